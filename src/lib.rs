//! # travis-log-parser - live build progress from a Travis CI log
//!
//! Feeds a raw build log, in whatever chunks it arrives, through:
//! - A line segmenter that re-frames the byte stream into complete lines
//! - A stage tracker that recognises the command echoes of configured actions
//! - An immutable progress state with a per-stage summary for rendering
//!
//! ```no_run
//! use travis_log_parser::{BuildConfig, LogParser};
//!
//! let config = BuildConfig::from_yaml_str("script: make travis")?;
//! for state in LogParser::from_str("\x1b[0K$ make travis\r\n", &config)? {
//!     println!("{} {}", state.current_stage(), state.current_action());
//! }
//! # Ok::<(), travis_log_parser::Error>(())
//! ```

pub mod action;
pub mod stage;
pub mod state;
pub mod summary;
pub mod segmenter;
pub mod parser;
pub mod config;
pub mod output;
pub mod ui;

// Re-exports for convenient access
pub use action::Action;
pub use stage::{Stage, StageStatus};
pub use state::{ProgressState, StageAssignment};
pub use summary::{StageSummary, Summary};
pub use segmenter::{Framing, Segmenter};
pub use parser::{LogParser, Observer, Outcome, Signal};
pub use config::{ActionValue, AppConfig, BuildConfig};

/// Result type alias for parser operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for parser operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Stage \"{0}\" doesn't exist")]
    UnknownStage(String),

    #[error("Stage \"{0}\" cannot hold actions")]
    SentinelStage(Stage),

    #[error("Invalid actions for stage \"{stage}\": {reason}")]
    InvalidActions { stage: String, reason: String },

    #[error("No stage found for action \"{0}\"")]
    ActionNotFound(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
