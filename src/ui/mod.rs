pub mod icons;
pub mod json;
pub mod output;
pub mod progress;
pub mod progress_message;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use json::JsonRenderer;
pub use output::{error, header, info, section, success, summary_row, warn};
pub use progress::{BarsRenderer, ProgressManager};
pub use progress_message::ProgressMessage;
pub use table::{plan_table, progress_table, TableRenderer};
pub use theme::{theme, Theme};

use crate::state::ProgressState;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// How snapshots are drawn
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RenderFormat {
    /// Progress table redrawn in place
    #[default]
    Table,
    /// One progress bar per stage
    Bars,
    /// Newline-delimited JSON snapshots
    Json,
}

/// Consumer of the snapshot stream.
///
/// Every snapshot is drawn in full, so redrawing the same one twice is
/// harmless.
pub trait Renderer {
    fn snapshot(&mut self, state: &ProgressState) -> anyhow::Result<()>;
    fn failed(&mut self, error: &dyn Display);
    fn finished(&mut self);
}

pub fn renderer(format: RenderFormat) -> Box<dyn Renderer> {
    match format {
        RenderFormat::Table => Box::new(TableRenderer::new()),
        RenderFormat::Bars => Box::new(BarsRenderer::new()),
        RenderFormat::Json => Box::new(JsonRenderer::new(std::io::stdout())),
    }
}
