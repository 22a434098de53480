//! travis-log-parser CLI - follow a Travis CI build log stage by stage

use anyhow::Context;
use clap::{Parser, Subcommand};
use crossbeam::channel::{self, Receiver};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use travis_log_parser::config::{self, AppConfig};
use travis_log_parser::ui::{self, Icons, RenderFormat};
use travis_log_parser::{BuildConfig, Framing, LogParser, Signal};

const CHUNK_SIZE: usize = 8 * 1024;

#[derive(Parser)]
#[command(name = "travis-log-parser")]
#[command(version)]
#[command(about = "Follow a Travis CI build log and show which stage and action is running")]
#[command(long_about = r#"
Reads a raw Travis CI job log, recognises the commands configured in
.travis.yml as they are echoed, and renders live per-stage progress.

Example usage:
  travis-log-parser watch --log job.log
  curl -s https://api.travis-ci.org/v3/job/1234/log.txt | travis-log-parser watch --framing cr
  travis-log-parser stages --travis-config .travis.yml
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the tool settings (defaults to travis-log-parser.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a build log and render progress as it streams in
    Watch {
        /// Build log to read, `-` or nothing for stdin
        #[arg(short, long)]
        log: Option<PathBuf>,

        /// Build configuration (defaults to .travis.yml)
        #[arg(short, long)]
        travis_config: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<RenderFormat>,

        /// Line framing of the log: crlf, or cr for raw logs with repainted lines
        #[arg(long)]
        framing: Option<Framing>,

        /// Pause after every snapshot, in milliseconds
        #[arg(long)]
        delay: Option<u64>,
    },

    /// List the stages and actions found in the build configuration
    Stages {
        /// Build configuration (defaults to .travis.yml)
        #[arg(short, long)]
        travis_config: Option<PathBuf>,
    },

    /// Write a default settings file
    Init {
        /// Overwrite an existing settings file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for the rendered progress
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();

    let settings = config::load_config(cli.config.as_deref())?.unwrap_or_default();

    match cli.command {
        Commands::Watch { log, travis_config, format, framing, delay } => {
            let travis_path = travis_config_path(travis_config, &settings);
            let build = load_build_config(&travis_path)?;
            let framing = framing.or(settings.framing).unwrap_or_default();
            let format = format.or(settings.format).unwrap_or_default();
            let delay = Duration::from_millis(delay.or(settings.redraw_delay_ms).unwrap_or(0));

            if format != RenderFormat::Json && !travis_log_parser::output::is_quiet() {
                ui::header(&format!("Following {}", describe_source(log.as_deref())));
                ui::info("Build configuration", &travis_path.display().to_string());
            }

            tracing::info!(?framing, ?format, "Parsing build log");
            let parser = LogParser::new(&build)?.with_framing(framing);
            let (snapshots, handle) = parser.spawn(read_chunks(log));
            let mut renderer = ui::renderer(format);

            for signal in snapshots {
                match signal {
                    Signal::Next(state) => {
                        renderer.snapshot(&state)?;
                        if !delay.is_zero() {
                            thread::sleep(delay);
                        }
                    }
                    Signal::Error(error) => {
                        renderer.failed(&error);
                        return Err(anyhow::Error::new(error).context("failed to read build log"));
                    }
                    Signal::Completed => renderer.finished(),
                }
            }

            let outcome = handle
                .join()
                .map_err(|_| anyhow::anyhow!("log parser thread panicked"))?;
            tracing::debug!(?outcome, "Build log finished");
        }

        Commands::Stages { travis_config } => {
            let travis_path = travis_config_path(travis_config, &settings);
            let state = load_build_config(&travis_path)?.initial_state()?;

            ui::section(&format!("{} Stages in {}", Icons::PACKAGE, travis_path.display()));
            let table = ui::plan_table(&state);
            if table.is_empty() {
                ui::warn("No actions configured for any stage.");
            } else {
                println!("{}", table);
                let stages = state.stages_with_actions();
                let actions: usize = stages.iter().map(|(_, actions)| actions.len()).sum();
                ui::summary_row("Stages:", &stages.len().to_string());
                ui::summary_row("Actions:", &actions.to_string());
            }
        }

        Commands::Init { force } => {
            let path = cli.config.unwrap_or_else(config::default_config_path);
            config::write_config(&path, &AppConfig::starter(), force)?;
            ui::success(&format!("Wrote {}", path.display()));
        }
    }

    Ok(())
}

fn travis_config_path(flag: Option<PathBuf>, settings: &AppConfig) -> PathBuf {
    flag.or_else(|| settings.travis_config.as_ref().map(PathBuf::from))
        .unwrap_or_else(config::default_travis_config_path)
}

fn load_build_config(path: &Path) -> anyhow::Result<BuildConfig> {
    BuildConfig::load(path).with_context(|| format!("failed to load build configuration {}", path.display()))
}

fn is_stdin(log: Option<&Path>) -> bool {
    log.is_none_or(|path| path == Path::new("-"))
}

fn describe_source(log: Option<&Path>) -> String {
    if is_stdin(log) {
        "stdin".to_string()
    } else {
        log.map(|p| p.display().to_string()).unwrap_or_default()
    }
}

/// Read the log on its own thread, one chunk per signal.
///
/// The channel is bounded, so a slow renderer holds the reader back.
fn read_chunks(log: Option<PathBuf>) -> Receiver<Signal<Vec<u8>, io::Error>> {
    let (tx, rx) = channel::bounded(64);

    thread::spawn(move || {
        let reader: io::Result<Box<dyn Read>> = match log {
            Some(path) if !is_stdin(Some(&path)) => {
                std::fs::File::open(&path).map(|file| Box::new(file) as Box<dyn Read>)
            }
            _ => Ok(Box::new(io::stdin())),
        };
        let mut reader = match reader {
            Ok(reader) => reader,
            Err(e) => {
                tx.send(Signal::Error(e)).ok();
                return;
            }
        };

        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => {
                    tx.send(Signal::Completed).ok();
                    break;
                }
                Ok(n) => {
                    // receiver gone: the parser stopped
                    if tx.send(Signal::Next(buf[..n].to_vec())).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tx.send(Signal::Error(e)).ok();
                    break;
                }
            }
        }
    });

    rx
}
