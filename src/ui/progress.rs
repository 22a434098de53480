use crate::stage::{Stage, StageStatus};
use crate::state::ProgressState;
use crate::ui::progress_message::ProgressMessage;
use crate::ui::{theme, Icons, Renderer};
use indicatif::{HumanDuration, MultiProgress, ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::fmt::Display;
use std::thread;
use std::time::Instant;

/// One progress bar per stage, redrawn from a channel on its own thread
pub struct ProgressManager {
    _mp: MultiProgress,
    handle: thread::JoinHandle<()>,
}

impl ProgressManager {
    pub fn new() -> (Self, crossbeam::channel::Sender<ProgressMessage>) {
        let (tx, rx) = crossbeam::channel::unbounded::<ProgressMessage>();

        let mp = MultiProgress::new();
        let style = ProgressStyle::with_template("{prefix:>15} [{bar:20}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");

        let bars: Vec<(Stage, ProgressBar)> = Stage::all()
            .iter()
            .map(|&stage| {
                let bar = if console::Term::stdout().is_term() {
                    mp.add(ProgressBar::new(0))
                } else {
                    ProgressBar::hidden()
                };
                bar.set_style(style.clone());
                bar.set_prefix(stage.as_str());
                bar.set_message(StageStatus::Waiting.as_str());
                (stage, bar)
            })
            .collect();

        let handle = thread::spawn(move || {
            for msg in rx {
                match msg {
                    ProgressMessage::Snapshot(state) => {
                        let summary = state.summary();
                        for (stage, bar) in &bars {
                            let row = summary.get(*stage);
                            bar.set_length(row.steps as u64);
                            bar.set_position(row.step as u64);
                            if row.status == StageStatus::Running && !state.current_action().is_empty() {
                                bar.set_message(format!("{}: {}", row.status, state.current_action()));
                            } else {
                                bar.set_message(row.status.as_str());
                            }
                        }
                    }
                    ProgressMessage::Failed(error) => {
                        for (_, bar) in &bars {
                            bar.abandon_with_message(format!("failed: {}", error));
                        }
                        break;
                    }
                    ProgressMessage::Finished => {
                        for (_, bar) in &bars {
                            bar.finish();
                        }
                        break;
                    }
                }
            }
        });

        (
            Self { _mp: mp, handle },
            tx,
        )
    }

    /// Wait for the renderer thread to draw everything it was sent
    pub fn join(self) {
        self.handle.join().ok();
    }
}

/// Drives a [`ProgressManager`] as a snapshot renderer
pub struct BarsRenderer {
    tx: Option<crossbeam::channel::Sender<ProgressMessage>>,
    manager: Option<ProgressManager>,
    started: Instant,
}

impl BarsRenderer {
    pub fn new() -> Self {
        let (manager, tx) = ProgressManager::new();
        Self {
            tx: Some(tx),
            manager: Some(manager),
            started: Instant::now(),
        }
    }

    fn send(&self, msg: ProgressMessage) {
        if let Some(tx) = &self.tx {
            tx.send(msg).ok();
        }
    }

    /// Close the channel and wait for the last redraw
    fn settle(&mut self) {
        self.tx.take();
        if let Some(manager) = self.manager.take() {
            manager.join();
        }
    }
}

impl Default for BarsRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for BarsRenderer {
    fn snapshot(&mut self, state: &ProgressState) -> anyhow::Result<()> {
        self.send(ProgressMessage::Snapshot(state.clone()));
        Ok(())
    }

    fn failed(&mut self, error: &dyn Display) {
        self.send(ProgressMessage::Failed(error.to_string()));
        self.settle();
        crate::ui::error(&format!("Log stream failed: {}", error));
    }

    fn finished(&mut self) {
        self.send(ProgressMessage::Finished);
        self.settle();
        println!(
            "{} {}",
            Icons::CHECK.style(theme().success.clone()),
            format!("Done! ({})", HumanDuration(self.started.elapsed())).style(theme().success.clone())
        );
    }
}

impl Drop for BarsRenderer {
    fn drop(&mut self) {
        self.settle();
    }
}
