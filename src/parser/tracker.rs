//! Stage tracker - folds command echo lines into progress snapshots

use crate::action::Action;
use crate::state::ProgressState;

/// Prefix Travis writes before echoing a command it is about to run:
/// an ANSI "clear line" sequence followed by a shell prompt.
pub const ACTION_MARKER: &str = "\x1b[0K$ ";

/// The command announced by a log line, if the line is a command echo
pub fn action_text(line: &str) -> Option<&str> {
    line.strip_prefix(ACTION_MARKER).map(str::trim)
}

/// Holds the current progress and advances it line by line.
///
/// Only command echoes of configured actions change the state; every other
/// line is ordinary build output.
#[derive(Debug, Clone)]
pub struct Tracker {
    state: ProgressState,
}

impl Tracker {
    pub fn new(initial: ProgressState) -> Self {
        Self { state: initial }
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    /// Feed one complete log line, returning the new state if it changed
    pub fn observe(&mut self, line: &str) -> Option<ProgressState> {
        let command = action_text(line)?;

        match self.state.with_current_action(Action::new(command)) {
            Ok(next) => {
                tracing::trace!(stage = %next.current_stage(), command, "Action started");
                self.state = next.clone();
                Some(next)
            }
            Err(_) => {
                // most likely one of Travis' own commands
                tracing::debug!(command, "Ignoring unconfigured command");
                None
            }
        }
    }

    /// Move to the `done` sentinel at the end of the stream
    pub fn complete(&mut self) -> ProgressState {
        self.state = self.state.finished();
        self.state.clone()
    }
}
