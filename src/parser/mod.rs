//! Log parser - raw log chunks in, progress snapshots out
//!
//! Chunks flow through a [`Segmenter`] into complete lines, command echoes
//! are picked out by the [`Tracker`], and every state change is pushed to an
//! [`Observer`]. The first snapshot is always `not_started_yet` and, when the
//! input completes cleanly, the last one is always `done`.

pub mod signal;
pub mod tracker;

use crate::config::BuildConfig;
use crate::segmenter::{Framing, Segmenter};
use crate::state::ProgressState;
use crate::Result;
use crossbeam::channel::{self, Receiver};
use std::convert::Infallible;
use std::thread;

pub use signal::{Flow, Observer, Signal};
pub use tracker::{action_text, Tracker, ACTION_MARKER};

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Input completed; `done` and completion were emitted
    Completed,
    /// Input failed; the error was forwarded
    Failed,
    /// The observer unsubscribed
    Cancelled,
}

/// Stateful half of a parse: one segmenter buffer and one tracker.
///
/// Drive it by hand when the producer pushes chunks through callbacks;
/// [`LogParser::run`] drives it from an iterator.
#[derive(Debug)]
pub struct Pipeline {
    segmenter: Segmenter,
    tracker: Tracker,
    closed: bool,
}

impl Pipeline {
    pub fn new(initial: ProgressState, framing: Framing) -> Self {
        Self {
            segmenter: Segmenter::new(framing),
            tracker: Tracker::new(initial),
            closed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Emit the initial snapshot
    pub fn start<E>(&mut self, observer: &mut impl Observer<ProgressState, E>) -> Flow {
        if self.closed {
            return Flow::Stop;
        }
        let flow = observer.on_next(self.tracker.state().clone());
        self.close_on_stop(flow)
    }

    /// Feed one chunk, emitting a snapshot per recognised action
    pub fn next<E>(&mut self, chunk: impl AsRef<[u8]>, observer: &mut impl Observer<ProgressState, E>) -> Flow {
        if self.closed {
            return Flow::Stop;
        }
        for line in self.segmenter.push(chunk) {
            tracing::trace!(line = %line.escape_debug(), "Line");
            if let Some(state) = self.tracker.observe(&line) {
                if observer.on_next(state) == Flow::Stop {
                    return self.close_on_stop(Flow::Stop);
                }
            }
        }
        Flow::Continue
    }

    /// Forward an input error; no `done` snapshot follows
    pub fn error<E>(&mut self, error: E, observer: &mut impl Observer<ProgressState, E>) {
        if self.closed {
            return;
        }
        self.close();
        observer.on_error(error);
    }

    /// Emit the `done` snapshot and complete the output.
    ///
    /// Returns `Flow::Stop` when the observer unsubscribed on `done`, in
    /// which case completion is not signalled.
    pub fn complete<E>(&mut self, observer: &mut impl Observer<ProgressState, E>) -> Flow {
        if self.closed {
            return Flow::Stop;
        }
        if let Some(fragment) = self.take_fragment() {
            tracing::warn!(fragment = %fragment.escape_debug(), "Discarding unterminated trailing line");
        }
        self.closed = true;
        let flow = observer.on_next(self.tracker.complete());
        if flow == Flow::Continue {
            observer.on_completed();
        } else {
            tracing::debug!("Observer unsubscribed on done");
        }
        flow
    }

    fn close_on_stop(&mut self, flow: Flow) -> Flow {
        if flow == Flow::Stop {
            tracing::debug!("Observer unsubscribed");
            self.close();
        }
        flow
    }

    fn close(&mut self) {
        self.take_fragment();
        self.closed = true;
    }

    fn take_fragment(&mut self) -> Option<String> {
        let framing = self.segmenter.framing();
        std::mem::replace(&mut self.segmenter, Segmenter::new(framing)).finish()
    }
}

/// Parses a Travis build log against a build configuration.
///
/// A `LogParser` holds no per-run state; every run gets a fresh buffer and
/// starts from the same initial state.
#[derive(Debug, Clone)]
pub struct LogParser {
    initial: ProgressState,
    framing: Framing,
}

impl LogParser {
    /// Create a parser for the stages and actions of `config`
    pub fn new(config: &BuildConfig) -> Result<Self> {
        Ok(Self::from_state(config.initial_state()?))
    }

    /// Create a parser starting from an already built state
    pub fn from_state(initial: ProgressState) -> Self {
        Self {
            initial,
            framing: Framing::default(),
        }
    }

    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    pub fn initial_state(&self) -> &ProgressState {
        &self.initial
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(self.initial.clone(), self.framing)
    }

    /// Push every snapshot of `input` to `observer`.
    ///
    /// The input ends at its first terminal signal; an iterator that runs
    /// out without one counts as completed.
    pub fn run<C, E, I, O>(&self, input: I, observer: &mut O) -> Outcome
    where
        C: AsRef<[u8]>,
        I: IntoIterator<Item = Signal<C, E>>,
        O: Observer<ProgressState, E>,
    {
        let mut pipeline = self.pipeline();
        if pipeline.start(observer) == Flow::Stop {
            return Outcome::Cancelled;
        }

        for signal in input {
            match signal {
                Signal::Next(chunk) => {
                    if pipeline.next(chunk, observer) == Flow::Stop {
                        return Outcome::Cancelled;
                    }
                }
                Signal::Error(error) => {
                    pipeline.error(error, observer);
                    return Outcome::Failed;
                }
                Signal::Completed => break,
            }
        }

        match pipeline.complete(observer) {
            Flow::Continue => Outcome::Completed,
            Flow::Stop => Outcome::Cancelled,
        }
    }

    /// Parse a complete log held in memory, as a single chunk
    pub fn parse_str(&self, contents: &str) -> Vec<ProgressState> {
        let mut signals: Vec<Signal<ProgressState, Infallible>> = Vec::new();
        self.run([Signal::<_, Infallible>::Next(contents)], &mut signals);
        signals
            .into_iter()
            .filter_map(|signal| match signal {
                Signal::Next(state) => Some(state),
                _ => None,
            })
            .collect()
    }

    /// Parse a complete log held in memory against `config`
    pub fn from_str(contents: &str, config: &BuildConfig) -> Result<Vec<ProgressState>> {
        Ok(Self::new(config)?.parse_str(contents))
    }

    /// Run the parser on its own thread between two channels.
    ///
    /// The returned receiver yields the snapshots followed by the terminal
    /// signal. Dropping it stops the parser at its next snapshot.
    pub fn spawn<C, E>(self, input: Receiver<Signal<C, E>>) -> (Receiver<Signal<ProgressState, E>>, thread::JoinHandle<Outcome>)
    where
        C: AsRef<[u8]> + Send + 'static,
        E: Send + 'static,
    {
        let (mut tx, rx) = channel::unbounded();
        let handle = thread::spawn(move || {
            let outcome = self.run(input, &mut tx);
            tracing::debug!(?outcome, "Log parser finished");
            outcome
        });
        (rx, handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::Stage;

    const MARKER: &str = ACTION_MARKER;

    fn snapshot_view(states: &[ProgressState]) -> Vec<(Stage, String, usize)> {
        states
            .iter()
            .map(|s| (s.current_stage(), s.current_action().to_string(), s.current_step()))
            .collect()
    }

    fn collect<C: AsRef<[u8]>>(parser: &LogParser, input: Vec<Signal<C, String>>) -> (Vec<Signal<ProgressState, String>>, Outcome) {
        let mut signals = Vec::new();
        let outcome = parser.run(input, &mut signals);
        (signals, outcome)
    }

    fn scenario_c_config() -> BuildConfig {
        BuildConfig::new()
            .with_stage("script", "make travis")
            .unwrap()
            .with_stage("install", vec!["composer install", "composer update"])
            .unwrap()
    }

    fn scenario_c_log() -> String {
        format!(
            "start\r\n{m}make travis\r\noutput\r\n{m}composer install\r\n{m}composer update\r\n{m}composer unknown\r\nend\r\n",
            m = MARKER
        )
    }

    #[test]
    fn test_scenario_a_no_actions() {
        let states = LogParser::from_str("abc\r\n", &BuildConfig::new()).unwrap();
        let stages: Vec<Stage> = states.iter().map(|s| s.current_stage()).collect();
        assert_eq!(stages, vec![Stage::NotStartedYet, Stage::Done]);
    }

    #[test]
    fn test_scenario_b_single_action() {
        let config = BuildConfig::new().with_stage("script", "make travis").unwrap();
        let log = format!("abc\r\ndef\r\n{}make travis\r\n", MARKER);
        let states = LogParser::from_str(&log, &config).unwrap();
        assert_eq!(
            snapshot_view(&states),
            vec![
                (Stage::NotStartedYet, String::new(), 0),
                (Stage::Script, "make travis".to_string(), 1),
                (Stage::Done, "make travis".to_string(), 0),
            ]
        );
    }

    #[test]
    fn test_scenario_c_multiple_stages() {
        let states = LogParser::from_str(&scenario_c_log(), &scenario_c_config()).unwrap();
        assert_eq!(
            snapshot_view(&states),
            vec![
                (Stage::NotStartedYet, String::new(), 0),
                (Stage::Script, "make travis".to_string(), 1),
                (Stage::Install, "composer install".to_string(), 1),
                (Stage::Install, "composer update".to_string(), 2),
                (Stage::Done, "composer update".to_string(), 0),
            ]
        );
    }

    #[test]
    fn test_single_byte_chunks_match_single_chunk() {
        let parser = LogParser::new(&scenario_c_config()).unwrap();
        let log = scenario_c_log();
        let whole = parser.parse_str(&log);

        let chunks: Vec<Signal<&[u8], String>> = log.as_bytes().chunks(1).map(Signal::Next).collect();
        let (signals, outcome) = collect(&parser, chunks);
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(signals.last(), Some(&Signal::Completed));

        let states: Vec<ProgressState> = signals
            .into_iter()
            .filter_map(|s| match s {
                Signal::Next(state) => Some(state),
                _ => None,
            })
            .collect();
        assert_eq!(states, whole);
    }

    #[test]
    fn test_monotonic_stages_for_lifecycle_ordered_log() {
        let config = BuildConfig::new()
            .with_stage("before_install", "phpenv config-rm xdebug.ini")
            .unwrap()
            .with_stage("install", vec!["composer install", "composer update"])
            .unwrap()
            .with_stage("script", vec!["make cs", "make unit"])
            .unwrap()
            .with_stage("after_script", "make coverage")
            .unwrap();
        let commands = [
            "phpenv config-rm xdebug.ini",
            "composer install",
            "composer update",
            "make cs",
            "make unit",
            "make coverage",
        ];
        let log: String = commands
            .iter()
            .map(|c| format!("{}{}\r\nsome output\r\n", MARKER, c))
            .collect();

        let states = LogParser::from_str(&log, &config).unwrap();
        assert_eq!(states.len(), commands.len() + 2);
        assert_eq!(states.first().unwrap().current_stage(), Stage::NotStartedYet);
        assert_eq!(states.last().unwrap().current_stage(), Stage::Done);
        for pair in states.windows(2) {
            assert!(pair[0].current_stage() <= pair[1].current_stage());
        }
    }

    #[test]
    fn test_upstream_error_is_forwarded_without_done() {
        let parser = LogParser::new(&scenario_c_config()).unwrap();
        let input = vec![
            Signal::Next(format!("{}make travis\r\n", MARKER)),
            Signal::Error("connection reset".to_string()),
            Signal::Next(format!("{}composer install\r\n", MARKER)),
        ];
        let (signals, outcome) = collect(&parser, input);

        assert_eq!(outcome, Outcome::Failed);
        assert_eq!(signals.len(), 3);
        assert_eq!(signals[2], Signal::Error("connection reset".to_string()));
        assert!(signals.iter().all(|s| match s {
            Signal::Next(state) => state.current_stage() != Stage::Done,
            _ => true,
        }));
    }

    #[test]
    fn test_error_drops_buffered_fragment() {
        let parser = LogParser::new(&scenario_c_config()).unwrap();
        let input = vec![
            Signal::Next(format!("{}make tr", MARKER)),
            Signal::Error("boom".to_string()),
        ];
        let (signals, _) = collect(&parser, input);
        assert_eq!(signals.len(), 2);
        assert!(matches!(&signals[0], Signal::Next(s) if s.current_stage() == Stage::NotStartedYet));
    }

    #[test]
    fn test_unterminated_trailing_line_is_discarded() {
        let config = BuildConfig::new().with_stage("script", "make travis").unwrap();
        let log = format!("abc\r\n{}make travis", MARKER);
        let states = LogParser::from_str(&log, &config).unwrap();
        let stages: Vec<Stage> = states.iter().map(|s| s.current_stage()).collect();
        assert_eq!(stages, vec![Stage::NotStartedYet, Stage::Done]);
    }

    #[test]
    fn test_completed_signal_ends_input() {
        let config = BuildConfig::new().with_stage("script", "make travis").unwrap();
        let parser = LogParser::new(&config).unwrap();
        let input = vec![
            Signal::Completed,
            Signal::Next(format!("{}make travis\r\n", MARKER)),
        ];
        let (signals, outcome) = collect(&parser, input);
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(signals.len(), 3);
        assert!(matches!(&signals[1], Signal::Next(s) if s.current_stage() == Stage::Done));
    }

    struct StopAfter {
        remaining: usize,
        seen: Vec<ProgressState>,
        terminal: bool,
    }

    impl Observer<ProgressState, String> for StopAfter {
        fn on_next(&mut self, item: ProgressState) -> Flow {
            self.seen.push(item);
            self.remaining -= 1;
            if self.remaining == 0 { Flow::Stop } else { Flow::Continue }
        }

        fn on_error(&mut self, _error: String) {
            self.terminal = true;
        }

        fn on_completed(&mut self) {
            self.terminal = true;
        }
    }

    #[test]
    fn test_unsubscribe_stops_processing() {
        let parser = LogParser::new(&scenario_c_config()).unwrap();
        let mut observer = StopAfter { remaining: 2, seen: Vec::new(), terminal: false };
        let input: Vec<Signal<String, String>> = vec![Signal::Next(scenario_c_log())];
        let outcome = parser.run(input, &mut observer);

        assert_eq!(outcome, Outcome::Cancelled);
        assert_eq!(observer.seen.len(), 2);
        assert_eq!(observer.seen[1].current_stage(), Stage::Script);
        assert!(!observer.terminal);
    }

    #[test]
    fn test_pipeline_ignores_input_after_close() {
        let parser = LogParser::new(&scenario_c_config()).unwrap();
        let mut pipeline = parser.pipeline();
        let mut signals: Vec<Signal<ProgressState, String>> = Vec::new();
        pipeline.start(&mut signals);
        assert_eq!(pipeline.complete(&mut signals), Flow::Continue);
        assert!(pipeline.is_closed());
        assert_eq!(pipeline.next(format!("{}make travis\r\n", MARKER), &mut signals), Flow::Stop);
        assert_eq!(pipeline.complete(&mut signals), Flow::Stop);
        assert_eq!(signals.len(), 3);
    }

    #[test]
    fn test_unsubscribe_on_done_is_cancelled() {
        let parser = LogParser::new(&scenario_c_config()).unwrap();
        // initial snapshot, then `done`
        let mut observer = StopAfter { remaining: 2, seen: Vec::new(), terminal: false };
        let input: Vec<Signal<&str, String>> = vec![Signal::Next("abc\r\n")];
        let outcome = parser.run(input, &mut observer);

        assert_eq!(outcome, Outcome::Cancelled);
        assert_eq!(observer.seen.len(), 2);
        assert_eq!(observer.seen[1].current_stage(), Stage::Done);
        assert!(!observer.terminal);
    }

    #[test]
    fn test_runs_are_independent_and_deterministic() {
        let parser = LogParser::new(&scenario_c_config()).unwrap();
        let first = parser.parse_str(&scenario_c_log());
        let second = parser.parse_str(&scenario_c_log());
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_cr_framing_with_repainted_lines() {
        let config = BuildConfig::new().with_stage("script", "make travis").unwrap();
        let parser = LogParser::new(&config).unwrap().with_framing(Framing::Cr);
        let log = format!("travis_fold:end:git.checkout\r{}make travis\r\nok\r\n", MARKER);
        let states = parser.parse_str(&log);
        let stages: Vec<Stage> = states.iter().map(|s| s.current_stage()).collect();
        assert_eq!(stages, vec![Stage::NotStartedYet, Stage::Script, Stage::Done]);
    }

    #[test]
    fn test_spawn_over_channels() {
        let parser = LogParser::new(&scenario_c_config()).unwrap();
        let (tx, rx) = channel::unbounded::<Signal<Vec<u8>, String>>();
        let (snapshots, handle) = parser.spawn(rx);

        for chunk in scenario_c_log().as_bytes().chunks(7) {
            tx.send(Signal::Next(chunk.to_vec())).unwrap();
        }
        tx.send(Signal::Completed).unwrap();

        let signals: Vec<Signal<ProgressState, String>> = snapshots.iter().collect();
        assert_eq!(handle.join().unwrap(), Outcome::Completed);
        assert_eq!(signals.len(), 6);
        assert_eq!(signals.last(), Some(&Signal::Completed));
    }

    #[test]
    fn test_spawn_forwards_error() {
        let parser = LogParser::new(&BuildConfig::new()).unwrap();
        let (tx, rx) = channel::unbounded::<Signal<Vec<u8>, String>>();
        let (snapshots, handle) = parser.spawn(rx);
        tx.send(Signal::Error("read failed".to_string())).unwrap();

        let signals: Vec<Signal<ProgressState, String>> = snapshots.iter().collect();
        assert_eq!(handle.join().unwrap(), Outcome::Failed);
        assert_eq!(signals.len(), 2);
        assert_eq!(signals[1], Signal::Error("read failed".to_string()));
    }

    #[test]
    fn test_spawn_stops_when_receiver_dropped() {
        let parser = LogParser::new(&scenario_c_config()).unwrap();
        let (tx, rx) = channel::unbounded::<Signal<Vec<u8>, String>>();
        let (snapshots, handle) = parser.spawn(rx);
        let first = snapshots.recv().unwrap();
        assert!(matches!(first, Signal::Next(ref s) if s.current_stage() == Stage::NotStartedYet));
        drop(snapshots);

        tx.send(Signal::Next(scenario_c_log().into_bytes())).unwrap();
        assert_eq!(handle.join().unwrap(), Outcome::Cancelled);
    }
}
