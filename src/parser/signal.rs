//! Push-stream protocol shared by the log input and the snapshot output
//!
//! A stream is any number of `Next` items followed by at most one terminal
//! signal, `Error` or `Completed`.

use crossbeam::channel::Sender;

/// One event of a push stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal<T, E> {
    Next(T),
    Error(E),
    Completed,
}

impl<T, E> Signal<T, E> {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Signal::Next(_))
    }
}

/// Whether the consumer wants more items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// The consumer unsubscribed; no further signal of any kind is sent
    Stop,
}

/// Receives the signals of a push stream.
pub trait Observer<T, E> {
    fn on_next(&mut self, item: T) -> Flow;
    fn on_error(&mut self, error: E);
    fn on_completed(&mut self);
}

/// Collects every signal, terminal ones included
impl<T, E> Observer<T, E> for Vec<Signal<T, E>> {
    fn on_next(&mut self, item: T) -> Flow {
        self.push(Signal::Next(item));
        Flow::Continue
    }

    fn on_error(&mut self, error: E) {
        self.push(Signal::Error(error));
    }

    fn on_completed(&mut self) {
        self.push(Signal::Completed);
    }
}

/// Forwards signals into a channel; a dropped receiver unsubscribes
impl<T, E> Observer<T, E> for Sender<Signal<T, E>> {
    fn on_next(&mut self, item: T) -> Flow {
        match self.send(Signal::Next(item)) {
            Ok(()) => Flow::Continue,
            Err(_) => Flow::Stop,
        }
    }

    fn on_error(&mut self, error: E) {
        self.send(Signal::Error(error)).ok();
    }

    fn on_completed(&mut self) {
        self.send(Signal::Completed).ok();
    }
}
