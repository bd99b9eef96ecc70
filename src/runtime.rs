use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyEvent};

pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Unified event type consumed by the exam host loop
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostEvent {
    Key(KeyEvent),
    Paste(String),
    FocusLost,
    FocusGained,
    Resize(u16, u16),
    Tick,
}

/// Source of terminal events (keyboard, paste, focus, resize)
pub trait HostEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<HostEvent, RecvTimeoutError>;
}

/// Production event source using crossterm
pub struct CrosstermEventSource {
    rx: Receiver<HostEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            let mapped = match event::read() {
                Ok(CtEvent::Key(key)) => Some(HostEvent::Key(key)),
                Ok(CtEvent::Paste(text)) => Some(HostEvent::Paste(text)),
                Ok(CtEvent::FocusLost) => Some(HostEvent::FocusLost),
                Ok(CtEvent::FocusGained) => Some(HostEvent::FocusGained),
                Ok(CtEvent::Resize(cols, rows)) => Some(HostEvent::Resize(cols, rows)),
                Ok(_) => None,
                Err(_) => break,
            };
            if let Some(ev) = mapped {
                if tx.send(ev).is_err() {
                    break;
                }
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl HostEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<HostEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for FixedTicker {
    fn default() -> Self {
        Self::new(TICK_INTERVAL)
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Test event source for unit tests
pub struct TestEventSource {
    rx: Receiver<HostEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<HostEvent>) -> Self {
        Self { rx }
    }
}

impl HostEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<HostEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Runner that advances the host one event/tick at a time. Ticks are paced
/// against a deadline so a burst of input does not stretch the countdown.
pub struct Runner<E: HostEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
    next_tick: std::cell::Cell<Instant>,
}

impl<E: HostEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        let next_tick = Instant::now() + ticker.interval();
        Self {
            event_source,
            ticker,
            next_tick: std::cell::Cell::new(next_tick),
        }
    }

    /// Blocks until the next tick deadline and returns the next event, or Tick when it passes
    pub fn step(&self) -> HostEvent {
        let now = Instant::now();
        let deadline = self.next_tick.get();
        if now >= deadline {
            self.next_tick.set(deadline + self.ticker.interval());
            return HostEvent::Tick;
        }
        match self.event_source.recv_timeout(deadline - now) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) => {
                self.next_tick.set(deadline + self.ticker.interval());
                HostEvent::Tick
            }
            Err(RecvTimeoutError::Disconnected) => {
                // no input left; keep the countdown paced
                std::thread::sleep(deadline.saturating_duration_since(Instant::now()));
                self.next_tick.set(deadline + self.ticker.interval());
                HostEvent::Tick
            }
        }
    }
}
