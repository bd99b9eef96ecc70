use serde::Serialize;

pub const FIVE_MINUTE_MARK: u32 = 301;
pub const FORCE_SAVE_MARKS: [u32; 2] = [30, 5];

/// Side effects requested by a single tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    FiveMinuteWarning,
    ForceSave { last: bool },
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClockState {
    pub remaining_seconds: u32,
    pub tick_interval_active: bool,
}

#[derive(Debug, Clone)]
pub struct SessionClock {
    state: SessionClockState,
    five_minute_mark: u32,
    force_save_marks: Vec<u32>,
    warned: bool,
}

impl SessionClock {
    pub fn new(duration_secs: u32) -> Self {
        Self::with_marks(duration_secs, FIVE_MINUTE_MARK, FORCE_SAVE_MARKS.to_vec())
    }

    pub fn with_marks(duration_secs: u32, five_minute_mark: u32, force_save_marks: Vec<u32>) -> Self {
        Self {
            state: SessionClockState {
                remaining_seconds: duration_secs,
                tick_interval_active: false,
            },
            five_minute_mark,
            force_save_marks,
            warned: false,
        }
    }

    pub fn start(&mut self) {
        self.state.tick_interval_active = true;
    }

    /// Cancel the interval; no further ticks decrement
    pub fn stop(&mut self) {
        self.state.tick_interval_active = false;
    }

    pub fn state(&self) -> SessionClockState {
        self.state
    }

    pub fn remaining(&self) -> u32 {
        self.state.remaining_seconds
    }

    pub fn is_running(&self) -> bool {
        self.state.tick_interval_active
    }

    /// Checkpoints are evaluated against the value before the decrement, so a
    /// tick from 301 to 300 fires the five-minute warning.
    pub fn tick(&mut self) -> Vec<Checkpoint> {
        if !self.state.tick_interval_active {
            return Vec::new();
        }

        let prev = self.state.remaining_seconds;
        let mut fired = Vec::new();

        if prev == self.five_minute_mark && !self.warned {
            self.warned = true;
            fired.push(Checkpoint::FiveMinuteWarning);
        }
        if let Some(pos) = self.force_save_marks.iter().position(|m| *m == prev) {
            fired.push(Checkpoint::ForceSave {
                last: pos + 1 == self.force_save_marks.len(),
            });
        }

        if prev <= 1 {
            self.state.remaining_seconds = 0;
            self.stop();
            fired.push(Checkpoint::Expired);
        } else {
            self.state.remaining_seconds = prev - 1;
        }
        fired
    }
}

/// `mm:ss` rendering of the remaining time
pub fn format_remaining(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
