use serde::Serialize;

pub const FULLSCREEN_EXIT_REASON: &str = "Exited fullscreen mode.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
pub enum FullscreenPhase {
    NotStarted,
    Fullscreen,
    ExitedWarning,
}

/// Result of feeding a fullscreen change into the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullscreenTransition {
    /// The candidate left fullscreen; record a general violation
    Exited,
    Restored,
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FullscreenState {
    pub has_entered_fullscreen: bool,
    pub is_currently_fullscreen: bool,
}

#[derive(Debug, Clone)]
pub struct FullscreenMonitor {
    state: FullscreenState,
    phase: FullscreenPhase,
}

impl Default for FullscreenMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl FullscreenMonitor {
    pub fn new() -> Self {
        Self {
            state: FullscreenState::default(),
            phase: FullscreenPhase::NotStarted,
        }
    }

    pub fn phase(&self) -> FullscreenPhase {
        self.phase
    }

    pub fn state(&self) -> FullscreenState {
        self.state
    }

    pub fn warning_showing(&self) -> bool {
        self.phase == FullscreenPhase::ExitedWarning
    }

    /// Candidate consented to start. Monitoring begins even if the host
    /// could not actually enter fullscreen.
    pub fn start(&mut self, granted: bool) {
        if !granted {
            log::warn!("fullscreen request was not granted; monitoring anyway");
        }
        self.state.has_entered_fullscreen = true;
        self.state.is_currently_fullscreen = granted;
        self.phase = FullscreenPhase::Fullscreen;
    }

    pub fn on_change(&mut self, active: bool, submitting: bool) -> FullscreenTransition {
        let was_active = self.state.is_currently_fullscreen;
        self.state.is_currently_fullscreen = active;

        if !self.state.has_entered_fullscreen {
            return FullscreenTransition::Unchanged;
        }

        match (active, self.phase) {
            // only a real active -> inactive change counts
            (false, FullscreenPhase::Fullscreen) if was_active && !submitting => {
                self.phase = FullscreenPhase::ExitedWarning;
                FullscreenTransition::Exited
            }
            (true, FullscreenPhase::ExitedWarning) => {
                self.phase = FullscreenPhase::Fullscreen;
                FullscreenTransition::Restored
            }
            (true, FullscreenPhase::Fullscreen) if !was_active => FullscreenTransition::Restored,
            _ => FullscreenTransition::Unchanged,
        }
    }
}
