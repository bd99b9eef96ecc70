use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

pub const DEFAULT_STRIKE_THRESHOLD: u8 = 3;

/// Classification attached to every cheating log entry
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    strum_macros::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ViolationKind {
    TabSwitch,
    WindowSwitch,
    ScreenshotAttempt,
    FullscreenExit,
    Violation,
    CopyPasteBlocked,
    SelectAllBlocked,
    KeyboardViolation,
}

/// The two independent strike channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Channel {
    General,
    Keyboard,
}

impl ViolationKind {
    /// Best-effort keyword classification of a general-channel reason
    pub fn classify_general(reason: &str) -> Self {
        let r = reason.to_lowercase();
        if r.contains("tab") {
            ViolationKind::TabSwitch
        } else if r.contains("window") || r.contains("focus") {
            ViolationKind::WindowSwitch
        } else if r.contains("screenshot") || r.contains("print") {
            ViolationKind::ScreenshotAttempt
        } else if r.contains("fullscreen") {
            ViolationKind::FullscreenExit
        } else {
            ViolationKind::Violation
        }
    }

    /// Best-effort keyword classification of a keyboard-channel reason
    pub fn classify_keyboard(reason: &str) -> Self {
        let r = reason.to_lowercase();
        if r.contains("copy") || r.contains("paste") || r.contains("cut") {
            ViolationKind::CopyPasteBlocked
        } else if r.contains("select") {
            ViolationKind::SelectAllBlocked
        } else {
            ViolationKind::KeyboardViolation
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheatingLog {
    #[serde(rename = "type")]
    pub kind: ViolationKind,
    pub details: String,
    pub time: DateTime<Local>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationState {
    pub general_count: u8,
    pub keyboard_count: u8,
    pub cheating_logs: Vec<CheatingLog>,
    pub auto_cheating_detected: bool,
}

impl ViolationState {
    /// Whether the submission should be flagged as cheating
    pub fn cheating_detected(&self, threshold: u8) -> bool {
        self.auto_cheating_detected
            || self.general_count >= threshold
            || !self.cheating_logs.is_empty()
    }
}

/// What the caller must do after a violation is recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// Nothing changed: session submitting or channel already at the threshold
    Ignored,
    Warning { channel: Channel, count: u8 },
    FinalWarning { channel: Channel, count: u8 },
    /// Threshold reached but auto-submit for the channel is disabled
    LimitReached { channel: Channel },
    /// Threshold reached; the caller must submit exactly once
    Exceeded { channel: Channel },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrikePolicy {
    pub threshold: u8,
    pub keyboard_auto_submit: bool,
}

impl Default for StrikePolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_STRIKE_THRESHOLD,
            keyboard_auto_submit: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ViolationTracker {
    state: ViolationState,
    policy: StrikePolicy,
    // set once an `Exceeded` has been handed out
    exceeded: bool,
}

impl ViolationTracker {
    pub fn new(policy: StrikePolicy) -> Self {
        Self {
            state: ViolationState::default(),
            policy,
            exceeded: false,
        }
    }

    /// Resume from a persisted ledger
    pub fn with_state(policy: StrikePolicy, state: ViolationState) -> Self {
        let mut state = state;
        state.general_count = state.general_count.min(policy.threshold);
        state.keyboard_count = state.keyboard_count.min(policy.threshold);
        Self {
            state,
            policy,
            exceeded: false,
        }
    }

    pub fn policy(&self) -> StrikePolicy {
        self.policy
    }

    pub fn state(&self) -> &ViolationState {
        &self.state
    }

    pub fn snapshot(&self) -> ViolationState {
        self.state.clone()
    }

    pub fn cheating_detected(&self) -> bool {
        self.state.cheating_detected(self.policy.threshold)
    }

    /// A general violation arriving while the count already sits at the
    /// threshold (filled by keyboard strikes) still ends the exam, once.
    pub fn record_general(&mut self, reason: &str, submitting: bool) -> Escalation {
        if submitting || self.exceeded {
            return Escalation::Ignored;
        }

        if self.state.general_count < self.policy.threshold {
            self.state.general_count += 1;
        }
        self.push_log(ViolationKind::classify_general(reason), reason);
        log::warn!(
            "general violation {}/{}: {}",
            self.state.general_count,
            self.policy.threshold,
            reason
        );

        let count = self.state.general_count;
        if count >= self.policy.threshold {
            self.state.auto_cheating_detected = true;
            self.exceeded = true;
            Escalation::Exceeded {
                channel: Channel::General,
            }
        } else {
            self.warning_for(Channel::General, count)
        }
    }

    pub fn record_keyboard(&mut self, reason: &str, submitting: bool) -> Escalation {
        if submitting || self.state.keyboard_count >= self.policy.threshold {
            return Escalation::Ignored;
        }

        self.state.keyboard_count += 1;
        // keyboard strikes also count toward the shared general total
        if self.state.general_count < self.policy.threshold {
            self.state.general_count += 1;
        }
        self.push_log(ViolationKind::classify_keyboard(reason), reason);
        log::warn!(
            "keyboard violation {}/{}: {}",
            self.state.keyboard_count,
            self.policy.threshold,
            reason
        );

        let count = self.state.keyboard_count;
        if count < self.policy.threshold {
            return self.warning_for(Channel::Keyboard, count);
        }
        if self.policy.keyboard_auto_submit {
            self.state.auto_cheating_detected = true;
            self.exceeded = true;
            Escalation::Exceeded {
                channel: Channel::Keyboard,
            }
        } else {
            Escalation::LimitReached {
                channel: Channel::Keyboard,
            }
        }
    }

    fn warning_for(&self, channel: Channel, count: u8) -> Escalation {
        if count + 1 >= self.policy.threshold {
            Escalation::FinalWarning { channel, count }
        } else {
            Escalation::Warning { channel, count }
        }
    }

    fn push_log(&mut self, kind: ViolationKind, details: &str) {
        self.state.cheating_logs.push(CheatingLog {
            kind,
            details: details.to_string(),
            time: Local::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_general() {
        assert_eq!(
            ViolationKind::classify_general("Tab switch detected."),
            ViolationKind::TabSwitch
        );
        assert_eq!(
            ViolationKind::classify_general("Window focus lost."),
            ViolationKind::WindowSwitch
        );
        assert_eq!(
            ViolationKind::classify_general("Lost focus"),
            ViolationKind::WindowSwitch
        );
        assert_eq!(
            ViolationKind::classify_general("Screenshot attempt detected."),
            ViolationKind::ScreenshotAttempt
        );
        assert_eq!(
            ViolationKind::classify_general("Print shortcut blocked."),
            ViolationKind::ScreenshotAttempt
        );
        assert_eq!(
            ViolationKind::classify_general("exited fullscreen"),
            ViolationKind::FullscreenExit
        );
        assert_eq!(
            ViolationKind::classify_general("Developer tools access blocked."),
            ViolationKind::Violation
        );
    }

    #[test]
    fn test_classify_keyboard() {
        assert_eq!(
            ViolationKind::classify_keyboard("Copy/Paste shortcuts blocked."),
            ViolationKind::CopyPasteBlocked
        );
        assert_eq!(
            ViolationKind::classify_keyboard("Cut blocked"),
            ViolationKind::CopyPasteBlocked
        );
        assert_eq!(
            ViolationKind::classify_keyboard("Select all blocked."),
            ViolationKind::SelectAllBlocked
        );
        assert_eq!(
            ViolationKind::classify_keyboard("Restricted key"),
            ViolationKind::KeyboardViolation
        );
    }

    #[test]
    fn test_kind_display_is_kebab_case() {
        assert_eq!(ViolationKind::TabSwitch.to_string(), "tab-switch");
        assert_eq!(
            ViolationKind::CopyPasteBlocked.to_string(),
            "copy-paste-blocked"
        );
        let json = serde_json::to_string(&ViolationKind::FullscreenExit).unwrap();
        assert_eq!(json, "\"fullscreen-exit\"");
    }

    #[test]
    fn test_general_escalation_ladder() {
        let mut tracker = ViolationTracker::default();
        assert_eq!(
            tracker.record_general("Tab switch detected.", false),
            Escalation::Warning {
                channel: Channel::General,
                count: 1
            }
        );
        assert_eq!(
            tracker.record_general("Tab switch detected.", false),
            Escalation::FinalWarning {
                channel: Channel::General,
                count: 2
            }
        );
        assert_eq!(
            tracker.record_general("Tab switch detected.", false),
            Escalation::Exceeded {
                channel: Channel::General
            }
        );
        assert!(tracker.state().auto_cheating_detected);
        assert_eq!(
            tracker.record_general("Tab switch detected.", false),
            Escalation::Ignored
        );
        assert_eq!(tracker.state().general_count, 3);
        assert_eq!(tracker.state().cheating_logs.len(), 3);
    }

    #[test]
    fn test_ignored_while_submitting() {
        let mut tracker = ViolationTracker::default();
        assert_eq!(tracker.record_general("tab", true), Escalation::Ignored);
        assert_eq!(tracker.record_keyboard("copy", true), Escalation::Ignored);
        assert_eq!(tracker.state(), &ViolationState::default());
    }

    #[test]
    fn test_keyboard_lockstep_and_suppressed_submit() {
        let mut tracker = ViolationTracker::default();
        tracker.record_keyboard("Copy/Paste shortcuts blocked.", false);
        assert_eq!(tracker.state().keyboard_count, 1);
        assert_eq!(tracker.state().general_count, 1);

        tracker.record_keyboard("Copy/Paste shortcuts blocked.", false);
        let third = tracker.record_keyboard("Select all blocked.", false);
        assert_eq!(
            third,
            Escalation::LimitReached {
                channel: Channel::Keyboard
            }
        );
        assert_eq!(tracker.state().keyboard_count, 3);
        assert_eq!(tracker.state().general_count, 3);
        assert!(!tracker.state().auto_cheating_detected);
        assert!(tracker.cheating_detected());
    }

    #[test]
    fn test_general_strike_after_lockstep_fill_exceeds_once() {
        let mut tracker = ViolationTracker::default();
        tracker.record_general("Tab switch detected.", false);
        tracker.record_keyboard("Paste blocked.", false);
        tracker.record_keyboard("Paste blocked.", false);
        assert_eq!(tracker.state().general_count, 3);
        assert!(!tracker.state().auto_cheating_detected);

        assert_eq!(
            tracker.record_general("Tab switch detected.", false),
            Escalation::Exceeded {
                channel: Channel::General
            }
        );
        assert!(tracker.state().auto_cheating_detected);
        assert_eq!(tracker.state().general_count, 3);
        assert_eq!(tracker.state().cheating_logs.len(), 4);
        assert_eq!(
            tracker.state().cheating_logs[3].kind,
            ViolationKind::TabSwitch
        );

        assert_eq!(
            tracker.record_general("Window focus lost.", false),
            Escalation::Ignored
        );
        assert_eq!(tracker.state().cheating_logs.len(), 4);
    }

    #[test]
    fn test_keyboard_auto_submit_policy() {
        let mut tracker = ViolationTracker::new(StrikePolicy {
            threshold: 3,
            keyboard_auto_submit: true,
        });
        tracker.record_keyboard("copy", false);
        tracker.record_keyboard("copy", false);
        assert_eq!(
            tracker.record_keyboard("copy", false),
            Escalation::Exceeded {
                channel: Channel::Keyboard
            }
        );
    }

    #[test]
    fn test_counts_never_exceed_threshold() {
        let mut tracker = ViolationTracker::default();
        for i in 0..20 {
            let before = tracker.snapshot();
            if i % 3 == 0 {
                tracker.record_keyboard("paste", false);
            } else {
                tracker.record_general("tab", false);
            }
            let after = tracker.state();
            assert!(after.general_count >= before.general_count);
            assert!(after.keyboard_count >= before.keyboard_count);
            assert!(after.general_count <= 3);
            assert!(after.keyboard_count <= 3);
        }
    }

    #[test]
    fn test_with_state_clamps_counts() {
        let state = ViolationState {
            general_count: 9,
            keyboard_count: 1,
            ..Default::default()
        };
        let tracker = ViolationTracker::with_state(StrikePolicy::default(), state);
        assert_eq!(tracker.state().general_count, 3);
        assert_eq!(tracker.state().keyboard_count, 1);
    }
}
