use std::time::Instant;

use crate::clock::{Checkpoint, SessionClock, SessionClockState};
use crate::config::ProctorConfig;
use crate::drafts::{AnswerBook, AnswerPayload};
use crate::error::{ClipboardError, SubmitError};
use crate::exam::{ExamDescriptor, PriorSubmission, QuestionId, SavedAnswer};
use crate::fullscreen::{
    FullscreenMonitor, FullscreenPhase, FullscreenState, FullscreenTransition,
    FULLSCREEN_EXIT_REASON,
};
use crate::guard::{ClipboardGate, ClipboardGateway, GuardSignal, InputGuard};
use crate::submission::{
    CodingSubmission, ExamSubmission, Integrity, SubmissionGuard, SubmissionPayload,
    SubmissionReason,
};
use crate::violation::{Channel, Escalation, StrikePolicy, ViolationState, ViolationTracker};

pub const TAB_SWITCH_REASON: &str = "Tab switch detected.";
pub const WINDOW_BLUR_REASON: &str = "Window focus lost.";

/// Host events fed into the session, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum ExamEvent {
    StartAssessment { fullscreen_granted: bool },
    FullscreenChanged { active: bool },
    VisibilityHidden,
    WindowBlur,
    Signal(GuardSignal),
    Tick { now: Instant },
    Answer { question: QuestionId, payload: AnswerPayload },
    CodeEdited { question: QuestionId, code: String, language: String, now: Instant },
    CodeRun { question: QuestionId, code: String, language: String },
    SubmitRequested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum SessionPhase {
    AwaitingConsent,
    Running,
    Submitting,
    Submitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    FinalWarning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    /// Stays on screen until dismissed
    pub persistent: bool,
}

impl Notice {
    fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            persistent: false,
        }
    }

    fn persistent(mut self) -> Self {
        self.persistent = true;
        self
    }
}

/// Everything the submit action needs, computed when the latch is taken
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionPlan {
    pub flush: Vec<(QuestionId, AnswerPayload)>,
    pub payload: SubmissionPayload,
}

/// Work the host must carry out after an event
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Notify(Notice),
    SaveAnswers(Vec<(QuestionId, AnswerPayload)>),
    Submit(SubmissionPlan),
    ExitFullscreen,
    ShowResults { exam_id: String },
    PersistViolations(ViolationState),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reaction {
    /// Host must cancel the default action and stop propagation
    pub blocked: bool,
    pub effects: Vec<Effect>,
}

/// Result of a clipboard call routed through the session
#[derive(Debug)]
pub struct Gated<T> {
    pub result: Result<T, ClipboardError>,
    pub effects: Vec<Effect>,
}

/// Exam-session integrity state machine. Owns all per-session state; each
/// event is handled to completion and returns the effects to run.
#[derive(Debug)]
pub struct ExamSession {
    exam: ExamDescriptor,
    student_id: String,
    persist_violations: bool,
    phase: SessionPhase,
    torn_down: bool,
    tracker: ViolationTracker,
    fullscreen: FullscreenMonitor,
    guard: InputGuard,
    clipboard: ClipboardGate,
    clock: SessionClock,
    book: AnswerBook,
    latch: SubmissionGuard,
}

impl ExamSession {
    pub fn new(exam: ExamDescriptor, student_id: impl Into<String>, config: &ProctorConfig) -> Self {
        let clock = SessionClock::with_marks(
            exam.duration_secs(),
            config.five_minute_mark,
            config.force_save_marks.clone(),
        );
        Self {
            exam,
            student_id: student_id.into(),
            persist_violations: config.persist_violations,
            phase: SessionPhase::AwaitingConsent,
            torn_down: false,
            tracker: ViolationTracker::new(config.strike_policy()),
            fullscreen: FullscreenMonitor::new(),
            guard: InputGuard::new(),
            clipboard: ClipboardGate::default(),
            clock,
            book: AnswerBook::new(config.code_save_debounce()),
            latch: SubmissionGuard::default(),
        }
    }

    pub fn with_clipboard(mut self, clipboard: Box<dyn ClipboardGateway>) -> Self {
        self.clipboard = ClipboardGate::new(clipboard);
        self
    }

    pub fn resume(mut self, prior: &PriorSubmission) -> Self {
        self.book.resume(prior);
        self
    }

    /// Rehydrate counters saved by an earlier visit
    pub fn with_violations(mut self, state: ViolationState) -> Self {
        self.tracker = ViolationTracker::with_state(self.tracker.policy(), state);
        self
    }

    /// Replace the countdown before the candidate starts, e.g. to continue
    /// with the time left from an earlier visit
    pub fn with_clock(mut self, clock: SessionClock) -> Self {
        if self.phase == SessionPhase::AwaitingConsent {
            self.clock = clock;
        }
        self
    }

    pub fn exam(&self) -> &ExamDescriptor {
        &self.exam
    }

    pub fn student_id(&self) -> &str {
        &self.student_id
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn violations(&self) -> &ViolationState {
        self.tracker.state()
    }

    pub fn strike_policy(&self) -> StrikePolicy {
        self.tracker.policy()
    }

    pub fn cheating_detected(&self) -> bool {
        self.tracker.cheating_detected()
    }

    pub fn fullscreen(&self) -> FullscreenState {
        self.fullscreen.state()
    }

    pub fn fullscreen_phase(&self) -> FullscreenPhase {
        self.fullscreen.phase()
    }

    pub fn fullscreen_warning(&self) -> bool {
        self.fullscreen.warning_showing()
    }

    pub fn clock(&self) -> SessionClockState {
        self.clock.state()
    }

    pub fn answers(&self) -> &AnswerBook {
        &self.book
    }

    pub fn is_submitting(&self) -> bool {
        self.latch.is_submitting()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn guard_active(&self) -> bool {
        self.guard.is_active()
    }

    pub fn clipboard_engaged(&self) -> bool {
        self.clipboard.is_engaged()
    }

    pub fn handle(&mut self, event: ExamEvent) -> Reaction {
        let mut reaction = Reaction::default();
        if self.torn_down {
            return reaction;
        }
        if self.phase == SessionPhase::AwaitingConsent {
            if let ExamEvent::StartAssessment { fullscreen_granted } = event {
                self.start(fullscreen_granted);
            }
            return reaction;
        }

        let fx = &mut reaction.effects;
        match event {
            ExamEvent::StartAssessment { .. } => {}
            ExamEvent::FullscreenChanged { active } => {
                let submitting = self.is_submitting();
                if self.fullscreen.on_change(active, submitting) == FullscreenTransition::Exited {
                    self.general_violation(FULLSCREEN_EXIT_REASON, fx);
                }
            }
            ExamEvent::VisibilityHidden => self.general_violation(TAB_SWITCH_REASON, fx),
            ExamEvent::WindowBlur => self.general_violation(WINDOW_BLUR_REASON, fx),
            ExamEvent::Signal(signal) => {
                let verdict = self.guard.inspect(&signal);
                reaction.blocked = verdict.blocked;
                if let Some(strike) = verdict.strike {
                    match strike.channel {
                        Channel::General => self.general_violation(strike.reason, fx),
                        Channel::Keyboard => self.keyboard_violation(strike.reason, fx),
                    }
                }
            }
            ExamEvent::Tick { now } => self.tick(now, fx),
            ExamEvent::Answer { question, payload } => {
                if self.phase == SessionPhase::Running {
                    let payload = self.book.set_answer(question.clone(), payload);
                    fx.push(Effect::SaveAnswers(vec![(question, payload)]));
                }
            }
            ExamEvent::CodeEdited {
                question,
                code,
                language,
                now,
            } => {
                if self.phase == SessionPhase::Running {
                    self.book.edit_code(question, code, language, now);
                }
            }
            ExamEvent::CodeRun {
                question,
                code,
                language,
            } => {
                if self.phase == SessionPhase::Running {
                    self.book.run_code(question, code, language);
                }
            }
            ExamEvent::SubmitRequested => {
                if let Some(plan) = self.request_submit(SubmissionReason::Manual) {
                    fx.push(Effect::Submit(plan));
                }
            }
        }
        reaction
    }

    fn start(&mut self, fullscreen_granted: bool) {
        self.fullscreen.start(fullscreen_granted);
        self.guard.activate();
        self.clipboard.engage();
        self.clock.start();
        self.phase = SessionPhase::Running;
        log::info!(
            "exam {} started for {} ({}s)",
            self.exam.id,
            self.student_id,
            self.clock.remaining()
        );
    }

    fn tick(&mut self, now: Instant, fx: &mut Vec<Effect>) {
        if self.phase != SessionPhase::Running {
            return;
        }

        let due = self.book.take_due(now);
        if !due.is_empty() {
            fx.push(Effect::SaveAnswers(due));
        }

        for checkpoint in self.clock.tick() {
            match checkpoint {
                Checkpoint::FiveMinuteWarning => fx.push(Effect::Notify(
                    Notice::new(NoticeLevel::Warning, "5 minutes remaining.").persistent(),
                )),
                Checkpoint::ForceSave { last } => {
                    log::info!(
                        "force-saving code drafts at {}s ({})",
                        self.clock.remaining() + 1,
                        if last { "final" } else { "early" }
                    );
                    let drafts = self.book.force_save_code();
                    if !drafts.is_empty() {
                        fx.push(Effect::SaveAnswers(drafts));
                    }
                }
                Checkpoint::Expired => {
                    // the clock is already stopped; the submit runs after this handler returns
                    fx.push(Effect::Notify(Notice::new(
                        NoticeLevel::Info,
                        "Time is up. Submitting your exam.",
                    )));
                    if let Some(plan) = self.request_submit(SubmissionReason::Timeout) {
                        fx.push(Effect::Submit(plan));
                    }
                }
            }
        }
    }

    fn general_violation(&mut self, reason: &str, fx: &mut Vec<Effect>) {
        let submitting = self.is_submitting();
        let escalation = self.tracker.record_general(reason, submitting);
        self.escalate(escalation, reason, fx);
    }

    fn keyboard_violation(&mut self, reason: &str, fx: &mut Vec<Effect>) {
        let submitting = self.is_submitting();
        let escalation = self.tracker.record_keyboard(reason, submitting);
        self.escalate(escalation, reason, fx);
    }

    fn escalate(&mut self, escalation: Escalation, reason: &str, fx: &mut Vec<Effect>) {
        let threshold = self.tracker.policy().threshold;
        let notice = match escalation {
            Escalation::Ignored => return,
            Escalation::Warning { channel, count } => Notice::new(
                NoticeLevel::Warning,
                format!(
                    "Warning: {reason} ({count}/{threshold} {} violations)",
                    channel
                ),
            ),
            Escalation::FinalWarning { channel, count } => {
                let mut message =
                    format!("Final warning: {reason} ({count}/{threshold} {channel} violations).");
                if channel == Channel::General || self.tracker.policy().keyboard_auto_submit {
                    message.push_str(" The next one ends your exam.");
                }
                Notice::new(NoticeLevel::FinalWarning, message)
            }
            Escalation::LimitReached { .. } => Notice::new(
                NoticeLevel::FinalWarning,
                format!("Keyboard violation limit reached: {reason} This has been recorded."),
            ),
            Escalation::Exceeded { .. } => Notice::new(
                NoticeLevel::Error,
                "Violation limit reached. Submitting your exam.",
            ),
        };
        fx.push(Effect::Notify(notice));

        if self.persist_violations {
            fx.push(Effect::PersistViolations(self.tracker.snapshot()));
        }

        if let Escalation::Exceeded { channel } = escalation {
            log::warn!("{} violation threshold exceeded on exam {}", channel, self.exam.id);
            let reason = match channel {
                Channel::General => SubmissionReason::Violations,
                Channel::Keyboard => SubmissionReason::KeyboardViolations,
            };
            if let Some(plan) = self.request_submit(reason) {
                fx.push(Effect::Submit(plan));
            }
        }
    }

    /// Take the submission latch and assemble the payload. Returns None when
    /// the session has not started, was torn down, or is already submitting.
    pub fn request_submit(&mut self, reason: SubmissionReason) -> Option<SubmissionPlan> {
        if self.torn_down || self.phase != SessionPhase::Running {
            return None;
        }
        if !self.latch.try_acquire() {
            return None;
        }
        self.phase = SessionPhase::Submitting;
        log::info!("submitting exam {} ({})", self.exam.id, reason);

        let flush = self.book.flush_all();
        let integrity = Integrity::from_state(
            self.tracker.state(),
            self.tracker.policy().threshold,
            reason,
        );
        let payload = if self.exam.is_coding() {
            SubmissionPayload::Coding(CodingSubmission {
                exam_id: self.exam.id.clone(),
                student_id: self.student_id.clone(),
                answers: self.book.coding_answers(&self.exam),
                integrity,
            })
        } else {
            SubmissionPayload::Standard {
                exam_id: self.exam.id.clone(),
                submission: ExamSubmission {
                    answers: flush
                        .iter()
                        .map(|(q, p)| SavedAnswer {
                            question_id: q.clone(),
                            payload: p.clone(),
                        })
                        .collect(),
                    integrity,
                },
            }
        };
        Some(SubmissionPlan { flush, payload })
    }

    /// Feed back the outcome of the submission call
    pub fn complete_submit(&mut self, outcome: Result<(), SubmitError>) -> Vec<Effect> {
        if self.phase != SessionPhase::Submitting {
            return Vec::new();
        }
        match outcome {
            Ok(()) => {
                log::info!("exam {} submitted", self.exam.id);
                self.phase = SessionPhase::Submitted;
                self.teardown();
                vec![
                    Effect::ExitFullscreen,
                    Effect::ShowResults {
                        exam_id: self.exam.id.clone(),
                    },
                ]
            }
            Err(e) => {
                log::error!("submission of exam {} failed: {}", self.exam.id, e);
                self.latch.reset();
                self.phase = SessionPhase::Running;
                vec![Effect::Notify(Notice::new(
                    NoticeLevel::Error,
                    format!("Submission failed: {e}. Please try submitting again."),
                ))]
            }
        }
    }

    /// Route a clipboard write through the gate; blocked calls count as
    /// keyboard violations
    pub fn clipboard_write(&mut self, text: &str) -> Gated<()> {
        let result = self.clipboard.write_text(text);
        let effects = self.clipboard_outcome(&result);
        Gated { result, effects }
    }

    pub fn clipboard_read(&mut self) -> Gated<String> {
        let result = self.clipboard.read_text();
        let effects = self.clipboard_outcome(&result);
        Gated { result, effects }
    }

    fn clipboard_outcome<T>(&mut self, result: &Result<T, ClipboardError>) -> Vec<Effect> {
        let mut fx = Vec::new();
        if let Err(ClipboardError::Blocked(op)) = result {
            self.keyboard_violation(op.reason(), &mut fx);
        }
        fx
    }

    /// Detach from the host: stop the clock, drop the guard and hand the
    /// clipboard back. Further events are ignored.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.clock.stop();
        self.guard.deactivate();
        self.clipboard.release();
        self.torn_down = true;
        log::debug!("exam session {} torn down", self.exam.id);
    }
}

impl Drop for ExamSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
