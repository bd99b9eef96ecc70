use serde::{Deserialize, Serialize};

use crate::drafts::CodingAnswer;
use crate::error::SubmitError;
use crate::exam::SavedAnswer;
use crate::violation::{CheatingLog, ViolationState};

/// Why the terminal submit action ran
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SubmissionReason {
    Manual,
    Timeout,
    Violations,
    KeyboardViolations,
}

/// Integrity fields carried by every submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Integrity {
    pub cheating_detected: bool,
    pub violation_count: u8,
    pub keyboard_violations: u8,
    pub submission_reason: SubmissionReason,
    pub cheating_logs: Vec<CheatingLog>,
}

impl Integrity {
    pub fn from_state(state: &ViolationState, threshold: u8, reason: SubmissionReason) -> Self {
        Self {
            cheating_detected: state.cheating_detected(threshold),
            violation_count: state.general_count,
            keyboard_violations: state.keyboard_count,
            submission_reason: reason,
            cheating_logs: state.cheating_logs.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamSubmission {
    pub answers: Vec<SavedAnswer>,
    #[serde(flatten)]
    pub integrity: Integrity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodingSubmission {
    pub exam_id: String,
    pub student_id: String,
    pub answers: Vec<CodingAnswer>,
    #[serde(flatten)]
    pub integrity: Integrity,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionPayload {
    Standard {
        exam_id: String,
        submission: ExamSubmission,
    },
    Coding(CodingSubmission),
}

impl SubmissionPayload {
    pub fn exam_id(&self) -> &str {
        match self {
            SubmissionPayload::Standard { exam_id, .. } => exam_id,
            SubmissionPayload::Coding(c) => &c.exam_id,
        }
    }

    pub fn integrity(&self) -> &Integrity {
        match self {
            SubmissionPayload::Standard { submission, .. } => &submission.integrity,
            SubmissionPayload::Coding(c) => &c.integrity,
        }
    }
}

/// Backend that grades and records a finished exam
pub trait SubmissionClient {
    fn submit_exam(&self, exam_id: &str, submission: &ExamSubmission) -> Result<(), SubmitError>;
    fn submit_coding_exam(&self, submission: &CodingSubmission) -> Result<(), SubmitError>;

    fn send(&self, payload: &SubmissionPayload) -> Result<(), SubmitError> {
        match payload {
            SubmissionPayload::Standard {
                exam_id,
                submission,
            } => self.submit_exam(exam_id, submission),
            SubmissionPayload::Coding(c) => self.submit_coding_exam(c),
        }
    }
}

/// One-shot latch around the submit action
#[derive(Debug, Clone, Copy, Default)]
pub struct SubmissionGuard {
    submitting: bool,
}

impl SubmissionGuard {
    /// Returns false when a submission is already in flight
    pub fn try_acquire(&mut self) -> bool {
        if self.submitting {
            return false;
        }
        self.submitting = true;
        true
    }

    /// Re-arm after a failed submission so the candidate can retry
    pub fn reset(&mut self) {
        self.submitting = false;
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }
}
