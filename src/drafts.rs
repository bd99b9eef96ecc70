use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::exam::{ExamDescriptor, PriorSubmission, QuestionId, QuestionKind};

pub const CODE_SAVE_DEBOUNCE: Duration = Duration::from_millis(2000);
const FALLBACK_LANGUAGE: &str = "plaintext";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AnswerPayload {
    Choice { option: usize },
    Text { text: String },
    Code { code: String, language: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodingAnswer {
    pub question_id: QuestionId,
    pub code: String,
    pub language: String,
}

#[derive(Debug, Clone, Default)]
struct CodeDraft {
    live: Option<String>,
    last_run: Option<String>,
    language: Option<String>,
    due: Option<Instant>,
}

impl CodeDraft {
    fn best(&self) -> Option<&String> {
        self.live.as_ref().or(self.last_run.as_ref())
    }

    fn payload(&self) -> Option<AnswerPayload> {
        self.best().map(|code| AnswerPayload::Code {
            code: code.clone(),
            language: self
                .language
                .clone()
                .unwrap_or_else(|| FALLBACK_LANGUAGE.to_string()),
        })
    }
}

/// Locally buffered answers. Choice and text answers save on change; code
/// edits are debounced and flushed by the clock.
#[derive(Debug, Clone)]
pub struct AnswerBook {
    answers: BTreeMap<QuestionId, AnswerPayload>,
    code: BTreeMap<QuestionId, CodeDraft>,
    debounce: Duration,
}

impl Default for AnswerBook {
    fn default() -> Self {
        Self::new(CODE_SAVE_DEBOUNCE)
    }
}

impl AnswerBook {
    pub fn new(debounce: Duration) -> Self {
        Self {
            answers: BTreeMap::new(),
            code: BTreeMap::new(),
            debounce,
        }
    }

    /// Seed drafts from answers saved in an earlier visit
    pub fn resume(&mut self, prior: &PriorSubmission) {
        for saved in &prior.answers {
            match &saved.payload {
                AnswerPayload::Code { code, language } => {
                    let draft = self.code.entry(saved.question_id.clone()).or_default();
                    draft.live = Some(code.clone());
                    draft.language = Some(language.clone());
                }
                other => {
                    self.answers
                        .insert(saved.question_id.clone(), other.clone());
                }
            }
        }
    }

    /// Record a non-code answer; the returned payload should be saved now
    pub fn set_answer(&mut self, question: QuestionId, payload: AnswerPayload) -> AnswerPayload {
        self.answers.insert(question, payload.clone());
        payload
    }

    pub fn edit_code(&mut self, question: QuestionId, code: String, language: String, now: Instant) {
        let draft = self.code.entry(question).or_default();
        draft.live = Some(code);
        draft.language = Some(language);
        draft.due = Some(now + self.debounce);
    }

    pub fn run_code(&mut self, question: QuestionId, code: String, language: String) {
        let draft = self.code.entry(question).or_default();
        draft.last_run = Some(code);
        draft.language = Some(language);
    }

    /// Code drafts whose debounce window elapsed
    pub fn take_due(&mut self, now: Instant) -> Vec<(QuestionId, AnswerPayload)> {
        let mut due = Vec::new();
        for (id, draft) in self.code.iter_mut() {
            if draft.due.is_some_and(|d| d <= now) {
                draft.due = None;
                if let Some(payload) = draft.payload() {
                    due.push((id.clone(), payload));
                }
            }
        }
        due
    }

    /// Every code draft, regardless of debounce state
    pub fn force_save_code(&mut self) -> Vec<(QuestionId, AnswerPayload)> {
        self.code
            .iter_mut()
            .filter_map(|(id, draft)| {
                draft.due = None;
                draft.payload().map(|p| (id.clone(), p))
            })
            .collect()
    }

    /// Everything buffered locally, for the pre-submission flush
    pub fn flush_all(&mut self) -> Vec<(QuestionId, AnswerPayload)> {
        let mut all: Vec<_> = self
            .answers
            .iter()
            .map(|(id, p)| (id.clone(), p.clone()))
            .collect();
        all.extend(self.force_save_code());
        all
    }

    pub fn answer(&self, question: &QuestionId) -> Option<&AnswerPayload> {
        self.answers.get(question)
    }

    pub fn code(&self, question: &QuestionId) -> Option<&str> {
        self.code
            .get(question)
            .and_then(|d| d.best())
            .map(String::as_str)
    }

    /// One entry per coding question, live draft preferred over last run
    pub fn coding_answers(&self, exam: &ExamDescriptor) -> Vec<CodingAnswer> {
        exam.questions
            .iter()
            .filter(|q| q.kind == QuestionKind::Coding)
            .map(|q| {
                let draft = self.code.get(&q.id);
                CodingAnswer {
                    question_id: q.id.clone(),
                    code: draft
                        .and_then(|d| d.best().cloned())
                        .or_else(|| q.starter_code.clone())
                        .unwrap_or_default(),
                    language: draft
                        .and_then(|d| d.language.clone())
                        .or_else(|| q.language.clone())
                        .unwrap_or_else(|| FALLBACK_LANGUAGE.to_string()),
                }
            })
            .collect()
    }
}
