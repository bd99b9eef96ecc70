use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::drafts::AnswerPayload;
use crate::error::LoadError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(pub String);

impl QuestionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QuestionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum QuestionKind {
    Mcq,
    Text,
    Coding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    pub kind: QuestionKind,
    pub prompt: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub starter_code: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamType {
    #[default]
    Standard,
    Coding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamDescriptor {
    pub id: String,
    pub title: String,
    pub duration_minutes: u32,
    pub questions: Vec<Question>,
    #[serde(rename = "type", default)]
    pub exam_type: ExamType,
}

impl ExamDescriptor {
    pub fn duration_secs(&self) -> u32 {
        self.duration_minutes.saturating_mul(60)
    }

    pub fn is_coding(&self) -> bool {
        self.exam_type == ExamType::Coding
    }

    pub fn question(&self, id: &QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| &q.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedAnswer {
    pub question_id: QuestionId,
    pub payload: AnswerPayload,
}

/// Answers a candidate already saved, used to resume a session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriorSubmission {
    pub answers: Vec<SavedAnswer>,
}

#[derive(Debug, Clone)]
pub struct LoadedExam {
    pub exam: ExamDescriptor,
    pub prior: Option<PriorSubmission>,
}

pub trait ExamLoader {
    fn load(&self) -> Result<LoadedExam, LoadError>;
}

/// Loads a JSON exam descriptor, or a plain-text MCQ bank (`.txt`)
#[derive(Debug, Clone)]
pub struct FileExamLoader {
    path: PathBuf,
    prior_path: Option<PathBuf>,
    bank_duration_minutes: u32,
}

impl FileExamLoader {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            prior_path: None,
            bank_duration_minutes: 30,
        }
    }

    pub fn with_prior<P: AsRef<Path>>(mut self, prior: P) -> Self {
        self.prior_path = Some(prior.as_ref().to_path_buf());
        self
    }

    pub fn with_bank_duration(mut self, minutes: u32) -> Self {
        self.bank_duration_minutes = minutes;
        self
    }

    fn is_bank(&self) -> bool {
        self.path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"))
    }
}

fn read(path: &Path) -> Result<String, LoadError> {
    fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })
}

impl ExamLoader for FileExamLoader {
    fn load(&self) -> Result<LoadedExam, LoadError> {
        let text = read(&self.path)?;
        let exam = if self.is_bank() {
            let stem = self
                .path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "exam".to_string());
            ExamDescriptor {
                id: stem.clone(),
                title: stem,
                duration_minutes: self.bank_duration_minutes,
                questions: crate::mcq::parse_bank(&text)?
                    .into_iter()
                    .map(|item| item.question)
                    .collect(),
                exam_type: ExamType::Standard,
            }
        } else {
            serde_json::from_str(&text)?
        };

        let prior = match &self.prior_path {
            Some(p) if p.exists() => Some(serde_json::from_str(&read(p)?)?),
            _ => None,
        };

        log::info!(
            "loaded exam {} ({} questions, {} min)",
            exam.id,
            exam.questions.len(),
            exam.duration_minutes
        );
        Ok(LoadedExam { exam, prior })
    }
}
