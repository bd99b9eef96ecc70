use chrono::{DateTime, Local};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::app_dirs::AppDirs;
use crate::drafts::AnswerPayload;
use crate::error::{StoreError, SubmitError};
use crate::exam::{PriorSubmission, QuestionId, SavedAnswer};
use crate::proctor::AnswerStore;
use crate::submission::{CodingSubmission, ExamSubmission, Integrity, SubmissionClient};
use crate::violation::{CheatingLog, ViolationState};

/// A submission archived by the local client
#[derive(Debug, Clone)]
pub struct StoredSubmission {
    pub exam_id: String,
    pub student_id: String,
    pub reason: String,
    pub cheating_detected: bool,
    pub cheating_logs: Vec<CheatingLog>,
    pub payload: serde_json::Value,
    pub submitted_at: DateTime<Local>,
}

/// SQLite persistence for drafts, the violation ledger and archived submissions
#[derive(Debug)]
pub struct ProctorDb {
    conn: Mutex<Connection>,
}

impl ProctorDb {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Directory {
                path: parent.display().to_string(),
                source,
            })?;
        }
        Self::init(Connection::open(path)?)
    }

    /// Database under $HOME/.local/state/proctor
    pub fn open_default() -> Result<Self, StoreError> {
        Self::open(AppDirs::db_path())
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS answers (
                exam_id TEXT NOT NULL,
                question_id TEXT NOT NULL,
                payload TEXT NOT NULL,
                saved_at TEXT NOT NULL,
                PRIMARY KEY (exam_id, question_id)
            );
            CREATE TABLE IF NOT EXISTS violation_ledger (
                exam_id TEXT NOT NULL,
                student_id TEXT NOT NULL,
                state TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (exam_id, student_id)
            );
            CREATE TABLE IF NOT EXISTS submissions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                exam_id TEXT NOT NULL,
                student_id TEXT NOT NULL,
                reason TEXT NOT NULL,
                cheating_detected BOOLEAN NOT NULL,
                payload TEXT NOT NULL,
                submitted_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_submissions_exam ON submissions(exam_id);
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Saved drafts for an exam, used to resume a session
    pub fn load_answers(&self, exam_id: &str) -> Result<PriorSubmission, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT question_id, payload FROM answers WHERE exam_id = ?1 ORDER BY question_id",
        )?;
        let rows = stmt.query_map([exam_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut answers = Vec::new();
        for row in rows {
            let (question_id, payload) = row?;
            answers.push(SavedAnswer {
                question_id: QuestionId(question_id),
                payload: serde_json::from_str(&payload)?,
            });
        }
        Ok(PriorSubmission { answers })
    }

    pub fn load_violations(
        &self,
        exam_id: &str,
        student_id: &str,
    ) -> Result<Option<ViolationState>, StoreError> {
        let conn = self.conn()?;
        let state: Option<String> = conn
            .query_row(
                "SELECT state FROM violation_ledger WHERE exam_id = ?1 AND student_id = ?2",
                params![exam_id, student_id],
                |row| row.get(0),
            )
            .optional()?;
        match state {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn clear_violations(&self, exam_id: &str, student_id: &str) -> Result<(), StoreError> {
        self.conn()?.execute(
            "DELETE FROM violation_ledger WHERE exam_id = ?1 AND student_id = ?2",
            params![exam_id, student_id],
        )?;
        Ok(())
    }

    pub fn submissions(&self, exam_id: &str) -> Result<Vec<StoredSubmission>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT exam_id, student_id, reason, cheating_detected, payload, submitted_at
            FROM submissions
            WHERE exam_id = ?1
            ORDER BY id
            "#,
        )?;
        let rows = stmt.query_map([exam_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, bool>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (exam_id, student_id, reason, cheating_detected, payload, submitted_at) = row?;
            let payload: serde_json::Value = serde_json::from_str(&payload)?;
            let cheating_logs = match payload.get("cheatingLogs") {
                Some(logs) => serde_json::from_value(logs.clone())?,
                None => Vec::new(),
            };
            let submitted_at = DateTime::parse_from_rfc3339(&submitted_at)
                .map_err(|_| {
                    rusqlite::Error::InvalidColumnType(
                        5,
                        "submitted_at".to_string(),
                        rusqlite::types::Type::Text,
                    )
                })?
                .with_timezone(&Local);
            out.push(StoredSubmission {
                exam_id,
                student_id,
                reason,
                cheating_detected,
                cheating_logs,
                payload,
                submitted_at,
            });
        }
        Ok(out)
    }

    fn archive(
        &self,
        exam_id: &str,
        student_id: &str,
        integrity: &Integrity,
        payload: String,
    ) -> Result<(), StoreError> {
        self.conn()?.execute(
            r#"
            INSERT INTO submissions
            (exam_id, student_id, reason, cheating_detected, payload, submitted_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                exam_id,
                student_id,
                integrity.submission_reason.to_string(),
                integrity.cheating_detected,
                payload,
                Local::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

impl AnswerStore for ProctorDb {
    fn save_answer(
        &self,
        exam_id: &str,
        question: &QuestionId,
        payload: &AnswerPayload,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string(payload)?;
        self.conn()?.execute(
            r#"
            INSERT INTO answers (exam_id, question_id, payload, saved_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(exam_id, question_id)
            DO UPDATE SET payload = excluded.payload, saved_at = excluded.saved_at
            "#,
            params![exam_id, question.as_str(), json, Local::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn save_violations(
        &self,
        exam_id: &str,
        student_id: &str,
        state: &ViolationState,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string(state)?;
        self.conn()?.execute(
            r#"
            INSERT INTO violation_ledger (exam_id, student_id, state, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(exam_id, student_id)
            DO UPDATE SET state = excluded.state, updated_at = excluded.updated_at
            "#,
            params![exam_id, student_id, json, Local::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

/// Archives submissions locally instead of posting them to a grading backend
impl SubmissionClient for ProctorDb {
    fn submit_exam(&self, exam_id: &str, submission: &ExamSubmission) -> Result<(), SubmitError> {
        let payload = serde_json::to_string(submission).map_err(StoreError::from)?;
        self.archive(exam_id, "", &submission.integrity, payload)?;
        Ok(())
    }

    fn submit_coding_exam(&self, submission: &CodingSubmission) -> Result<(), SubmitError> {
        let payload = serde_json::to_string(submission).map_err(StoreError::from)?;
        self.archive(
            &submission.exam_id,
            &submission.student_id,
            &submission.integrity,
            payload,
        )?;
        Ok(())
    }
}

impl<T: AnswerStore + ?Sized> AnswerStore for &T {
    fn save_answer(
        &self,
        exam_id: &str,
        question: &QuestionId,
        payload: &AnswerPayload,
    ) -> Result<(), StoreError> {
        (**self).save_answer(exam_id, question, payload)
    }

    fn save_violations(
        &self,
        exam_id: &str,
        student_id: &str,
        state: &ViolationState,
    ) -> Result<(), StoreError> {
        (**self).save_violations(exam_id, student_id, state)
    }
}

impl<T: SubmissionClient + ?Sized> SubmissionClient for &T {
    fn submit_exam(&self, exam_id: &str, submission: &ExamSubmission) -> Result<(), SubmitError> {
        (**self).submit_exam(exam_id, submission)
    }

    fn submit_coding_exam(&self, submission: &CodingSubmission) -> Result<(), SubmitError> {
        (**self).submit_coding_exam(submission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submission::SubmissionReason;
    use crate::violation::ViolationTracker;
    use tempfile::tempdir;

    #[test]
    fn test_answers_upsert_and_resume() {
        let db = ProctorDb::in_memory().unwrap();
        let q1 = QuestionId::new("q1");
        db.save_answer("e1", &q1, &AnswerPayload::Choice { option: 0 })
            .unwrap();
        db.save_answer("e1", &q1, &AnswerPayload::Choice { option: 3 })
            .unwrap();
        db.save_answer("other", &q1, &AnswerPayload::Choice { option: 1 })
            .unwrap();

        let prior = db.load_answers("e1").unwrap();
        assert_eq!(prior.answers.len(), 1);
        assert_eq!(prior.answers[0].payload, AnswerPayload::Choice { option: 3 });
    }

    #[test]
    fn test_violation_ledger_roundtrip() {
        let dir = tempdir().unwrap();
        let db = ProctorDb::open(dir.path().join("nested").join("p.db")).unwrap();
        assert!(db.load_violations("e1", "s1").unwrap().is_none());

        let mut tracker = ViolationTracker::default();
        tracker.record_general("Tab switch detected.", false);
        tracker.record_keyboard("Copy/Paste shortcuts blocked.", false);
        db.save_violations("e1", "s1", tracker.state()).unwrap();

        let restored = db.load_violations("e1", "s1").unwrap().unwrap();
        assert_eq!(restored.general_count, 2);
        assert_eq!(restored.keyboard_count, 1);
        assert_eq!(restored.cheating_logs.len(), 2);

        db.clear_violations("e1", "s1").unwrap();
        assert!(db.load_violations("e1", "s1").unwrap().is_none());
    }

    #[test]
    fn test_archived_submission_exposes_logs() {
        let db = ProctorDb::in_memory().unwrap();
        let mut tracker = ViolationTracker::default();
        tracker.record_general("Window focus lost.", false);
        let submission = CodingSubmission {
            exam_id: "e1".into(),
            student_id: "s1".into(),
            answers: vec![],
            integrity: Integrity::from_state(tracker.state(), 3, SubmissionReason::Timeout),
        };
        db.submit_coding_exam(&submission).unwrap();

        let stored = db.submissions("e1").unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].student_id, "s1");
        assert_eq!(stored[0].reason, "timeout");
        assert!(stored[0].cheating_detected);
        assert_eq!(stored[0].cheating_logs.len(), 1);
        assert!(db.submissions("nope").unwrap().is_empty());
    }
}
