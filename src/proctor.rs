use std::collections::VecDeque;

use crate::drafts::AnswerPayload;
use crate::error::{ClipboardError, StoreError};
use crate::exam::QuestionId;
use crate::session::{Effect, ExamEvent, ExamSession, Notice, SubmissionPlan};
use crate::submission::{SubmissionClient, SubmissionReason};
use crate::violation::ViolationState;

/// Persists answer drafts. Shared across worker threads during the
/// pre-submission flush.
pub trait AnswerStore: Sync {
    fn save_answer(&self, exam_id: &str, question: &QuestionId, payload: &AnswerPayload)
        -> Result<(), StoreError>;

    /// Keep violation counters across reloads; no-op unless the store supports it
    fn save_violations(
        &self,
        _exam_id: &str,
        _student_id: &str,
        _state: &ViolationState,
    ) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Fire-and-forget notification surface
pub trait Notifier {
    fn notify(&mut self, notice: &Notice);
}

pub trait Navigator {
    /// Best-effort; failures are logged and ignored
    fn exit_fullscreen(&mut self) -> std::io::Result<()> {
        Ok(())
    }
    fn show_results(&mut self, exam_id: &str);
}

/// Runs an `ExamSession` against its collaborators, executing the effects
/// each event produces in order
pub struct Proctor<S: AnswerStore, C: SubmissionClient, N: Notifier, V: Navigator> {
    session: ExamSession,
    store: S,
    client: C,
    notifier: N,
    navigator: V,
}

impl<S: AnswerStore, C: SubmissionClient, N: Notifier, V: Navigator> Proctor<S, C, N, V> {
    pub fn new(session: ExamSession, store: S, client: C, notifier: N, navigator: V) -> Self {
        Self {
            session,
            store,
            client,
            notifier,
            navigator,
        }
    }

    pub fn session(&self) -> &ExamSession {
        &self.session
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn navigator(&self) -> &V {
        &self.navigator
    }

    pub fn navigator_mut(&mut self) -> &mut V {
        &mut self.navigator
    }

    /// Handle one host event; returns whether the host must block it
    pub fn dispatch(&mut self, event: ExamEvent) -> bool {
        let reaction = self.session.handle(event);
        self.run(reaction.effects);
        reaction.blocked
    }

    pub fn submit(&mut self) {
        if let Some(plan) = self.session.request_submit(SubmissionReason::Manual) {
            self.run(vec![Effect::Submit(plan)]);
        }
    }

    pub fn clipboard_write(&mut self, text: &str) -> Result<(), ClipboardError> {
        let gated = self.session.clipboard_write(text);
        self.run(gated.effects);
        gated.result
    }

    pub fn clipboard_read(&mut self) -> Result<String, ClipboardError> {
        let gated = self.session.clipboard_read();
        self.run(gated.effects);
        gated.result
    }

    pub fn teardown(&mut self) {
        self.session.teardown();
    }

    fn run(&mut self, effects: Vec<Effect>) {
        let mut queue: VecDeque<Effect> = effects.into();
        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::Notify(notice) => self.notifier.notify(&notice),
                Effect::SaveAnswers(answers) => {
                    save_all(&self.store, &self.session.exam().id, &answers);
                }
                Effect::Submit(plan) => queue.extend(self.execute_submit(plan)),
                Effect::ExitFullscreen => {
                    if let Err(e) = self.navigator.exit_fullscreen() {
                        log::warn!("could not exit fullscreen: {}", e);
                    }
                }
                Effect::ShowResults { exam_id } => self.navigator.show_results(&exam_id),
                Effect::PersistViolations(state) => {
                    let exam = &self.session.exam().id;
                    let student = self.session.student_id();
                    if let Err(e) = self.store.save_violations(exam, student, &state) {
                        log::warn!("could not persist violation ledger: {}", e);
                    }
                }
            }
        }
    }

    fn execute_submit(&mut self, plan: SubmissionPlan) -> Vec<Effect> {
        let failed = save_all(&self.store, plan.payload.exam_id(), &plan.flush);
        if failed > 0 {
            log::warn!("{} drafts failed to flush before submission", failed);
        }
        let outcome = self.client.send(&plan.payload);
        self.session.complete_submit(outcome)
    }
}

/// Save drafts in parallel. Individual failures are logged and swallowed;
/// returns how many failed.
pub fn save_all<S: AnswerStore>(
    store: &S,
    exam_id: &str,
    answers: &[(QuestionId, AnswerPayload)],
) -> usize {
    if answers.is_empty() {
        return 0;
    }
    std::thread::scope(|scope| {
        let handles: Vec<_> = answers
            .iter()
            .map(|(question, payload)| {
                scope.spawn(move || (question, store.save_answer(exam_id, question, payload)))
            })
            .collect();

        handles
            .into_iter()
            .map(|h| match h.join() {
                Ok((_, Ok(()))) => 0,
                Ok((question, Err(e))) => {
                    log::warn!("saving answer for {} failed: {}", question, e);
                    1
                }
                Err(_) => {
                    log::warn!("answer save worker panicked");
                    1
                }
            })
            .sum()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FlakyStore {
        saved: Mutex<Vec<QuestionId>>,
    }

    impl AnswerStore for FlakyStore {
        fn save_answer(
            &self,
            _exam_id: &str,
            question: &QuestionId,
            _payload: &AnswerPayload,
        ) -> Result<(), StoreError> {
            if question.as_str() == "bad" {
                return Err(StoreError::Poisoned);
            }
            self.saved
                .lock()
                .map_err(|_| StoreError::Poisoned)?
                .push(question.clone());
            Ok(())
        }
    }

    #[test]
    fn test_save_all_swallows_failures() {
        let store = FlakyStore::default();
        let answers = vec![
            (QuestionId::new("a"), AnswerPayload::Choice { option: 0 }),
            (QuestionId::new("bad"), AnswerPayload::Choice { option: 1 }),
            (
                QuestionId::new("c"),
                AnswerPayload::Text {
                    text: "hello".into(),
                },
            ),
        ];
        assert_eq!(save_all(&store, "e", &answers), 1);
        let mut saved = store.saved.lock().unwrap().clone();
        saved.sort();
        assert_eq!(saved, vec![QuestionId::new("a"), QuestionId::new("c")]);
    }

    #[test]
    fn test_save_all_empty_is_noop() {
        let store = FlakyStore::default();
        assert_eq!(save_all(&store, "e", &[]), 0);
    }
}
