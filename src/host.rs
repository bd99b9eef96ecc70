use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::collections::HashMap;
use std::time::Instant;

use crate::drafts::AnswerPayload;
use crate::exam::{Question, QuestionId, QuestionKind};
use crate::guard::{ClipboardOp, GuardSignal, Surface};
use crate::proctor::{AnswerStore, Navigator, Notifier, Proctor};
use crate::runtime::HostEvent;
use crate::session::{ExamEvent, ExamSession, Notice};
use crate::submission::SubmissionClient;

const MAX_NOTICES: usize = 4;

/// Keeps the most recent notices for display; persistent ones are never evicted
#[derive(Debug, Default)]
pub struct NoticeBoard {
    notices: Vec<Notice>,
}

impl NoticeBoard {
    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }
}

impl Notifier for NoticeBoard {
    fn notify(&mut self, notice: &Notice) {
        self.notices.push(notice.clone());
        while self.notices.len() > MAX_NOTICES {
            match self.notices.iter().position(|n| !n.persistent) {
                Some(idx) => {
                    self.notices.remove(idx);
                }
                None => break,
            }
        }
    }
}

/// Records the navigation requested after a successful submission
#[derive(Debug, Default)]
pub struct ResultsGate {
    results_for: Option<String>,
    fullscreen_released: bool,
}

impl ResultsGate {
    pub fn results_for(&self) -> Option<&str> {
        self.results_for.as_deref()
    }

    pub fn fullscreen_released(&self) -> bool {
        self.fullscreen_released
    }
}

impl Navigator for ResultsGate {
    fn exit_fullscreen(&mut self) -> std::io::Result<()> {
        self.fullscreen_released = true;
        Ok(())
    }

    fn show_results(&mut self, exam_id: &str) {
        self.results_for = Some(exam_id.to_string());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Consent,
    Exam,
    Results,
}

fn surface_for(question: Option<&Question>) -> Surface {
    match question.map(|q| q.kind) {
        Some(QuestionKind::Coding) => Surface::CodeEditor,
        Some(QuestionKind::Text) => Surface::TextArea,
        _ => Surface::Document,
    }
}

/// Terminal exam host: turns terminal input into session events
pub struct ExamApp<S: AnswerStore, C: SubmissionClient> {
    proctor: Proctor<S, C, NoticeBoard, ResultsGate>,
    screen: Screen,
    current: usize,
    buffers: HashMap<QuestionId, String>,
    min_size: (u16, u16),
    quit: bool,
}

impl<S: AnswerStore, C: SubmissionClient> ExamApp<S, C> {
    pub fn new(session: ExamSession, store: S, client: C, min_size: (u16, u16)) -> Self {
        let mut buffers = HashMap::new();
        for q in &session.exam().questions {
            let existing = match q.kind {
                QuestionKind::Coding => session
                    .answers()
                    .code(&q.id)
                    .map(str::to_string)
                    .or_else(|| q.starter_code.clone()),
                QuestionKind::Text => match session.answers().answer(&q.id) {
                    Some(AnswerPayload::Text { text }) => Some(text.clone()),
                    _ => None,
                },
                QuestionKind::Mcq => None,
            };
            if let Some(text) = existing {
                buffers.insert(q.id.clone(), text);
            }
        }

        Self {
            proctor: Proctor::new(
                session,
                store,
                client,
                NoticeBoard::default(),
                ResultsGate::default(),
            ),
            screen: Screen::Consent,
            current: 0,
            buffers,
            min_size,
            quit: false,
        }
    }

    pub fn session(&self) -> &ExamSession {
        self.proctor.session()
    }

    pub fn proctor(&self) -> &Proctor<S, C, NoticeBoard, ResultsGate> {
        &self.proctor
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    pub fn notices(&self) -> &[Notice] {
        self.proctor.notifier().notices()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.session().exam().questions.get(self.current)
    }

    pub fn buffer(&self, id: &QuestionId) -> &str {
        self.buffers.get(id).map(String::as_str).unwrap_or("")
    }

    pub fn fits(&self, cols: u16, rows: u16) -> bool {
        cols >= self.min_size.0 && rows >= self.min_size.1
    }

    /// Candidate consented; the alternate screen stands in for fullscreen
    pub fn start(&mut self, cols: u16, rows: u16) {
        self.proctor.dispatch(ExamEvent::StartAssessment {
            fullscreen_granted: self.fits(cols, rows),
        });
        self.screen = Screen::Exam;
    }

    pub fn on_event(&mut self, event: HostEvent, size: (u16, u16)) {
        match (self.screen, event) {
            (Screen::Consent, HostEvent::Key(key)) => match key.code {
                KeyCode::Enter => self.start(size.0, size.1),
                KeyCode::Esc => self.quit = true,
                _ => {}
            },
            (Screen::Results, HostEvent::Key(key)) => {
                if matches!(key.code, KeyCode::Esc | KeyCode::Char('q') | KeyCode::Enter) {
                    self.quit = true;
                }
            }
            (Screen::Exam, HostEvent::Key(key)) => self.on_key(key),
            (Screen::Exam, HostEvent::Paste(_)) => {
                let target = surface_for(self.current_question());
                self.proctor
                    .dispatch(ExamEvent::Signal(GuardSignal::Clipboard {
                        op: ClipboardOp::Paste,
                        target,
                    }));
            }
            (Screen::Exam, HostEvent::FocusLost) => {
                self.proctor.dispatch(ExamEvent::WindowBlur);
            }
            (Screen::Exam, HostEvent::Resize(cols, rows)) => {
                let active = self.fits(cols, rows);
                self.proctor
                    .dispatch(ExamEvent::FullscreenChanged { active });
            }
            (Screen::Exam, HostEvent::Tick) => {
                self.proctor.dispatch(ExamEvent::Tick {
                    now: Instant::now(),
                });
            }
            _ => {}
        }

        if self.screen == Screen::Exam && self.proctor.navigator().results_for().is_some() {
            self.screen = Screen::Results;
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        if key.kind == KeyEventKind::Release {
            return;
        }
        let Some(question) = self.current_question().cloned() else {
            return;
        };
        let target = surface_for(Some(&question));
        if self
            .proctor
            .dispatch(ExamEvent::Signal(GuardSignal::Key { key, target }))
        {
            return;
        }

        let count = self.session().exam().questions.len();
        let plain = !key.modifiers.intersects(
            KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER | KeyModifiers::META,
        );
        match key.code {
            KeyCode::F(2) => self.current = self.current.saturating_sub(1),
            KeyCode::F(3) => self.current = (self.current + 1).min(count.saturating_sub(1)),
            KeyCode::F(5) if question.kind == QuestionKind::Coding => {
                let code = self.buffer(&question.id).to_string();
                self.proctor.dispatch(ExamEvent::CodeRun {
                    question: question.id.clone(),
                    code,
                    language: language_of(&question),
                });
            }
            KeyCode::F(10) => self.proctor.submit(),
            KeyCode::Char(c) if plain && question.kind == QuestionKind::Mcq => {
                if let Some(option) = c.to_digit(10).and_then(|d| (d as usize).checked_sub(1)) {
                    if option < question.options.len() {
                        self.proctor.dispatch(ExamEvent::Answer {
                            question: question.id.clone(),
                            payload: AnswerPayload::Choice { option },
                        });
                    }
                }
            }
            KeyCode::Char(c) if plain => self.edit(&question, |buf| buf.push(c)),
            KeyCode::Enter => self.edit(&question, |buf| buf.push('\n')),
            KeyCode::Tab => self.edit(&question, |buf| buf.push_str("    ")),
            KeyCode::Backspace => self.edit(&question, |buf| {
                buf.pop();
            }),
            _ => {}
        }
    }

    fn edit(&mut self, question: &Question, apply: impl FnOnce(&mut String)) {
        let buf = self.buffers.entry(question.id.clone()).or_default();
        apply(buf);
        let text = buf.clone();
        let event = match question.kind {
            QuestionKind::Coding => ExamEvent::CodeEdited {
                question: question.id.clone(),
                code: text,
                language: language_of(question),
                now: Instant::now(),
            },
            QuestionKind::Text => ExamEvent::Answer {
                question: question.id.clone(),
                payload: AnswerPayload::Text { text },
            },
            QuestionKind::Mcq => return,
        };
        self.proctor.dispatch(event);
    }

    pub fn teardown(&mut self) {
        self.proctor.teardown();
    }
}

fn language_of(question: &Question) -> String {
    question
        .language
        .clone()
        .unwrap_or_else(|| "plaintext".to_string())
}
