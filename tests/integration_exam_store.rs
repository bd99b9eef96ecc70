use std::fs;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{backend::TestBackend, Terminal};
use tempfile::tempdir;

use proctor::config::ProctorConfig;
use proctor::drafts::AnswerPayload;
use proctor::exam::{ExamLoader, FileExamLoader, QuestionId};
use proctor::host::{ExamApp, Screen};
use proctor::report::{summarize, write_logs_csv};
use proctor::runtime::HostEvent;
use proctor::session::ExamSession;
use proctor::store::ProctorDb;
use proctor::violation::ViolationKind;

const BANK: &str = "\
# networking quiz
Q: Which layer does TCP live in?
A) Network
B) Transport
C) Session
ANSWER: B

Q: Default HTTPS port?
A) 80
B) 443
";

const FULL: (u16, u16) = (120, 40);

fn key(code: KeyCode) -> HostEvent {
    HostEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
}

fn screen_text<S, C>(app: &ExamApp<S, C>) -> String
where
    S: proctor::proctor::AnswerStore,
    C: proctor::submission::SubmissionClient,
{
    let mut terminal = Terminal::new(TestBackend::new(FULL.0, FULL.1)).unwrap();
    terminal
        .draw(|f| f.render_widget(app, f.area()))
        .unwrap();
    terminal
        .backend()
        .buffer()
        .content
        .iter()
        .map(|c| c.symbol())
        .collect()
}

fn load_bank(dir: &std::path::Path) -> proctor::exam::LoadedExam {
    let path = dir.join("quiz.txt");
    fs::write(&path, BANK).unwrap();
    FileExamLoader::new(&path)
        .with_bank_duration(15)
        .load()
        .unwrap()
}

#[test]
fn terminal_session_saves_answers_and_archives_violation_submit() {
    let dir = tempdir().unwrap();
    let db = ProctorDb::open(dir.path().join("proctor.db")).unwrap();
    let loaded = load_bank(dir.path());
    assert_eq!(loaded.exam.id, "quiz");
    assert_eq!(loaded.exam.questions.len(), 2);

    let session = ExamSession::new(loaded.exam, "s1", &ProctorConfig::default());
    let mut app = ExamApp::new(session, &db, &db, (80, 24));
    assert!(screen_text(&app).contains("2 questions, 15 minutes"));

    app.on_event(key(KeyCode::Enter), FULL);
    assert_eq!(app.screen(), Screen::Exam);
    assert!(app.session().guard_active());

    app.on_event(key(KeyCode::Char('2')), FULL);
    let prior = db.load_answers("quiz").unwrap();
    assert_eq!(prior.answers.len(), 1);
    assert_eq!(prior.answers[0].question_id, QuestionId::new("q1"));
    assert_eq!(prior.answers[0].payload, AnswerPayload::Choice { option: 1 });

    app.on_event(key(KeyCode::F(3)), FULL);
    assert_eq!(app.current_index(), 1);
    app.on_event(key(KeyCode::F(3)), FULL);
    assert_eq!(app.current_index(), 1);

    // bracketed paste is a blocked clipboard paste
    app.on_event(HostEvent::Paste("443".into()), FULL);
    assert_eq!(app.session().violations().keyboard_count, 1);
    assert_eq!(app.session().violations().general_count, 1);

    // shrinking the terminal leaves "fullscreen"
    app.on_event(HostEvent::Resize(60, 20), FULL);
    assert!(app.session().fullscreen_warning());
    assert!(screen_text(&app).contains("Fullscreen exited"));
    app.on_event(HostEvent::Resize(FULL.0, FULL.1), FULL);
    assert!(!app.session().fullscreen_warning());

    // third general strike submits
    app.on_event(HostEvent::FocusLost, FULL);
    assert_eq!(app.screen(), Screen::Results);
    assert!(app.proctor().navigator().fullscreen_released());
    assert!(screen_text(&app).contains("Exam submitted"));

    let subs = db.submissions("quiz").unwrap();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].reason, "violations");
    assert!(subs[0].cheating_detected);
    let kinds: Vec<_> = subs[0].cheating_logs.iter().map(|l| l.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ViolationKind::CopyPasteBlocked,
            ViolationKind::FullscreenExit,
            ViolationKind::WindowSwitch
        ]
    );

    let summary = summarize(&subs);
    assert!(summary.contains("reason=violations"));
    assert!(summary.contains("fullscreen-exit"));

    let csv_path = dir.path().join("logs.csv");
    write_logs_csv(&subs, fs::File::create(&csv_path).unwrap()).unwrap();
    let csv = fs::read_to_string(&csv_path).unwrap();
    assert_eq!(csv.lines().count(), 4);

    app.on_event(key(KeyCode::Char('q')), FULL);
    assert!(app.should_quit());
}

#[test]
fn answers_resume_after_reload() {
    let dir = tempdir().unwrap();
    let db = ProctorDb::open(dir.path().join("proctor.db")).unwrap();

    {
        let loaded = load_bank(dir.path());
        let session = ExamSession::new(loaded.exam, "s1", &ProctorConfig::default());
        let mut app = ExamApp::new(session, &db, &db, (80, 24));
        app.on_event(key(KeyCode::Enter), FULL);
        app.on_event(key(KeyCode::Char('1')), FULL);
        app.on_event(key(KeyCode::F(3)), FULL);
        app.on_event(key(KeyCode::Char('2')), FULL);
        app.teardown();
    }

    let loaded = load_bank(dir.path());
    let prior = db.load_answers(&loaded.exam.id).unwrap();
    let session = ExamSession::new(loaded.exam, "s1", &ProctorConfig::default()).resume(&prior);
    assert_eq!(
        session.answers().answer(&QuestionId::new("q1")),
        Some(&AnswerPayload::Choice { option: 0 })
    );
    assert_eq!(
        session.answers().answer(&QuestionId::new("q2")),
        Some(&AnswerPayload::Choice { option: 1 })
    );
    assert!(db.submissions("quiz").unwrap().is_empty());
}

#[test]
fn persisted_violations_rehydrate() {
    let dir = tempdir().unwrap();
    let db = ProctorDb::open(dir.path().join("proctor.db")).unwrap();
    let config = ProctorConfig {
        persist_violations: true,
        ..ProctorConfig::default()
    };

    {
        let loaded = load_bank(dir.path());
        let session = ExamSession::new(loaded.exam, "s1", &config);
        let mut app = ExamApp::new(session, &db, &db, (80, 24));
        app.on_event(key(KeyCode::Enter), FULL);
        app.on_event(HostEvent::FocusLost, FULL);
        app.on_event(HostEvent::FocusLost, FULL);
        app.teardown();
    }

    let state = db.load_violations("quiz", "s1").unwrap().unwrap();
    assert_eq!(state.general_count, 2);

    let loaded = load_bank(dir.path());
    let session = ExamSession::new(loaded.exam, "s1", &config).with_violations(state);
    let mut app = ExamApp::new(session, &db, &db, (80, 24));
    app.on_event(key(KeyCode::Enter), FULL);
    app.on_event(HostEvent::FocusLost, FULL);

    // one more strike after the reload ends the exam
    assert_eq!(app.screen(), Screen::Results);
    assert_eq!(db.submissions("quiz").unwrap().len(), 1);
}

#[test]
fn undersized_terminal_starts_without_fullscreen() {
    let dir = tempdir().unwrap();
    let db = ProctorDb::in_memory().unwrap();
    let loaded = load_bank(dir.path());
    let session = ExamSession::new(loaded.exam, "s1", &ProctorConfig::default());
    let mut app = ExamApp::new(session, &db, &db, (80, 24));

    app.on_event(key(KeyCode::Enter), (40, 10));
    assert_eq!(app.screen(), Screen::Exam);
    assert!(!app.session().fullscreen().is_currently_fullscreen);
    assert_eq!(app.session().violations().general_count, 0);

    // still too small: never was fullscreen, so nothing to exit
    app.on_event(HostEvent::Resize(50, 12), (50, 12));
    assert_eq!(app.session().violations().general_count, 0);
    assert!(!app.session().fullscreen_warning());

    app.on_event(HostEvent::Resize(FULL.0, FULL.1), FULL);
    assert!(app.session().fullscreen().is_currently_fullscreen);
    app.on_event(HostEvent::Resize(50, 12), (50, 12));
    assert_eq!(app.session().violations().general_count, 1);
    assert!(app.session().fullscreen_warning());
}

#[test]
fn consent_screen_shows_configured_threshold() {
    let dir = tempdir().unwrap();
    let db = ProctorDb::in_memory().unwrap();
    let loaded = load_bank(dir.path());
    let config = ProctorConfig {
        strike_threshold: 5,
        ..ProctorConfig::default()
    };
    let session = ExamSession::new(loaded.exam, "s1", &config);
    let app = ExamApp::new(session, &db, &db, (80, 24));

    let text = screen_text(&app);
    assert!(text.contains("5 violations submit the exam automatically."));
    assert!(text.contains("(enter) start / (esc) leave"));
}
