use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
};

use crate::clock::format_remaining;
use crate::drafts::AnswerPayload;
use crate::exam::{Question, QuestionKind};
use crate::host::{ExamApp, Screen};
use crate::proctor::AnswerStore;
use crate::session::NoticeLevel;
use crate::submission::SubmissionClient;

const HORIZONTAL_MARGIN: u16 = 2;
const VERTICAL_MARGIN: u16 = 1;

impl<S: AnswerStore, C: SubmissionClient> Widget for &ExamApp<S, C> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.screen() {
            Screen::Consent => render_consent(self, area, buf),
            Screen::Exam => render_exam(self, area, buf),
            Screen::Results => render_results(self, area, buf),
        }
    }
}

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn level_style(level: NoticeLevel) -> Style {
    match level {
        NoticeLevel::Info => Style::default().fg(Color::Cyan),
        NoticeLevel::Warning => Style::default().fg(Color::Yellow),
        NoticeLevel::FinalWarning => bold().fg(Color::LightRed),
        NoticeLevel::Error => bold().fg(Color::Red),
    }
}

fn render_consent<S: AnswerStore, C: SubmissionClient>(
    app: &ExamApp<S, C>,
    area: Rect,
    buf: &mut Buffer,
) {
    let exam = app.session().exam();
    let threshold = app.session().strike_policy().threshold;
    let text = vec![
        Line::from(Span::styled(exam.title.clone(), bold())),
        Line::from(""),
        Line::from(format!(
            "{} questions, {} minutes",
            exam.questions.len(),
            exam.duration_minutes
        )),
        Line::from(""),
        Line::from("This exam is proctored. Leaving the window, shrinking the terminal,"),
        Line::from("pasting text or using blocked shortcuts is recorded as a violation."),
        Line::from(format!(
            "{threshold} violations submit the exam automatically."
        )),
        Line::from(""),
        Line::from(Span::styled(
            "(enter) start / (esc) leave",
            Style::default().add_modifier(Modifier::ITALIC),
        )),
    ];

    let height = text.len() as u16;
    Paragraph::new(text)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(centered(area, height), buf);
}

fn render_exam<S: AnswerStore, C: SubmissionClient>(
    app: &ExamApp<S, C>,
    area: Rect,
    buf: &mut Buffer,
) {
    let session = app.session();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(1), // header
            Constraint::Length(1), // counters
            Constraint::Min(3),    // question
            Constraint::Length(app.notices().len() as u16),
            Constraint::Length(1), // legend
        ])
        .split(area);

    let remaining = session.clock().remaining_seconds;
    let clock_style = if remaining <= 300 {
        bold().fg(Color::Red)
    } else {
        bold()
    };
    let header = Line::from(vec![
        Span::styled(session.exam().title.clone(), bold()),
        Span::raw("   "),
        Span::styled(format_remaining(remaining), clock_style),
    ]);
    Paragraph::new(header).render(chunks[0], buf);

    let v = session.violations();
    let counters = Paragraph::new(Span::styled(
        format!(
            "violations {}   keyboard {}   question {}/{}   {}",
            v.general_count,
            v.keyboard_count,
            app.current_index() + 1,
            session.exam().questions.len(),
            session.phase(),
        ),
        Style::default().add_modifier(Modifier::DIM),
    ));
    counters.render(chunks[1], buf);

    if let Some(question) = app.current_question() {
        render_question(app, question, chunks[2], buf);
    }

    let notices: Vec<Line> = app
        .notices()
        .iter()
        .map(|n| Line::from(Span::styled(n.message.clone(), level_style(n.level))))
        .collect();
    Paragraph::new(notices).render(chunks[3], buf);

    Paragraph::new(Span::styled(
        "(f2) prev / (f3) next / (f5) run / (f10) submit",
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .render(chunks[4], buf);

    if session.fullscreen_warning() {
        render_fullscreen_warning(area, buf);
    }
}

fn render_question<S: AnswerStore, C: SubmissionClient>(
    app: &ExamApp<S, C>,
    question: &Question,
    area: Rect,
    buf: &mut Buffer,
) {
    let mut lines = vec![Line::from(Span::styled(question.prompt.clone(), bold())), Line::from("")];

    match question.kind {
        QuestionKind::Mcq => {
            let chosen = match app.session().answers().answer(&question.id) {
                Some(AnswerPayload::Choice { option }) => Some(*option),
                _ => None,
            };
            for (idx, option) in question.options.iter().enumerate() {
                let marker = if chosen == Some(idx) { ">" } else { " " };
                let style = if chosen == Some(idx) {
                    bold().fg(Color::Green)
                } else {
                    Style::default()
                };
                lines.push(Line::from(Span::styled(
                    format!("{marker} {}) {option}", idx + 1),
                    style,
                )));
            }
        }
        QuestionKind::Text | QuestionKind::Coding => {
            for line in app.buffer(&question.id).split('\n') {
                lines.push(Line::from(line.to_string()));
            }
        }
    }

    let title = match (&question.kind, &question.language) {
        (QuestionKind::Coding, Some(lang)) => format!(" {} ({lang}) ", question.id),
        _ => format!(" {} ", question.id),
    };
    Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: false })
        .render(area, buf);
}

fn render_fullscreen_warning(area: Rect, buf: &mut Buffer) {
    let popup = centered(area, 5);
    Clear.render(popup, buf);
    Paragraph::new(vec![
        Line::from(Span::styled("Fullscreen exited", bold().fg(Color::Red))),
        Line::from("Restore the terminal size to continue the exam."),
    ])
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL))
    .render(popup, buf);
}

fn render_results<S: AnswerStore, C: SubmissionClient>(
    app: &ExamApp<S, C>,
    area: Rect,
    buf: &mut Buffer,
) {
    let v = app.session().violations();
    let mut lines = vec![
        Line::from(Span::styled("Exam submitted", bold().fg(Color::Green))),
        Line::from(""),
        Line::from(format!(
            "{} violations, {} keyboard violations",
            v.general_count, v.keyboard_count
        )),
    ];
    if app.session().cheating_detected() {
        lines.push(Line::from(Span::styled(
            "Flagged for review",
            bold().fg(Color::Red),
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "(q) quit",
        Style::default().add_modifier(Modifier::ITALIC),
    )));

    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .render(centered(area, 6), buf);
}

/// Full-width band of `height` rows in the vertical middle of `area`
fn centered(area: Rect, height: u16) -> Rect {
    let height = height.min(area.height);
    Rect {
        x: area.x,
        y: area.y + (area.height - height) / 2,
        width: area.width,
        height,
    }
}
