use crate::error::LoadError;
use crate::exam::{Question, QuestionId, QuestionKind};

/// A parsed question together with its answer key
#[derive(Debug, Clone, PartialEq)]
pub struct McqItem {
    pub question: Question,
    pub answer: Option<usize>,
}

struct Pending {
    line: usize,
    prompt: String,
    options: Vec<String>,
    answer: Option<usize>,
}

impl Pending {
    fn finish(self, index: usize) -> Result<McqItem, LoadError> {
        if self.options.len() < 2 {
            return Err(LoadError::mcq(
                self.line,
                "question needs at least two options",
            ));
        }
        Ok(McqItem {
            question: Question {
                id: QuestionId(format!("q{}", index + 1)),
                kind: QuestionKind::Mcq,
                prompt: self.prompt,
                options: self.options,
                language: None,
                starter_code: None,
            },
            answer: self.answer,
        })
    }
}

/// `A)` or `A.` prefixes
fn option_label(line: &str) -> Option<(usize, &str)> {
    let mut chars = line.chars();
    let letter = chars.next()?;
    let sep = chars.next()?;
    if !letter.is_ascii_uppercase() || !(sep == ')' || sep == '.') {
        return None;
    }
    Some(((letter as u8 - b'A') as usize, line[2..].trim()))
}

fn strip_prefix_ci<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    match line.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => Some(line[prefix.len()..].trim()),
        _ => None,
    }
}

/// Parse a line-oriented question bank:
///
/// ```text
/// # comment
/// Q: What is 2 + 2?
/// A) 3
/// B) 4
/// ANSWER: B
/// ```
pub fn parse_bank(input: &str) -> Result<Vec<McqItem>, LoadError> {
    let mut items = Vec::new();
    let mut current: Option<Pending> = None;

    for (idx, raw) in input.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();

        if line.starts_with('#') {
            continue;
        }
        if line.is_empty() {
            if let Some(p) = current.take() {
                items.push(p.finish(items.len())?);
            }
            continue;
        }

        if let Some(prompt) = strip_prefix_ci(line, "Q:") {
            if let Some(p) = current.take() {
                items.push(p.finish(items.len())?);
            }
            if prompt.is_empty() {
                return Err(LoadError::mcq(line_no, "empty question"));
            }
            current = Some(Pending {
                line: line_no,
                prompt: prompt.to_string(),
                options: Vec::new(),
                answer: None,
            });
            continue;
        }

        let Some(pending) = current.as_mut() else {
            return Err(LoadError::mcq(line_no, "expected `Q:` to start a question"));
        };

        if let Some(key) = strip_prefix_ci(line, "ANSWER:") {
            let Some((index, _)) = option_label(&format!("{})", key.to_ascii_uppercase())) else {
                return Err(LoadError::mcq(line_no, format!("invalid answer `{key}`")));
            };
            if index >= pending.options.len() {
                return Err(LoadError::mcq(
                    line_no,
                    format!("answer `{key}` has no matching option"),
                ));
            }
            pending.answer = Some(index);
        } else if let Some((index, text)) = option_label(line) {
            if index != pending.options.len() {
                return Err(LoadError::mcq(line_no, "options must be in order A, B, C, ..."));
            }
            pending.options.push(text.to_string());
        } else if pending.options.is_empty() {
            // multi-line prompt
            pending.prompt.push('\n');
            pending.prompt.push_str(line);
        } else {
            return Err(LoadError::mcq(line_no, format!("unexpected line `{line}`")));
        }
    }

    if let Some(p) = current.take() {
        items.push(p.finish(items.len())?);
    }
    Ok(items)
}
