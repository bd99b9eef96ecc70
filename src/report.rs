use itertools::Itertools;
use serde::Serialize;
use std::io::Write;

use crate::store::StoredSubmission;
use crate::violation::{CheatingLog, ViolationKind};

/// Per-kind totals across a set of cheating logs, most frequent first
pub fn kind_counts(logs: &[CheatingLog]) -> Vec<(ViolationKind, usize)> {
    logs.iter()
        .map(|l| l.kind)
        .counts()
        .into_iter()
        .sorted_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)))
        .collect()
}

#[derive(Debug, Serialize)]
struct LogRow<'a> {
    exam_id: &'a str,
    student_id: &'a str,
    #[serde(rename = "type")]
    kind: String,
    details: &'a str,
    time: String,
}

/// Write every cheating log of the given submissions as CSV
pub fn write_logs_csv<W: Write>(submissions: &[StoredSubmission], out: W) -> csv::Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    for sub in submissions {
        for log in &sub.cheating_logs {
            wtr.serialize(LogRow {
                exam_id: &sub.exam_id,
                student_id: &sub.student_id,
                kind: log.kind.to_string(),
                details: &log.details,
                time: log.time.to_rfc3339(),
            })?;
        }
    }
    wtr.flush()?;
    Ok(())
}

/// Plain-text summary for the `report` command
pub fn summarize(submissions: &[StoredSubmission]) -> String {
    let mut out = String::new();
    for sub in submissions {
        let student = if sub.student_id.is_empty() {
            "-"
        } else {
            sub.student_id.as_str()
        };
        out.push_str(&format!(
            "{}  student={}  reason={}  cheating={}  submitted={}\n",
            sub.exam_id,
            student,
            sub.reason,
            sub.cheating_detected,
            sub.submitted_at.format("%Y-%m-%d %H:%M:%S"),
        ));
        for (kind, n) in kind_counts(&sub.cheating_logs) {
            out.push_str(&format!("    {:<20} {n}\n", kind.to_string()));
        }
    }
    out
}
