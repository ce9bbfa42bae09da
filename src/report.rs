use std::collections::HashMap;
use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::models::{MatchCandidate, MatchRequest};

#[derive(Debug, Clone, PartialEq)]
pub struct ReasonSummary {
    pub reason: String,
    pub count: usize,
}

pub fn summarize_reasons(candidates: &[MatchCandidate]) -> Vec<ReasonSummary> {
    let mut map: HashMap<&str, usize> = HashMap::new();

    for reason in candidates.iter().flat_map(|candidate| candidate.reasons.iter()) {
        *map.entry(reason.as_str()).or_insert(0) += 1;
    }

    let mut summaries: Vec<ReasonSummary> = map
        .into_iter()
        .map(|(reason, count)| ReasonSummary {
            reason: reason.to_string(),
            count,
        })
        .collect();

    summaries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.reason.cmp(&b.reason)));
    summaries
}

pub fn average_score(candidates: &[MatchCandidate]) -> f64 {
    if candidates.is_empty() {
        return 0.0;
    }
    candidates.iter().map(|candidate| candidate.score).sum::<f64>() / candidates.len() as f64
}

pub fn build_report(
    request: &MatchRequest,
    candidates: &[MatchCandidate],
    generated_at: DateTime<Utc>,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Workspace Match Report: {}", request.workspace_name);
    let _ = writeln!(
        output,
        "Generated {} (minimum Python {}%, minimum ML {}%, {} yr experience expected)",
        generated_at.format("%Y-%m-%d %H:%M UTC"),
        request.min_python_percent,
        request.min_ml_percent,
        request.min_experience
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Ranked Candidates");

    if candidates.is_empty() {
        let _ = writeln!(output, "No students meet this workspace's requirements.");
    } else {
        let _ = writeln!(
            output,
            "{} candidates, average score {:.1}%",
            candidates.len(),
            average_score(candidates)
        );
        let _ = writeln!(output);
        for (rank, candidate) in candidates.iter().enumerate() {
            let _ = writeln!(
                output,
                "{}. {} ({}) score {}%",
                rank + 1,
                candidate.name,
                candidate.roll,
                candidate.score
            );
            for reason in &candidate.reasons {
                let _ = writeln!(output, "   - {reason}");
            }
        }
    }

    let summaries = summarize_reasons(candidates);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Reason Mix");

    if summaries.is_empty() {
        let _ = writeln!(output, "No reasons recorded for this run.");
    } else {
        for summary in &summaries {
            let _ = writeln!(output, "- {} ({})", summary.reason, summary.count);
        }
    }

    output
}
