//! Markdown rendering of the primer document.

use chrono::{DateTime, Utc};

use super::stages::{StageId, STAGE_ORDER};

/// Collected sentences for one stage.
#[derive(Debug, Clone, Default)]
pub struct StageBuckets {
    /// Sentences from the most recent session, rendered first.
    pub latest: Vec<String>,
    /// Sentences from older sessions.
    pub archive: Vec<String>,
}

impl StageBuckets {
    pub fn is_empty(&self) -> bool {
        self.latest.is_empty() && self.archive.is_empty()
    }
}

/// Everything the renderer needs for one primer document.
#[derive(Debug, Clone)]
pub struct PrimerInput {
    /// Handle bucket key the document belongs to.
    pub bucket: String,
    pub session_count: usize,
    /// Title or date label of the most recent session, if any.
    pub latest_label: Option<String>,
    /// One bucket pair per stage, indexed like [`STAGE_ORDER`].
    pub stages: Vec<StageBuckets>,
    pub updated_at: DateTime<Utc>,
    /// Cap on the cross-stage highlight list.
    pub highlight_cap: usize,
}

/// Render the primer markdown document.
pub fn render_primer(input: &PrimerInput) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Memory Primer — {}\n\n", input.bucket));
    out.push_str(&format!(
        "_Updated: {}_\n\n",
        input.updated_at.format("%Y-%m-%d %H:%M UTC")
    ));
    out.push_str(&format!("Sessions on record: {}\n", input.session_count));
    if let Some(label) = &input.latest_label {
        out.push_str(&format!("Latest session: {label}\n"));
    }
    out.push('\n');

    // Cross-stage highlights from the latest session, in stage order.
    let highlights: Vec<&String> = input
        .stages
        .iter()
        .flat_map(|buckets| buckets.latest.iter())
        .take(input.highlight_cap)
        .collect();
    out.push_str("## Latest Session Highlights\n\n");
    if highlights.is_empty() {
        out.push_str("_No highlights from the latest session._\n");
    } else {
        for highlight in highlights {
            out.push_str(&format!("- {highlight}\n"));
        }
    }
    out.push('\n');

    let mut empty_stages: Vec<StageId> = Vec::new();
    for (stage, buckets) in STAGE_ORDER.iter().zip(&input.stages) {
        out.push_str(&format!("## {}\n\n", stage.title()));
        if buckets.is_empty() {
            out.push_str(&format!("_{}_\n", stage.fallback_prompt()));
            empty_stages.push(*stage);
        } else {
            for sentence in &buckets.latest {
                out.push_str(&format!("- Latest • {sentence}\n"));
            }
            for sentence in &buckets.archive {
                out.push_str(&format!("- {sentence}\n"));
            }
        }
        out.push('\n');
    }

    out.push_str("## Suggested Next Angles\n\n");
    if empty_stages.is_empty() {
        out.push_str("_Every stage has material; revisit any of them for depth._\n");
    } else {
        for stage in empty_stages {
            out.push_str(&format!("- {}\n", stage.title()));
        }
    }

    out
}
