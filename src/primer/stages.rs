//! Biography stages and sentence classification.
//!
//! Classification is intentionally simple heuristic matching, not NLP: an
//! ordered list of keyword patterns is tested per stage and the first match
//! wins, so pattern order decides where ambiguous sentences land.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// One biography stage of the primer document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    Intro,
    Youth,
    Family,
    Work,
    Places,
    Reflections,
    /// Catch-all stage for sentences no pattern claims.
    Notes,
}

/// Fixed rendering order of the stages.
pub const STAGE_ORDER: [StageId; 7] = [
    StageId::Intro,
    StageId::Youth,
    StageId::Family,
    StageId::Work,
    StageId::Places,
    StageId::Reflections,
    StageId::Notes,
];

impl StageId {
    /// Section heading shown in the primer document.
    pub fn title(&self) -> &'static str {
        match self {
            StageId::Intro => "Intro & Warm Memories",
            StageId::Youth => "Youth & Formative Years",
            StageId::Family => "Family & Relationships",
            StageId::Work => "Work & Purpose",
            StageId::Places => "Places & Travels",
            StageId::Reflections => "Reflections & Lessons",
            StageId::Notes => "Additional Notes",
        }
    }

    /// Prompt rendered when a stage has no collected sentences yet.
    pub fn fallback_prompt(&self) -> &'static str {
        match self {
            StageId::Intro => "No warm-up memories collected yet.",
            StageId::Youth => "Nothing about early years yet — a good opening topic.",
            StageId::Family => "No family stories collected yet.",
            StageId::Work => "Nothing about work or daily purpose yet.",
            StageId::Places => "No places or journeys mentioned yet.",
            StageId::Reflections => "No reflections or life lessons captured yet.",
            StageId::Notes => "No further notes yet.",
        }
    }

    /// Index within [`STAGE_ORDER`].
    pub fn index(&self) -> usize {
        STAGE_ORDER
            .iter()
            .position(|s| s == self)
            .unwrap_or(STAGE_ORDER.len() - 1)
    }
}

/// The ordered (pattern, stage) pairs. First match wins; the catch-all
/// Notes stage has no pattern.
fn stage_patterns() -> &'static [(Regex, StageId)] {
    static PATTERNS: OnceLock<Vec<(Regex, StageId)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (
                r"(?i)(remember|memor(y|ies)|favou?rite|cherish|happiest|laughed|smell|song)",
                StageId::Intro,
            ),
            (
                r"(?i)(childhood|school|grew up|growing up|young|youth|teenage|as a (boy|girl|kid)|born|playground)",
                StageId::Youth,
            ),
            (
                r"(?i)(famil(y|ies)|mother|father|mom|dad|grand(mother|father|ma|pa)|brother|sister|wife|husband|marri(ed|age)|son|daughter|children|kids)",
                StageId::Family,
            ),
            (
                r"(?i)(work(ed|ing)?|job|career|business|company|farm|factory|profession|colleague|retire)",
                StageId::Work,
            ),
            (
                r"(?i)(moved|travel|journey|city|town|village|country|abroad|hometown|by the sea|mountain)",
                StageId::Places,
            ),
            (
                r"(?i)(lesson|learn(ed|t)|proud|regret|believe|wisdom|advice|grateful|thankful|faith|looking back)",
                StageId::Reflections,
            ),
        ]
        .into_iter()
        .map(|(pattern, stage)| {
            (
                Regex::new(pattern).expect("stage pattern compiles"),
                stage,
            )
        })
        .collect()
    })
}

/// Classify one sentence into exactly one stage.
pub fn classify_sentence(sentence: &str) -> StageId {
    for (pattern, stage) in stage_patterns() {
        if pattern.is_match(sentence) {
            return *stage;
        }
    }
    StageId::Notes
}

/// Split raw turn text into whitespace-normalized sentences.
pub fn split_sentences(text: &str) -> Vec<String> {
    text.split(['.', '!', '?', '\n'])
        .map(|part| part.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|s| !s.is_empty())
        .collect()
}

/// Capitalize the first letter and bound the length of a sentence.
pub fn polish_sentence(sentence: &str, max_len: usize) -> String {
    let mut chars = sentence.chars();
    let mut polished: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => return String::new(),
    };
    if polished.chars().count() > max_len {
        polished = polished.chars().take(max_len.saturating_sub(1)).collect();
        polished = polished.trim_end().to_string();
        polished.push('…');
    }
    polished
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sentences_normalizes_whitespace() {
        let sentences = split_sentences("I grew up   near the sea.  We had\na small boat! ok");
        assert_eq!(
            sentences,
            vec!["I grew up near the sea", "We had", "a small boat", "ok"]
        );
    }

    #[test]
    fn test_classification_first_match_wins() {
        // "remember" (Intro) appears before any Youth keyword is tested,
        // even though "school" would also match.
        assert_eq!(
            classify_sentence("I remember my school fondly"),
            StageId::Intro
        );
        assert_eq!(
            classify_sentence("My school was next to the bakery"),
            StageId::Youth
        );
        assert_eq!(
            classify_sentence("My sister and I shared a room"),
            StageId::Family
        );
        assert_eq!(
            classify_sentence("I worked at the shipyard for thirty years"),
            StageId::Work
        );
        assert_eq!(
            classify_sentence("We moved to a small village"),
            StageId::Places
        );
        assert_eq!(
            classify_sentence("Looking back, patience was everything"),
            StageId::Reflections
        );
        assert_eq!(
            classify_sentence("The weather was grey that week"),
            StageId::Notes
        );
    }

    #[test]
    fn test_polish_sentence_capitalizes() {
        assert_eq!(polish_sentence("my first bicycle", 200), "My first bicycle");
        assert_eq!(polish_sentence("", 200), "");
    }

    #[test]
    fn test_polish_sentence_truncates() {
        let long = "a".repeat(250);
        let polished = polish_sentence(&long, 200);
        assert_eq!(polished.chars().count(), 200);
        assert!(polished.ends_with('…'));
    }

    #[test]
    fn test_stage_order_ends_with_catch_all() {
        assert_eq!(STAGE_ORDER.last(), Some(&StageId::Notes));
        assert_eq!(StageId::Notes.index(), STAGE_ORDER.len() - 1);
    }
}
