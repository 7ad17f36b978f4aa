//! Rule-based PRM heuristics (spec §4.4): the default, model-free path for
//! evidence-strength and logical-consistency. Grounded on rlm-core's
//! `complexity::PatternClassifier` keyword-signal classification style.

use std::sync::OnceLock;

use regex::Regex;

const WEAK_LANGUAGE: &[&str] = &["i think", "maybe", "probably", "perhaps", "might be", "could be"];
const ATTRIBUTION_KEYWORDS: &[&str] = &[
    "research", "study", "shows", "according to", "data", "report", "survey", "source:",
];
const CONNECTORS: &[&str] = &["therefore", "because", "since", "thus", "hence"];
const ANTONYM_PAIRS: &[(&str, &str)] = &[
    ("increase", "decrease"),
    ("more", "less"),
    ("higher", "lower"),
    ("true", "false"),
    ("positive", "negative"),
];

fn numeric_with_unit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[0-9][0-9,]*(\.[0-9]+)?\s?(%|[a-zA-Z]+(/[a-zA-Z]+)?)").unwrap())
}

/// Evidence strength in [0,1]: additive strong-evidence signals, capped
/// and then reduced by hedging language (spec §4.4).
///
/// A step containing only weak-language tokens must score exactly 0.0; a
/// step with a numeric-with-unit token and an attribution keyword must
/// score at least 0.7 (spec §8 boundary behaviors).
pub fn evidence_strength(text: &str) -> f64 {
    if text.trim().is_empty() {
        return 0.0;
    }
    let lower = text.to_lowercase();
    let mut score = 0.3_f64;

    if numeric_with_unit_re().is_match(&lower) {
        score += 0.3;
    }
    if ATTRIBUTION_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        score += 0.3;
    }
    let hedge_hits = WEAK_LANGUAGE.iter().filter(|kw| lower.contains(**kw)).count();
    score -= hedge_hits as f64 * 0.4;

    score.clamp(0.0, 1.0)
}

/// Logical consistency in [0,1]: reward logical-connector tokens preceded
/// by a premise-like clause, penalize same-entity opposite-polarity
/// self-contradictions (spec §4.4).
pub fn logical_consistency(text: &str) -> f64 {
    if text.trim().is_empty() {
        return 0.0;
    }
    let lower = text.to_lowercase();
    let mut score = 0.5_f64;

    let has_premise_then_connector = CONNECTORS.iter().any(|connector| {
        lower
            .find(connector)
            .map(|idx| idx > 0)
            .unwrap_or(false)
    });
    if has_premise_then_connector {
        score += 0.3;
    }

    let contradicts = ANTONYM_PAIRS
        .iter()
        .any(|(a, b)| lower.contains(a) && lower.contains(b));
    if contradicts {
        score -= 0.4;
    }

    score.clamp(0.0, 1.0)
}
