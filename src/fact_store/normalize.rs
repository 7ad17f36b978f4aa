//! Ingest-time canonicalization (spec §4.1, §9): the single chokepoint
//! where untyped free text becomes typed core state. Deterministic
//! case-fold + whitespace collapse + synonym lookup for entity/predicate
//! text, and unit-aware numeric normalization for objects.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::fact_store::types::ObjectValue;

/// Collapse runs of whitespace and fold case, the deterministic
/// canonicalization spec §4.1 requires for subject/predicate text.
pub fn normalize_entity(raw: &str) -> String {
    let folded = raw.trim().to_lowercase();
    let collapsed = folded.split_whitespace().collect::<Vec<_>>().join(" ");
    resolve_synonym(&collapsed)
}

/// A small fixed synonym table. Real deployments would load this from
/// configuration; the core only needs the lookup to be deterministic.
fn resolve_synonym(s: &str) -> String {
    match s {
        "pv system" | "solar system" => "solar kit".to_string(),
        "electricity price" | "power price" => "grid price".to_string(),
        other => other.to_string(),
    }
}

fn numeric_with_unit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([0-9][0-9,]*(?:\.[0-9]+)?)\s*(.*)$").unwrap())
}

/// Normalize a unit token: case-fold, and map known synonyms (e.g. the
/// German "Jahr" to "yr") so that `4,500 kWh/Jahr` and `4500 kWh/yr`
/// normalize to the same unit string.
fn normalize_unit(unit: &str) -> String {
    let folded = unit.trim().to_lowercase();
    let folded = folded.replace("jahr", "yr");
    folded
}

/// Parse an object literal into a normalized `ObjectValue`. A bare numeric
/// with no unit token is rejected (spec §3: "bare numerics without a unit
/// are rejected at ingest").
pub fn normalize_object(raw: &str) -> Result<ObjectValue> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::invalid_input("object must not be empty"));
    }
    if let Some(caps) = numeric_with_unit_re().captures(trimmed) {
        let digits = caps.get(1).unwrap().as_str().replace(',', "");
        let rest = caps.get(2).unwrap().as_str().trim();
        let value: f64 = digits
            .parse()
            .map_err(|_| Error::invalid_input(format!("unparseable numeric object: {raw}")))?;
        if rest.is_empty() {
            return Err(Error::invalid_input(format!(
                "numeric object '{raw}' is missing a required unit"
            )));
        }
        return Ok(ObjectValue::Numeric {
            value,
            unit: normalize_unit(rest),
        });
    }
    Ok(ObjectValue::Literal(normalize_entity(trimmed)))
}

/// Fractional divergence between two numeric values, used both by the
/// fingerprint-merge decision and by the 5% auto-merge threshold (spec
/// §4.3, §8). Returns `f64::INFINITY` if both values are zero-divergent
/// but one is nonzero (undefined relative divergence from zero).
pub fn relative_divergence(a: f64, b: f64) -> f64 {
    let denom = a.abs().max(b.abs());
    if denom == 0.0 {
        0.0
    } else {
        (a - b).abs() / denom
    }
}

/// Two normalized objects are fingerprint-equivalent if they render to the
/// same canonical string representation used as fingerprint input. Numeric
/// values are considered equivalent for fingerprinting only when they are
/// exactly equal after unit normalization; near-equal-but-distinct values
/// (e.g. 7.94 vs 7.9 years) are merged by `SourceVerifier`, not silently
/// collapsed by the fingerprint itself (spec §3 invariant i concerns exact
/// duplicates; §4.3's numeric tolerance handles near-duplicates).
pub fn object_fingerprint_key(object: &ObjectValue) -> String {
    match object {
        ObjectValue::Literal(s) => s.clone(),
        ObjectValue::Numeric { value, unit } => format!("{value}|{unit}"),
    }
}
