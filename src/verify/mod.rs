//! SourceVerifier & TierPromoter (C3): cross-reference triples across
//! sources, promote tiers, and run the conflict escalation ladder
//! (spec §4.3). Grounded on rlm-core's `memory::store` promote/decay
//! tier-evolution operations, generalized from a hypergraph node's access
//! statistics to an SPO triple's provenance and axiom alignment.

use crate::axiom::{AxiomJudge, AxiomLibrary, JudgeInput};
use crate::capability::LanguageModel;
use crate::config::TierThresholds;
use crate::error::Result;
use crate::fact_store::{
    relative_divergence, ConflictKind, ConflictStatus, FactStore, ObjectValue, SpoTriple, Tier,
    TripleFingerprint,
};

const EMPIRICAL_VALIDATION_SOURCE: &str = "empirical-validation";
const NUMERICAL_MERGE_TOLERANCE: f64 = 0.05;

/// Scans the store for any other live triple sharing this triple's
/// (subject, predicate) with an incompatible object, and records a
/// `Conflict` for each (spec §3 invariant iv, §4.3).
pub async fn detect_conflicts(store: &FactStore, fingerprint: &TripleFingerprint) -> Result<Vec<TripleFingerprint>> {
    let triple = match store.get(fingerprint).await? {
        Some(t) => t,
        None => return Ok(Vec::new()),
    };
    let candidates = store
        .query(crate::fact_store::TripleQuery {
            subject: Some(triple.subject.clone()),
            predicate: Some(triple.predicate.clone()),
            ..Default::default()
        })
        .await?;

    let mut conflicting = Vec::new();
    for other in candidates {
        if other.fingerprint == *fingerprint {
            continue;
        }
        if objects_compatible(&triple.object, &other.object) {
            continue;
        }
        let kind = conflict_kind(&triple.object, &other.object);
        store.record_conflict(fingerprint, &other.fingerprint, kind).await?;
        conflicting.push(other.fingerprint);
    }
    Ok(conflicting)
}

/// Only exactly-equal numerics (same unit, same value) count as
/// compatible. A numeric pair within the merge tolerance but not equal is
/// still a conflict — it has to surface through `detect_conflicts` and
/// reach rung 1 of the escalation ladder so `resolve_conflict` can merge
/// it; treating it as silently compatible here would mean it's never
/// recorded as a conflict at all (spec §4.3 scenario 1).
fn objects_compatible(a: &ObjectValue, b: &ObjectValue) -> bool {
    match (a, b) {
        (ObjectValue::Literal(x), ObjectValue::Literal(y)) => x == y,
        (ObjectValue::Numeric { value: va, unit: ua }, ObjectValue::Numeric { value: vb, unit: ub }) => {
            ua == ub && va == vb
        }
        _ => false,
    }
}

fn conflict_kind(a: &ObjectValue, b: &ObjectValue) -> ConflictKind {
    match (a, b) {
        (ObjectValue::Numeric { .. }, ObjectValue::Numeric { .. }) => ConflictKind::NumericalMismatch,
        _ => ConflictKind::CategoricalDisagreement,
    }
}

/// Runs the three-rung conflict escalation ladder for a single conflicting
/// pair (spec §4.3). The core only records the ladder's current rung;
/// rung 3 ("awaiting arbitration") has no completion path here (spec §9).
pub async fn resolve_conflict(
    store: &FactStore,
    a_fp: &TripleFingerprint,
    b_fp: &TripleFingerprint,
    authority_source: Option<&str>,
) -> Result<ConflictStatus> {
    let a = store.get(a_fp).await?;
    let b = store.get(b_fp).await?;
    let (Some(a), Some(b)) = (a, b) else {
        return Ok(ConflictStatus::AwaitingArbitration);
    };

    // Rung 1: numerical auto-merge.
    if let (
        ObjectValue::Numeric { value: va, unit: ua },
        ObjectValue::Numeric { value: vb, unit: ub },
    ) = (&a.object, &b.object)
    {
        if ua == ub && relative_divergence(*va, *vb) <= NUMERICAL_MERGE_TOLERANCE {
            let total_weight = (a.provenance.len() + b.provenance.len()).max(1) as f64;
            let merged_value = (va * a.provenance.len() as f64 + vb * b.provenance.len() as f64) / total_weight;
            let mut provenance = a.provenance.clone();
            for source in &b.provenance {
                if !provenance.contains(source) {
                    provenance.push(source.clone());
                }
            }
            let merged_fp = TripleFingerprint::compute(
                &a.subject,
                &a.predicate,
                &format!("{merged_value}|{ua}"),
                provenance.first().map(|s| s.as_str()).unwrap_or(""),
            );
            let merged = SpoTriple {
                fingerprint: merged_fp,
                subject: a.subject.clone(),
                predicate: a.predicate.clone(),
                object: ObjectValue::Numeric {
                    value: merged_value,
                    unit: ua.clone(),
                },
                provenance,
                confidence: a.confidence.max(b.confidence),
                tier: a.tier.max(b.tier),
                created_at: a.created_at.min(b.created_at),
                superseded_by: None,
            };
            persist_merged(store, merged.clone()).await?;
            store.supersede(a_fp, &merged_fp).await?;
            store.supersede(b_fp, &merged_fp).await?;
            let status = ConflictStatus::AutoMerged { merged_into: merged_fp };
            store.update_conflict_status(a_fp, b_fp, status.clone()).await?;
            return Ok(status);
        }
    }

    // Rung 2: source-authority resolution.
    if let Some(authority) = authority_source {
        if a.provenance.iter().any(|s| s == authority) || b.provenance.iter().any(|s| s == authority) {
            let status = ConflictStatus::AuthorityResolved {
                authority_source: authority.to_string(),
            };
            store.update_conflict_status(a_fp, b_fp, status.clone()).await?;
            return Ok(status);
        }
    }

    // Rung 3: surfaced without deciding.
    let status = ConflictStatus::AwaitingArbitration;
    store.update_conflict_status(a_fp, b_fp, status.clone()).await?;
    Ok(status)
}

async fn persist_merged(store: &FactStore, merged: SpoTriple) -> Result<()> {
    // `merged` already carries its own fingerprint, its combined
    // provenance, and `a.tier.max(b.tier)` — `upsert_merged` stores it as
    // built rather than re-deriving any of that through `insert`'s
    // single-source, Bronze-by-default path.
    store.upsert_merged(merged).await?;
    Ok(())
}

/// Applies the Bronze→Silver and Silver→Gold promotion rules to a single
/// triple (spec §4.3). `consensus_score` is the external-experience
/// consensus input the Silver→Gold rule consults when no
/// empirical-validation source is present; the core does not compute this
/// score itself (it has no opinion on how a collaborator derives it).
pub async fn promote(
    store: &FactStore,
    library: &AxiomLibrary,
    model: &dyn LanguageModel,
    judge_temperature: f64,
    thresholds: &TierThresholds,
    fingerprint: &TripleFingerprint,
    consensus_score: f64,
) -> Result<Tier> {
    let triple = match store.get(fingerprint).await? {
        Some(t) => t,
        None => return Ok(Tier::Bronze),
    };
    if triple.tier == Tier::Gold {
        return Ok(Tier::Gold);
    }

    let conflicts = store.conflicts_touching(fingerprint).await?;
    let has_unresolved_conflict = conflicts
        .iter()
        .any(|c| matches!(c.status, ConflictStatus::Unresolved | ConflictStatus::AwaitingArbitration));

    if triple.tier == Tier::Bronze {
        if triple.independent_source_count() >= 2 && !has_unresolved_conflict {
            store.set_tier(fingerprint, Tier::Silver).await?;
        } else {
            return Ok(Tier::Bronze);
        }
    }

    // Re-fetch: may have just been promoted to Silver above.
    let triple = store.get(fingerprint).await?.unwrap();
    if triple.tier != Tier::Silver {
        return Ok(triple.tier);
    }

    let judge = AxiomJudge::new(library);
    let mut input = JudgeInput::text_only(format!("{} {} {}", triple.subject, triple.predicate, triple.object));
    if let ObjectValue::Numeric { value, .. } = &triple.object {
        input = input.with_numeric_field(triple.predicate.clone(), *value);
    }
    let axiom_score = judge.evaluate(&input, model, judge_temperature).await?;

    let has_empirical_validation = triple.provenance.iter().any(|s| s == EMPIRICAL_VALIDATION_SOURCE);
    let consensus_met = consensus_score >= thresholds.consensus;

    if axiom_score.has_no_violation() && (has_empirical_validation || consensus_met) {
        store.set_tier(fingerprint, Tier::Gold).await?;
        return Ok(Tier::Gold);
    }
    Ok(Tier::Silver)
}

/// Runs conflict detection then promotion for every triple accepted in a
/// single expansion batch — the pipeline `ToTManager` triggers after
/// inserting a winning variant's triples (spec §4.6 step 5).
pub async fn run_promotion_pipeline(
    store: &FactStore,
    library: &AxiomLibrary,
    model: &dyn LanguageModel,
    judge_temperature: f64,
    thresholds: &TierThresholds,
    authority_source: Option<&str>,
    consensus_score: f64,
    inserted: &[TripleFingerprint],
) -> Result<()> {
    for fingerprint in inserted {
        let conflicting = detect_conflicts(store, fingerprint).await?;
        for other in conflicting {
            resolve_conflict(store, fingerprint, &other, authority_source).await?;
        }
        promote(store, library, model, judge_temperature, thresholds, fingerprint, consensus_score).await?;
    }
    Ok(())
}
