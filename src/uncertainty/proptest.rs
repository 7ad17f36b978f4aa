//! Property-based test for the uncertainty weight-scaling law (spec §8:
//! "scaling every weight by k scales the uncertainty score by k"). Grounded
//! on rlm-core's `epistemic::proptest` module's style of generating
//! bounded floats and asserting an algebraic invariant over them.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use std::sync::Arc;

    use crate::config::UncertaintyWeights;
    use crate::fact_store::InMemoryFactPersistence;
    use crate::fact_store::FactStore;
    use crate::tot::ToTNode;
    use crate::uncertainty::UncertaintyEvaluator;

    fn weight() -> impl Strategy<Value = f64> {
        0.0f64..5.0f64
    }

    fn scale_factor() -> impl Strategy<Value = f64> {
        prop_oneof![Just(0.0), Just(1.0), Just(2.0), 0.1f64..10.0f64]
    }

    fn node_with(coverage: f64, axiom_alignment: f64) -> ToTNode {
        let mut node = ToTNode::root("does solar pay for itself?");
        node.coverage = coverage;
        node.axiom_alignment = axiom_alignment;
        node
    }

    proptest! {
        /// For any base set of weights and any non-negative scale factor k,
        /// evaluating with `k * weights` yields exactly `k * base_score`,
        /// since the score is a weighted linear sum of fixed components for
        /// a fixed node (no conflicts or confidence samples involved here,
        /// so conflicts and confidence_variance are both held at zero).
        #[test]
        fn scaling_weights_by_k_scales_the_score_by_k(
            conflicts in weight(),
            confidence_variance in weight(),
            coverage_gap in weight(),
            axiom_gap in weight(),
            coverage in 0.0f64..1.0f64,
            axiom_alignment in 0.0f64..1.0f64,
            k in scale_factor(),
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let store = FactStore::new(Arc::new(InMemoryFactPersistence::new()));
            let node = node_with(coverage, axiom_alignment);

            let base_weights = UncertaintyWeights {
                conflicts,
                confidence_variance,
                coverage_gap,
                axiom_gap,
            };
            let scaled_weights = UncertaintyWeights {
                conflicts: conflicts * k,
                confidence_variance: confidence_variance * k,
                coverage_gap: coverage_gap * k,
                axiom_gap: axiom_gap * k,
            };

            let base = rt
                .block_on(UncertaintyEvaluator::new(base_weights).evaluate(&store, &node))
                .unwrap();
            let scaled = rt
                .block_on(UncertaintyEvaluator::new(scaled_weights).evaluate(&store, &node))
                .unwrap();

            prop_assert!((scaled.score - k * base.score).abs() < 1e-6);
        }
    }
}
