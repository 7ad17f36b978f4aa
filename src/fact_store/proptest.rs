//! Property-based tests for `TripleFingerprint` and numerical-divergence
//! determinism (spec §8 "Fingerprint uniqueness", "a numeric triple with
//! 4.9% divergence auto-merges, with 5.1% it creates a conflict").
//! Grounded on rlm-core's `epistemic::proptest` module.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::fact_store::normalize::relative_divergence;
    use crate::fact_store::types::TripleFingerprint;

    fn ident() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9]{1,12}".prop_map(|s| s)
    }

    proptest! {
        /// The same four fields always hash to the same fingerprint,
        /// regardless of how many times it is recomputed.
        #[test]
        fn fingerprint_is_deterministic_for_any_input(
            subject in ident(),
            predicate in ident(),
            object in ident(),
            source in ident(),
        ) {
            let a = TripleFingerprint::compute(&subject, &predicate, &object, &source);
            let b = TripleFingerprint::compute(&subject, &predicate, &object, &source);
            prop_assert_eq!(a, b);
        }

        /// Changing any single field changes the fingerprint (collision
        /// freedom is not provable, but a single differing byte in any
        /// of the four fields must never coincidentally collide across
        /// this generated sample).
        #[test]
        fn fingerprint_differs_when_object_differs(
            subject in ident(),
            predicate in ident(),
            object in ident(),
            other_object in ident(),
            source in ident(),
        ) {
            prop_assume!(object != other_object);
            let a = TripleFingerprint::compute(&subject, &predicate, &object, &source);
            let b = TripleFingerprint::compute(&subject, &predicate, &other_object, &source);
            prop_assert_ne!(a, b);
        }

        /// Relative divergence is symmetric and non-negative for any pair
        /// of finite values, and zero for a value against itself.
        #[test]
        fn relative_divergence_is_symmetric_and_nonnegative(
            a in -1_000_000.0f64..1_000_000.0f64,
            b in -1_000_000.0f64..1_000_000.0f64,
        ) {
            let forward = relative_divergence(a, b);
            let backward = relative_divergence(b, a);
            prop_assert!(forward >= 0.0);
            prop_assert!((forward - backward).abs() < 1e-9);
            prop_assert!(relative_divergence(a, a) <= 1e-12);
        }
    }
}
