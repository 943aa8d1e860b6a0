//! Property tests for distance metrics.

use nori_vector::{DistanceMetric, VectorItem};
use proptest::prelude::*;

fn arb_vector(dim: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-100.0f64..100.0, dim)
}

fn arb_pair() -> impl Strategy<Value = (Vec<f64>, Vec<f64>)> {
    (1usize..32).prop_flat_map(|dim| (arb_vector(dim), arb_vector(dim)))
}

proptest! {
    #[test]
    fn prop_all_metrics_symmetric((a, b) in arb_pair()) {
        for metric in [DistanceMetric::L2, DistanceMetric::InnerProduct, DistanceMetric::Cosine] {
            let ab = metric.distance(&a, &b);
            let ba = metric.distance(&b, &a);
            prop_assert!((ab - ba).abs() <= 1e-9 * (1.0 + ab.abs()), "{:?}: {} vs {}", metric, ab, ba);
        }
    }

    #[test]
    fn prop_self_distance_is_zero(a in (1usize..32).prop_flat_map(arb_vector)) {
        prop_assert_eq!(DistanceMetric::L2.distance(&a, &a), 0.0);
        prop_assert_eq!(DistanceMetric::Cosine.distance(&a, &a), 0.0);
        let zero = vec![0.0; a.len()];
        prop_assert_eq!(DistanceMetric::Cosine.distance(&zero, &zero), 0.0);
    }

    #[test]
    fn prop_l2_and_cosine_non_negative((a, b) in arb_pair()) {
        prop_assert!(DistanceMetric::L2.distance(&a, &b) >= 0.0);
        let cos = DistanceMetric::Cosine.distance(&a, &b);
        prop_assert!((0.0..=2.0).contains(&cos));
    }

    #[test]
    fn prop_item_dimension_enforced(v in (1usize..16).prop_flat_map(arb_vector), extra in 1usize..4) {
        let dim = v.len();
        prop_assert!(VectorItem::new("k", v.clone(), dim).is_ok());
        prop_assert!(VectorItem::new("k", v, dim + extra).is_err());
    }
}
