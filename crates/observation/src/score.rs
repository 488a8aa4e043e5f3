//! Overall performance score

use std::collections::HashMap;

/// Weight of the best possible behavior
pub const MAX_BEHAVIOR_WEIGHT: f64 = 20.0;

/// `sum(weight) / (count * 20) * 100` over the recorded behavior labels.
///
/// Labels missing from the weight table count with weight 0. No labels
/// scores 0. The result is not clamped.
pub fn performance_score<'a, I>(labels: I, weights: &HashMap<String, f64>) -> f64
where
    I: IntoIterator<Item = &'a str>,
{
    let (total, count) = labels.into_iter().fold((0.0, 0usize), |(total, count), label| {
        (total + weights.get(label).copied().unwrap_or(0.0), count + 1)
    });

    if count == 0 {
        return 0.0;
    }
    total / (count as f64 * MAX_BEHAVIOR_WEIGHT) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn weights() -> HashMap<String, f64> {
        HashMap::from([
            ("A".to_string(), 10.0),
            ("B".to_string(), 30.0),
            ("attentive".to_string(), 20.0),
        ])
    }

    #[test]
    fn test_weighted_example() {
        assert_eq!(performance_score(["A", "B"], &weights()), 100.0);
    }

    #[test]
    fn test_no_observations() {
        assert_eq!(performance_score(std::iter::empty::<&str>(), &weights()), 0.0);
    }

    #[test]
    fn test_unknown_labels_weigh_zero() {
        assert_eq!(performance_score(["attentive", "unknown"], &weights()), 50.0);
    }

    #[test]
    fn test_not_clamped() {
        assert_eq!(performance_score(["B"], &weights()), 150.0);
    }

    proptest! {
        #[test]
        fn bounded_weights_give_bounded_score(ws in prop::collection::vec(0.0f64..=20.0, 1..50)) {
            let labels: Vec<String> = (0..ws.len()).map(|i| format!("b{}", i)).collect();
            let table: HashMap<String, f64> = labels.iter().cloned().zip(ws).collect();
            let score = performance_score(labels.iter().map(String::as_str), &table);
            prop_assert!((0.0..=100.0 + 1e-9).contains(&score));
        }
    }
}
