// Snapshot comparison: normalize both sides, then diff
use crate::domain::diff::{Diff, DiffOptions, diff_values};
use crate::domain::record::{Normalizer, ResultSet};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotComparator {
    normalizer: Normalizer,
    options: DiffOptions,
}

impl SnapshotComparator {
    pub fn new(normalizer: Normalizer, options: DiffOptions) -> Self {
        Self {
            normalizer,
            options,
        }
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Differences of `current` relative to the `expected` baseline.
    pub fn compare(&self, current: &ResultSet, expected: &ResultSet) -> Diff {
        let current = self.normalizer.normalize_set(current);
        let expected = self.normalizer.normalize_set(expected);
        diff_values(&expected.to_value(), &current.to_value(), &self.options)
    }
}

pub fn compare_outputs(current: &ResultSet, expected: &ResultSet) -> Diff {
    SnapshotComparator::default().compare(current, expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn set(value: Value) -> ResultSet {
        ResultSet::from_value(value).unwrap()
    }

    #[test]
    fn test_compare_equal_after_normalization() {
        let current = set(json!([
            {"value": 1, "timestamp": "2025-08-24T19:00:00Z"},
            {"value": 2, "timestamp": "2025-08-24T19:01:00Z"},
        ]));
        let expected = set(json!([
            {"value": 2, "timestamp": "2025-08-24T19:02:00Z"},
            {"value": 1, "timestamp": "2025-08-24T19:03:00Z"},
        ]));

        assert!(compare_outputs(&current, &expected).is_empty());
    }

    #[test]
    fn test_compare_detects_value_change() {
        let current = set(json!([{"value": 1, "timestamp": "t0"}]));
        let expected = set(json!([{"value": 2, "timestamp": "t1"}]));

        let diff = compare_outputs(&current, &expected);

        assert!(!diff.is_empty());
        let change = &diff.values_changed["root[0]['value']"];
        assert_eq!(change.old_value, json!(2));
        assert_eq!(change.new_value, json!(1));
    }

    #[test]
    fn test_compare_empty_sets() {
        let diff = compare_outputs(&ResultSet::default(), &ResultSet::default());
        assert!(diff.is_empty());
        assert_eq!(diff.to_value(), json!({}));
    }

    #[test]
    fn test_compare_reports_added_field() {
        let current = set(json!([{"value": 1, "extra": "foo", "timestamp": "t0"}]));
        let expected = set(json!([{"value": 1, "timestamp": "t1"}]));

        let diff = compare_outputs(&current, &expected);

        assert_eq!(diff.dictionary_item_added, vec!["root[0]['extra']"]);
        assert!(diff.values_changed.is_empty());
    }

    #[test]
    fn test_emptiness_is_symmetric() {
        let a = set(json!([{"v": 1, "timestamp": 1}, {"v": 2}]));
        let b = set(json!([{"v": 2, "timestamp": 9}, {"v": 1}]));
        let c = set(json!([{"v": 3}]));

        assert!(compare_outputs(&a, &b).is_empty());
        assert!(compare_outputs(&b, &a).is_empty());
        assert!(!compare_outputs(&a, &c).is_empty());
        assert!(!compare_outputs(&c, &a).is_empty());
    }

    #[test]
    fn test_custom_volatile_fields_are_ignored() {
        let comparator = SnapshotComparator::new(
            Normalizer::with_fields(["timestamp", "scrapedAt"]),
            DiffOptions::default(),
        );
        let current = set(json!([{"v": 1, "scrapedAt": "x"}]));
        let expected = set(json!([{"v": 1, "scrapedAt": "y"}]));

        assert!(comparator.compare(&current, &expected).is_empty());
    }
}
