// Structural diff over JSON-like values
//
// Paths use the `root[0]['key']` notation. Lists are compared as multisets
// unless their field path is listed in `DiffOptions::ordered_fields`.
use crate::domain::record::kind_of;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub const DEFAULT_CUTOFF_DISTANCE_FOR_PAIRS: f64 = 0.3;

#[derive(Debug, Clone, PartialEq)]
pub struct DiffOptions {
    /// Compare lists as multisets.
    pub ignore_order: bool,
    /// Field paths (object keys joined by `.`, list indices skipped) whose
    /// lists are compared position by position even when `ignore_order` is set.
    pub ordered_fields: BTreeSet<String>,
    /// Leftover list elements closer than this are reported as a change
    /// instead of an add/remove pair.
    pub cutoff_distance_for_pairs: f64,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            ignore_order: true,
            ordered_fields: BTreeSet::new(),
            cutoff_distance_for_pairs: DEFAULT_CUTOFF_DISTANCE_FOR_PAIRS,
        }
    }
}

impl DiffOptions {
    pub fn ordered<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ordered_fields.extend(fields.into_iter().map(Into::into));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueChange {
    pub old_value: Value,
    pub new_value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeChange {
    pub old_type: &'static str,
    pub new_type: &'static str,
    pub old_value: Value,
    pub new_value: Value,
}

/// Differences between an old (expected) and a new (current) value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diff {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dictionary_item_added: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dictionary_item_removed: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub values_changed: BTreeMap<String, ValueChange>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub type_changes: BTreeMap<String, TypeChange>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub iterable_item_added: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub iterable_item_removed: BTreeMap<String, Value>,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of reported differences.
    pub fn len(&self) -> usize {
        self.dictionary_item_added.len()
            + self.dictionary_item_removed.len()
            + self.values_changed.len()
            + self.type_changes.len()
            + self.iterable_item_added.len()
            + self.iterable_item_removed.len()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl fmt::Display for Diff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string_pretty(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{:?}", self),
        }
    }
}

/// Diff `old` against `new`.
pub fn diff_values(old: &Value, new: &Value, options: &DiffOptions) -> Diff {
    let mut differ = Differ {
        options,
        path: Vec::new(),
        diff: Diff::default(),
    };
    differ.compare(old, new);
    differ.diff
}

#[derive(Debug, Clone)]
enum Segment {
    Key(String),
    Index(usize),
}

struct Differ<'a> {
    options: &'a DiffOptions,
    path: Vec<Segment>,
    diff: Diff,
}

impl Differ<'_> {
    fn compare(&mut self, old: &Value, new: &Value) {
        if old == new {
            return;
        }

        match (old, new) {
            (Value::Object(old_map), Value::Object(new_map)) => {
                for (key, old_value) in old_map {
                    match new_map.get(key) {
                        Some(new_value) => {
                            self.path.push(Segment::Key(key.clone()));
                            self.compare(old_value, new_value);
                            self.path.pop();
                        }
                        None => {
                            let path = self.render_with(Segment::Key(key.clone()));
                            self.diff.dictionary_item_removed.push(path);
                        }
                    }
                }
                for key in new_map.keys().filter(|k| !old_map.contains_key(*k)) {
                    let path = self.render_with(Segment::Key(key.clone()));
                    self.diff.dictionary_item_added.push(path);
                }
            }
            (Value::Array(old_items), Value::Array(new_items)) => {
                if self.is_ordered() {
                    self.compare_ordered(old_items, new_items);
                } else {
                    self.compare_unordered(old_items, new_items);
                }
            }
            _ if kind_of(old) == kind_of(new) => {
                self.diff.values_changed.insert(
                    self.render(),
                    ValueChange {
                        old_value: old.clone(),
                        new_value: new.clone(),
                    },
                );
            }
            _ => {
                self.diff.type_changes.insert(
                    self.render(),
                    TypeChange {
                        old_type: kind_of(old),
                        new_type: kind_of(new),
                        old_value: old.clone(),
                        new_value: new.clone(),
                    },
                );
            }
        }
    }

    fn compare_ordered(&mut self, old_items: &[Value], new_items: &[Value]) {
        let shared = old_items.len().min(new_items.len());
        for index in 0..shared {
            self.path.push(Segment::Index(index));
            self.compare(&old_items[index], &new_items[index]);
            self.path.pop();
        }
        for (index, item) in old_items.iter().enumerate().skip(shared) {
            let path = self.render_with(Segment::Index(index));
            self.diff.iterable_item_removed.insert(path, item.clone());
        }
        for (index, item) in new_items.iter().enumerate().skip(shared) {
            let path = self.render_with(Segment::Index(index));
            self.diff.iterable_item_added.insert(path, item.clone());
        }
    }

    fn compare_unordered(&mut self, old_items: &[Value], new_items: &[Value]) {
        let mut taken = vec![false; new_items.len()];
        let mut removed = Vec::new();

        for (old_index, item) in old_items.iter().enumerate() {
            let matched = new_items
                .iter()
                .enumerate()
                .position(|(new_index, candidate)| !taken[new_index] && candidate == item);
            match matched {
                Some(new_index) => taken[new_index] = true,
                None => removed.push(old_index),
            }
        }

        let added: Vec<usize> = (0..new_items.len()).filter(|i| !taken[*i]).collect();
        let pairs = self.pair_leftovers(old_items, &removed, new_items, &added);

        let mut paired_old = BTreeSet::new();
        let mut paired_new = BTreeSet::new();
        for (old_index, new_index) in pairs {
            paired_old.insert(old_index);
            paired_new.insert(new_index);
            self.path.push(Segment::Index(new_index));
            self.compare(&old_items[old_index], &new_items[new_index]);
            self.path.pop();
        }

        for old_index in removed.into_iter().filter(|i| !paired_old.contains(i)) {
            let path = self.render_with(Segment::Index(old_index));
            self.diff
                .iterable_item_removed
                .insert(path, old_items[old_index].clone());
        }
        for new_index in added.into_iter().filter(|i| !paired_new.contains(i)) {
            let path = self.render_with(Segment::Index(new_index));
            self.diff
                .iterable_item_added
                .insert(path, new_items[new_index].clone());
        }
    }

    /// Match leftover elements that are close enough to be the same item
    /// with some fields changed. Closest pairs are taken first.
    fn pair_leftovers(
        &self,
        old_items: &[Value],
        removed: &[usize],
        new_items: &[Value],
        added: &[usize],
    ) -> Vec<(usize, usize)> {
        if removed.len() == 1 && added.len() == 1 {
            return vec![(removed[0], added[0])];
        }

        let mut candidates = Vec::new();
        for &old_index in removed {
            for &new_index in added {
                let distance = self.distance(&old_items[old_index], &new_items[new_index]);
                if distance < self.options.cutoff_distance_for_pairs {
                    candidates.push((distance, old_index, new_index));
                }
            }
        }
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

        let mut used_old = BTreeSet::new();
        let mut used_new = BTreeSet::new();
        let mut pairs = Vec::new();
        for (_, old_index, new_index) in candidates {
            if used_old.contains(&old_index) || used_new.contains(&new_index) {
                continue;
            }
            used_old.insert(old_index);
            used_new.insert(new_index);
            pairs.push((old_index, new_index));
        }
        pairs
    }

    fn distance(&self, old: &Value, new: &Value) -> f64 {
        if kind_of(old) != kind_of(new) {
            return 1.0;
        }
        let changes = diff_values(old, new, self.options).len();
        let size = leaf_count(old) + leaf_count(new);
        changes as f64 / size.max(1) as f64
    }

    fn is_ordered(&self) -> bool {
        !self.options.ignore_order || self.options.ordered_fields.contains(&self.field_path())
    }

    fn field_path(&self) -> String {
        self.path
            .iter()
            .filter_map(|segment| match segment {
                Segment::Key(key) => Some(key.as_str()),
                Segment::Index(_) => None,
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    fn render(&self) -> String {
        render_path(&self.path)
    }

    fn render_with(&mut self, segment: Segment) -> String {
        self.path.push(segment);
        let rendered = self.render();
        self.path.pop();
        rendered
    }
}

fn render_path(path: &[Segment]) -> String {
    let mut rendered = String::from("root");
    for segment in path {
        match segment {
            Segment::Key(key) => {
                rendered.push_str("['");
                rendered.push_str(key);
                rendered.push_str("']");
            }
            Segment::Index(index) => {
                rendered.push('[');
                rendered.push_str(&index.to_string());
                rendered.push(']');
            }
        }
    }
    rendered
}

fn leaf_count(value: &Value) -> usize {
    match value {
        Value::Object(map) => map.values().map(leaf_count).sum::<usize>().max(1),
        Value::Array(items) => items.iter().map(leaf_count).sum::<usize>().max(1),
        _ => 1,
    }
}
