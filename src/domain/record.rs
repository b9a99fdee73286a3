// Result records and output normalization
use crate::error::{RegressionError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One row or point of query output.
pub type Record = Map<String, Value>;

/// Fields that differ between otherwise identical fetches.
pub const DEFAULT_VOLATILE_FIELDS: &[&str] = &["timestamp"];

/// Ordered sequence of result records. Comparison treats it as a multiset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSet(Vec<Record>);

impl ResultSet {
    pub fn new(records: Vec<Record>) -> Self {
        Self(records)
    }

    /// Build a result set from a JSON array, rejecting non-object entries.
    pub fn from_value(value: Value) -> Result<Self> {
        let items = match value {
            Value::Array(items) => items,
            other => return Err(RegressionError::NotAResultSet(kind_of(&other))),
        };

        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Object(record) => Ok(record),
                other => Err(RegressionError::InvalidRecord {
                    index,
                    found: kind_of(&other),
                }),
            })
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }

    pub fn records(&self) -> &[Record] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_records(self) -> Vec<Record> {
        self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Array(self.0.iter().cloned().map(Value::Object).collect())
    }
}

impl From<Vec<Record>> for ResultSet {
    fn from(records: Vec<Record>) -> Self {
        Self(records)
    }
}

/// Strips volatile fields from the top level of each record.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalizer {
    volatile_fields: Vec<String>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::with_fields(DEFAULT_VOLATILE_FIELDS.iter().copied())
    }
}

impl Normalizer {
    pub fn with_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            volatile_fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn volatile_fields(&self) -> &[String] {
        &self.volatile_fields
    }

    pub fn normalize_record(&self, record: &Record) -> Record {
        record
            .iter()
            .filter(|(key, _)| !self.volatile_fields.iter().any(|field| field == *key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn normalize(&self, records: &[Record]) -> Vec<Record> {
        records.iter().map(|r| self.normalize_record(r)).collect()
    }

    pub fn normalize_set(&self, set: &ResultSet) -> ResultSet {
        ResultSet(self.normalize(set.records()))
    }
}

/// Remove the default volatile fields from every record.
pub fn normalize(records: &[Record]) -> Vec<Record> {
    Normalizer::default().normalize(records)
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
