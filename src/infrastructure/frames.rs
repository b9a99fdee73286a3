// Mapper from /api/ds/query data frames to flat result records
use crate::domain::record::{Record, ResultSet, kind_of};
use crate::error::{RegressionError, Result};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Flatten a query response into one record per frame row.
///
/// The first `time` field of a frame becomes `timestamp`, every other field is
/// keyed by its display name. Keys are unique within a record: a name that is
/// already taken, including the `refId` and `frame` keys added here, gets a
/// ` #2`, ` #3`, ... suffix. A response that already is a JSON array is taken
/// as a result set as-is.
pub fn result_set_from_response(response: &Value) -> Result<ResultSet> {
    if response.is_array() {
        return ResultSet::from_value(response.clone());
    }

    let results = response
        .get("results")
        .and_then(Value::as_object)
        .ok_or(RegressionError::NotAResultSet(kind_of(response)))?;

    let mut records = Vec::new();
    for (ref_id, result) in results {
        if let Some(message) = result.get("error").and_then(Value::as_str) {
            return Err(RegressionError::QueryFailed {
                ref_id: ref_id.clone(),
                message: message.to_string(),
            });
        }

        let frames = result.get("frames").and_then(Value::as_array);
        for frame in frames.into_iter().flatten() {
            records.extend(frame_records(ref_id, frame));
        }
    }

    tracing::debug!("Flattened query response into {} records", records.len());
    Ok(ResultSet::new(records))
}

fn frame_records(ref_id: &str, frame: &Value) -> Vec<Record> {
    let schema = frame.get("schema");
    let frame_name = schema
        .and_then(|s| s.get("name"))
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty());
    let fields = schema
        .and_then(|s| s.get("fields"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let columns = frame
        .get("data")
        .and_then(|d| d.get("values"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let time_column = fields
        .iter()
        .position(|field| field.get("type").and_then(Value::as_str) == Some("time"));

    let mut taken: HashSet<String> = HashSet::from(["refId".to_string()]);
    if frame_name.is_some() {
        taken.insert("frame".to_string());
    }
    if time_column.is_some() {
        taken.insert("timestamp".to_string());
    }

    let keys: Vec<String> = fields
        .iter()
        .enumerate()
        .map(|(column, field)| {
            if Some(column) == time_column {
                "timestamp".to_string()
            } else {
                unique_key(display_name(field), &mut taken)
            }
        })
        .collect();

    let row_count = columns
        .iter()
        .filter_map(Value::as_array)
        .map(Vec::len)
        .max()
        .unwrap_or(0);

    (0..row_count)
        .map(|row| {
            let mut record = Record::new();
            record.insert("refId".to_string(), Value::String(ref_id.to_string()));
            if let Some(name) = frame_name {
                record.insert("frame".to_string(), Value::String(name.to_string()));
            }
            for (column, key) in keys.iter().enumerate() {
                let value = columns
                    .get(column)
                    .and_then(|c| c.get(row))
                    .cloned()
                    .unwrap_or(Value::Null);
                record.insert(key.clone(), value);
            }
            record
        })
        .collect()
}

fn unique_key(name: String, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.clone()) {
        return name;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{} #{}", name, n);
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

fn display_name(field: &Value) -> String {
    let name = field
        .get("config")
        .and_then(|c| c.get("displayNameFromDS"))
        .or_else(|| field.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("value");

    let labels: BTreeMap<&str, &str> = field
        .get("labels")
        .and_then(Value::as_object)
        .map(|labels| {
            labels
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.as_str(), v)))
                .collect()
        })
        .unwrap_or_default();

    if labels.is_empty() {
        return name.to_string();
    }

    let rendered: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, v))
        .collect();
    format!("{}{{{}}}", name, rendered.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_frames_are_flattened_to_rows() {
        let response = json!({
            "results": {
                "A": {
                    "status": 200,
                    "frames": [{
                        "schema": {
                            "name": "up",
                            "refId": "A",
                            "fields": [
                                {"name": "Time", "type": "time"},
                                {"name": "Value", "type": "number", "labels": {"job": "api", "instance": "a:9090"}}
                            ]
                        },
                        "data": {"values": [[1000, 2000], [1, 0]]}
                    }]
                }
            }
        });

        let set = result_set_from_response(&response).unwrap();

        assert_eq!(
            set.to_value(),
            json!([
                {"refId": "A", "frame": "up", "timestamp": 1000, "Value{instance=\"a:9090\", job=\"api\"}": 1},
                {"refId": "A", "frame": "up", "timestamp": 2000, "Value{instance=\"a:9090\", job=\"api\"}": 0},
            ])
        );
    }

    #[test]
    fn test_ragged_columns_fill_with_null() {
        let response = json!({
            "results": {
                "B": {"frames": [{
                    "schema": {"fields": [{"name": "host", "type": "string"}, {"name": "load", "type": "number"}]},
                    "data": {"values": [["a", "b"], [0.5]]}
                }]}
            }
        });

        let set = result_set_from_response(&response).unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set.records()[1]["load"], Value::Null);
        assert!(set.records()[0].get("frame").is_none());
    }

    #[test]
    fn test_display_name_from_datasource_wins() {
        let field = json!({"name": "Value", "config": {"displayNameFromDS": "requests"}});
        assert_eq!(display_name(&field), "requests");
    }

    #[test]
    fn test_array_response_is_taken_as_is() {
        let set = result_set_from_response(&json!([{"value": 1}])).unwrap();
        assert_eq!(set.to_value(), json!([{"value": 1}]));
    }

    #[test]
    fn test_query_error_is_reported() {
        let response = json!({"results": {"A": {"error": "parse error at char 3", "status": 400}}});
        let err = result_set_from_response(&response).unwrap_err();
        assert!(matches!(err, RegressionError::QueryFailed { ref ref_id, .. } if ref_id == "A"));
    }

    #[test]
    fn test_results_without_frames_are_empty() {
        let set = result_set_from_response(&json!({"results": {"A": {"data": []}}})).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_unexpected_shape_is_rejected() {
        let err = result_set_from_response(&json!("nope")).unwrap_err();
        assert!(matches!(err, RegressionError::NotAResultSet("string")));
    }

    fn frame(fields: Value, values: Value) -> Value {
        json!({"results": {"A": {"frames": [{"schema": {"fields": fields}, "data": {"values": values}}]}}})
    }

    #[test]
    fn test_repeated_field_names_get_suffixes() {
        let fields = json!([
            {"name": "Time", "type": "time"},
            {"name": "Value", "type": "number"},
            {"name": "Value", "type": "number"},
            {"name": "Value", "type": "number"}
        ]);

        let set = result_set_from_response(&frame(fields, json!([[1], ["a"], [5], [6]]))).unwrap();

        assert_eq!(
            set.to_value(),
            json!([{"refId": "A", "timestamp": 1, "Value": "a", "Value #2": 5, "Value #3": 6}])
        );
    }

    #[test]
    fn test_change_in_repeated_column_is_reported() {
        let fields = json!([
            {"name": "Time", "type": "time"},
            {"name": "Value", "type": "number"},
            {"name": "Value", "type": "number"}
        ]);
        let current = result_set_from_response(&frame(fields.clone(), json!([[1], [7], [5]]))).unwrap();
        let expected = result_set_from_response(&frame(fields, json!([[2], [8], [5]]))).unwrap();

        let diff = crate::domain::snapshot::compare_outputs(&current, &expected);

        assert!(diff.values_changed.contains_key("root[0]['Value']"));
    }

    #[test]
    fn test_data_fields_cannot_shadow_added_keys() {
        let fields = json!([
            {"name": "refId", "type": "string"},
            {"name": "timestamp", "type": "string"},
            {"name": "Time", "type": "time"},
            {"name": "v", "type": "number"}
        ]);

        let set = result_set_from_response(&frame(fields, json!([["host-a"], ["t"], [10], [1]]))).unwrap();

        assert_eq!(
            set.to_value(),
            json!([{"refId": "A", "refId #2": "host-a", "timestamp #2": "t", "timestamp": 10, "v": 1}])
        );
    }
}
