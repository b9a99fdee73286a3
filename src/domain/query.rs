// Query request construction for /api/ds/query
use serde::Serialize;
use serde_json::Value;

pub const DEFAULT_QUERY_TYPE: &str = "prometheus";
pub const DEFAULT_REF_ID: &str = "A";
pub const DEFAULT_FORMAT: &str = "time_series";
pub const INTERVAL_MS: u64 = 60_000;
pub const MAX_DATA_POINTS: u64 = 500;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasourceRef {
    pub uid: String,
}

/// One entry of the `queries` array, derived from a panel target.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub datasource: DatasourceRef,
    pub ref_id: String,
    pub interval_ms: u64,
    pub max_data_points: u64,
    pub format: String,
    pub target: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_field: Option<String>,
}

/// Body posted to the query endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryPayload {
    pub queries: Vec<QueryRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeRange {
    pub from: Option<String>,
    pub to: Option<String>,
}

impl QueryPayload {
    pub fn new(datasource_uid: &str, targets: &[Value], range: &TimeRange) -> Self {
        Self {
            queries: build_queries(datasource_uid, targets),
            from: range.from.clone(),
            to: range.to.clone(),
        }
    }
}

/// Build one request per target, in target order.
pub fn build_queries(datasource_uid: &str, targets: &[Value]) -> Vec<QueryRequest> {
    targets
        .iter()
        .map(|target| build_query(datasource_uid, target))
        .collect()
}

fn build_query(datasource_uid: &str, target: &Value) -> QueryRequest {
    let query_type = target
        .get("datasource")
        .and_then(|ds| ds.get("type"))
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_QUERY_TYPE);

    let mut request = QueryRequest {
        datasource: DatasourceRef {
            uid: datasource_uid.to_string(),
        },
        ref_id: string_field(target, "refId").unwrap_or(DEFAULT_REF_ID).to_string(),
        interval_ms: INTERVAL_MS,
        max_data_points: MAX_DATA_POINTS,
        format: string_field(target, "format").unwrap_or(DEFAULT_FORMAT).to_string(),
        target: target.clone(),
        query_type: None,
        time_field: None,
    };

    match query_type {
        "elasticsearch" => {
            request.query_type = Some("lucene".to_string());
            request.time_field = Some("@timestamp".to_string());
        }
        // influxql or flux
        "influxdb" => {
            request.query_type =
                Some(string_field(target, "queryType").unwrap_or("influxql").to_string());
        }
        _ => {}
    }

    request
}

fn string_field<'a>(target: &'a Value, key: &str) -> Option<&'a str> {
    target.get(key).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_elasticsearch_target() {
        let targets = vec![json!({"refId": "A", "datasource": {"type": "elasticsearch"}})];

        let queries = build_queries("ds1", &targets);

        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].datasource.uid, "ds1");
        assert_eq!(queries[0].query_type.as_deref(), Some("lucene"));
        assert_eq!(queries[0].time_field.as_deref(), Some("@timestamp"));
    }

    #[test]
    fn test_defaults_without_datasource() {
        let targets = vec![json!({"expr": "up"})];

        let query = &build_queries("ds1", &targets)[0];

        assert_eq!(query.ref_id, "A");
        assert_eq!(query.format, "time_series");
        assert_eq!(query.query_type, None);
        assert_eq!(query.time_field, None);
        assert_eq!(
            serde_json::to_value(query).unwrap(),
            json!({
                "datasource": {"uid": "ds1"},
                "refId": "A",
                "intervalMs": 60000,
                "maxDataPoints": 500,
                "format": "time_series",
                "target": {"expr": "up"},
            })
        );
    }

    #[test]
    fn test_influxdb_query_type() {
        let targets = vec![
            json!({"refId": "A", "datasource": {"type": "influxdb"}}),
            json!({"refId": "B", "datasource": {"type": "influxdb"}, "queryType": "flux"}),
        ];

        let queries = build_queries("influx", &targets);

        assert_eq!(queries[0].query_type.as_deref(), Some("influxql"));
        assert_eq!(queries[1].query_type.as_deref(), Some("flux"));
        assert_eq!(queries[1].time_field, None);
    }

    #[test]
    fn test_order_and_unknown_fields_preserved() {
        let targets = vec![
            json!({"refId": "B", "format": "table", "custom": {"deep": [1, 2]}}),
            json!({"refId": "A", "datasource": {"type": "prometheus", "uid": "p"}}),
            json!({"refId": "C", "datasource": "legacy-name"}),
        ];

        let queries = build_queries("ds", &targets);

        let ids: Vec<&str> = queries.iter().map(|q| q.ref_id.as_str()).collect();
        assert_eq!(ids, vec!["B", "A", "C"]);
        assert_eq!(queries[0].format, "table");
        assert_eq!(queries[0].target, targets[0]);
        assert_eq!(queries[2].query_type, None);
    }

    #[test]
    fn test_payload_time_range() {
        let targets = vec![json!({"refId": "A"})];
        let range = TimeRange {
            from: Some("now-1h".to_string()),
            to: Some("now".to_string()),
        };

        let with_range = serde_json::to_value(QueryPayload::new("ds", &targets, &range)).unwrap();
        let without = serde_json::to_value(QueryPayload::new("ds", &targets, &TimeRange::default())).unwrap();

        assert_eq!(with_range["from"], json!("now-1h"));
        assert_eq!(with_range["to"], json!("now"));
        assert!(without.get("from").is_none());
        assert_eq!(without["queries"].as_array().map(Vec::len), Some(1));
    }
}
