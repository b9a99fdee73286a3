// Grafana HTTP API client
use crate::application::monitoring_api::MonitoringApi;
use crate::domain::query::{QueryPayload, TimeRange};
use crate::error::{RegressionError, Result};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    ApiKey(String),
    Basic { username: String, password: String },
}

impl Credentials {
    /// Prefer the API key, fall back to username/password. Empty values count
    /// as missing.
    pub fn resolve(
        api_key: Option<String>,
        username: Option<String>,
        password: Option<String>,
    ) -> Result<Self> {
        let present = |v: Option<String>| v.filter(|s| !s.is_empty());
        match (present(api_key), present(username), present(password)) {
            (Some(key), _, _) => Ok(Credentials::ApiKey(key)),
            (None, Some(username), Some(password)) => Ok(Credentials::Basic { username, password }),
            _ => Err(RegressionError::MissingCredentials),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::ApiKey(_) => f.write_str("ApiKey(***)"),
            Credentials::Basic { username, .. } => write!(f, "Basic({}:***)", username),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GrafanaClient {
    base_url: String,
    credentials: Credentials,
    time_range: TimeRange,
    http: Client,
}

impl GrafanaClient {
    pub fn new(base_url: &str, credentials: Credentials, timeout: Duration) -> Result<Self> {
        match &credentials {
            Credentials::ApiKey(_) => tracing::info!("Using API key authentication"),
            Credentials::Basic { .. } => {
                tracing::info!("Using basic authentication with username/password")
            }
        }

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(RegressionError::Client)?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            time_range: TimeRange::default(),
            http,
        })
    }

    pub fn with_time_range(mut self, time_range: TimeRange) -> Self {
        self.time_range = time_range;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header("Content-Type", "application/json");
        match &self.credentials {
            Credentials::ApiKey(key) => request.bearer_auth(key),
            Credentials::Basic { username, password } => request.basic_auth(username, Some(password)),
        }
    }

    fn execute(&self, method: &'static str, url: &str, request: RequestBuilder) -> Result<Value> {
        let response = self
            .authorize(request)
            .send()
            .map_err(|source| RegressionError::Transport {
                url: url.to_string(),
                source,
            })?;

        let response = check_status(method, url, response)?;
        response.json::<Value>().map_err(|source| RegressionError::Transport {
            url: url.to_string(),
            source,
        })
    }
}

fn check_status(method: &'static str, url: &str, response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().unwrap_or_default();
    Err(RegressionError::Status {
        method,
        url: url.to_string(),
        status,
        body,
    })
}

impl MonitoringApi for GrafanaClient {
    fn get_dashboard(&self, uid: &str) -> Result<Value> {
        let url = format!("{}/api/dashboards/uid/{}", self.base_url, urlencoding::encode(uid));
        tracing::debug!("GET {}", url);

        let dashboard = self.execute("GET", &url, self.http.get(&url))?;
        tracing::info!("Dashboard {} retrieved", uid);
        Ok(dashboard)
    }

    fn query_panel(&self, datasource_uid: &str, targets: &[Value]) -> Result<Value> {
        let url = format!("{}/api/ds/query", self.base_url);
        let payload = QueryPayload::new(datasource_uid, targets, &self.time_range);
        tracing::debug!("POST {} with payload: {:?}", url, payload);

        let result = self.execute("POST", &url, self.http.post(&url).json(&payload))?;
        tracing::info!("Query executed for datasource {}", datasource_uid);
        Ok(result)
    }
}
