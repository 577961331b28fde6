//! Authenticated HTTP client for the Prisma Cloud API.
//!
//! The handle is immutable once built: the transport, base URL and session
//! token never change, so it can be shared read-only across concurrent queries.

use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{Credentials, ValidatedConfig};
use crate::error::{ClientError, Result};

/// Header carrying the session token on every request.
pub const AUTH_HEADER: &str = "x-redlock-auth";

const INITIAL_BACKOFF: Duration = Duration::from_millis(250);

/// One outbound API call: method, path segments, query pairs and optional JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: Vec<String>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new<S: AsRef<str>>(method: Method, path: &[S]) -> Self {
        Self {
            method,
            path: path.iter().map(|s| s.as_ref().to_string()).collect(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get<S: AsRef<str>>(path: &[S]) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post<S: AsRef<str>>(path: &[S]) -> Self {
        Self::new(Method::POST, path)
    }

    /// Append one query parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Append a list of query parameters, preserving their order.
    pub fn params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Short `METHOD /a/b` label for logs.
    pub fn label(&self) -> String {
        format!("{} /{}", self.method, self.path.join("/"))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    customer_name: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: Option<String>,
}

/// A live, authenticated handle to the Prisma Cloud API.
#[derive(Debug)]
pub struct PrismaClient {
    http: reqwest::Client,
    base: Url,
    token: String,
    config: ValidatedConfig,
}

impl PrismaClient {
    /// Build the transport and authenticate.
    ///
    /// Token credentials are used as-is; username/password credentials are
    /// exchanged for a session token through `POST /login`.
    pub async fn connect(config: ValidatedConfig) -> Result<Self> {
        let base = Url::parse(&config.endpoint()).map_err(|e| {
            ClientError::Configuration(format!("invalid url '{}': {}", config.endpoint(), e))
        })?;
        if base.cannot_be_a_base() {
            return Err(ClientError::Configuration(format!(
                "invalid url '{}'",
                config.endpoint()
            )));
        }

        if config.skip_ssl_cert_verification {
            warn!(
                "TLS certificate verification is disabled for {}",
                config.endpoint()
            );
        }

        let mut builder = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.skip_ssl_cert_verification);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| ClientError::Connection(format!("failed to build transport: {}", e)))?;

        let token = match &config.credentials {
            Credentials::Token(token) => token.clone(),
            Credentials::Password {
                username,
                password,
                customer_name,
            } => {
                login(
                    &http,
                    &base,
                    LoginRequest {
                        username,
                        password,
                        customer_name,
                    },
                )
                .await?
            }
        };

        info!("Prisma Cloud client initialized for {}", config.endpoint());

        Ok(Self {
            http,
            base,
            token,
            config,
        })
    }

    pub fn config(&self) -> &ValidatedConfig {
        &self.config
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Resolve the full URL for a request.
    pub fn url_for(&self, request: &ApiRequest) -> Result<Url> {
        join_url(&self.base, &request.path, &request.query)
    }

    /// Send one request and decode the JSON response.
    ///
    /// Throttled responses (429) are retried up to `max_retries` times and
    /// connect/timeout failures up to `retries` times, with exponential
    /// backoff capped at `retry_max_delay`.
    pub async fn execute(&self, request: &ApiRequest) -> Result<Value> {
        let url = self.url_for(request)?;
        if self.config.logs("LogAction") {
            debug!("prismacloud request: {}", request.label());
        }

        let mut throttled = 0u32;
        let mut transient = 0u32;
        let mut delay = INITIAL_BACKOFF.min(self.config.retry_max_delay);

        loop {
            let mut builder = self
                .http
                .request(request.method.clone(), url.clone())
                .header(AUTH_HEADER, &self.token)
                .header(reqwest::header::ACCEPT, "application/json");
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            match builder.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status == StatusCode::TOO_MANY_REQUESTS && throttled < self.config.max_retries
                    {
                        throttled += 1;
                        warn!(
                            "{} throttled, retry {}/{} in {:?}",
                            request.label(),
                            throttled,
                            self.config.max_retries,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        delay = self.next_delay(delay);
                        continue;
                    }
                    let body = response.text().await?;
                    return decode_response(request, status, &body);
                }
                Err(e) if (e.is_connect() || e.is_timeout()) && transient < self.config.retries => {
                    transient += 1;
                    warn!(
                        "{} failed ({}), retry {}/{} in {:?}",
                        request.label(),
                        e,
                        transient,
                        self.config.retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    delay = self.next_delay(delay);
                }
                Err(e) => return Err(ClientError::Transport(e)),
            }
        }
    }

    fn next_delay(&self, current: Duration) -> Duration {
        (current * 2).min(self.config.retry_max_delay)
    }
}

fn join_url<S: AsRef<str>>(base: &Url, path: &[S], query: &[(String, String)]) -> Result<Url> {
    let mut url = base.clone();
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| ClientError::Configuration(format!("invalid base url '{}'", base)))?;
        segments.pop_if_empty();
        segments.extend(path.iter().map(|s| s.as_ref()));
    }
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query.iter());
    }
    Ok(url)
}

fn decode_response(request: &ApiRequest, status: StatusCode, body: &str) -> Result<Value> {
    if status == StatusCode::NOT_FOUND
        || (!status.is_success() && body.contains("object not found"))
    {
        return Err(ClientError::NotFound(request.label()));
    }
    if !status.is_success() {
        return Err(ClientError::Api {
            status: status.as_u16(),
            body: body.to_string(),
        });
    }
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body)
        .map_err(|e| ClientError::Decode(format!("{}: {}", request.label(), e)))
}

async fn login(http: &reqwest::Client, base: &Url, request: LoginRequest<'_>) -> Result<String> {
    let url = join_url(base, &["login"], &[])?;
    debug!("Logging in to {} as {}", base, request.username);

    let response = http
        .post(url)
        .json(&request)
        .send()
        .await
        .map_err(|e| ClientError::Connection(format!("login request failed: {}", e)))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ClientError::Connection(format!("login response unreadable: {}", e)))?;
    if !status.is_success() {
        return Err(ClientError::Connection(format!(
            "login rejected ({}): {}",
            status.as_u16(),
            body
        )));
    }

    let parsed: LoginResponse = serde_json::from_str(&body)
        .map_err(|e| ClientError::Connection(format!("login response malformed: {}", e)))?;
    parsed
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ClientError::Connection("login response carried no token".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionConfig;

    async fn client_for(url: &str) -> PrismaClient {
        let config = ConnectionConfig {
            url: Some(url.to_string()),
            token: Some("abc".to_string()),
            ..Default::default()
        };
        PrismaClient::connect(config.validate().unwrap()).await.unwrap()
    }

    #[tokio::test]
    async fn test_url_joins_segments_and_query() {
        let client = client_for("api.example.com").await;
        let request = ApiRequest::get(&["v2", "policy"])
            .param("policy.severity", "high")
            .param("cloud.type", "aws");
        let url = client.url_for(&request).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/v2/policy?policy.severity=high&cloud.type=aws"
        );
    }

    #[tokio::test]
    async fn test_url_escapes_path_segments() {
        let client = client_for("api.example.com").await;
        let url = client
            .url_for(&ApiRequest::get(&["policy", "a b/c"]))
            .unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/policy/a%20b%2Fc");
    }

    #[tokio::test]
    async fn test_url_keeps_base_path_prefix() {
        let client = client_for("example.com/prisma/").await;
        let url = client.url_for(&ApiRequest::get(&["cloud"])).unwrap();
        assert_eq!(url.as_str(), "https://example.com/prisma/cloud");
    }

    #[test]
    fn test_request_label() {
        let request = ApiRequest::post(&["v2", "alert"]);
        assert_eq!(request.label(), "POST /v2/alert");
    }

    #[test]
    fn test_decode_not_found() {
        let request = ApiRequest::get(&["policy", "x"]);
        let err = decode_response(&request, StatusCode::NOT_FOUND, "").unwrap_err();
        assert!(err.is_not_found());

        let err = decode_response(
            &request,
            StatusCode::BAD_REQUEST,
            r#"[{"i18nKey":"object not found"}]"#,
        )
        .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_decode_api_error_keeps_status() {
        let request = ApiRequest::get(&["cloud"]);
        let err = decode_response(&request, StatusCode::INTERNAL_SERVER_ERROR, "boom").unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.to_string(), "api error (500): boom");
    }

    #[test]
    fn test_decode_empty_body_is_null() {
        let request = ApiRequest::get(&["cloud"]);
        assert_eq!(decode_response(&request, StatusCode::OK, "  ").unwrap(), Value::Null);
    }

    #[test]
    fn test_decode_malformed_json() {
        let request = ApiRequest::get(&["cloud"]);
        let err = decode_response(&request, StatusCode::OK, "{not json").unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }
}
