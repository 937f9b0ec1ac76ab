//! Authenticated HTTP transport.
//!
//! `Transport` owns the credential and the last seen rate-limit counters.
//! It attaches the bearer token, refreshes it when the server says it has
//! expired, and turns 4xx/5xx answers into [`Error::HttpStatus`]. The
//! actual bytes-on-the-wire part sits behind [`Connector`] so the refresh
//! and rate-limit rules can be exercised without a network.

use crate::credential::{Credential, TokenGrant};
use crate::{Error, Result};
use chrono::Utc;
use reqwest::blocking::{multipart, Client};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_API_BASE: &str = "https://api.raindrop.io/rest/v1";
pub const ACCESS_TOKEN_URL: &str = "https://raindrop.io/oauth/access_token";
/// Raindrop refreshes on the same endpoint that issues access tokens.
pub const DEFAULT_REFRESH_URL: &str = ACCESS_TOKEN_URL;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

/// A file to send as `multipart/form-data`, with extra text fields.
#[derive(Debug, Clone, PartialEq)]
pub struct FilePart {
    pub field_name: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    pub fields: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    Json(String),
    Multipart(FilePart),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WireRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub authorization: Option<String>,
    pub body: Body,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WireResponse {
    pub status: u16,
    /// Header names are stored lowercased.
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl WireResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status)
    }
}

/// Sends one request and returns whatever the server answered, including
/// error statuses. Only failures to get an answer at all are errors.
pub trait Connector {
    fn send(&self, request: &WireRequest) -> Result<WireResponse>;
}

/// [`Connector`] backed by a blocking reqwest client.
pub struct HttpConnector {
    client: Client,
}

impl HttpConnector {
    /// Every request, including token refreshes, is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("raindrop-shell/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl Connector for HttpConnector {
    fn send(&self, request: &WireRequest) -> Result<WireResponse> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Put => reqwest::Method::PUT,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        };
        let mut builder = self.client.request(method, &request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(auth) = &request.authorization {
            builder = builder.header(AUTHORIZATION, auth);
        }
        builder = match &request.body {
            Body::Empty => builder,
            Body::Json(text) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(text.clone()),
            Body::Multipart(part) => {
                let file = multipart::Part::bytes(part.bytes.clone())
                    .file_name(part.file_name.clone())
                    .mime_str(&part.content_type)
                    .map_err(|e| Error::Transport(format!("Invalid content type: {}", e)))?;
                let mut form = multipart::Form::new();
                for (name, value) in &part.fields {
                    form = form.text(name.clone(), value.clone());
                }
                builder.multipart(form.part(part.field_name.clone(), file))
            }
        };

        let response = builder
            .send()
            .map_err(|e| Error::Transport(format!("{} {}: {}", request.method.as_str(), request.url, e)))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response
            .text()
            .map_err(|e| Error::Transport(format!("Failed to read response body: {}", e)))?;
        Ok(WireResponse { status, headers, body })
    }
}

/// Server-reported request quota. Fields only ever move from one known
/// value to another; a missing header leaves the previous value alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitState {
    pub limit: Option<u64>,
    pub remaining: Option<u64>,
    pub reset: Option<u64>,
}

impl RateLimitState {
    pub fn observe(&mut self, response: &WireResponse) {
        let read = |name: &str| response.header(name).and_then(|v| v.trim().parse::<u64>().ok());
        if let Some(v) = read("X-RateLimit-Limit") {
            self.limit = Some(v);
        }
        if let Some(v) = read("X-RateLimit-Remaining") {
            self.remaining = Some(v);
        }
        if let Some(v) = read("X-RateLimit-Reset") {
            self.reset = Some(v);
        }
    }
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    grant_type: &'static str,
    refresh_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_secret: Option<&'a str>,
}

/// Called with the renewed credential after every successful refresh.
pub type TokenUpdater = Box<dyn FnMut(&Credential)>;

pub struct Transport {
    connector: Box<dyn Connector>,
    base_url: String,
    refresh_url: String,
    credential: Credential,
    rate_limit: RateLimitState,
    token_updater: Option<TokenUpdater>,
}

impl Transport {
    pub fn new(connector: Box<dyn Connector>, base_url: impl Into<String>, credential: Credential) -> Self {
        Self {
            connector,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            refresh_url: DEFAULT_REFRESH_URL.to_string(),
            credential,
            rate_limit: RateLimitState::default(),
            token_updater: None,
        }
    }

    pub fn with_refresh_url(mut self, refresh_url: impl Into<String>) -> Self {
        self.refresh_url = refresh_url.into();
        self
    }

    pub fn on_token_refresh(&mut self, updater: TokenUpdater) {
        self.token_updater = Some(updater);
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn rate_limit(&self) -> RateLimitState {
        self.rate_limit
    }

    pub fn get(&mut self, path: &str, query: Vec<(String, String)>) -> Result<Value> {
        self.request(Method::Get, path, query, Body::Empty)
    }

    pub fn post<B: Serialize + ?Sized>(&mut self, path: &str, body: &B) -> Result<Value> {
        self.request(Method::Post, path, Vec::new(), json_body(body)?)
    }

    pub fn put<B: Serialize + ?Sized>(&mut self, path: &str, body: &B) -> Result<Value> {
        self.request(Method::Put, path, Vec::new(), json_body(body)?)
    }

    pub fn delete<B: Serialize + ?Sized>(&mut self, path: &str, body: &B) -> Result<Value> {
        self.request(Method::Delete, path, Vec::new(), json_body(body)?)
    }

    pub fn put_file(&mut self, path: &str, part: FilePart) -> Result<Value> {
        self.request(Method::Put, path, Vec::new(), Body::Multipart(part))
    }

    /// Issue a request against the API base, refreshing the token at most
    /// once and re-sending the original request at most once.
    pub fn request(&mut self, method: Method, path: &str, query: Vec<(String, String)>, body: Body) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut refreshed = false;

        if self.credential.is_expired(Utc::now()) && self.credential.can_refresh() {
            info!("access token expired, refreshing before {} {}", method.as_str(), path);
            self.refresh()?;
            refreshed = true;
        }

        let mut response = self.send(method, &url, &query, &body)?;
        if response.status == 401 && !refreshed && self.credential.can_refresh() {
            info!("access token rejected on {} {}, refreshing", method.as_str(), path);
            self.refresh()?;
            response = self.send(method, &url, &query, &body)?;
        }

        decode(response)
    }

    fn send(&mut self, method: Method, url: &str, query: &[(String, String)], body: &Body) -> Result<WireResponse> {
        let request = WireRequest {
            method,
            url: url.to_string(),
            query: query.to_vec(),
            authorization: Some(self.credential.authorization()),
            body: body.clone(),
        };
        debug!(method = method.as_str(), url, "request");
        let response = self.connector.send(&request)?;
        self.rate_limit.observe(&response);
        debug!(status = response.status, remaining = ?self.rate_limit.remaining, "response");
        Ok(response)
    }

    fn refresh(&mut self) -> Result<()> {
        let refresh_token = self
            .credential
            .refresh_token
            .clone()
            .ok_or_else(|| Error::AuthRefresh("no refresh token available".to_string()))?;
        let payload = RefreshRequest {
            grant_type: "refresh_token",
            refresh_token: &refresh_token,
            client_id: self.credential.client_id.as_deref(),
            client_secret: self.credential.client_secret.as_deref(),
        };
        let request = WireRequest {
            method: Method::Post,
            url: self.refresh_url.clone(),
            query: Vec::new(),
            authorization: None,
            body: Body::Json(serde_json::to_string(&payload)?),
        };

        let response = self
            .connector
            .send(&request)
            .map_err(|e| Error::AuthRefresh(e.to_string()))?;
        if !(200..300).contains(&response.status) {
            warn!(status = response.status, "token refresh rejected");
            return Err(Error::AuthRefresh(format!("HTTP {}: {}", response.status, response.body.trim())));
        }
        let grant: TokenGrant = serde_json::from_str(&response.body)
            .map_err(|e| Error::AuthRefresh(format!("unexpected refresh response: {}", e)))?;

        self.credential.apply_grant(grant, Utc::now());
        if let Some(updater) = self.token_updater.as_mut() {
            updater(&self.credential);
        }
        Ok(())
    }
}

/// Serialize a request body. Enumerations become their primitive value and
/// timestamps RFC 3339 strings through their `Serialize` impls.
pub fn json_body<B: Serialize + ?Sized>(body: &B) -> Result<Body> {
    Ok(Body::Json(serde_json::to_string(body)?))
}

fn decode(response: WireResponse) -> Result<Value> {
    if response.status >= 400 {
        return Err(Error::HttpStatus {
            status: response.status,
            body: response.body,
        });
    }
    if response.body.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&response.body)?)
}
