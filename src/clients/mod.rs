/// TNS API client module
use crate::config::{TNS_BASE_URL_REAL, TNS_BASE_URL_SANDBOX};
use crate::errors::{LookupError, TransportError};
use crate::logging::Logger;
use crate::utils::{code, lookup};
use async_trait::async_trait;
use reqwest::multipart::Form;
use reqwest::Client;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

#[cfg(test)]
pub mod fake;

pub const AT_REPORT_FORM: &str = "bulk-report";
pub const AT_REPORT_REPLY: &str = "bulk-report-reply";
pub const SEARCH: &str = "get/search";

/// Multipart form fields, name to value
pub type FormFields = BTreeMap<String, String>;

/// Status line and body of an HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Performs the actual POST; swapped for an in-memory fake in tests
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_form(
        &self,
        url: &str,
        fields: &FormFields,
        timeout: Duration,
    ) -> Result<RawResponse, TransportError>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(concat!("tns-report/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_form(
        &self,
        url: &str,
        fields: &FormFields,
        timeout: Duration,
    ) -> Result<RawResponse, TransportError> {
        // TNS expects every field as its own multipart part, never urlencoded.
        let form = fields
            .iter()
            .fold(Form::new(), |form, (name, value)| {
                form.text(name.clone(), value.clone())
            });

        let resp = self
            .client
            .post(url)
            .multipart(form)
            .timeout(timeout)
            .send()
            .await?;

        let status = resp.status().as_u16();
        let body = resp.text().await?;
        Ok(RawResponse { status, body })
    }
}

/// Human-readable description of a non-200 HTTP status
pub fn http_error_message(status: u16) -> String {
    match status {
        304 => "Error 304: Not Modified: There was no new data to return.".to_string(),
        400 => "Error 400: Bad Request: The request was invalid. An accompanying error message will explain why.".to_string(),
        403 => "Error 403: Forbidden: The request is understood, but it has been refused. An accompanying error message will explain why".to_string(),
        404 => "Error 404: Not Found: The URI requested is invalid or the resource requested, such as a category, does not exists.".to_string(),
        500 => "Error 500: Internal Server Error: Something is broken.".to_string(),
        503 => "Error 503: Service Unavailable.".to_string(),
        other => format!("Error {}: undocumented error: {}", other, other),
    }
}

/// Parsed JSON envelope, empty when the response carried nothing usable
#[derive(Debug, Clone, PartialEq)]
pub struct TnsReply(Value);

impl TnsReply {
    pub fn empty() -> Self {
        Self(Value::Object(Map::new()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.as_object().map_or(true, |m| m.is_empty())
    }

    /// Server's application-level status, independent of the HTTP status.
    /// `Ok(None)` when the key is absent, `Err` when it holds no integer.
    pub fn status(&self) -> Result<Option<i64>, LookupError> {
        match self.0.get("id_code") {
            None => Ok(None),
            Some(value) => code(value)
                .map(Some)
                .ok_or_else(|| LookupError::Unparseable(format!("id_code = {}", value))),
        }
    }

    pub fn id_code(&self) -> Option<i64> {
        self.status().ok().flatten()
    }

    pub fn id_message(&self) -> Option<&str> {
        self.0.get("id_message").and_then(Value::as_str)
    }

    pub fn lookup(&self, path: &[&str]) -> Result<&Value, LookupError> {
        lookup(&self.0, path)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

/// Per-client request defaults, fixed at construction
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub defaults: FormFields,
    pub timeout: Duration,
}

impl ClientOptions {
    pub fn new(api_key: &str, timeout: Duration) -> Self {
        let mut defaults = FormFields::new();
        defaults.insert("api_key".to_string(), api_key.to_string());
        Self { defaults, timeout }
    }
}

/// Bulk report API client
pub struct TnsClient {
    base_url: String,
    options: ClientOptions,
    transport: Arc<dyn Transport>,
    logger: Arc<dyn Logger>,
}

impl TnsClient {
    pub fn new(
        sandbox: bool,
        options: ClientOptions,
        transport: Arc<dyn Transport>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        let base_url = if sandbox {
            TNS_BASE_URL_SANDBOX
        } else {
            TNS_BASE_URL_REAL
        };
        Self::with_base_url(base_url, options, transport, logger)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        options: ClientOptions,
        transport: Arc<dyn Transport>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            options,
            transport,
            logger,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, resource: &str) -> String {
        format!("{}{}", self.base_url, resource)
    }

    /// Overlay per-call fields on the client defaults
    pub fn build_parameters(&self, extra: FormFields) -> FormFields {
        let mut params = self.options.defaults.clone();
        params.extend(extra);
        params
    }

    pub async fn post(
        &self,
        url: &str,
        parameters: &FormFields,
        timeout: Duration,
    ) -> Result<RawResponse, TransportError> {
        self.transport.post_form(url, parameters, timeout).await
    }

    /// Classify an HTTP response; problems are logged, never raised
    pub fn parse_response(&self, raw: &RawResponse) -> TnsReply {
        if raw.status != 200 {
            self.logger.warning(&http_error_message(raw.status));
            return TnsReply::empty();
        }

        let body: Value = match serde_json::from_str(&raw.body) {
            Ok(v) => v,
            Err(e) => {
                self.logger
                    .error(&format!("response is not valid JSON: {}", e));
                return TnsReply::empty();
            }
        };
        if !body.is_object() {
            self.logger.error("response is not a JSON object");
            return TnsReply::empty();
        }

        let reply = TnsReply(body);
        let bad_code = match reply.status() {
            Ok(Some(200)) | Ok(None) => None,
            Ok(Some(id_code)) => Some(id_code.to_string()),
            Err(_) => Some(reply.0["id_code"].to_string()),
        };
        if let Some(id_code) = bad_code {
            self.logger.error(&format!(
                "Bad response: code = {}, error = '{}'",
                id_code,
                reply.id_message().unwrap_or("")
            ));
        }
        reply
    }

    /// Submit a bulk report document
    pub async fn send_bulk_report(&self, report: &Value) -> Result<TnsReply, TransportError> {
        let mut extra = FormFields::new();
        extra.insert("data".to_string(), report.to_string());

        self.logger.info("sending request");
        let reply = self.call(AT_REPORT_FORM, extra).await;
        self.logger.info("got response (or timed out)");
        reply
    }

    /// Ask for the processing result of a submitted report
    pub async fn bulk_report_reply(&self, report_id: &str) -> Result<TnsReply, TransportError> {
        let mut extra = FormFields::new();
        extra.insert("report_id".to_string(), report_id.to_string());

        self.logger.info("looking for reply report");
        let reply = self.call(AT_REPORT_REPLY, extra).await;
        self.logger.info("got report (or timed out)");
        reply
    }

    /// Cone search for objects already registered around a position
    pub async fn search(
        &self,
        ra: f64,
        dec: f64,
        radius_arcsec: f64,
    ) -> Result<TnsReply, TransportError> {
        let query = serde_json::json!({
            "ra": ra,
            "dec": dec,
            "radius": radius_arcsec,
            "units": "arcsec",
            "objname": "",
            "internal_name": "",
        });
        let mut extra = FormFields::new();
        extra.insert("data".to_string(), query.to_string());

        self.call(SEARCH, extra).await
    }

    async fn call(&self, resource: &str, extra: FormFields) -> Result<TnsReply, TransportError> {
        let url = self.build_url(resource);
        let params = self.build_parameters(extra);
        match self.post(&url, &params, self.options.timeout).await {
            Ok(raw) => Ok(self.parse_response(&raw)),
            Err(e) => {
                self.logger
                    .error(&format!("request to {} failed: {}", url, e));
                Err(e)
            }
        }
    }
}
