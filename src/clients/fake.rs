use crate::clients::{FormFields, RawResponse, Transport, AT_REPORT_FORM, AT_REPORT_REPLY};
use crate::errors::TransportError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// A request seen by the fake
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub fields: FormFields,
    pub timeout: Duration,
}

type Scripted = Result<RawResponse, TransportError>;

/// `FakeTransport` is an in-memory stand-in for the TNS API.
///
/// Responses are scripted per resource and replayed in order; the last one
/// keeps being served once the queue runs dry. In echo mode it accepts any
/// bulk report and answers replies with the submitted `at_report` as feedback.
#[derive(Default)]
pub struct FakeTransport {
    scripted: Mutex<HashMap<String, VecDeque<Scripted>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    echo: bool,
    submitted: Mutex<Option<Value>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn echoing() -> Self {
        Self {
            echo: true,
            ..Self::default()
        }
    }

    /// Queue a response for a resource such as `bulk-report-reply`
    pub fn fake_respond(&self, resource: &str, response: Scripted) {
        self.scripted
            .lock()
            .unwrap()
            .entry(resource.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, resource: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.url.ends_with(&format!("/{}", resource)))
            .count()
    }

    fn echo_response(&self, resource: &str, fields: &FormFields) -> RawResponse {
        if resource == AT_REPORT_FORM {
            let data: Value = fields
                .get("data")
                .and_then(|d| serde_json::from_str(d).ok())
                .unwrap_or(Value::Null);
            *self.submitted.lock().unwrap() = Some(data);
            return RawResponse::new(
                200,
                r#"{"id_code": 200, "id_message": "OK", "data": {"report_id": "1"}}"#,
            );
        }

        match self.submitted.lock().unwrap().as_ref() {
            Some(data) if resource == AT_REPORT_REPLY => {
                let body = serde_json::json!({
                    "id_code": 200,
                    "id_message": "OK",
                    "data": {"feedback": {"at_report": data["at_report"].clone()}},
                });
                RawResponse::new(200, body.to_string())
            }
            _ => RawResponse::new(
                200,
                r#"{"id_code": 404, "id_message": "Unknown report"}"#,
            ),
        }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn post_form(
        &self,
        url: &str,
        fields: &FormFields,
        timeout: Duration,
    ) -> Result<RawResponse, TransportError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            url: url.to_string(),
            fields: fields.clone(),
            timeout,
        });

        let resource = url.rsplit("/api/").next().unwrap_or(url).to_string();

        if self.echo {
            return Ok(self.echo_response(&resource, fields));
        }

        let mut scripted = self.scripted.lock().unwrap();
        match scripted.get_mut(&resource) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if queue.len() == 1 => queue[0].clone(),
            _ => Ok(RawResponse::new(404, "")),
        }
    }
}
