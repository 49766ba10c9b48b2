/// Business logic services layer
use crate::clients::{TnsClient, TnsReply};
use crate::config::ReplyPolicy;
use crate::domain::{
    BulkReport, Candidate, CandidateOutcome, MalformedReason, PollOutcome, ReplyOutcome,
    ReportId, SearchOutcome, SubmissionOutcome,
};
use crate::errors::{LookupError, ReportError};
use crate::logging::Logger;
use crate::report::ReportBuilder;
use crate::utils::jd_to_datetime;
use serde_json::Value;
use std::sync::Arc;

const REPORT_ID_PATH: &[&str] = &["data", "report_id"];
const FEEDBACK_PATH: &[&str] = &["data", "feedback", "at_report"];
const SEARCH_REPLY_PATH: &[&str] = &["data", "reply"];

/// Submits bulk reports and collects their processing feedback
pub struct BulkReportService {
    client: TnsClient,
    logger: Arc<dyn Logger>,
}

impl BulkReportService {
    pub fn new(client: TnsClient, logger: Arc<dyn Logger>) -> Self {
        Self { client, logger }
    }

    /// Post a bulk report and extract the report id from the acknowledgment
    pub async fn submit(&self, report: &Value) -> SubmissionOutcome {
        match self.client.send_bulk_report(report).await {
            Ok(reply) => self.classify_submission(&reply),
            Err(e) => SubmissionOutcome::Unreachable(e),
        }
    }

    /// Fetch the reply for a submitted report once
    pub async fn fetch_reply(&self, report_id: &ReportId) -> ReplyOutcome {
        let outcome = match self.client.bulk_report_reply(report_id.as_str()).await {
            Ok(reply) => self.classify_reply(report_id, &reply),
            Err(e) => ReplyOutcome::Unreachable(e),
        };
        self.logger.info(&format!(
            "got response {} for report {}",
            describe_reply(&outcome),
            report_id
        ));
        outcome
    }

    /// Sleep, ask, repeat until the server has a final answer or the budget runs out
    pub async fn poll_reply(&self, report_id: &ReportId, policy: &ReplyPolicy) -> PollOutcome {
        let mut attempts = 0;
        loop {
            tokio::time::sleep(policy.delay).await;
            let last = self.fetch_reply(report_id).await;
            attempts += 1;

            if last.is_definitive() || attempts >= policy.max_attempts {
                if !last.is_definitive() {
                    self.logger.warning(&format!(
                        "no final reply for report {} after {} attempts",
                        report_id, attempts
                    ));
                }
                return PollOutcome { attempts, last };
            }
        }
    }

    /// Check whether TNS already lists an object within `radius_arcsec`
    pub async fn search(&self, ra: f64, dec: f64, radius_arcsec: f64) -> SearchOutcome {
        match self.client.search(ra, dec, radius_arcsec).await {
            Ok(reply) => classify_search(&reply),
            Err(e) => SearchOutcome::Failed(e.to_string()),
        }
    }

    /// Build, optionally de-duplicate, submit and poll a single candidate
    pub async fn report_candidate(
        &self,
        builder: &ReportBuilder,
        candidate: &Candidate,
        policy: &ReplyPolicy,
        search_radius_arcsec: Option<f64>,
    ) -> Result<CandidateOutcome, ReportError> {
        let report = builder.build_bulk(candidate)?;

        if let Some(radius) = search_radius_arcsec {
            let found = self.search(candidate.ra, candidate.dec, radius).await;
            if found != SearchOutcome::NotReported {
                self.logger.warning(&format!(
                    "not submitting {}: {:?}",
                    candidate.internal_name, found
                ));
                return Ok(CandidateOutcome::Skipped(found));
            }
        }

        let submission = self
            .submit_report(&report, &candidate.internal_name)
            .await?;
        let report_id = match submission {
            SubmissionOutcome::Accepted(ref id) => id.clone(),
            other => {
                self.logger.warning("TNS send failure");
                return Ok(CandidateOutcome::NotSubmitted(other));
            }
        };

        let poll = self.poll_reply(&report_id, policy).await;
        Ok(CandidateOutcome::Submitted { report_id, poll })
    }

    async fn submit_report(
        &self,
        report: &BulkReport,
        internal_name: &str,
    ) -> Result<SubmissionOutcome, ReportError> {
        let discovery = report
            .at_report
            .values()
            .map(|r| r.discovery_datetime)
            .fold(f64::INFINITY, f64::min);
        let discovered = jd_to_datetime(discovery)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| discovery.to_string());
        self.logger.info(&format!(
            "submitting transient {} discovered {}",
            internal_name, discovered
        ));

        let value =
            serde_json::to_value(report).map_err(|e| ReportError::Encoding(e.to_string()))?;
        Ok(self.submit(&value).await)
    }

    fn classify_submission(&self, reply: &TnsReply) -> SubmissionOutcome {
        if reply.is_empty() {
            self.logger
                .error("Empty response. Something went wrong. Is the API Key OK?");
            return SubmissionOutcome::Malformed(MalformedReason::EmptyResponse);
        }

        match reply.lookup(REPORT_ID_PATH) {
            Ok(value) => match ReportId::from_value(value) {
                Ok(id) => {
                    self.logger.info(&format!("successful with ID {}", id));
                    SubmissionOutcome::Accepted(id)
                }
                Err(e) => {
                    self.logger
                        .error(&format!("Cannot read the report id: {}", e));
                    SubmissionOutcome::Malformed(MalformedReason::UnparseableReportId)
                }
            },
            Err(e) => match reply.id_code() {
                Some(code) if code != 200 => SubmissionOutcome::Rejected {
                    code,
                    message: reply.id_message().unwrap_or_default().to_string(),
                },
                _ => {
                    self.logger.error(&format!(
                        "Cannot find the data key. Something is wrong. ({})",
                        e
                    ));
                    SubmissionOutcome::Malformed(MalformedReason::MissingReportId)
                }
            },
        }
    }

    fn classify_reply(&self, report_id: &ReportId, reply: &TnsReply) -> ReplyOutcome {
        let status = match reply.status() {
            Ok(status) => status,
            Err(e) => {
                self.logger.error(&format!(
                    "{}: cannot read the reply status ({})",
                    report_id, e
                ));
                return ReplyOutcome::UnreadableCode(reply.as_value()["id_code"].to_string());
            }
        };
        match status {
            None => ReplyOutcome::Empty,
            Some(404) => {
                self.logger.warning(&format!(
                    "{}: Unknown report. Perhaps the report has not yet been processed.",
                    report_id
                ));
                ReplyOutcome::NotYetProcessed
            }
            Some(200) => match reply.lookup(FEEDBACK_PATH) {
                Ok(feedback) => ReplyOutcome::Feedback(feedback.clone()),
                Err(e) => {
                    self.logger.error(&format!(
                        "Cannot find the response feedback payload. ({})",
                        e
                    ));
                    ReplyOutcome::MissingFeedback
                }
            },
            Some(code) => ReplyOutcome::Rejected {
                code,
                message: reply.id_message().unwrap_or_default().to_string(),
            },
        }
    }
}

/// Interpret a cone search reply
pub fn classify_search(reply: &TnsReply) -> SearchOutcome {
    match reply.id_message() {
        None => return SearchOutcome::Failed("reply has no id_message".to_string()),
        Some("OK") => {}
        Some(_) => return SearchOutcome::NotReported,
    }

    let entries = match reply.lookup(SEARCH_REPLY_PATH) {
        Ok(Value::Array(entries)) => entries,
        Ok(_) => {
            return SearchOutcome::Failed(
                LookupError::Unparseable("data.reply".to_string()).to_string(),
            )
        }
        Err(e) => return SearchOutcome::Failed(e.to_string()),
    };

    match entries.as_slice() {
        [] => SearchOutcome::NotReported,
        [entry] => {
            let prefix = entry.get("prefix").and_then(Value::as_str).unwrap_or("");
            let name = entry.get("objname").and_then(Value::as_str).unwrap_or("");
            SearchOutcome::Reported(format!("{}{}", prefix, name))
        }
        _ => SearchOutcome::Ambiguous(format!(
            "Cannot understand reply {}",
            serde_json::to_string_pretty(reply.as_value()).unwrap_or_default()
        )),
    }
}

fn describe_reply(outcome: &ReplyOutcome) -> String {
    match outcome {
        ReplyOutcome::Feedback(v) => v.to_string(),
        ReplyOutcome::NotYetProcessed => "not yet processed".to_string(),
        ReplyOutcome::Rejected { code, message } => format!("error {} ({})", code, message),
        ReplyOutcome::MissingFeedback => "without feedback".to_string(),
        ReplyOutcome::UnreadableCode(code) => format!("with unreadable code {}", code),
        ReplyOutcome::Empty => "with no usable body".to_string(),
        ReplyOutcome::Unreachable(e) => format!("failure ({})", e),
    }
}
