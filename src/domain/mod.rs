/// Domain models for the application
use crate::errors::{LookupError, TransportError};
use crate::utils::text;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Bulk submission document, AT reports keyed by local sequence number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkReport {
    pub at_report: BTreeMap<String, AtReport>,
}

impl BulkReport {
    /// Wrap a single AT report under sequence number "0"
    pub fn single(report: AtReport) -> Self {
        let mut at_report = BTreeMap::new();
        at_report.insert("0".to_string(), report);
        Self { at_report }
    }
}

/// One astronomical transient report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtReport {
    pub groupid: String,
    pub reporter: String,
    pub at_type: String,
    pub internal_name: String,
    pub ra: Coordinate,
    pub dec: Coordinate,
    pub non_detection: NonDetection,
    pub photometry: Photometry,
    /// Julian Date of the earliest photometry point
    pub discovery_datetime: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub value: f64,
    pub error: String,
    pub units: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NonDetection {
    #[serde(flatten)]
    pub kind: NonDetectionKind,
    #[serde(flatten)]
    pub instrument: InstrumentInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NonDetectionKind {
    Observed {
        obsdate: f64,
        limiting_flux: f64,
    },
    Archival {
        archiveid: String,
        archival_remarks: String,
    },
}

/// Survey instrument metadata attached to non-detections and photometry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentInfo {
    pub flux_units: String,
    pub instrument_value: String,
    pub exptime: String,
    #[serde(rename = "Observer")]
    pub observer: String,
}

impl InstrumentInfo {
    /// ZTF camera on the P48, robotic operation
    pub fn ztf() -> Self {
        Self {
            flux_units: "1".to_string(),
            instrument_value: "196".to_string(),
            exptime: "30".to_string(),
            observer: "Robot".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photometry {
    pub photometry_group: BTreeMap<String, PhotometryPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotometryPoint {
    pub obsdate: f64,
    pub flux: f64,
    pub flux_error: f64,
    pub limiting_flux: f64,
    pub filter_value: String,
    #[serde(flatten)]
    pub instrument: InstrumentInfo,
}

/// Light curve of a transient candidate, the input to the report builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub internal_name: String,
    pub ra: f64,
    pub dec: f64,
    #[serde(default)]
    pub non_detection: Option<PriorNonDetection>,
    pub photometry: LightCurve,
}

/// Latest visit before detection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriorNonDetection {
    pub obsdate: f64,
    pub limiting_flux: f64,
}

/// Parallel columns, one entry per photometry point
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LightCurve {
    pub obsdates: Vec<f64>,
    pub fluxes: Vec<f64>,
    pub flux_errors: Vec<f64>,
    pub limiting_magnitudes: Vec<f64>,
    /// Survey filter codes: 1 = g, 2 = r, 3 = i
    pub filters: Vec<u8>,
}

/// Server-assigned report identifier, sent back as string or number
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReportId(String);

impl ReportId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn from_value(v: &Value) -> Result<Self, LookupError> {
        text(v)
            .map(Self)
            .ok_or_else(|| LookupError::Unparseable("data.report_id".to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a submission reply could not be turned into a report id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    EmptyResponse,
    MissingReportId,
    UnparseableReportId,
}

/// Result of posting a bulk report
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    Accepted(ReportId),
    Rejected { code: i64, message: String },
    Malformed(MalformedReason),
    Unreachable(TransportError),
}

impl SubmissionOutcome {
    pub fn report_id(&self) -> Option<&ReportId> {
        match self {
            SubmissionOutcome::Accepted(id) => Some(id),
            _ => None,
        }
    }
}

/// Result of one bulk-report-reply request
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyOutcome {
    /// Server feedback for the report (`data.feedback.at_report`)
    Feedback(Value),
    NotYetProcessed,
    Rejected { code: i64, message: String },
    /// id_code 200 but no feedback payload
    MissingFeedback,
    /// id_code present but not a number, shown as the server sent it
    UnreadableCode(String),
    /// No id_code to act on
    Empty,
    Unreachable(TransportError),
}

impl ReplyOutcome {
    /// The server has a final answer and polling should stop
    pub fn is_definitive(&self) -> bool {
        matches!(
            self,
            ReplyOutcome::Feedback(_)
                | ReplyOutcome::Rejected { .. }
                | ReplyOutcome::MissingFeedback
                | ReplyOutcome::UnreadableCode(_)
        )
    }
}

/// Result of polling for a reply
#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome {
    pub attempts: u32,
    pub last: ReplyOutcome,
}

impl PollOutcome {
    pub fn feedback(&self) -> Option<&Value> {
        match &self.last {
            ReplyOutcome::Feedback(v) => Some(v),
            _ => None,
        }
    }

    pub fn exhausted(&self) -> bool {
        !self.last.is_definitive()
    }
}

/// Whether TNS already knows a transient at a position
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    NotReported,
    /// Full TNS name, prefix included (e.g. "AT 2018abc")
    Reported(String),
    Ambiguous(String),
    Failed(String),
}

/// Result of the build, search, submit and poll sequence for one candidate
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateOutcome {
    Skipped(SearchOutcome),
    NotSubmitted(SubmissionOutcome),
    Submitted {
        report_id: ReportId,
        poll: PollOutcome,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_id_from_number_and_string() {
        assert_eq!(
            ReportId::from_value(&serde_json::json!(98765)).unwrap(),
            ReportId::new("98765")
        );
        assert_eq!(
            ReportId::from_value(&serde_json::json!("abc")).unwrap(),
            ReportId::new("abc")
        );
    }

    #[test]
    fn test_report_id_rejects_objects() {
        assert!(matches!(
            ReportId::from_value(&serde_json::json!({"id": 1})),
            Err(LookupError::Unparseable(_))
        ));
    }

    #[test]
    fn test_archival_non_detection_serializes_flat() {
        let nd = NonDetection {
            kind: NonDetectionKind::Archival {
                archiveid: "0".to_string(),
                archival_remarks: "none".to_string(),
            },
            instrument: InstrumentInfo::ztf(),
        };
        let json = serde_json::to_value(&nd).unwrap();
        assert_eq!(json["archiveid"], "0");
        assert_eq!(json["instrument_value"], "196");
        assert_eq!(json["Observer"], "Robot");
        assert!(json.get("obsdate").is_none());
    }

    #[test]
    fn test_definitive_replies() {
        assert!(ReplyOutcome::Feedback(Value::Null).is_definitive());
        assert!(ReplyOutcome::MissingFeedback.is_definitive());
        assert!(ReplyOutcome::UnreadableCode("\"ERR\"".to_string()).is_definitive());
        assert!(ReplyOutcome::Rejected {
            code: 400,
            message: "bad".to_string()
        }
        .is_definitive());
        assert!(!ReplyOutcome::NotYetProcessed.is_definitive());
        assert!(!ReplyOutcome::Empty.is_definitive());
    }

    #[test]
    fn test_candidate_parses_without_non_detection() {
        let candidate: Candidate = serde_json::from_value(serde_json::json!({
            "internal_name": "ZTF18aaaaaaa",
            "ra": 23.4621,
            "dec": 30.6599,
            "photometry": {
                "obsdates": [2458380.7],
                "fluxes": [19.1],
                "flux_errors": [0.1],
                "limiting_magnitudes": [20.5],
                "filters": [2]
            }
        }))
        .unwrap();
        assert!(candidate.non_detection.is_none());
        assert_eq!(candidate.photometry.filters, vec![2]);
    }
}
