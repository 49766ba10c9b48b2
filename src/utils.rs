/// Utility functions
use crate::errors::LookupError;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

/// Julian Date of the Unix epoch
const JD_UNIX_EPOCH: f64 = 2_440_587.5;

/// Extract an integer code from JSON, accepting numeric strings
pub fn code(v: &Value) -> Option<i64> {
    if let Some(x) = v.as_i64() {
        return Some(x);
    }
    if let Some(x) = v.as_f64() {
        if x.fract() == 0.0 {
            return Some(x as i64);
        }
    }
    if let Some(s) = v.as_str() {
        return s.trim().parse::<i64>().ok();
    }
    None
}

/// Extract a non-empty string from JSON, rendering numbers as text
pub fn text(v: &Value) -> Option<String> {
    if let Some(s) = v.as_str() {
        if !s.is_empty() {
            return Some(s.to_string());
        }
    } else if v.is_number() {
        return Some(v.to_string());
    }
    None
}

/// Walk a key path through nested JSON objects
pub fn lookup<'a>(v: &'a Value, path: &[&str]) -> Result<&'a Value, LookupError> {
    let mut current = v;
    let mut walked = String::new();
    for key in path {
        let obj = current.as_object().ok_or_else(|| {
            LookupError::NotAnObject(if walked.is_empty() {
                "<root>".to_string()
            } else {
                walked.clone()
            })
        })?;
        if !walked.is_empty() {
            walked.push('.');
        }
        walked.push_str(key);
        current = obj
            .get(*key)
            .ok_or_else(|| LookupError::MissingKey(walked.clone()))?;
    }
    Ok(current)
}

/// Convert a Julian Date to a UTC timestamp
pub fn jd_to_datetime(jd: f64) -> Option<DateTime<Utc>> {
    if !jd.is_finite() {
        return None;
    }
    let millis = ((jd - JD_UNIX_EPOCH) * 86_400_000.0).round();
    if millis.abs() > i64::MAX as f64 {
        return None;
    }
    Utc.timestamp_millis_opt(millis as i64).single()
}
