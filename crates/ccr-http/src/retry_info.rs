//! Provider-agnostic extraction of retry hints from an error response body
//! (spec §4.1 "Body retry-info extraction").

use std::time::Duration;

use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryInfo {
    pub delay: Option<Duration>,
    pub is_daily_quota: bool,
}

pub fn extract_retry_info(body: &[u8], initial_backoff_ms: u64) -> RetryInfo {
    let Ok(value) = serde_json::from_slice::<Value>(body) else {
        return RetryInfo::default();
    };

    let mut info = RetryInfo::default();
    let Some(details) = value.pointer("/error/details").and_then(Value::as_array) else {
        return info;
    };

    for detail in details {
        if info.delay.is_none() {
            if let Some(retry_delay) = detail.get("retryDelay").and_then(Value::as_str) {
                if let Some(seconds) = parse_seconds_suffix(retry_delay) {
                    let ms = (seconds * 1000.0).round() as u64;
                    info.delay = Some(Duration::from_millis(ms.max(initial_backoff_ms)));
                }
            }
        }
        if let Some(quota_id) = detail
            .get("metadata")
            .and_then(|metadata| metadata.get("quotaId"))
            .and_then(Value::as_str)
        {
            if quota_id.contains("PerDay") {
                info.is_daily_quota = true;
            }
        }
    }

    info
}

fn parse_seconds_suffix(value: &str) -> Option<f64> {
    value.strip_suffix('s')?.parse::<f64>().ok()
}
