//! Maps error codes reported by the browser extension onto [`BrowserError`].

use crate::error::BrowserError;
use serde_json::Value;

/// Maps an extension error code and message to a [`BrowserError`].
///
/// `details` may carry the offending `tab_id`, `target` or `operation`.
/// Unknown codes fall back to [`BrowserError::Other`] with the code kept in
/// the message.
pub fn map_browser_error(code: &str, message: &str, details: Option<&Value>) -> BrowserError {
    match code {
        "NOT_READY" => BrowserError::NotReady,
        "NOT_SUPPORTED" | "UNKNOWN_COMMAND" => BrowserError::NotSupported(message.to_string()),
        "CONNECTION_LOST" => BrowserError::ConnectionLost,
        "TAB_NOT_FOUND" => match detail_i64(details, "tab_id") {
            Some(id) => BrowserError::TabNotFound(id),
            None => BrowserError::Other(message.to_string()),
        },
        "NO_ACTIVE_TAB" => BrowserError::NoActiveTab,
        "NAVIGATION_ERROR" => BrowserError::Navigation(message.to_string()),
        "ELEMENT_NOT_FOUND" => {
            let target = detail_str(details, "target").unwrap_or_else(|| message.to_string());
            BrowserError::ElementNotFound(target)
        }
        "SCRIPT_ERROR" | "CONTENT_SCRIPT_UNAVAILABLE" => {
            BrowserError::ScriptError(message.to_string())
        }
        "PERMISSION_DENIED" => BrowserError::PermissionDenied(message.to_string()),
        "TIMEOUT" => BrowserError::Timeout {
            operation: detail_str(details, "operation").unwrap_or_else(|| message.to_string()),
        },
        "INVALID_REQUEST" | "INVALID_PARAMS" => BrowserError::InvalidRequest(message.to_string()),
        "SERIALIZATION_ERROR" => BrowserError::Serialization(message.to_string()),
        "INTERNAL_ERROR" => BrowserError::Other(message.to_string()),
        _ => BrowserError::Other(format!("[{}] {}", code, message)),
    }
}

fn detail_str(details: Option<&Value>, key: &str) -> Option<String> {
    details
        .and_then(|d| d.get(key))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

fn detail_i64(details: Option<&Value>, key: &str) -> Option<i64> {
    details.and_then(|d| d.get(key)).and_then(|v| v.as_i64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_map_tab_not_found() {
        let details = json!({"tab_id": 12});
        let err = map_browser_error("TAB_NOT_FOUND", "Tab 12 does not exist", Some(&details));
        assert_eq!(err, BrowserError::TabNotFound(12));
        assert_eq!(err.code(), "TAB_NOT_FOUND");
    }

    #[test]
    fn test_map_element_not_found_prefers_target() {
        let details = json!({"target": "sign in"});
        let err = map_browser_error("ELEMENT_NOT_FOUND", "nothing matched", Some(&details));
        assert_eq!(err, BrowserError::ElementNotFound("sign in".into()));
        assert_eq!(err.to_string(), "Could not find element: sign in");
    }

    #[test]
    fn test_map_timeout() {
        let err = map_browser_error("TIMEOUT", "page did not answer", None);
        match &err {
            BrowserError::Timeout { operation } => assert_eq!(operation, "page did not answer"),
            _ => panic!("Expected Timeout"),
        }
        assert_eq!(err.code(), "TIMEOUT");
    }

    #[test]
    fn test_map_unknown_code_fallback() {
        let err = map_browser_error("SOME_NEW_CODE", "Something happened", None);
        match err {
            BrowserError::Other(msg) => {
                assert!(msg.contains("SOME_NEW_CODE"));
                assert!(msg.contains("Something happened"));
            }
            _ => panic!("Expected Other"),
        }
    }

    #[test]
    fn test_codes_round_trip_through_mapping() {
        let errors = vec![
            BrowserError::NotReady,
            BrowserError::NoActiveTab,
            BrowserError::ConnectionLost,
            BrowserError::Navigation("x".into()),
            BrowserError::ScriptError("x".into()),
            BrowserError::PermissionDenied("x".into()),
        ];
        for err in errors {
            let mapped = map_browser_error(err.code(), "x", None);
            assert_eq!(mapped.code(), err.code());
        }
    }
}
