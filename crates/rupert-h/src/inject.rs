use chromiumoxide::Page;
use rupert_common::error_mapping::map_browser_error;
use rupert_common::protocol::PageAction;
use rupert_engine::backend::BrowserError;
use serde_json::{Value, json};
use std::time::Duration;

const PAGE_ACTIONS_JS: &str = include_str!("page_actions.js");

/// Prevents hanging when a dialog blocks the page's JS thread.
const EVAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum retries for context errors while the page is navigating.
const MAX_CONTEXT_RETRIES: u32 = 10;

const CONTEXT_RETRY_DELAY: Duration = Duration::from_millis(100);

fn is_context_error(err: &str) -> bool {
    err.contains("Cannot find context")
        || err.contains("Execution context was destroyed")
        || err.contains("-32000")
}

/// Expression that runs `action` through the injected helpers.
pub fn page_action_expression(action: &PageAction) -> Result<String, BrowserError> {
    let args = serde_json::to_string(action)?;
    Ok(format!("window.__rupert.run({})", args))
}

/// Turns the helper's `{success, code, message, ...}` reply into the data a
/// successful action reports, or the matching [`BrowserError`].
pub fn interpret_reply(action: &PageAction, reply: Value) -> Result<Value, BrowserError> {
    let success = reply
        .get("success")
        .and_then(Value::as_bool)
        .ok_or_else(|| BrowserError::ScriptError(format!("Unexpected page reply: {}", reply)))?;
    if success {
        return Ok(reply);
    }

    let code = reply
        .get("code")
        .and_then(Value::as_str)
        .unwrap_or("SCRIPT_ERROR");
    let message = reply
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("Page action failed");
    let details = match action {
        PageAction::Click { target } | PageAction::Type { target, .. } => {
            json!({ "target": target })
        }
        PageAction::Find { text } => json!({ "target": text }),
        PageAction::Scroll { .. } => Value::Null,
    };
    Err(map_browser_error(code, message, Some(&details)))
}

pub async fn run_page_action(page: &Page, action: &PageAction) -> Result<Value, BrowserError> {
    let expression = page_action_expression(action)?;
    tracing::debug!("Evaluating page action: {}", expression);

    let mut last_error = None;

    for attempt in 0..MAX_CONTEXT_RETRIES {
        inject_helpers(page).await?;

        match evaluate_with_timeout(page, &expression).await {
            Ok(value) => return interpret_reply(action, value),
            Err(EvalError::Timeout) => {
                return Err(BrowserError::Timeout {
                    operation: "page action (possibly blocked by a dialog)".into(),
                });
            }
            Err(EvalError::Context(err_str)) => {
                tracing::debug!(
                    "Context error during page action (attempt {}/{}), retrying...",
                    attempt + 1,
                    MAX_CONTEXT_RETRIES
                );
                last_error = Some(err_str);
                tokio::time::sleep(CONTEXT_RETRY_DELAY).await;
            }
            Err(EvalError::Other(err_str)) => {
                return Err(BrowserError::ScriptError(err_str));
            }
        }
    }

    Err(BrowserError::ScriptError(last_error.unwrap_or_else(|| {
        "Failed to run page action after retries".to_string()
    })))
}

async fn inject_helpers(page: &Page) -> Result<(), BrowserError> {
    let loaded = evaluate_with_timeout(page, "typeof window.__rupert !== 'undefined'").await;
    match loaded {
        Ok(Value::Bool(true)) => Ok(()),
        Ok(_) => match evaluate_with_timeout(page, PAGE_ACTIONS_JS).await {
            Ok(_) | Err(EvalError::Context(_)) => Ok(()),
            Err(EvalError::Timeout) => Err(BrowserError::Timeout {
                operation: "helper injection".into(),
            }),
            Err(EvalError::Other(e)) => Err(BrowserError::ScriptError(format!(
                "Failed to inject page helpers: {}",
                e
            ))),
        },
        // The caller's evaluation will hit the same context error and retry.
        Err(EvalError::Context(_)) => Ok(()),
        Err(EvalError::Timeout) => Err(BrowserError::Timeout {
            operation: "helper injection".into(),
        }),
        Err(EvalError::Other(e)) => Err(BrowserError::ScriptError(e)),
    }
}

enum EvalError {
    Timeout,
    Context(String),
    Other(String),
}

async fn evaluate_with_timeout(page: &Page, expression: &str) -> Result<Value, EvalError> {
    let eval_result = tokio::time::timeout(EVAL_TIMEOUT, page.evaluate(expression)).await;

    match eval_result {
        Err(_) => Err(EvalError::Timeout),
        Ok(Err(e)) => {
            let err_str = e.to_string();
            if is_context_error(&err_str) {
                Err(EvalError::Context(err_str))
            } else {
                Err(EvalError::Other(err_str))
            }
        }
        Ok(Ok(remote_object)) => Ok(remote_object.value().cloned().unwrap_or(Value::Null)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rupert_common::protocol::{ScrollAmount, ScrollDirection};

    #[test]
    fn test_expression_escapes_arguments() {
        let action = PageAction::Type {
            target: "search".into(),
            text: "it's \"quoted\"".into(),
        };
        let expr = page_action_expression(&action).unwrap();
        assert!(expr.starts_with("window.__rupert.run({"));
        assert!(expr.contains(r#""action":"type""#));
        assert!(expr.contains(r#"it's \"quoted\""#));
    }

    #[test]
    fn test_scroll_expression_carries_amount() {
        let action = PageAction::Scroll {
            direction: ScrollDirection::Up,
            amount: ScrollAmount::Large,
        };
        let expr = page_action_expression(&action).unwrap();
        assert!(expr.contains(r#""direction":"up""#));
        assert!(expr.contains(r#""amount":"large""#));
    }

    #[test]
    fn test_successful_reply_is_returned() {
        let action = PageAction::Find { text: "pricing".into() };
        let reply = json!({"success": true, "message": "Found 2 instances", "count": 2});
        assert_eq!(interpret_reply(&action, reply.clone()).unwrap(), reply);
    }

    #[test]
    fn test_missing_element_maps_to_target() {
        let action = PageAction::Click { target: "sign in".into() };
        let reply = json!({
            "success": false,
            "code": "ELEMENT_NOT_FOUND",
            "message": "Could not find element: sign in"
        });
        let err = interpret_reply(&action, reply).unwrap_err();
        assert_eq!(err, BrowserError::ElementNotFound("sign in".into()));
    }

    #[test]
    fn test_script_failure_without_code() {
        let action = PageAction::Scroll {
            direction: ScrollDirection::Down,
            amount: ScrollAmount::Normal,
        };
        let err = interpret_reply(&action, json!({"success": false, "message": "boom"}))
            .unwrap_err();
        assert_eq!(err, BrowserError::ScriptError("boom".into()));
    }

    #[test]
    fn test_malformed_reply() {
        let action = PageAction::Find { text: "x".into() };
        let err = interpret_reply(&action, json!("nope")).unwrap_err();
        assert_eq!(err.code(), "SCRIPT_ERROR");
    }

    #[test]
    fn test_context_errors() {
        assert!(is_context_error("Execution context was destroyed."));
        assert!(!is_context_error("ReferenceError: foo is not defined"));
    }
}
