//! Turns a model's free-form reply into an [`Intent`].

use rupert_common::protocol::{ActionKind, Intent, IntentSource, Target};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Score assumed when the model omits `confidence`.
pub const DEFAULT_MODEL_CONFIDENCE: f64 = 0.7;

#[derive(Debug, Error, PartialEq)]
pub enum ReplyError {
    #[error("No JSON object in model reply")]
    NoJson,
    #[error("Malformed JSON in model reply: {0}")]
    Malformed(String),
    #[error("Model reply is missing '{0}'")]
    MissingField(&'static str),
    #[error("Model proposed an unsupported action '{0}'")]
    UnsupportedAction(String),
    #[error("Model declined the command: {0}")]
    Declined(String),
}

/// The JSON object the prompt asks the model to return.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelReply {
    pub success: Option<bool>,
    pub action: Option<String>,
    #[serde(default)]
    pub target: Option<Value>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Removes a surrounding Markdown code fence (```json ... ```), if present.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    let after = &trimmed[start + 3..];
    // Skip the info string ("json") up to the end of the fence line.
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after[body_start..];
    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// First balanced top-level `{...}` in `text`. Braces inside JSON strings
/// are ignored.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

pub fn parse_model_reply(text: &str) -> Result<ModelReply, ReplyError> {
    let body = strip_code_fence(text);
    let json = extract_json_object(body)
        .or_else(|| extract_json_object(text))
        .ok_or(ReplyError::NoJson)?;
    serde_json::from_str(json).map_err(|e| ReplyError::Malformed(e.to_string()))
}

/// Parses a reply into an intent. `min_confidence` is the bar below which
/// the intent is replaced by a request to rephrase.
pub fn reply_to_intent(text: &str, min_confidence: f64) -> Result<Intent, ReplyError> {
    let reply = parse_model_reply(text)?;
    let success = reply.success.ok_or(ReplyError::MissingField("success"))?;
    let action_name = reply
        .action
        .as_deref()
        .filter(|a| !a.trim().is_empty())
        .ok_or(ReplyError::MissingField("action"))?;
    if !success {
        let reason = reply
            .message
            .or(reply.explanation)
            .unwrap_or_else(|| "no reason given".to_string());
        return Err(ReplyError::Declined(reason));
    }
    let action = ActionKind::from_name(action_name)
        .ok_or_else(|| ReplyError::UnsupportedAction(action_name.to_string()))?;

    let confidence = reply.confidence.unwrap_or(DEFAULT_MODEL_CONFIDENCE);
    if action != ActionKind::Unknown && confidence < min_confidence {
        let percent = (confidence.clamp(0.0, 1.0) * 100.0).round() as i64;
        return Ok(Intent::unknown(
            format!(
                "I'm not confident about that command ({}%). Could you please rephrase it?",
                percent
            ),
            IntentSource::Llm,
        ));
    }

    let explanation = reply
        .explanation
        .unwrap_or_else(|| format!("Running {}", action));
    let mut intent = Intent::new(action, confidence, explanation, IntentSource::Llm);
    intent.target = reply.target.as_ref().and_then(value_to_target);
    intent.data = reply.data.as_ref().and_then(value_to_string);
    intent.url = reply.url.filter(|u| !u.trim().is_empty());

    // Legacy direction-specific names carry their direction in the action.
    if action == ActionKind::Scroll && intent.target.is_none() {
        match action_name {
            "scroll_up" => intent.target = Some(Target::text("up")),
            "scroll_down" => intent.target = Some(Target::text("down")),
            _ => {}
        }
    }
    Ok(intent)
}

fn value_to_target(value: &Value) -> Option<Target> {
    match value {
        Value::Number(n) => n.as_i64().map(Target::Index),
        Value::String(s) if !s.trim().is_empty() => Some(Target::text(s.trim())),
        _ => None,
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
