use super::context::BrowserContext;

const ACTIONS: &str = "\
- **navigate**: Open a website. Requires \"url\" (or a site name in \"target\")
- **search**: Search the web or the current site. Requires \"target\" (the search terms)
- **new_tab**: Open a new tab. Optional \"url\"
- **close_tab**: Close the current tab, or tab number \"target\" (1-based)
- **switch_tab**: Switch to tab number \"target\" (1-based). Requires \"target\"
- **scroll**: Scroll the page. \"target\" is up, down, top or bottom; optional \"data\": small, normal or large
- **click**: Click a button or link. Requires \"target\" (its visible text)
- **type**: Type into a field. Requires \"target\" (the field) and \"data\" (the text)
- **find**: Highlight text on the page. Requires \"target\" (the text)
- **refresh**: Reload the current page
- **back**: Go back in history
- **forward**: Go forward in history";

const EXAMPLES: &str = r#"Command: "open amazon"
Response: {"success": true, "action": "navigate", "url": "https://amazon.com", "confidence": 0.95, "explanation": "Opening Amazon website"}

Command: "search for wireless headphones"
Response: {"success": true, "action": "search", "target": "wireless headphones", "confidence": 0.9, "explanation": "Searching Google for wireless headphones"}

Command: "scroll down"
Response: {"success": true, "action": "scroll", "target": "down", "confidence": 0.95, "explanation": "Scrolling down on current page"}

Command: "find the search box and search for laptops"
Response: {"success": true, "action": "type", "target": "search", "data": "laptops", "confidence": 0.85, "explanation": "Typing laptops into the search box"}

Command: "go to the second tab"
Response: {"success": true, "action": "switch_tab", "target": 2, "confidence": 0.9, "explanation": "Switching to tab number 2"}"#;

/// Builds the interpretation prompt. The output depends only on the
/// arguments, so identical inputs always produce identical prompts.
pub fn build_prompt(transcript: &str, context: &BrowserContext) -> String {
    let context_json =
        serde_json::to_string_pretty(context).unwrap_or_else(|_| "{}".to_string());
    let transcript = transcript.trim().replace('"', "'");

    format!(
        r#"You are Rupert, an intelligent web navigation assistant. Analyze this voice command and return a JSON response with the appropriate web action.

**Current Browser Context:**
{active}
{context_json}

**Voice Command:** "{transcript}"

**Available Actions:**
{actions}

**Response Format (JSON only):**
{{
  "success": true,
  "action": "action_name",
  "target": "specific_target",
  "data": "additional_data",
  "url": "https://example.com",
  "confidence": 0.0-1.0,
  "explanation": "What I will do"
}}

**Examples:**

{examples}

**Important:**
- Use only the actions listed above
- Always provide a confidence score (0.5+ for execution)
- If the command is unclear, set "success" to false and explain why
- Consider the current page when interpreting commands
- Return ONLY the JSON object, no other text

Analyze: "{transcript}""#,
        active = context.describe_active(),
        actions = ACTIONS,
        examples = EXAMPLES,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_is_deterministic() {
        let mut ctx = BrowserContext::default();
        ctx.recent_commands = vec!["open amazon".into()];
        let a = build_prompt("scroll down", &ctx);
        let b = build_prompt("scroll down", &ctx);
        assert_eq!(a, b);
        assert!(a.contains("**Voice Command:** \"scroll down\""));
        assert!(a.contains("\"open amazon\""));
        assert!(a.contains("No active page"));
    }

    #[test]
    fn test_prompt_lists_every_action() {
        let prompt = build_prompt("x", &BrowserContext::default());
        for action in rupert_common::protocol::ActionKind::ALL {
            if action == rupert_common::protocol::ActionKind::Unknown {
                continue;
            }
            assert!(
                prompt.contains(&format!("**{}**", action)),
                "missing {}",
                action
            );
        }
    }
}
