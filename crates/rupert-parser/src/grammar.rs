//! Prioritized regex grammar mapping spoken commands to intents.
//!
//! Rules are tried in table order and the first match wins, so specific
//! rules (site openers, indexed tab rules) sit above the generic ones. The
//! catch-all "open X" navigation rule is always last.

use crate::ParseError;
use crate::normalizer::normalize_transcript;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use rupert_common::protocol::{ActionKind, Intent, IntentSource, ScrollAmount, Target};
use rupert_common::sites::normalize_url;
use serde::Serialize;

const NUMBER: &str = r"(\d+|one|two|three|four|five|six|seven|eight|nine|ten|first|second|third|fourth|fifth|sixth|seventh|eighth|ninth|tenth)";
const OPEN_VERB: &str = r"(?:open|go\s+to|navigate\s+to|visit|take\s+me\s+to|show\s+me|launch)";
const AMOUNT: &str = r"(?:\s+(a\s+little|a\s+bit|a\s+lot|a\s+page))?";

/// Where a capture group's text ends up in the produced intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Free text target (search terms, element label, page text).
    Target,
    /// Tab number, digits or a number word.
    Index,
    /// Secondary payload: typed text or a scroll amount.
    Data,
    /// Spoken destination; also resolved to a URL when it looks like one.
    Destination,
}

#[derive(Debug, Clone)]
pub struct GrammarRule {
    pub name: String,
    pub patterns: Vec<Regex>,
    pub action: ActionKind,
    pub confidence: f64,
    pub description: String,
    pub url: Option<String>,
    pub target: Option<Target>,
    /// Capture group `i + 1` fills `slots[i]`.
    pub slots: Vec<Slot>,
    pub examples: Vec<String>,
}

impl GrammarRule {
    fn new(
        name: &str,
        action: ActionKind,
        confidence: f64,
        description: &str,
        patterns: &[&str],
    ) -> Result<Self, ParseError> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(&format!("^(?:{})$", p)).map_err(|source| ParseError::InvalidPattern {
                    rule: name.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            name: name.to_string(),
            patterns,
            action,
            confidence,
            description: description.to_string(),
            url: None,
            target: None,
            slots: Vec::new(),
            examples: Vec::new(),
        })
    }

    fn url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }

    fn target(mut self, target: &str) -> Self {
        self.target = Some(Target::text(target));
        self
    }

    fn slots(mut self, slots: &[Slot]) -> Self {
        self.slots = slots.to_vec();
        self
    }

    fn examples(mut self, examples: &[&str]) -> Self {
        self.examples = examples.iter().map(|e| e.to_string()).collect();
        self
    }

    /// Matches an already normalized transcript against this rule.
    pub fn apply(&self, normalized: &str) -> Option<Intent> {
        let caps = self.patterns.iter().find_map(|p| p.captures(normalized))?;
        self.build(&caps)
    }

    fn build(&self, caps: &Captures<'_>) -> Option<Intent> {
        let mut intent = Intent::new(
            self.action,
            self.confidence,
            self.description.clone(),
            IntentSource::Grammar,
        );
        intent.url = self.url.clone();
        intent.target = self.target.clone();

        for (i, slot) in self.slots.iter().enumerate() {
            let Some(m) = caps.get(i + 1) else {
                continue;
            };
            let value = m.as_str().trim();
            if value.is_empty() {
                continue;
            }
            match slot {
                Slot::Target => intent.target = Some(Target::text(value)),
                Slot::Index => intent.target = Some(Target::Index(number_value(value)?)),
                Slot::Data => intent.data = Some(data_value(self.action, value)),
                Slot::Destination => {
                    intent.target = Some(Target::text(value));
                    if let Some(url) = normalize_url(value) {
                        intent.url = Some(url);
                    }
                }
            }
        }
        Some(intent)
    }
}

fn data_value(action: ActionKind, raw: &str) -> String {
    match action {
        ActionKind::Scroll => match ScrollAmount::from_word(raw) {
            ScrollAmount::Small => "small".to_string(),
            ScrollAmount::Normal => "normal".to_string(),
            ScrollAmount::Large => "large".to_string(),
        },
        _ => raw.to_string(),
    }
}

/// Digits or a spoken number word ("three", "third") as a 1-based index.
pub fn number_value(word: &str) -> Option<i64> {
    if let Ok(n) = word.parse::<i64>() {
        return Some(n);
    }
    let n = match word {
        "one" | "first" => 1,
        "two" | "second" => 2,
        "three" | "third" => 3,
        "four" | "fourth" => 4,
        "five" | "fifth" => 5,
        "six" | "sixth" => 6,
        "seven" | "seventh" => 7,
        "eight" | "eighth" => 8,
        "nine" | "ninth" => 9,
        "ten" | "tenth" => 10,
        _ => return None,
    };
    Some(n)
}

/// Name, description and sample phrases of one rule, for help output.
#[derive(Debug, Clone, Serialize)]
pub struct CommandSummary {
    pub name: String,
    pub action: ActionKind,
    pub description: String,
    pub examples: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CommandGrammar {
    rules: Vec<GrammarRule>,
}

lazy_static! {
    static ref BUILTIN: CommandGrammar =
        CommandGrammar::from_sites(&[]).expect("built-in grammar must compile");
}

impl CommandGrammar {
    /// The built-in rule table, compiled once.
    pub fn builtin() -> &'static CommandGrammar {
        &BUILTIN
    }

    /// Builds the rule table with additional site shortcuts, inserted after
    /// the built-in site openers.
    pub fn from_sites(extra_sites: &[(String, String)]) -> Result<Self, ParseError> {
        let mut rules = vec![
            site_rule("open_amazon", "amazon", "https://amazon.com", 0.95, "Opens Amazon.com in a new tab")?
                .examples(&["open amazon", "take me to amazon", "amazon.com"]),
            site_rule("open_google", "google", "https://google.com", 0.90, "Opens Google.com in a new tab")?
                .examples(&["open google", "go to google"]),
            site_rule("open_youtube", "youtube", "https://youtube.com", 0.90, "Opens YouTube.com in a new tab")?
                .examples(&["open youtube", "visit you tube"]),
        ];

        for (name, url) in extra_sites {
            let trimmed = name.trim().to_lowercase();
            if trimmed.is_empty() {
                return Err(ParseError::InvalidSite {
                    name: name.clone(),
                    reason: "empty site name".into(),
                });
            }
            let Some(resolved) = normalize_url(url) else {
                return Err(ParseError::InvalidSite {
                    name: name.clone(),
                    reason: format!("'{}' is not a URL", url),
                });
            };
            let rule_name = format!("open_{}", trimmed.replace(char::is_whitespace, "_"));
            let description = format!("Opens {} in a new tab", trimmed);
            rules.push(
                site_rule(&rule_name, &trimmed, &resolved, 0.90, &description)?
                    .examples(&[&format!("open {}", trimmed)]),
            );
        }

        rules.extend(builtin_rules()?);
        Ok(Self { rules })
    }

    /// Interprets a transcript. Empty or missing input, or no matching
    /// rule, yields an `unknown` intent with confidence 0.
    pub fn parse<'a>(&self, text: impl Into<Option<&'a str>>) -> Intent {
        let Some(text) = text.into() else {
            return Intent::unknown("No transcript provided", IntentSource::Grammar);
        };
        let normalized = normalize_transcript(text);
        if normalized.is_empty() {
            return Intent::unknown("No transcript provided", IntentSource::Grammar);
        }
        match self.match_rule(&normalized) {
            Some((_, intent)) => intent,
            None => Intent::unknown("No matching command pattern found", IntentSource::Grammar),
        }
    }

    /// First rule matching `text` together with the intent it produced.
    pub fn match_rule(&self, text: &str) -> Option<(&GrammarRule, Intent)> {
        let normalized = normalize_transcript(text);
        self.rules
            .iter()
            .find_map(|rule| rule.apply(&normalized).map(|intent| (rule, intent)))
    }

    pub fn rules(&self) -> &[GrammarRule] {
        &self.rules
    }

    pub fn available_commands(&self) -> Vec<CommandSummary> {
        self.rules
            .iter()
            .map(|r| CommandSummary {
                name: r.name.clone(),
                action: r.action,
                description: r.description.clone(),
                examples: r.examples.clone(),
            })
            .collect()
    }
}

fn site_rule(
    name: &str,
    site: &str,
    url: &str,
    confidence: f64,
    description: &str,
) -> Result<GrammarRule, ParseError> {
    let spoken = site
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s*");
    // "you tube" and "youtube" are both common transcriptions.
    let spoken = if site == "youtube" {
        r"you\s*tube".to_string()
    } else {
        spoken
    };
    let with_verb = format!(r"{}\s+(?:the\s+)?{}(?:\.com)?(?:\s+website)?", OPEN_VERB, spoken);
    let bare = format!(r"{}\.com", spoken);
    Ok(GrammarRule::new(
        name,
        ActionKind::Navigate,
        confidence,
        description,
        &[&with_verb, &bare],
    )?
    .url(url))
}

fn builtin_rules() -> Result<Vec<GrammarRule>, ParseError> {
    use ActionKind::*;

    let switch_tab = [
        format!(r"(?:switch|go|change|jump)\s+to\s+(?:the\s+)?tab\s+(?:number\s+)?{}", NUMBER),
        format!(r"(?:switch|go|change|jump)\s+to\s+(?:the\s+)?{}\s+tab", NUMBER),
        format!(r"(?:show\s+)?tab\s+(?:number\s+)?{}", NUMBER),
    ];
    let close_indexed = [
        format!(r"close\s+(?:the\s+)?tab\s+(?:number\s+)?{}", NUMBER),
        format!(r"close\s+(?:the\s+)?{}\s+tab", NUMBER),
    ];
    let scroll_up = format!(r"(?:scroll|page|move|go)\s+up{}", AMOUNT);
    let scroll_down = format!(r"(?:scroll|page|move|go)\s+down{}|scroll", AMOUNT);

    Ok(vec![
        GrammarRule::new(
            "new_tab",
            NewTab,
            0.95,
            "Opens a new browser tab",
            &[
                r"(?:open|create)\s+(?:a\s+)?new\s+(?:browser\s+)?tab",
                r"new\s+(?:browser\s+)?tab",
                r"open\s+(?:a\s+)?tab",
            ],
        )?
        .examples(&["open new tab", "new tab", "create a new tab", "open a tab"]),
        GrammarRule::new(
            "switch_tab",
            SwitchTab,
            0.90,
            "Switches to the given tab number",
            &[&switch_tab[0], &switch_tab[1], &switch_tab[2]],
        )?
        .slots(&[Slot::Index])
        .examples(&["switch to tab 2", "go to tab three", "switch to the second tab", "tab 4"]),
        GrammarRule::new(
            "close_tab_number",
            CloseTab,
            0.90,
            "Closes the given tab number",
            &[&close_indexed[0], &close_indexed[1]],
        )?
        .slots(&[Slot::Index])
        .examples(&["close tab 3", "close tab number two", "close the first tab"]),
        GrammarRule::new(
            "close_tab",
            CloseTab,
            0.90,
            "Closes the current tab",
            &[r"close\s+(?:this|the|current|the\s+current)?\s*tab", r"close\s+it"],
        )?
        .examples(&["close tab", "close this tab", "close current tab"]),
        GrammarRule::new(
            "find_on_page",
            Find,
            0.85,
            "Highlights text on the current page",
            &[
                r"find\s+(.+?)\s+on\s+(?:this|the)\s+page",
                r"(?:find|search)\s+(?:on\s+)?(?:this|the)\s+page\s+for\s+(.+)",
                r"find\s+on\s+page\s+(.+)",
            ],
        )?
        .slots(&[Slot::Target])
        .examples(&["find pricing on this page", "search this page for contact"]),
        GrammarRule::new(
            "search",
            Search,
            0.85,
            "Searches the web for the specified term",
            &[
                r"search\s+(?:for\s+|the\s+web\s+for\s+)?(.+)",
                r"google\s+(?:search\s+)?(?:for\s+)?(.+)",
                r"look\s+up\s+(.+)",
                r"find\s+(.+)",
                r"(?:what|who)\s+(?:is|are)\s+(.+)",
            ],
        )?
        .slots(&[Slot::Target])
        .examples(&[
            "search for wireless headphones",
            "google rust tutorials",
            "look up the weather",
            "what is a borrow checker",
        ]),
        GrammarRule::new(
            "go_back",
            Back,
            0.90,
            "Goes back to the previous page",
            &[r"(?:go|navigate)\s+back", r"back", r"previous\s+page", r"previous"],
        )?
        .examples(&["go back", "back", "previous page"]),
        GrammarRule::new(
            "go_forward",
            Forward,
            0.90,
            "Goes forward to the next page",
            &[r"(?:go|navigate)\s+forward", r"forward", r"next\s+page"],
        )?
        .examples(&["go forward", "next page"]),
        GrammarRule::new("scroll_up", Scroll, 0.85, "Scrolls up on the current page", &[&scroll_up])?
            .target("up")
            .slots(&[Slot::Data])
            .examples(&["scroll up", "page up", "scroll up a lot"]),
        GrammarRule::new(
            "scroll_down",
            Scroll,
            0.85,
            "Scrolls down on the current page",
            &[&scroll_down],
        )?
        .target("down")
        .slots(&[Slot::Data])
        .examples(&["scroll down", "page down", "scroll down a little", "scroll"]),
        GrammarRule::new(
            "scroll_top",
            Scroll,
            0.85,
            "Scrolls to the top of the page",
            &[r"(?:scroll|go|jump)\s+(?:up\s+)?to\s+(?:the\s+)?top(?:\s+of\s+(?:the\s+)?page)?", r"top\s+of\s+(?:the\s+)?page"],
        )?
        .target("top")
        .examples(&["scroll to the top", "go to the top of the page"]),
        GrammarRule::new(
            "scroll_bottom",
            Scroll,
            0.85,
            "Scrolls to the bottom of the page",
            &[r"(?:scroll|go|jump)\s+(?:down\s+)?to\s+(?:the\s+)?bottom(?:\s+of\s+(?:the\s+)?page)?", r"bottom\s+of\s+(?:the\s+)?page"],
        )?
        .target("bottom")
        .examples(&["scroll to the bottom", "go to the bottom"]),
        GrammarRule::new(
            "refresh_page",
            Refresh,
            0.90,
            "Refreshes the current page",
            &[r"(?:refresh|reload|update)(?:\s+(?:the|this))?(?:\s+page)?"],
        )?
        .examples(&["refresh", "reload page", "refresh the page"]),
        GrammarRule::new(
            "type_text",
            Type,
            0.80,
            "Types text into a field on the page",
            &[r"(?:type|enter|write)\s+(.+?)\s+(?:in|into)\s+(?:the\s+)?(.+?)(?:\s+(?:field|box|input))?"],
        )?
        .slots(&[Slot::Data, Slot::Target])
        .examples(&["type hello world into the search box", "enter john in name field"]),
        GrammarRule::new(
            "click",
            Click,
            0.80,
            "Clicks a button or link on the page",
            &[r"(?:click|press|tap|hit)\s+(?:on\s+)?(?:the\s+)?(.+?)(?:\s+(?:button|link))?"],
        )?
        .slots(&[Slot::Target])
        .examples(&["click sign in", "click on the login button", "press submit"]),
        GrammarRule::new(
            "open_website",
            Navigate,
            0.80,
            "Opens a website",
            &[&format!(r"{}\s+(?:the\s+)?(.+?)(?:\s+website)?", OPEN_VERB)],
        )?
        .slots(&[Slot::Destination])
        .examples(&["open github", "go to docs.rs", "visit the rust website"]),
    ])
}
