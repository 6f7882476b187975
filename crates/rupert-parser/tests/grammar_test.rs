use rupert_common::protocol::{ActionKind, IntentSource, Target};
use rupert_parser::{CommandGrammar, normalize_transcript, parse};

#[test]
fn test_new_tab_with_wake_phrase() {
    let intent = parse("hey rupert open new tab");
    assert_eq!(intent.action, ActionKind::NewTab);
    assert_eq!(intent.confidence, 0.95);
    assert_eq!(intent.source, IntentSource::Grammar);
}

#[test]
fn test_open_amazon() {
    let intent = parse("hey rupert open amazon");
    assert_eq!(intent.action, ActionKind::Navigate);
    assert_eq!(intent.url.as_deref(), Some("https://amazon.com"));
    assert_eq!(intent.confidence, 0.95);
}

#[test]
fn test_search_captures_terms() {
    let intent = parse("search for wireless headphones");
    assert_eq!(intent.action, ActionKind::Search);
    assert_eq!(intent.target, Some(Target::text("wireless headphones")));
    assert_eq!(intent.confidence, 0.85);
}

#[test]
fn test_empty_and_missing_input() {
    for intent in [parse(""), parse("   "), parse(None)] {
        assert_eq!(intent.action, ActionKind::Unknown);
        assert_eq!(intent.confidence, 0.0);
    }
}

#[test]
fn test_no_match_is_unknown() {
    let intent = parse("sing me a song about crabs");
    assert!(intent.is_unknown());
    assert_eq!(intent.confidence, 0.0);
}

#[test]
fn test_indexed_tab_rules() {
    let intent = parse("close tab 3");
    assert_eq!(intent.action, ActionKind::CloseTab);
    assert_eq!(intent.target, Some(Target::Index(3)));

    let intent = parse("close this tab");
    assert_eq!(intent.action, ActionKind::CloseTab);
    assert_eq!(intent.target, None);

    let intent = parse("Switch to tab two.");
    assert_eq!(intent.action, ActionKind::SwitchTab);
    assert_eq!(intent.target, Some(Target::Index(2)));
}

#[test]
fn test_scroll_directions() {
    let cases = [
        ("scroll up", "up"),
        ("page down", "down"),
        ("scroll to the top", "top"),
        ("go to the bottom of the page", "bottom"),
    ];
    for (input, direction) in cases {
        let intent = parse(input);
        assert_eq!(intent.action, ActionKind::Scroll, "{input}");
        assert_eq!(intent.target, Some(Target::text(direction)), "{input}");
    }
}

#[test]
fn test_find_on_page_precedes_search() {
    let intent = parse("find shipping costs on this page");
    assert_eq!(intent.action, ActionKind::Find);
    assert_eq!(intent.target_text().as_deref(), Some("shipping costs"));

    let intent = parse("find shipping costs");
    assert_eq!(intent.action, ActionKind::Search);
}

#[test]
fn test_generic_navigation_is_last() {
    let intent = parse("open github");
    assert_eq!(intent.action, ActionKind::Navigate);
    assert_eq!(intent.url.as_deref(), Some("https://github.com"));
    assert_eq!(intent.confidence, 0.8);

    let intent = parse("go to docs.rs");
    assert_eq!(intent.url.as_deref(), Some("https://docs.rs"));

    let intent = parse("visit the rust website");
    assert_eq!(intent.action, ActionKind::Navigate);
    assert_eq!(intent.url, None);
    assert_eq!(intent.target_text().as_deref(), Some("rust"));
}

#[test]
fn test_type_and_click() {
    let intent = parse("type hello world into the search box");
    assert_eq!(intent.action, ActionKind::Type);
    assert_eq!(intent.data.as_deref(), Some("hello world"));
    assert_eq!(intent.target_text().as_deref(), Some("search"));

    let intent = parse("click on the login button");
    assert_eq!(intent.action, ActionKind::Click);
    assert_eq!(intent.target_text().as_deref(), Some("login"));
}

#[test]
fn test_every_example_hits_its_own_rule() {
    let grammar = CommandGrammar::builtin();
    for rule in grammar.rules() {
        assert!(!rule.examples.is_empty(), "rule {} has no examples", rule.name);
        for example in &rule.examples {
            let (matched, intent) = grammar
                .match_rule(example)
                .unwrap_or_else(|| panic!("'{}' matched nothing", example));
            assert_eq!(matched.name, rule.name, "'{}'", example);
            assert_eq!(intent.action, rule.action, "'{}'", example);
            assert_eq!(intent.confidence, rule.confidence, "'{}'", example);
        }
    }
}

#[test]
fn test_parse_is_idempotent() {
    let inputs = [
        "Hey Rupert, open new tab!",
        "search for rust lifetimes",
        "close the first tab",
        "nothing useful here",
    ];
    for input in inputs {
        assert_eq!(parse(input), parse(input));
        assert_eq!(parse(normalize_transcript(input).as_str()), parse(input));
    }
}

#[test]
fn test_available_commands_lists_rules() {
    let grammar = CommandGrammar::builtin();
    let commands = grammar.available_commands();
    assert_eq!(commands.len(), grammar.rules().len());
    assert!(commands.iter().any(|c| c.name == "new_tab"));
    assert!(commands.iter().all(|c| !c.description.is_empty()));
}
