mod common;

use common::MockBrowser;
use rupert_common::protocol::{
    ActionKind, Intent, IntentSource, PageAction, ScrollAmount, ScrollDirection, Target,
};
use rupert_engine::dispatcher::{CAPABILITIES, CommandDispatcher, DispatchConfig};
use rupert_parser::parse;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Notify;

fn dispatcher() -> CommandDispatcher {
    CommandDispatcher::new(DispatchConfig::default())
}

#[tokio::test]
async fn test_wake_phrase_then_new_tab() {
    let intent = parse("hey rupert open new tab");
    assert_eq!(intent.action, ActionKind::NewTab);
    assert_eq!(intent.confidence, 0.95);

    let mut browser = MockBrowser::new();
    let result = dispatcher().dispatch(&mut browser, &intent).await;
    assert!(result.success, "{}", result.message);
    let tabs = browser.tabs();
    assert_eq!(tabs.len(), 1);
    assert_eq!(tabs[0].url, "chrome://newtab/");
    assert!(tabs[0].active);
    assert_eq!(result.data["action"], json!("new_tab"));
}

#[tokio::test]
async fn test_open_amazon_opens_new_tab() {
    let intent = parse("hey rupert open amazon");
    assert_eq!(intent.action, ActionKind::Navigate);
    assert_eq!(intent.url.as_deref(), Some("https://amazon.com"));
    assert_eq!(intent.confidence, 0.95);

    let mut browser = MockBrowser::with_tabs(&[("Inbox", "https://mail.example.com")], 1);
    let result = dispatcher().dispatch(&mut browser, &intent).await;
    assert!(result.success);
    assert_eq!(browser.mutations(), vec!["create_tab https://amazon.com"]);
    assert_eq!(result.data["url"], json!("https://amazon.com"));
}

#[tokio::test]
async fn test_search_opens_google_results() {
    let intent = parse("search for wireless headphones");
    assert_eq!(intent.action, ActionKind::Search);
    assert_eq!(intent.target, Some(Target::text("wireless headphones")));

    let mut browser = MockBrowser::new();
    let result = dispatcher().dispatch(&mut browser, &intent).await;
    assert!(result.success);
    assert_eq!(
        browser.mutations(),
        vec!["create_tab https://www.google.com/search?q=wireless+headphones"]
    );
    assert_eq!(result.data["query"], json!("wireless headphones"));
}

#[tokio::test]
async fn test_search_follows_active_site() {
    let mut browser =
        MockBrowser::with_tabs(&[("Amazon.com", "https://www.amazon.com/gp/cart")], 1);
    let result = dispatcher()
        .dispatch(&mut browser, &parse("search for usb hub"))
        .await;
    assert!(result.success);
    assert_eq!(
        browser.mutations(),
        vec!["create_tab https://www.amazon.com/s?k=usb+hub"]
    );
}

#[tokio::test]
async fn test_navigate_without_address_searches() {
    let intent = Intent::new(ActionKind::Navigate, 0.9, "", IntentSource::Llm)
        .with_target(Target::text("cheap flights"));
    let mut browser = MockBrowser::new();
    let result = dispatcher().dispatch(&mut browser, &intent).await;
    assert!(result.success);
    assert_eq!(
        browser.mutations(),
        vec!["create_tab https://www.google.com/search?q=cheap+flights"]
    );
}

#[tokio::test]
async fn test_navigate_without_destination() {
    let intent = Intent::new(ActionKind::Navigate, 0.9, "", IntentSource::Llm);
    let mut browser = MockBrowser::new();
    let result = dispatcher().dispatch(&mut browser, &intent).await;
    assert!(!result.success);
    assert_eq!(result.message, "No URL specified for navigation");
}

#[tokio::test]
async fn test_below_threshold_never_touches_browser() {
    let mut browser = MockBrowser::new();
    let intent = Intent::new(ActionKind::NewTab, 0.4, "", IntentSource::Grammar);
    let result = dispatcher().dispatch(&mut browser, &intent).await;
    assert!(!result.success);
    assert!(result.message.contains("40%"), "{}", result.message);
    assert!(browser.calls().is_empty());
}

#[tokio::test]
async fn test_thresholds_depend_on_source() {
    let d = dispatcher();

    let mut browser = MockBrowser::new();
    let llm = Intent::new(ActionKind::NewTab, 0.55, "", IntentSource::Llm);
    assert!(!d.dispatch(&mut browser, &llm).await.success);
    assert!(browser.calls().is_empty());

    let grammar = Intent::new(ActionKind::NewTab, 0.55, "", IntentSource::Grammar);
    assert!(d.dispatch(&mut browser, &grammar).await.success);
}

#[tokio::test]
async fn test_unknown_lists_capabilities() {
    let mut browser = MockBrowser::new();
    let result = dispatcher()
        .dispatch(&mut browser, &parse("sing me a song"))
        .await;
    assert!(!result.success);
    assert!(result.message.contains(CAPABILITIES));
    assert!(browser.calls().is_empty());
}

#[tokio::test]
async fn test_close_numbered_tab() {
    let mut browser = MockBrowser::with_tabs(
        &[
            ("Mail", "https://mail.example.com"),
            ("Docs", "https://docs.example.com"),
            ("News", "https://news.example.com"),
        ],
        1,
    );
    let result = dispatcher()
        .dispatch(&mut browser, &parse("close tab 2"))
        .await;
    assert!(result.success);
    assert_eq!(result.message, "Closed tab 2: Docs");
    let titles: Vec<String> = browser.tabs().into_iter().map(|t| t.title).collect();
    assert_eq!(titles, vec!["Mail", "News"]);

    let missing = dispatcher()
        .dispatch(&mut browser, &parse("close tab 9"))
        .await;
    assert!(!missing.success);
    assert_eq!(missing.message, "Tab 9 not found");
}

#[tokio::test]
async fn test_close_current_tab() {
    let mut browser = MockBrowser::with_tabs(
        &[("Mail", "https://mail.example.com"), ("Docs", "https://docs.example.com")],
        2,
    );
    let result = dispatcher()
        .dispatch(&mut browser, &parse("close this tab"))
        .await;
    assert!(result.success, "{}", result.message);
    assert_eq!(result.message, "Closed current tab: Docs");
    assert_eq!(browser.tabs().len(), 1);
}

#[tokio::test]
async fn test_switch_tab() {
    let mut browser = MockBrowser::with_tabs(
        &[("Mail", "https://mail.example.com"), ("Docs", "https://docs.example.com")],
        2,
    );
    let result = dispatcher()
        .dispatch(&mut browser, &parse("switch to tab one"))
        .await;
    assert!(result.success);
    assert_eq!(result.message, "Switched to tab 1: Mail");
    assert!(browser.tabs()[0].active);
    assert!(!browser.tabs()[1].active);
}

#[tokio::test]
async fn test_switch_tab_requires_index() {
    let mut browser = MockBrowser::with_tabs(&[("Mail", "https://mail.example.com")], 1);
    let intent = Intent::new(ActionKind::SwitchTab, 0.9, "", IntentSource::Llm)
        .with_target(Target::text("the mail one"));
    let result = dispatcher().dispatch(&mut browser, &intent).await;
    assert!(!result.success);
    assert_eq!(result.message, "Invalid tab number");
}

#[tokio::test]
async fn test_scroll_runs_page_action() {
    let mut browser = MockBrowser::with_tabs(&[("Docs", "https://docs.example.com")], 1);
    let result = dispatcher()
        .dispatch(&mut browser, &parse("scroll down"))
        .await;
    assert!(result.success);
    let actions = browser.log.lock().unwrap().page_actions.clone();
    assert_eq!(
        actions,
        vec![PageAction::Scroll {
            direction: ScrollDirection::Down,
            amount: ScrollAmount::Normal,
        }]
    );
}

#[tokio::test]
async fn test_page_action_without_active_tab() {
    let mut browser = MockBrowser::new();
    let result = dispatcher()
        .dispatch(&mut browser, &parse("refresh the page"))
        .await;
    assert!(!result.success);
    assert_eq!(result.message, "No active tab found");
}

#[tokio::test]
async fn test_browser_error_becomes_failure() {
    let mut browser = MockBrowser::with_tabs(&[("Docs", "https://docs.example.com")], 1);
    let intent = Intent::new(ActionKind::Click, 0.9, "", IntentSource::Llm)
        .with_target(Target::text("missing"));
    let result = dispatcher().dispatch(&mut browser, &intent).await;
    assert!(!result.success);
    assert_eq!(
        result.message,
        "Error executing click: Could not find element: missing"
    );
    assert_eq!(result.data["error_code"], json!("ELEMENT_NOT_FOUND"));
}

#[tokio::test]
async fn test_history_navigation() {
    let mut browser = MockBrowser::with_tabs(&[("Docs", "https://docs.example.com")], 1);
    let d = dispatcher();
    assert!(d.dispatch(&mut browser, &parse("go back")).await.success);
    assert!(d.dispatch(&mut browser, &parse("go forward")).await.success);
    assert_eq!(browser.mutations(), vec!["go_back 100", "go_forward 100"]);
}

#[tokio::test]
async fn test_busy_dispatch_is_rejected() {
    let d = dispatcher();
    let gate = Arc::new(Notify::new());
    let mut slow = MockBrowser {
        gate: Some(Arc::clone(&gate)),
        ..MockBrowser::new()
    };
    let mut other = MockBrowser::new();
    let intent = parse("open new tab");

    let (first, second, _) = tokio::join!(
        d.dispatch(&mut slow, &intent),
        d.dispatch(&mut other, &intent),
        async {
            tokio::task::yield_now().await;
            gate.notify_one();
        }
    );

    assert!(first.success);
    assert!(!second.success);
    assert_eq!(second.message, "Another command is still running");
    assert!(other.calls().is_empty());
    assert!(!d.is_busy());
}
