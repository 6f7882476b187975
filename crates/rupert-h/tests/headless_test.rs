use rupert_common::protocol::{PageAction, ScrollAmount, ScrollDirection, TabQuery};
use rupert_engine::backend::{Browser, BrowserError, active_tab};
use rupert_engine::dispatcher::{CommandDispatcher, DispatchConfig};
use rupert_h::HeadlessBrowser;
use serial_test::serial;

const PAGE: &str = "data:text/html,<html><head><title>Test Page</title></head><body>\
<h1>Hello World</h1><input placeholder='Search products'>\
<button onclick=\"document.title='clicked'\">Sign In</button>\
<div style='height:4000px'>pricing details</div></body></html>";

/// Launches Chromium, or returns `None` when the machine has none.
async fn launch() -> Option<HeadlessBrowser> {
    tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::INFO)
        .try_init()
        .ok();

    let mut browser = HeadlessBrowser::new();
    match browser.launch().await {
        Ok(()) => Some(browser),
        Err(e) => {
            eprintln!("Failed to launch browser (is Chromium installed?): {}", e);
            None
        }
    }
}

#[tokio::test]
#[serial]
async fn test_tab_lifecycle() {
    let Some(mut browser) = launch().await else {
        return;
    };

    let tabs = browser.query_tabs(TabQuery::All).await.expect("query failed");
    assert_eq!(tabs.len(), 1);
    let first = tabs[0].id;

    let created = browser
        .create_tab(Some(PAGE), true)
        .await
        .expect("create_tab failed");
    assert_eq!(created.index, 2);
    assert!(created.active);

    let active = active_tab(&mut browser).await.expect("no active tab");
    assert_eq!(active.id, created.id);
    assert_eq!(active.title, "Test Page");

    browser.activate_tab(first).await.expect("activate failed");
    assert_eq!(active_tab(&mut browser).await.unwrap().id, first);

    browser.close_tab(created.id).await.expect("close failed");
    assert_eq!(
        browser.close_tab(created.id).await,
        Err(BrowserError::TabNotFound(created.id))
    );
    assert_eq!(browser.query_tabs(TabQuery::All).await.unwrap().len(), 1);

    browser.close().await.expect("Close failed");
}

#[tokio::test]
#[serial]
async fn test_page_actions() {
    let Some(mut browser) = launch().await else {
        return;
    };
    let tab = browser.create_tab(Some(PAGE), true).await.unwrap();

    let scrolled = browser
        .run_page_action(
            tab.id,
            PageAction::Scroll {
                direction: ScrollDirection::Down,
                amount: ScrollAmount::Small,
            },
        )
        .await
        .expect("scroll failed");
    assert_eq!(scrolled["success"], true);

    let typed = browser
        .run_page_action(
            tab.id,
            PageAction::Type {
                target: "search".into(),
                text: "usb hub".into(),
            },
        )
        .await
        .expect("type failed");
    assert_eq!(typed["elementType"], "INPUT");

    let found = browser
        .run_page_action(tab.id, PageAction::Find { text: "pricing".into() })
        .await
        .expect("find failed");
    assert_eq!(found["count"], 1);

    browser
        .run_page_action(tab.id, PageAction::Click { target: "sign in".into() })
        .await
        .expect("click failed");
    let tabs = browser.query_tabs(TabQuery::Active).await.unwrap();
    assert_eq!(tabs[0].title, "clicked");

    let missing = browser
        .run_page_action(tab.id, PageAction::Click { target: "checkout".into() })
        .await;
    assert_eq!(missing, Err(BrowserError::ElementNotFound("checkout".into())));

    browser.close().await.expect("Close failed");
}

#[tokio::test]
#[serial]
async fn test_dispatch_against_chromium() {
    let Some(mut browser) = launch().await else {
        return;
    };
    let dispatcher = CommandDispatcher::new(DispatchConfig::default());

    let result = dispatcher
        .dispatch(&mut browser, &rupert_parser::parse("open new tab"))
        .await;
    assert!(result.success, "{}", result.message);
    assert_eq!(browser.query_tabs(TabQuery::All).await.unwrap().len(), 2);

    let result = dispatcher
        .dispatch(&mut browser, &rupert_parser::parse("close this tab"))
        .await;
    assert!(result.success, "{}", result.message);
    assert_eq!(browser.query_tabs(TabQuery::All).await.unwrap().len(), 1);

    browser.close().await.expect("Close failed");
}
