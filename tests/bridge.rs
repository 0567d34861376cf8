use builder_e2e::auth::{Bridge, LoginOutcome};
use builder_e2e::testing::{init_tracing, RecordedAction, ScriptedElement, ScriptedPage};
use builder_e2e::{Config, FrameScope, HarnessError};

const APP_FRAME: &str = r#"iframe[name="app-iframe"]"#;

fn config() -> Config {
    Config::from_lookup(|key| match key {
        "BASE_URL" => Some("https://rc.pagefly.io".to_string()),
        "STORE" => Some("demo-store".to_string()),
        _ => None,
    })
    .unwrap()
}

fn fills_and_clicks(page: &ScriptedPage) -> usize {
    page.actions()
        .iter()
        .filter(|a| matches!(a, RecordedAction::Fill { .. } | RecordedAction::Click { .. }))
        .count()
}

#[tokio::test]
async fn login_form_is_submitted_once() {
    init_tracing();
    let page = ScriptedPage::new("about:blank");
    page.on_goto("rc.pagefly.io", |s| {
        s.set(r#"input[name="store"]"#, ScriptedElement::visible());
        s.set(r#"input[type="password"]"#, ScriptedElement::visible());
        s.set(r#"button[type="submit"]"#, ScriptedElement::visible());
    })
    .on_click(r#"button[type="submit"]"#, |s| {
        s.add_frame(APP_FRAME);
    });
    let config = config();
    let bridge = Bridge::new(&page, &config);

    let frame = bridge.open_app().await.unwrap();

    assert_eq!(frame, FrameScope::top().child(APP_FRAME));
    let fills = page.fills();
    assert_eq!(fills.len(), 2);
    assert_eq!(fills[0].1, "demo-store");
    assert_eq!(fills[1].1, "welcome2PF");
    assert_eq!(page.clicks().len(), 1);
}

#[tokio::test]
async fn no_login_form_means_no_input() {
    init_tracing();
    let page = ScriptedPage::new("about:blank");
    let config = config();
    let bridge = Bridge::new(&page, &config);

    let frame = bridge.open_app().await.unwrap();
    assert!(frame.is_top());
    assert_eq!(bridge.login().await.unwrap(), LoginOutcome::NoFormDetected);
    assert_eq!(fills_and_clicks(&page), 0);
    assert_eq!(page.visits(), vec!["https://rc.pagefly.io".to_string()]);
}

#[tokio::test]
async fn listing_markers_mean_already_logged_in() {
    init_tracing();
    let page = ScriptedPage::new("https://rc.pagefly.io/pages");
    page.set_element(r#"button:has-text("Create page")"#, ScriptedElement::visible())
        .set_element(r#"input[name="email"]"#, ScriptedElement::visible());
    let config = config();
    let bridge = Bridge::new(&page, &config);

    assert_eq!(bridge.login().await.unwrap(), LoginOutcome::AlreadyAuthenticated);
    assert_eq!(fills_and_clicks(&page), 0);
}

#[tokio::test]
async fn missing_frame_falls_back_to_top_level() {
    init_tracing();
    let page = ScriptedPage::new("about:blank");
    let config = config();
    let bridge = Bridge::new(&page, &config);

    assert!(bridge.open_page_listing().await.unwrap().is_top());
    assert_eq!(page.visits(), vec!["https://rc.pagefly.io/pages".to_string()]);

    page.add_frame(APP_FRAME);
    let frame = bridge.open_trash().await.unwrap();
    assert_eq!(frame.depth(), 1);
    assert!(bridge.resolve_editor_frame().await.is_top());
}

#[tokio::test]
async fn install_page_fills_visible_inputs_by_guess() {
    init_tracing();
    let page = ScriptedPage::new("about:blank");
    page.on_goto("rc.pagefly.io", |s| {
        s.url = "https://rc.pagefly.io/install".to_string();
        s.set(r#"button:has-text("Login")"#, ScriptedElement::visible().disabled());
        s.set(
            r#"input[type="text"]"#,
            ScriptedElement::visible().with_attr("placeholder", "Your Store name"),
        );
        s.set(
            r#"input[type="password"]"#,
            ScriptedElement::visible().with_attr("type", "password"),
        );
        s.set("input:not([type])", ScriptedElement::hidden());
    });
    let config = config();
    let bridge = Bridge::new(&page, &config);

    let frame = bridge.open_app().await.unwrap();

    assert!(frame.is_top());
    let values: Vec<String> = page.fills().into_iter().map(|(_, v)| v).collect();
    assert_eq!(values, vec!["demo-store".to_string(), "welcome2PF".to_string()]);
    // the button never became enabled, so nothing was clicked
    assert!(page.clicks().is_empty());
}

#[tokio::test]
async fn install_page_login_leads_to_form_submission() {
    init_tracing();
    let page = ScriptedPage::new("https://rc.pagefly.io/install");
    page.set_element(r#"button:has-text("Login")"#, ScriptedElement::visible())
        .on_click(r#"button:has-text("Login")"#, |s| {
            s.set(r#"input[name="email"]"#, ScriptedElement::visible());
            s.set(r#"input[name="password"]"#, ScriptedElement::visible());
        });
    let config = config();
    let bridge = Bridge::new(&page, &config);

    let outcome = bridge.login().await.unwrap();

    assert_eq!(outcome, LoginOutcome::InstallHeuristic { submitted: true });
    assert_eq!(page.fills().len(), 2);
    let clicks = page.clicks();
    assert_eq!(clicks.len(), 2);
    assert!(clicks[1].contains(r#"button[type="submit"]"#));
}

#[tokio::test]
async fn navigation_timeout_is_logged_and_the_app_still_opens() {
    init_tracing();
    let page = ScriptedPage::new("about:blank");
    page.fail_goto_with(|url| HarnessError::Timeout(format!("navigating to {}", url)))
        .on_goto("rc.pagefly.io", |s| {
            s.set(r#"input[name="store"]"#, ScriptedElement::visible());
            s.set(r#"input[type="password"]"#, ScriptedElement::visible());
            s.set(r#"button[type="submit"]"#, ScriptedElement::visible());
        });
    let config = config();
    let bridge = Bridge::new(&page, &config);

    let frame = bridge.open_app().await.unwrap();

    assert_eq!(frame, FrameScope::top());
    assert_eq!(page.visits(), vec!["https://rc.pagefly.io".to_string()]);
    // the page behind the slow navigation still got its login
    assert_eq!(page.fills().len(), 2);
    assert_eq!(page.clicks().len(), 1);
}

#[tokio::test]
async fn navigation_failure_other_than_timeout_propagates() {
    init_tracing();
    let page = ScriptedPage::new("about:blank");
    page.fail_goto_with(|url| {
        HarnessError::NavigationFailed(format!("{}: net::ERR_NAME_NOT_RESOLVED", url))
    });
    let config = config();
    let bridge = Bridge::new(&page, &config);

    let err = bridge.open_app().await.unwrap_err();

    assert!(matches!(err, HarnessError::NavigationFailed(_)));
    assert!(err.to_string().contains("ERR_NAME_NOT_RESOLVED"));
    assert_eq!(fills_and_clicks(&page), 0);

    let err = bridge.open_page_listing().await.unwrap_err();
    assert!(matches!(err, HarnessError::NavigationFailed(_)));
}
