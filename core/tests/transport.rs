use std::time::Duration;

use raidscanner_core::http::{HttpClient, HttpTransport, ProbeRequest};
use raidscanner_core::render::{RenderError, Renderer, RendererFactory, WebDriverFactory};
use serde_json::json;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn header_pair(key: &str, value: &str) -> (String, String) {
    (key.to_string(), value.to_string())
}

async fn redirecting_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/go"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/landing"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/landing"))
        .respond_with(ResponseTemplate::new(200).set_body_string("landed"))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_no_follow_returns_redirect_and_location() {
    let server = redirecting_server().await;
    let client = HttpClient::new(None, &[]).unwrap();

    let request = ProbeRequest::get(format!("{}/go", server.uri())).follow_redirects(false);
    let response = client.get(&request).await.unwrap();

    assert_eq!(response.status, 302);
    assert_eq!(response.location(), Some("/landing"));
}

#[tokio::test]
async fn test_follow_reaches_landing_page() {
    let server = redirecting_server().await;
    let client = HttpClient::new(None, &[]).unwrap();

    let response = client.get(&ProbeRequest::get(format!("{}/go", server.uri()))).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body, "landed");
    assert!(response.location().is_none());
}

#[tokio::test]
async fn test_random_user_agent_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header_exists("user-agent"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(None, &[]).unwrap();
    let response = client.get(&ProbeRequest::get(server.uri())).await.unwrap();
    assert_eq!(response.status, 200);

    let received = server.received_requests().await.unwrap();
    let agent = received[0].headers.get("user-agent").unwrap().to_str().unwrap();
    assert!(agent.starts_with("Mozilla/5.0"), "unexpected agent {}", agent);
}

#[tokio::test]
async fn test_supplied_user_agent_wins() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("user-agent", "raid-test/1.0"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let from_defaults =
        HttpClient::new(None, &[header_pair("User-Agent", "raid-test/1.0")]).unwrap();
    assert_eq!(from_defaults.get(&ProbeRequest::get(server.uri())).await.unwrap().status, 200);

    let from_request = HttpClient::new(None, &[]).unwrap();
    let request =
        ProbeRequest::get(server.uri()).with_headers(&[header_pair("user-agent", "raid-test/1.0")]);
    assert_eq!(from_request.get(&request).await.unwrap().status, 200);
}

#[tokio::test]
async fn test_default_and_request_headers_merged() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .and(header("cookie", "s=1"))
        .and(header("x-extra", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(None, &[header_pair("Cookie", "s=1")]).unwrap();
    let request = ProbeRequest::get(format!("{}/page", server.uri()))
        .with_headers(&[header_pair("X-Extra", "1")]);
    let response = client.get(&request).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body, "ok");
}

/// A driver that hands out session `abc` and accepts the page-load timeout.
async fn driver() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": { "sessionId": "abc", "capabilities": {} }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/session/abc/timeouts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": null })))
        .mount(&server)
        .await;
    server
}

fn driver_error(status: u16, code: &str) -> ResponseTemplate {
    ResponseTemplate::new(status)
        .set_body_json(json!({ "value": { "error": code, "message": code } }))
}

async fn open_session(server: &MockServer) -> Box<dyn Renderer> {
    WebDriverFactory::new(&server.uri()).unwrap().launch().await.unwrap()
}

#[tokio::test]
async fn test_navigate_with_open_alert_succeeds() {
    let server = driver().await;
    Mock::given(method("POST"))
        .and(path("/session/abc/url"))
        .respond_with(driver_error(500, "unexpected alert open"))
        .expect(1)
        .mount(&server)
        .await;

    let mut renderer = open_session(&server).await;
    assert_eq!(renderer.navigate("http://t.test/?q=x", Duration::from_secs(5)).await, Ok(()));
}

#[tokio::test]
async fn test_navigate_timeout_maps_to_timeout() {
    let server = driver().await;
    Mock::given(method("POST"))
        .and(path("/session/abc/url"))
        .respond_with(driver_error(500, "timeout"))
        .mount(&server)
        .await;

    let mut renderer = open_session(&server).await;
    let page_load = Duration::from_secs(3);
    assert_eq!(
        renderer.navigate("http://t.test/", page_load).await,
        Err(RenderError::Timeout(page_load))
    );
}

#[tokio::test]
async fn test_navigate_other_error_is_protocol() {
    let server = driver().await;
    Mock::given(method("POST"))
        .and(path("/session/abc/url"))
        .respond_with(driver_error(400, "invalid argument"))
        .mount(&server)
        .await;

    let mut renderer = open_session(&server).await;
    let result = renderer.navigate("not a url", Duration::from_secs(3)).await;
    assert!(matches!(result, Err(RenderError::Protocol(ref m)) if m.contains("invalid argument")));
}

#[tokio::test]
async fn test_no_such_alert_means_no_dialog() {
    let server = driver().await;
    Mock::given(method("GET"))
        .and(path("/session/abc/alert/text"))
        .respond_with(driver_error(404, "no such alert"))
        .expect(1..)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/session/abc/alert/accept"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": null })))
        .expect(0)
        .mount(&server)
        .await;

    let mut renderer = open_session(&server).await;
    assert_eq!(renderer.wait_for_dialog(Duration::from_millis(250)).await, Ok(false));
}

#[tokio::test]
async fn test_dialog_seen_and_accepted() {
    let server = driver().await;
    Mock::given(method("GET"))
        .and(path("/session/abc/alert/text"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": "1" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/session/abc/alert/accept"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": null })))
        .expect(1)
        .mount(&server)
        .await;

    let mut renderer = open_session(&server).await;
    assert_eq!(renderer.wait_for_dialog(Duration::from_secs(1)).await, Ok(true));
}

#[tokio::test]
async fn test_source_read_then_session_deleted_once() {
    let server = driver().await;
    Mock::given(method("GET"))
        .and(path("/session/abc/source"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "value": "<html><b>x</b></html>" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/session/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": null })))
        .expect(1)
        .mount(&server)
        .await;

    let mut renderer = open_session(&server).await;
    assert_eq!(renderer.rendered_source().await.unwrap(), "<html><b>x</b></html>");
    assert_eq!(renderer.close().await, Ok(()));
    assert_eq!(renderer.close().await, Ok(()));
    assert_eq!(renderer.rendered_source().await, Err(RenderError::Closed));
}

#[tokio::test]
async fn test_launch_without_session_id_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/session"))
        .respond_with(driver_error(500, "session not created"))
        .mount(&server)
        .await;

    let result = WebDriverFactory::new(&server.uri()).unwrap().launch().await;
    assert!(matches!(result, Err(RenderError::Launch(ref m)) if m.contains("session not created")));
}
