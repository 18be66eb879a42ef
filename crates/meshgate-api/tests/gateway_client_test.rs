// Integration tests for `GatewayClient` using wiremock.
#![allow(clippy::unwrap_used)]

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use meshgate_api::{Error, GatewayClient};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, GatewayClient) {
    let server = MockServer::start().await;
    let base = Url::parse(&format!("{}/", server.uri())).unwrap();
    let client = GatewayClient::with_client(reqwest::Client::new(), base);
    (server, client)
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_operate_posts_swcmd_and_accepts_ok() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/operate"))
        .and(body_json(json!({
            "type": "swcmd",
            "data": [{"addr": ["AA:BB"], "nodedata": {"cmdtype": "operate", "subid": 18, "cmd": 1}}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    assert!(client.operate("AA:BB", 18, 1).await.unwrap());
}

#[tokio::test]
async fn test_request_status_broadcasts() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/operate"))
        .and(body_json(json!({
            "type": "swcmd",
            "data": [{"addr": ["ffffffffffff"], "nodedata": {"cmdtype": "getstatus"}}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    assert!(client.request_status().await.unwrap());
}

#[tokio::test]
async fn test_success_body_is_compared_strictly() {
    for body in ["OK", "ok\n", " ok", "fail", ""] {
        let (server, client) = setup().await;
        Mock::given(method("POST"))
            .and(path("/operate"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        assert!(
            !client.operate("AA:BB", 17, 0).await.unwrap(),
            "body {body:?} must not count as success"
        );
    }
}

#[tokio::test]
async fn test_server_error_is_rejection_not_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/operate"))
        .respond_with(ResponseTemplate::new(500).set_body_string("busy"))
        .mount(&server)
        .await;

    assert!(!client.request_status().await.unwrap());
}

#[tokio::test]
async fn test_unreachable_gateway_is_transport_error() {
    // Grab a free port, then release it so nothing is listening.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let base = Url::parse(&format!("http://127.0.0.1:{port}/")).unwrap();

    let client = GatewayClient::with_client(reqwest::Client::new(), base);
    let err = client.request_status().await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)), "got {err:?}");
    assert!(err.is_transient());
}
