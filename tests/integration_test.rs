//! Integration tests for the magento-soap crate.
//!
//! These tests drive the public client end-to-end against a scripted
//! in-memory server: login, session injection, fault handling and decoding.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use magento_soap::catalog::{
    CatalogProductEntity, CatalogProductInfoRequest, CatalogProductListRequest,
    CatalogProductListResponse, Filters,
};
use magento_soap::session::{LoginRequest, LoginResponse};
use magento_soap::transport::{HttpRequest, HttpResponse, Transport};
use magento_soap::{Client, ClientConfig, Envelope, ErrorResponse, Session, SoapError, SoapResult};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Helper: scripted server
// ============================================================================

/// Answers `login` with the next queued token (or an "Access denied" fault
/// once the queue is empty) and every other action with a canned reply.
#[derive(Default)]
struct ScriptedServer {
    tokens: Mutex<VecDeque<String>>,
    replies: Mutex<HashMap<String, HttpResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
    login_delay: Duration,
    action_delay: Duration,
}

impl ScriptedServer {
    fn new(tokens: &[&str]) -> Self {
        Self {
            tokens: Mutex::new(tokens.iter().map(|t| t.to_string()).collect()),
            ..Default::default()
        }
    }

    fn reply(self, action: &str, response: HttpResponse) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(action.to_string(), response);
        self
    }

    fn requests_for(&self, action: &str) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.action == action)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedServer {
    async fn post(&self, request: &HttpRequest) -> SoapResult<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());

        if request.action == "login" {
            tokio::time::sleep(self.login_delay).await;
            let token = self.tokens.lock().unwrap().pop_front();
            return Ok(match token {
                Some(token) => xml_response(&encode(LoginResponse {
                    login_return: token,
                })),
                None => fault_response("2", "Access denied"),
            });
        }

        tokio::time::sleep(self.action_delay).await;
        let reply = self.replies.lock().unwrap().get(&request.action).cloned();
        reply.ok_or_else(|| SoapError::Transport(format!("no reply for {}", request.action)))
    }
}

fn encode<P: magento_soap::Payload>(payload: P) -> String {
    String::from_utf8(Envelope::wrap(payload).encode().unwrap()).unwrap()
}

fn xml_response(body: &str) -> HttpResponse {
    HttpResponse {
        status: 200,
        content_type: Some("text/xml; charset=utf-8".to_string()),
        body: Bytes::from(body.to_string()),
    }
}

fn fault_response(code: &str, message: &str) -> HttpResponse {
    xml_response(&ErrorResponse::new(code, message).to_xml())
}

fn products() -> CatalogProductListResponse {
    CatalogProductListResponse {
        store_view: vec![CatalogProductEntity {
            product_id: 16,
            sku: "n2610".to_string(),
            name: "Nokia 2610 Phone".to_string(),
            set: "38".to_string(),
            kind: "simple".to_string(),
            category_ids: vec![4],
            website_ids: vec![1],
        }],
    }
}

fn config() -> ClientConfig {
    ClientConfig::new("http://shop.example.com/api/soap/", "user", "secret")
}

fn client(server: &Arc<ScriptedServer>) -> Client {
    Client::with_transport(config(), server.clone()).unwrap()
}

fn sent_session_token(request: &HttpRequest) -> String {
    let envelope = Envelope::<CatalogProductListRequest>::decode(&request.body).unwrap();
    envelope
        .body
        .session_id
        .map(|id| id.token().to_string())
        .unwrap_or_default()
}

// ============================================================================
// End-to-end scenarios
// ============================================================================

#[tokio::test]
async fn test_e2e_login_then_fault() {
    let server = Arc::new(
        ScriptedServer::new(&["T1"])
            .reply("catalogProductList", fault_response("1", "Access denied")),
    );
    let client = client(&server);

    let err = client
        .call(CatalogProductListRequest::new())
        .await
        .unwrap_err();

    match err {
        SoapError::Fault(ref fault) => {
            assert_eq!(fault.message, "Access denied");
            assert_eq!(fault.code, "1");
            assert_eq!(fault.http_status, 200);
        }
        other => panic!("expected a fault, got {:?}", other),
    }

    let logins = server.requests_for("login");
    assert_eq!(logins.len(), 1);
    let login = Envelope::<LoginRequest>::decode(&logins[0].body).unwrap().body;
    assert_eq!(login.username.expose(), "user");
    assert_eq!(login.api_key.expose(), "secret");
    let login_xml = String::from_utf8(logins[0].body.to_vec()).unwrap();
    assert!(login_xml.contains("<apiKey><![CDATA[secret]]></apiKey>"));

    let calls = server.requests_for("catalogProductList");
    assert_eq!(calls.len(), 1);
    assert_eq!(sent_session_token(&calls[0]), "T1");
}

#[tokio::test]
async fn test_e2e_list_products() {
    let server = Arc::new(
        ScriptedServer::new(&["T1"])
            .reply("catalogProductList", xml_response(&encode(products()))),
    );
    let client = client(&server);

    let request = CatalogProductListRequest::new()
        .with_filters(Filters::default().with_complex_filter("sku", "like", "n26%"));
    let listed = client.catalog_product_list(request).await.unwrap();
    assert_eq!(listed, products().store_view);

    // Second call reuses the cached session.
    client
        .catalog_product_list(CatalogProductListRequest::new())
        .await
        .unwrap();
    assert_eq!(server.requests_for("login").len(), 1);
    assert_eq!(client.sessions().login_count(), 1);

    let calls = server.requests_for("catalogProductList");
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| sent_session_token(c) == "T1"));
}

#[tokio::test]
async fn test_e2e_request_headers() {
    let server = Arc::new(
        ScriptedServer::new(&["T1"])
            .reply("catalogProductList", xml_response(&encode(products()))),
    );
    let client = client(&server);
    client.call(CatalogProductListRequest::new()).await.unwrap();

    let call = &server.requests_for("catalogProductList")[0];
    assert_eq!(call.url, "http://shop.example.com/api/soap/");
    assert_eq!(call.headers["content-type"], "text/xml; charset=utf-8");
    assert_eq!(call.headers["accept"], "text/xml");
    assert_eq!(call.headers["soapaction"], "urn:Magento#catalogProductList");
    assert!(call.headers.contains_key("user-agent"));

    let body = String::from_utf8(call.body.to_vec()).unwrap();
    assert!(body.contains(r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance""#));
    assert!(body.contains(r#"xmlns:urn="urn:Magento""#));
}

// ============================================================================
// Session lifecycle
// ============================================================================

#[tokio::test]
async fn test_expired_session_is_renewed() {
    let server = Arc::new(
        ScriptedServer::new(&["T1"])
            .reply("catalogProductList", xml_response(&encode(products()))),
    );
    let client = client(&server);
    let stale = Session::new(
        "T0",
        Utc::now() - chrono::Duration::hours(2),
        chrono::Duration::hours(1),
    )
    .unwrap();
    client.sessions().restore(stale).await;

    client.call(CatalogProductListRequest::new()).await.unwrap();

    assert_eq!(server.requests_for("login").len(), 1);
    let calls = server.requests_for("catalogProductList");
    assert_eq!(sent_session_token(&calls[0]), "T1");
    assert_eq!(client.sessions().current().await.unwrap().token(), "T1");
}

#[tokio::test]
async fn test_concurrent_calls_share_one_login() {
    let server = Arc::new(ScriptedServer {
        login_delay: Duration::from_millis(50),
        ..ScriptedServer::new(&["T1", "T2"])
    }
    .reply("catalogProductList", xml_response(&encode(products()))));
    let client = Arc::new(client(&server));
    let stale = Session::new(
        "T0",
        Utc::now() - chrono::Duration::hours(2),
        chrono::Duration::hours(1),
    )
    .unwrap();
    client.sessions().restore(stale).await;

    let a = tokio::spawn({
        let client = client.clone();
        async move { client.call(CatalogProductListRequest::new()).await }
    });
    let b = tokio::spawn({
        let client = client.clone();
        async move { client.call(CatalogProductListRequest::new()).await }
    });
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    assert_eq!(server.requests_for("login").len(), 1);
    let calls = server.requests_for("catalogProductList");
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| sent_session_token(c) == "T1"));
}

#[tokio::test]
async fn test_login_failure_is_returned_not_retried() {
    let server = Arc::new(
        ScriptedServer::new(&[])
            .reply("catalogProductList", xml_response(&encode(products()))),
    );
    let client = client(&server);

    let err = client
        .call(CatalogProductListRequest::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SoapError::Login(_)));
    assert_eq!(err.fault().unwrap().message, "Access denied");

    assert_eq!(server.requests_for("login").len(), 1);
    assert!(server.requests_for("catalogProductList").is_empty());
    assert!(client.sessions().current().await.is_none());
}

#[tokio::test]
async fn test_explicit_login_replaces_session() {
    let server = Arc::new(ScriptedServer::new(&["T1", "T2"]));
    let client = client(&server);

    assert_eq!(client.session().await.unwrap().token(), "T1");
    assert_eq!(client.session().await.unwrap().token(), "T1");

    let session = client.login().await.unwrap();
    assert_eq!(session.token(), "T2");
    assert_eq!(
        session.expires_at() - session.issued_at(),
        chrono::Duration::seconds(3600)
    );
    assert_eq!(server.requests_for("login").len(), 2);
}

// ============================================================================
// Response classification through the client
// ============================================================================

#[tokio::test]
async fn test_empty_body_is_fault() {
    let server = Arc::new(
        ScriptedServer::new(&["T1"]).reply("catalogProductList", xml_response("")),
    );
    let err = client(&server)
        .call(CatalogProductListRequest::new())
        .await
        .unwrap_err();
    let fault = err.fault().unwrap();
    assert!(err.is_fault());
    assert!(fault.message.is_empty());
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let truncated = r#"<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/"><SOAP-ENV:Body><ns1:catalogProductListResponse>"#;
    let server = Arc::new(
        ScriptedServer::new(&["T1"]).reply("catalogProductList", xml_response(truncated)),
    );
    let err = client(&server)
        .call(CatalogProductListRequest::new())
        .await
        .unwrap_err();
    assert!(err.is_decode(), "expected decode error, got {:?}", err);
}

#[tokio::test]
async fn test_wrong_payload_is_decode_error() {
    let wrong = encode(LoginResponse {
        login_return: "T9".to_string(),
    });
    let server = Arc::new(
        ScriptedServer::new(&["T1"]).reply("catalogProductList", xml_response(&wrong)),
    );
    let err = client(&server)
        .call(CatalogProductListRequest::new())
        .await
        .unwrap_err();
    assert!(err.is_decode());
    assert!(err.to_string().contains("unexpected body shape"));
}

#[tokio::test]
async fn test_content_type_mismatch_still_decodes() {
    let mut reply = xml_response(&encode(products()));
    reply.content_type = Some("application/soap+xml; charset=utf-8".to_string());
    let server = Arc::new(ScriptedServer::new(&["T1"]).reply("catalogProductList", reply));

    let listed = client(&server)
        .catalog_product_list(CatalogProductListRequest::new())
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn test_transport_error_is_returned() {
    let server = Arc::new(ScriptedServer::new(&["T1"]));
    let err = client(&server)
        .call(CatalogProductInfoRequest::new("16"))
        .await
        .unwrap_err();
    assert!(matches!(err, SoapError::Transport(_)));
    assert_eq!(server.requests_for("catalogProductInfo").len(), 1);
}

// ============================================================================
// Deadlines and hooks
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_timeout_keeps_session() {
    let server = Arc::new(ScriptedServer {
        action_delay: Duration::from_secs(60),
        ..ScriptedServer::new(&["T1"])
    }
    .reply("catalogProductList", xml_response(&encode(products()))));
    let client = client(&server);

    let err = client
        .call(CatalogProductListRequest::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SoapError::Timeout(_)));
    assert_eq!(client.sessions().current().await.unwrap().token(), "T1");
}

#[tokio::test(start_paused = true)]
async fn test_login_timeout_caches_nothing() {
    let server = Arc::new(ScriptedServer {
        login_delay: Duration::from_secs(60),
        ..ScriptedServer::new(&["T1"])
    });
    let client = client(&server);

    let err = client.session().await.unwrap_err();
    match err {
        SoapError::Login(inner) => assert!(matches!(*inner, SoapError::Timeout(_))),
        other => panic!("expected login failure, got {:?}", other),
    }
    assert!(client.sessions().current().await.is_none());
}

#[tokio::test]
async fn test_request_completion_hook() {
    let server = Arc::new(
        ScriptedServer::new(&["T1"])
            .reply("catalogProductList", xml_response(&encode(products()))),
    );
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    let client = client(&server).on_request_completed(move |request, response| {
        assert_eq!(response.status, 200);
        assert!(!request.action.is_empty());
        counter.fetch_add(1, Ordering::SeqCst);
    });

    client.call(CatalogProductListRequest::new()).await.unwrap();
    // login + list
    assert_eq!(seen.load(Ordering::SeqCst), 2);
}
