//! Connection-tracking integration tests: persisted store, staleness,
//! dashboard verification, and the platform management API passthroughs.

use chrono::{Duration, Utc};
use ellipsis_client::config::PlatformEntry;
use ellipsis_client::platforms::verify::{PlatformVerifier, VerifyOutcome};
use ellipsis_client::platforms::{ConnectionStore, PlatformCatalog};
use ellipsis_client::{BackendClient, UiEvent};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn make_test_dir() -> tempfile::TempDir {
    match tempfile::tempdir() {
        Ok(d) => d,
        Err(_) => unreachable!("tempdir creation should not fail"),
    }
}

fn open_store(dir: &std::path::Path) -> ConnectionStore {
    match ConnectionStore::open(dir, 300) {
        Ok(s) => s,
        Err(_) => unreachable!("store opens on an empty dir"),
    }
}

#[test]
fn five_minute_staleness_window() {
    let dir = make_test_dir();
    let mut store = open_store(dir.path());
    let t0 = Utc::now();

    let _ = store.record_status_at("Spotify", true, t0);

    // Fresh at four minutes, untrusted at six — with no new event at all.
    assert!(store.is_connected_at("Spotify", t0 + Duration::minutes(4)));
    assert!(!store.is_connected_at("Spotify", t0 + Duration::minutes(6)));
}

#[test]
fn store_round_trips_across_restart() {
    let dir = make_test_dir();
    let t0 = Utc::now();
    {
        let mut store = open_store(dir.path());
        let _ = store.record_status_at("LinkedIn", true, t0);
        let _ = store.record_status_at("Twitter", true, t0);
        let _ = store.record_status_at("Reddit", false, t0);
    }

    let reopened = open_store(dir.path());
    assert_eq!(reopened.connected_platforms(), ["LinkedIn", "Twitter"]);
    assert!(reopened.is_connected_at("LinkedIn", t0));
    assert!(!reopened.is_connected_at("Reddit", t0));

    // The fixed file names exist on disk.
    assert!(dir
        .path()
        .join(ellipsis_client::platforms::CONNECTED_PLATFORMS_FILE)
        .exists());
    assert!(dir
        .path()
        .join(ellipsis_client::platforms::LOGIN_STATUS_FILE)
        .exists());
}

fn verifier_against(
    server: &MockServer,
    dir: &std::path::Path,
) -> (Arc<PlatformVerifier>, broadcast::Receiver<UiEvent>) {
    let catalog = PlatformCatalog::new(vec![PlatformEntry {
        name: "LinkedIn".to_string(),
        dashboard_url: format!("{}/feed/", server.uri()),
        success_url_pattern: "linkedin.com/feed".to_string(),
    }]);
    let store = Arc::new(Mutex::new(open_store(dir)));
    let (events, rx) = broadcast::channel(16);
    (
        Arc::new(PlatformVerifier::new(
            reqwest::Client::new(),
            catalog,
            store,
            events,
        )),
        rx,
    )
}

#[tokio::test]
async fn successful_verification_records_connected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let dir = make_test_dir();
    let (verifier, _rx) = verifier_against(&server, dir.path());

    let outcome = verifier.verify("LinkedIn").await;
    assert!(matches!(outcome, Ok(VerifyOutcome::Connected)));

    match verifier.store().lock() {
        Ok(store) => {
            assert!(store.is_connected("LinkedIn"));
            assert_eq!(store.connected_platforms(), ["LinkedIn"]);
        }
        Err(_) => unreachable!("store not poisoned"),
    }
}

#[tokio::test]
async fn failed_verification_requests_the_connect_dialog() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed/"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let dir = make_test_dir();
    let (verifier, mut rx) = verifier_against(&server, dir.path());

    let outcome = verifier.verify("LinkedIn").await;
    assert!(matches!(outcome, Ok(VerifyOutcome::Disconnected)));

    match rx.try_recv() {
        Ok(UiEvent::ConnectPromptRequested { platform }) => assert_eq!(platform, "LinkedIn"),
        _ => unreachable!("failed verify should request the connect dialog"),
    }

    match verifier.store().lock() {
        Ok(store) => assert!(!store.is_connected("LinkedIn")),
        Err(_) => unreachable!("store not poisoned"),
    }
}

// ── platform management API passthroughs ─────────────────────────────────

#[tokio::test]
async fn connected_platforms_endpoint_parses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/connected_platforms"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "connected_platforms": ["LinkedIn", "Reddit"]
        })))
        .mount(&server)
        .await;

    let client = match BackendClient::with_http(reqwest::Client::new(), &server.uri()) {
        Ok(c) => c,
        Err(_) => unreachable!("mock server URI parses"),
    };
    let platforms = client.connected_platforms().await;
    match platforms {
        Ok(names) => assert_eq!(names, ["LinkedIn", "Reddit"]),
        Err(_) => unreachable!("connected_platforms should parse"),
    }
}

#[tokio::test]
async fn oauth_url_endpoint_parses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/oauth_url/LinkedIn"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "oauth_url": "https://www.linkedin.com/oauth/v2/authorization?x=1"
        })))
        .mount(&server)
        .await;

    let client = match BackendClient::with_http(reqwest::Client::new(), &server.uri()) {
        Ok(c) => c,
        Err(_) => unreachable!("mock server URI parses"),
    };
    let url = client.oauth_url("LinkedIn").await;
    match url {
        Ok(url) => assert!(url.starts_with("https://www.linkedin.com/oauth")),
        Err(_) => unreachable!("oauth_url should parse"),
    }
}

#[tokio::test]
async fn connect_and_disconnect_post_the_platform() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/connect"))
        .and(body_partial_json(json!({"platform": "Reddit"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/disconnect"))
        .and(body_partial_json(json!({"platform": "Reddit"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = match BackendClient::with_http(reqwest::Client::new(), &server.uri()) {
        Ok(c) => c,
        Err(_) => unreachable!("mock server URI parses"),
    };
    assert!(client.connect_platform("Reddit").await.is_ok());
    assert!(client.disconnect_platform("Reddit").await.is_ok());
}

#[tokio::test]
async fn trending_topics_parse() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/trending"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "topics": [
                {"title": "Gene therapy", "description": "CRISPR news", "category": "Science"},
                {"title": "Rate cuts", "description": "Fed watch", "category": "Finance"}
            ]
        })))
        .mount(&server)
        .await;

    let client = match BackendClient::with_http(reqwest::Client::new(), &server.uri()) {
        Ok(c) => c,
        Err(_) => unreachable!("mock server URI parses"),
    };
    let topics = client.trending_topics().await;
    match topics {
        Ok(topics) => {
            assert_eq!(topics.len(), 2);
            assert_eq!(topics[0].title, "Gene therapy");
            assert_eq!(topics[1].category, "Finance");
        }
        Err(_) => unreachable!("trending should parse"),
    }
}
