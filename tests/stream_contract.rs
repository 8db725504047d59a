//! Progress-stream contract tests.
//!
//! Verify the SSE wire contract end to end: a mock backend pushes named
//! events and the typed channel plus session state machine must arrive at
//! the documented final state.

use ellipsis_client::coordinator::SessionCoordinator;
use ellipsis_client::stream::EventChannel;
use ellipsis_client::{BackendClient, GenerationStage};
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sse_response(body: &'static str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body)
}

async fn mount_stream(server: &MockServer, body: &'static str) {
    Mock::given(method("GET"))
        .and(path("/stream"))
        .respond_with(sse_response(body))
        .expect(1)
        .mount(server)
        .await;
}

async fn drain(server: &MockServer) -> SessionCoordinator {
    let client = match BackendClient::with_http(reqwest::Client::new(), &server.uri()) {
        Ok(c) => c,
        Err(_) => unreachable!("mock server URI parses"),
    };
    let mut coordinator = SessionCoordinator::new(client.clone());
    let mut channel = match EventChannel::open(client.http(), client.origin()).await {
        Ok(c) => c,
        Err(_) => unreachable!("stream should open against the mock"),
    };

    while let Some(event) = channel.recv().await {
        coordinator.handle_event(&event);
    }
    channel.close().await;
    coordinator
}

#[tokio::test]
async fn stream_request_asks_for_event_stream() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stream"))
        .and(header("accept", "text/event-stream"))
        .respond_with(sse_response(""))
        .expect(1)
        .mount(&server)
        .await;

    let client = match BackendClient::with_http(reqwest::Client::new(), &server.uri()) {
        Ok(c) => c,
        Err(_) => unreachable!("mock server URI parses"),
    };
    let channel = EventChannel::open(client.http(), client.origin()).await;
    assert!(channel.is_ok());
}

#[tokio::test]
async fn full_generation_over_the_wire() {
    let server = MockServer::start().await;
    mount_stream(
        &server,
        concat!(
            "event: status\n",
            "data: {\"status\":\"initial_response_generation_started\"}\n\n",
            "event: persona\n",
            "data: {\"persona\":\"Sarah\",\"response\":\"R1\"}\n\n",
            "event: persona\n",
            "data: {\"persona\":\"John\",\"response\":\"R2\"}\n\n",
            "event: status\n",
            "data: {\"status\":\"mad_started\"}\n\n",
            "event: script\n",
            "data: {\"script\":\"**A:** hi\"}\n\n",
            "event: status\n",
            "data: {\"status\":\"script_ready\"}\n\n",
            "event: status\n",
            "data: {\"status\":\"audio_generation_started\"}\n\n",
            "event: audio\n",
            "data: {\"audio\":\"/files/out.wav\"}\n\n",
        ),
    )
    .await;

    let coordinator = drain(&server).await;
    let session = coordinator.session();

    assert_eq!(session.stage(), GenerationStage::AudioReady);
    assert_eq!(session.responses().general_public.as_deref(), Some("R1"));
    assert_eq!(session.responses().critic.as_deref(), Some("R2"));
    assert_eq!(session.script(), Some("**A:** hi"));
    let audio_url = session.audio_url().unwrap_or_default();
    assert!(audio_url.ends_with("/files/out.wav"));

    // The audio URL is absolute against the backend origin.
    let origin = match Url::parse(&server.uri()) {
        Ok(u) => u,
        Err(_) => unreachable!("mock server URI parses"),
    };
    assert!(audio_url.starts_with(origin.as_str()));
}

#[tokio::test]
async fn audio_error_after_script_ready_is_terminal() {
    let server = MockServer::start().await;
    mount_stream(
        &server,
        concat!(
            "event: persona\n",
            "data: {\"persona\":\"Sarah\",\"response\":\"R1\"}\n\n",
            "event: script\n",
            "data: {\"script\":\"**A:** hi\"}\n\n",
            "event: status\n",
            "data: {\"status\":\"script_ready\"}\n\n",
            "event: status\n",
            "data: {\"status\":\"audio_error\",\"message\":\"tts down\"}\n\n",
        ),
    )
    .await;

    let coordinator = drain(&server).await;
    let session = coordinator.session();

    assert_eq!(session.stage(), GenerationStage::AudioError);
    assert!(!session.can_submit_next());
    // Prior content survives the failure.
    assert_eq!(session.responses().general_public.as_deref(), Some("R1"));
    assert_eq!(session.script(), Some("**A:** hi"));
    assert_eq!(session.header_text(), "Audio generation failed: tts down");
}

#[tokio::test]
async fn unknown_events_and_statuses_are_ignored() {
    let server = MockServer::start().await;
    mount_stream(
        &server,
        concat!(
            "data: untyped keepalive\n\n",
            "event: mad\n",
            "data: {\"mad_agent\":\"Critique Agent\"}\n\n",
            "event: status\n",
            "data: {\"status\":\"quantum_started\"}\n\n",
            "event: persona\n",
            "data: {\"persona\":\"Maria\",\"response\":\"R3\"}\n\n",
            "event: status\n",
            "data: {\"status\":\"mad_started\"}\n\n",
        ),
    )
    .await;

    let coordinator = drain(&server).await;
    let session = coordinator.session();

    // Only the recognized status moved anything.
    assert_eq!(session.stage(), GenerationStage::Debate);
    assert!(session.responses().general_public.is_none());
    assert!(session.responses().critic.is_none());
}

#[tokio::test]
async fn duplicate_and_out_of_order_statuses_stay_monotonic() {
    let server = MockServer::start().await;
    mount_stream(
        &server,
        concat!(
            "event: status\n",
            "data: {\"status\":\"mad_started\"}\n\n",
            "event: status\n",
            "data: {\"status\":\"mad_started\"}\n\n",
            "event: status\n",
            "data: {\"status\":\"script_ready\"}\n\n",
            "event: status\n",
            "data: {\"status\":\"initial_response_generation_started\"}\n\n",
        ),
    )
    .await;

    let coordinator = drain(&server).await;
    assert_eq!(coordinator.session().stage(), GenerationStage::ScriptReady);
}

#[tokio::test]
async fn blank_script_on_the_wire_never_clears() {
    let server = MockServer::start().await;
    mount_stream(
        &server,
        concat!(
            "event: script\n",
            "data: {\"script\":\"**A:** hi\"}\n\n",
            "event: script\n",
            "data: {\"script\":\"\"}\n\n",
            "event: script\n",
            "data: {\"script\":\"   \"}\n\n",
        ),
    )
    .await;

    let coordinator = drain(&server).await;
    assert_eq!(coordinator.session().script(), Some("**A:** hi"));
}

#[tokio::test]
async fn run_drains_until_terminal() {
    let server = MockServer::start().await;
    mount_stream(
        &server,
        concat!(
            "event: status\n",
            "data: {\"status\":\"script_ready\"}\n\n",
            "event: audio\n",
            "data: {\"audio\":\"/files/out.wav\"}\n\n",
        ),
    )
    .await;

    let client = match BackendClient::with_http(reqwest::Client::new(), &server.uri()) {
        Ok(c) => c,
        Err(_) => unreachable!("mock server URI parses"),
    };
    let mut coordinator = SessionCoordinator::new(client.clone());
    let mut channel = match EventChannel::open(client.http(), client.origin()).await {
        Ok(c) => c,
        Err(_) => unreachable!("stream should open against the mock"),
    };

    coordinator.run(&mut channel).await;
    assert_eq!(coordinator.session().stage(), GenerationStage::AudioReady);
    channel.close().await;
}

#[tokio::test]
async fn run_reports_a_closed_channel() {
    let server = MockServer::start().await;
    mount_stream(
        &server,
        concat!(
            "event: status\n",
            "data: {\"status\":\"mad_started\"}\n\n",
        ),
    )
    .await;

    let client = match BackendClient::with_http(reqwest::Client::new(), &server.uri()) {
        Ok(c) => c,
        Err(_) => unreachable!("mock server URI parses"),
    };
    let mut coordinator = SessionCoordinator::new(client.clone());
    let mut ui = coordinator.subscribe();
    let mut channel = match EventChannel::open(client.http(), client.origin()).await {
        Ok(c) => c,
        Err(_) => unreachable!("stream should open against the mock"),
    };

    coordinator.run(&mut channel).await;

    let mut saw_closed = false;
    while let Ok(event) = ui.try_recv() {
        if matches!(event, ellipsis_client::UiEvent::ChannelClosed) {
            saw_closed = true;
        }
    }
    assert!(saw_closed);
    assert_eq!(coordinator.session().stage(), GenerationStage::Debate);
}

#[tokio::test]
async fn channel_closes_without_reconnect() {
    // One mounted expectation: were the channel to reconnect, the second
    // GET would violate `expect(1)`.
    let server = MockServer::start().await;
    mount_stream(
        &server,
        concat!(
            "event: status\n",
            "data: {\"status\":\"mad_started\"}\n\n",
        ),
    )
    .await;

    let client = match BackendClient::with_http(reqwest::Client::new(), &server.uri()) {
        Ok(c) => c,
        Err(_) => unreachable!("mock server URI parses"),
    };
    let mut coordinator = SessionCoordinator::new(client.clone());
    let mut channel = match EventChannel::open(client.http(), client.origin()).await {
        Ok(c) => c,
        Err(_) => unreachable!("stream should open against the mock"),
    };

    let first = channel.recv().await;
    assert!(first.is_some());
    if let Some(ref event) = first {
        coordinator.handle_event(event);
    }

    // Stream ends; the receiver closes and the stage stays where it was.
    assert!(channel.recv().await.is_none());
    assert_eq!(coordinator.session().stage(), GenerationStage::Debate);
    channel.close().await;

    server.verify().await;
}

#[tokio::test]
async fn stream_endpoint_error_fails_open() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stream"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = match BackendClient::with_http(reqwest::Client::new(), &server.uri()) {
        Ok(c) => c,
        Err(_) => unreachable!("mock server URI parses"),
    };
    let channel = EventChannel::open(client.http(), client.origin()).await;
    assert!(channel.is_err());
}
