//! Integration tests for the cloud client, session store and dispatcher,
//! driven against a wiremock stand-in for the vendor cloud endpoint.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use kasalink::cloud::{CloudClient, CloudError, SessionStore};
use kasalink::dispatch::{DispatchError, Dispatcher};

const DEVICE_ID: &str = "8006E0C0FFEE";

fn login_ok() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "error_code": 0,
        "result": { "token": "test-token-123" }
    }))
}

fn device_list_ok(server_uri: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "error_code": 0,
        "result": {
            "deviceList": [{
                "deviceId": DEVICE_ID,
                "alias": "Desk Lamp",
                "appServerUrl": format!("{server_uri}/relay"),
                "deviceType": "IOT.SMARTPLUGSWITCH",
                "status": 1
            }]
        }
    }))
}

fn relay_ok() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "error_code": 0 }))
}

async fn mock_happy_cloud(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({ "method": "login" })))
        .respond_with(login_ok())
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({ "method": "getDeviceList" })))
        .respond_with(device_list_ok(&server.uri()))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/relay"))
        .respond_with(relay_ok())
        .mount(server)
        .await;
}

/// Count relay commands received for a given wire state (0 or 1).
async fn relay_commands_with_state(server: &MockServer, state: u64) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == "/relay")
        .filter(|r| {
            serde_json::from_slice::<serde_json::Value>(&r.body)
                .ok()
                .and_then(|v| {
                    v["params"]["requestData"]["system"]["set_relay_state"]["state"].as_u64()
                })
                == Some(state)
        })
        .count()
}

fn client_for(server: &MockServer) -> CloudClient {
    CloudClient::new(&server.uri(), "user@example.com", "hunter2")
}

// ── Session / cache behaviour ────────────────────────────────

#[tokio::test]
async fn login_without_token_field_stops_the_chain() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({ "method": "login" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error_code": 0,
            "result": {}
        })))
        .mount(&server)
        .await;
    // The device listing must never be attempted without a token.
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({ "method": "getDeviceList" })))
        .respond_with(device_list_ok(&server.uri()))
        .expect(0)
        .mount(&server)
        .await;

    let store = SessionStore::new();
    let err = store.devices(&client_for(&server)).await.unwrap_err();
    assert!(matches!(err, CloudError::MissingToken));
}

#[tokio::test]
async fn vendor_error_code_surfaces_as_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error_code": -20601,
            "msg": "Account is not found"
        })))
        .mount(&server)
        .await;

    let err = client_for(&server).login().await.unwrap_err();
    match err {
        CloudError::Api { code, msg } => {
            assert_eq!(code, -20601);
            assert_eq!(msg, "Account is not found");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn second_device_listing_is_served_from_cache() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({ "method": "login" })))
        .respond_with(login_ok())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({ "method": "getDeviceList" })))
        .respond_with(device_list_ok(&server.uri()))
        .expect(1)
        .mount(&server)
        .await;

    let store = SessionStore::new();
    let client = client_for(&server);

    let first = store.devices(&client).await.unwrap();
    let second = store.devices(&client).await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(second[0].device_id, DEVICE_ID);
    // expect(1) on both mocks verifies zero extra network calls on drop
}

#[tokio::test]
async fn empty_device_list_is_ok_but_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({ "method": "login" })))
        .respond_with(login_ok())
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({ "method": "getDeviceList" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error_code": 0,
            "result": { "deviceList": [] }
        })))
        .expect(2)
        .mount(&server)
        .await;

    let store = SessionStore::new();
    let client = client_for(&server);

    assert!(store.devices(&client).await.unwrap().is_empty());
    // An empty result must not populate the cache; the listing is retried.
    assert!(store.devices(&client).await.unwrap().is_empty());
}

#[tokio::test]
async fn session_token_is_reused_within_the_expiry_window() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({ "method": "login" })))
        .respond_with(login_ok())
        .expect(1)
        .mount(&server)
        .await;

    let store = SessionStore::new();
    let client = client_for(&server);

    let a = store.session(&client).await.unwrap();
    let b = store.session(&client).await.unwrap();
    assert_eq!(a.token, b.token);
    assert_eq!(a.terminal_uuid, b.terminal_uuid);
    assert!(!a.is_expired());
}

#[tokio::test]
async fn expired_session_is_renewed_with_a_fresh_login() {
    // Instant cannot be backdated past the platform's epoch (e.g. boot);
    // skip on hosts that have been up for less than the TTL.
    let Some(issued_at) = std::time::Instant::now()
        .checked_sub(kasalink::cloud::SESSION_TTL + Duration::from_secs(1))
    else {
        return;
    };

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({ "method": "login" })))
        .respond_with(login_ok())
        .expect(1)
        .mount(&server)
        .await;

    let store = SessionStore::new();
    let client = client_for(&server);

    let stale_uuid = uuid::Uuid::new_v4();
    store
        .put_session(kasalink::cloud::Session {
            token: "stale-token".into(),
            terminal_uuid: stale_uuid,
            issued_at,
        })
        .await;

    let renewed = store.session(&client).await.unwrap();
    assert_eq!(renewed.token, "test-token-123");
    assert_ne!(renewed.terminal_uuid, stale_uuid);
    assert!(!renewed.is_expired());

    // The renewed session is now the cached one; no second login.
    let again = store.session(&client).await.unwrap();
    assert_eq!(again.token, renewed.token);
    assert_eq!(again.terminal_uuid, renewed.terminal_uuid);
}

#[test]
fn backdated_session_is_expired() {
    // Instant cannot be backdated past the platform's epoch (e.g. boot);
    // skip on hosts that have been up for less than the TTL.
    let Some(issued_at) = std::time::Instant::now()
        .checked_sub(kasalink::cloud::SESSION_TTL + Duration::from_secs(1))
    else {
        return;
    };
    let session = kasalink::cloud::Session {
        token: "stale".into(),
        terminal_uuid: uuid::Uuid::new_v4(),
        issued_at,
    };
    assert!(session.is_expired());
}

// ── Dispatcher behaviour ─────────────────────────────────────

#[tokio::test]
async fn turn_on_sends_one_on_command() {
    let server = MockServer::start().await;
    mock_happy_cloud(&server).await;

    let client = client_for(&server);
    let dispatcher = Dispatcher::new(client, SessionStore::new());

    dispatcher.turn_on(DEVICE_ID, None).await.unwrap();
    assert_eq!(relay_commands_with_state(&server, 1).await, 1);
    assert_eq!(relay_commands_with_state(&server, 0).await, 0);
    assert!(!dispatcher.pending_off(DEVICE_ID));
}

#[tokio::test]
async fn deferred_off_fires_after_the_duration_not_before() {
    let server = MockServer::start().await;
    mock_happy_cloud(&server).await;

    let client = client_for(&server);
    let dispatcher = Dispatcher::new(client, SessionStore::new());

    dispatcher.turn_on(DEVICE_ID, Some(1)).await.unwrap();
    assert_eq!(relay_commands_with_state(&server, 1).await, 1);
    assert!(dispatcher.pending_off(DEVICE_ID));

    // Well before the timer: no off command yet.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(relay_commands_with_state(&server, 0).await, 0);

    // Well after the timer: exactly one off command.
    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(relay_commands_with_state(&server, 0).await, 1);
    assert!(!dispatcher.pending_off(DEVICE_ID));
}

#[tokio::test]
async fn out_of_range_duration_arms_no_deferred_off() {
    let server = MockServer::start().await;
    mock_happy_cloud(&server).await;

    let client = client_for(&server);
    let dispatcher = Dispatcher::new(client, SessionStore::new());

    // > 24h
    dispatcher.turn_on(DEVICE_ID, Some(90_000)).await.unwrap();
    assert_eq!(relay_commands_with_state(&server, 1).await, 1);
    assert!(!dispatcher.pending_off(DEVICE_ID));

    // zero
    dispatcher.turn_on(DEVICE_ID, Some(0)).await.unwrap();
    assert!(!dispatcher.pending_off(DEVICE_ID));
}

#[tokio::test]
async fn unknown_device_sends_no_command() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({ "method": "login" })))
        .respond_with(login_ok())
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({ "method": "getDeviceList" })))
        .respond_with(device_list_ok(&server.uri()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/relay"))
        .respond_with(relay_ok())
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let dispatcher = Dispatcher::new(client, SessionStore::new());

    let err = dispatcher.turn_on("no-such-device", None).await.unwrap_err();
    assert!(matches!(err, DispatchError::DeviceNotFound(id) if id == "no-such-device"));
}

#[tokio::test]
async fn manual_off_cancels_the_pending_timer() {
    let server = MockServer::start().await;
    mock_happy_cloud(&server).await;

    let client = client_for(&server);
    let dispatcher = Dispatcher::new(client, SessionStore::new());

    dispatcher.turn_on(DEVICE_ID, Some(1)).await.unwrap();
    assert!(dispatcher.pending_off(DEVICE_ID));

    dispatcher.turn_off(DEVICE_ID).await.unwrap();
    assert!(!dispatcher.pending_off(DEVICE_ID));

    // Past the timer's deadline: only the manual off was sent.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(relay_commands_with_state(&server, 1).await, 1);
    assert_eq!(relay_commands_with_state(&server, 0).await, 1);
}

#[tokio::test]
async fn rearming_replaces_the_previous_timer() {
    let server = MockServer::start().await;
    mock_happy_cloud(&server).await;

    let client = client_for(&server);
    let dispatcher = Dispatcher::new(client, SessionStore::new());

    dispatcher.turn_on(DEVICE_ID, Some(1)).await.unwrap();
    dispatcher.turn_on(DEVICE_ID, Some(1)).await.unwrap();

    tokio::time::sleep(Duration::from_millis(1500)).await;
    // Two on commands, but the replaced timer never fired: one off only.
    assert_eq!(relay_commands_with_state(&server, 1).await, 2);
    assert_eq!(relay_commands_with_state(&server, 0).await, 1);
}

#[tokio::test]
async fn command_failure_is_a_typed_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({ "method": "login" })))
        .respond_with(login_ok())
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({ "method": "getDeviceList" })))
        .respond_with(device_list_ok(&server.uri()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/relay"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let dispatcher = Dispatcher::new(client, SessionStore::new());

    let err = dispatcher.turn_off(DEVICE_ID).await.unwrap_err();
    assert!(matches!(err, DispatchError::Cloud(CloudError::Status(s)) if s.as_u16() == 500));
}
