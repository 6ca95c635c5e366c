use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{extract::State, routing::post, Json, Router};
use serde_json::{json, Value};
use sheetbridge_client::{BridgeClient, BridgeConfig};
use sheetbridge_common::protocol::bridge::{ExecutionMode, NO_RESULT, RELAY_FAILED};
use sheetbridge_common::types::SessionLocator;
use sheetbridge_relay::{server, RelayConfig, RelayHub};
use tokio::net::TcpListener;
use url::Url;

#[derive(Clone)]
struct DirectState {
    seen: Arc<Mutex<Vec<Value>>>,
    result: Value,
}

/// JSON-RPC endpoint that answers every request with a fixed `result`.
async fn start_direct(result: Value) -> (SocketAddr, Arc<Mutex<Vec<Value>>>) {
    async fn handle(State(state): State<DirectState>, Json(request): Json<Value>) -> Json<Value> {
        let id = request["id"].clone();
        state.seen.lock().expect("seen lock").push(request);
        Json(json!({ "jsonrpc": "2.0", "id": id, "result": state.result }))
    }

    let seen = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/jsonrpc", post(handle))
        .with_state(DirectState { seen: seen.clone(), result });
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("direct listener should bind");
    let addr = listener.local_addr().expect("direct listener should expose local address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("direct server should run");
    });
    (addr, seen)
}

async fn start_relay(job_timeout: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("relay listener should bind");
    let addr = listener.local_addr().expect("relay listener should expose local address");
    let config = RelayConfig {
        listen_addr: addr,
        job_timeout,
        max_poll_wait: Duration::from_secs(2),
        ..RelayConfig::default()
    };
    tokio::spawn(async move {
        server::serve(listener, RelayHub::new(job_timeout), config, std::future::pending())
            .await
            .expect("relay server should run");
    });
    addr
}

/// An address nothing is listening on.
async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("listener should bind");
    listener.local_addr().expect("listener should expose local address")
}

fn client(direct: SocketAddr, relay: SocketAddr) -> BridgeClient {
    let config = BridgeConfig::default()
        .with_rpc_url(Url::parse(&format!("http://{direct}/jsonrpc")).expect("rpc url"))
        .with_app_origin(Url::parse(&format!("http://{relay}")).expect("origin url"))
        .with_http_timeout(Duration::from_secs(5));
    BridgeClient::from_config(&config).expect("client should build")
}

/// Stand-in for an add-in runtime: claim one job for the session and
/// answer it with `reply`.
async fn run_add_in_once(relay: SocketAddr, locator: &[(&str, &str)], reply: Value) -> Value {
    let http = reqwest::Client::new();
    let mut query = locator.to_vec();
    query.push(("waitMs", "2000"));
    let job: Value = http
        .get(format!("http://{relay}/api/excel/agent/jobs"))
        .query(&query)
        .send()
        .await
        .expect("poll should succeed")
        .json()
        .await
        .expect("a job should be handed out");

    let id = job["id"].as_str().expect("job id").to_string();
    let status = http
        .post(format!("http://{relay}/api/excel/agent/jobs/{id}"))
        .json(&reply)
        .send()
        .await
        .expect("completion should succeed")
        .status();
    assert_eq!(status.as_u16(), 204);
    job
}

#[tokio::test]
async fn direct_read_passes_server_result_through() {
    let (direct, seen) =
        start_direct(json!({ "ok": true, "mode": "GRAPH", "data": { "values": [[42]] } })).await;
    let relay = closed_addr().await;

    let result = client(direct, relay).get_range("Sheet1!A1", &SessionLocator::ambient()).await;

    assert!(result.ok);
    assert_eq!(result.mode, ExecutionMode::Graph);
    assert_eq!(result.data, Some(json!({ "values": [[42]] })));
    assert!(result.ms.is_some());

    let seen = seen.lock().expect("seen lock");
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0]["jsonrpc"], "2.0");
    assert_eq!(seen[0]["method"], "excel.get_range");
    assert_eq!(seen[0]["params"], json!({ "address": "Sheet1!A1" }));
    assert!(uuid::Uuid::parse_str(seen[0]["id"].as_str().expect("string id")).is_ok());
}

#[tokio::test]
async fn remote_error_is_returned_without_relaying() {
    let (direct, _) = start_direct(json!({ "ok": false, "mode": "GRAPH", "error": { "message": "bad_range" } })).await;
    let relay = closed_addr().await;

    let result = client(direct, relay)
        .set_range("Sheet1!ZZ", vec![vec![json!(1)]], &SessionLocator::ambient())
        .await;

    assert!(!result.ok);
    assert_eq!(result.mode, ExecutionMode::Graph);
    assert_eq!(result.error_message(), Some("bad_range"));
}

#[tokio::test]
async fn unreachable_rpc_endpoint_yields_no_result() {
    let direct = closed_addr().await;
    let relay = closed_addr().await;

    let result = client(direct, relay).append_row("Orders", vec![json!("a"), json!(1)], &SessionLocator::ambient()).await;

    assert!(!result.ok);
    assert_eq!(result.mode, ExecutionMode::Unknown);
    assert_eq!(serde_json::to_value(&result.error).expect("error"), json!({ "message": NO_RESULT }));
    assert!(result.ms.is_some());
}

#[tokio::test]
async fn relay_request_is_fulfilled_by_add_in_session() {
    let (direct, _) = start_direct(json!({ "ok": true, "mode": "OFFICEJS", "proxy": "officejs-client" })).await;
    let relay = start_relay(Duration::from_secs(5)).await;
    let locator = SessionLocator::new(Some("wb-1".into()), Some("s-1".into()));

    let add_in = tokio::spawn(run_add_in_once(
        relay,
        &[("workbookId", "wb-1"), ("sessionId", "s-1")],
        json!({ "ok": true, "data": { "status": 1 } }),
    ));

    let result = client(direct, relay).set_range("Sheet1!A1", vec![vec![json!(5)]], &locator).await;

    assert!(result.ok, "unexpected result: {result:?}");
    assert_eq!(result.mode, ExecutionMode::OfficeJs);
    assert_eq!(result.data, Some(json!({ "status": 1 })));
    assert!(result.extra.is_empty());

    let job = add_in.await.expect("add-in task should join");
    assert_eq!(job["method"], "excel.set_range");
    assert_eq!(
        job["params"],
        json!({ "address": "Sheet1!A1", "values": [[5]], "workbookId": "wb-1", "sessionId": "s-1" })
    );
}

#[tokio::test]
async fn relay_without_add_in_reports_relay_failed() {
    let (direct, _) = start_direct(json!({ "ok": true, "mode": "OFFICEJS", "proxy": "officejs-client" })).await;
    let relay = start_relay(Duration::from_millis(100)).await;

    let result = client(direct, relay).get_range("Sheet1!A1", &SessionLocator::ambient()).await;

    assert!(result.is_relay_failed());
    assert_eq!(result.mode, ExecutionMode::OfficeJs);
    let details = result.error.and_then(|error| error.details).expect("relay failure details");
    assert_eq!(details["status"], 504);
}

#[tokio::test]
async fn unreachable_relay_reports_relay_failed() {
    let (direct, _) = start_direct(json!({ "ok": true, "mode": "OFFICEJS", "relay": "officejs-client" })).await;
    let relay = closed_addr().await;

    let result = client(direct, relay).get_range("Sheet1!A1", &SessionLocator::ambient()).await;

    assert!(result.is_relay_failed());
    assert_eq!(result.error_message(), Some(RELAY_FAILED));
    assert!(result.error.and_then(|error| error.details).is_some_and(|details| details.get("reason").is_some()));
}
