use async_trait::async_trait;
use axum::http::StatusCode;
use hawkeye_relay::{
    config::HawkeyeConfig,
    hawkeye::{AdvanceReceipt, PromptOutcome},
    receiver::{AlertRelay, PromptDispatcher, RelaySummary},
    server::Server,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use uuid::Uuid;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

#[derive(Default)]
struct RecordingDispatcher {
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl PromptDispatcher for RecordingDispatcher {
    async fn dispatch(&self, prompt: &str) -> PromptOutcome {
        self.prompts.lock().unwrap().push(prompt.to_string());
        PromptOutcome::Delivered {
            request_id: Uuid::new_v4(),
            receipt: AdvanceReceipt::default(),
        }
    }
}

fn alert_batch() -> serde_json::Value {
    json!({
        "receiver": "hawkeye",
        "status": "firing",
        "alerts": [
            {
                "status": "firing",
                "labels": { "alertname": "HighCPU", "severity": "warning" },
                "annotations": { "description": "CPU above 90%" },
                "startsAt": "2025-04-04T02:22:51Z",
                "endsAt": "0001-01-01T00:00:00Z",
                "generatorURL": "http://prometheus/graph?g0.expr=cpu"
            },
            {
                "status": "resolved",
                "labels": { "alertname": "DiskFull" },
                "annotations": { "description": "Disk at 99%" },
                "startsAt": "2025-04-04T01:00:00Z",
                "endsAt": "2025-04-04T02:00:00Z",
                "generatorURL": "http://prometheus/graph?g0.expr=disk"
            }
        ],
        "groupLabels": { "alertname": "HighCPU" },
        "commonLabels": {},
        "commonAnnotations": {},
        "externalURL": "http://alertmanager:9093",
        "version": "4",
        "groupKey": "{}:{alertname=\"HighCPU\"}",
        "truncatedAlerts": 0
    })
}

fn test_server(dispatcher: Arc<dyn PromptDispatcher>) -> axum_test::TestServer {
    let server = Server::new(AlertRelay::new(dispatcher));
    axum_test::TestServer::new(server.build_router()).unwrap()
}

#[tokio::test]
async fn test_health_and_metrics() {
    let client = test_server(Arc::new(RecordingDispatcher::default()));

    let response = client.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "healthy");

    let response = client.get("/metrics").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert!(response.text().contains("hawkeye_relay_alerts_received_total"));
}

#[tokio::test]
async fn test_alert_webhook_dispatches_firing_alerts() {
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let client = test_server(dispatcher.clone());

    let response = client.post("/alert").json(&alert_batch()).await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let summary: RelaySummary = response.json();
    assert_eq!(
        summary,
        RelaySummary {
            received: 2,
            firing: 1,
            delivered: 1
        }
    );
    assert_eq!(
        *dispatcher.prompts.lock().unwrap(),
        vec!["HighCPU - CPU above 90%. Investigate from last 1 hour. Please provide a detailed report.".to_string()]
    );
}

#[tokio::test]
async fn test_non_rfc3339_timestamps_are_accepted() {
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let client = test_server(dispatcher.clone());

    let mut batch = alert_batch();
    batch["alerts"][0]["startsAt"] = json!("2025-04-04 02:22:51");
    batch["alerts"][0]["endsAt"] = json!("");

    let response = client.post("/alert").json(&batch).await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let summary: RelaySummary = response.json();
    assert_eq!(summary.delivered, 1);
    assert_eq!(dispatcher.prompts.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_malformed_payload_is_rejected() {
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let client = test_server(dispatcher.clone());

    let response = client
        .post("/alert")
        .json(&json!({ "receiver": "hawkeye", "alerts": "not-a-list" }))
        .await;

    assert!(response.status_code().is_client_error());
    assert!(dispatcher.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unreachable_service_still_acknowledges() {
    let hawkeye = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/user/login"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&hawkeye)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/project"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&hawkeye)
        .await;

    let config = HawkeyeConfig::new(hawkeye.uri(), "ops@example.com", "secret", "production");
    let client = axum_test::TestServer::new(
        Server::new(AlertRelay::from_config(config)).build_router(),
    )
    .unwrap();

    let response = client.post("/alert").json(&alert_batch()).await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let summary: RelaySummary = response.json();
    assert_eq!(summary.firing, 1);
    assert_eq!(summary.delivered, 0);
}
