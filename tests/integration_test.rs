//! Integration tests for the full webhook → classifier → storage → export flow
//!
//! Each test serves the real router on an ephemeral port and talks to it over
//! HTTP, so extraction, routing and response shapes are covered together.

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

use lead_intake::config::{
    CollectionConfig, Config, DatabaseConfig, ExportConfig, LogFormat, LoggingConfig,
    RequestConfig, ServerConfig, SheetsConfig,
};
use lead_intake::export::Exporter;
use lead_intake::intake::IntakeService;
use lead_intake::server::{self, AppState};
use lead_intake::sheets::{SheetsClient, SheetsCredentials};
use lead_intake::storage::{ConversationStore, SqliteStore};
use lead_intake::Branch;

/// Create test configuration; Sheets points at the mock server when given
fn create_test_config(sheets_url: Option<&str>) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        database: DatabaseConfig::default(),
        collections: CollectionConfig::default(),
        sheets: sheets_url.map(|url| SheetsConfig {
            spreadsheet_id: "sheet-123".to_string(),
            credentials: SheetsCredentials::AccessToken("test-token".to_string()),
            base_url: url.to_string(),
        }),
        export: ExportConfig {
            enabled: false,
            auto_create_tabs: false,
            ..Default::default()
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: LogFormat::Pretty,
        },
        request: RequestConfig { timeout_ms: 5000 },
    }
}

/// A running server plus the handles needed to inspect and stop it
struct TestServer {
    addr: SocketAddr,
    store: Arc<SqliteStore>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
    client: reqwest::Client,
}

impl TestServer {
    async fn start(sheets_url: Option<&str>) -> Self {
        let config = create_test_config(sheets_url);
        let store = Arc::new(SqliteStore::new_in_memory().await.unwrap());

        let exporter = config.sheets.as_ref().map(|sheets| {
            let client = SheetsClient::new(sheets, config.request.clone()).unwrap();
            Arc::new(Exporter::new(
                store.clone(),
                Arc::new(client),
                config.collections.clone(),
                config.export.branches.clone(),
                config.export.auto_create_tabs,
            ))
        });

        let intake = IntakeService::new(
            Some(store.clone() as Arc<dyn ConversationStore>),
            config.collections.clone(),
            3,
        );
        let state = Arc::new(AppState::new(config, intake, exporter));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            server::serve(listener, state, async {
                let _ = rx.await;
            })
            .await
            .unwrap();
        });

        Self {
            addr,
            store,
            shutdown: Some(tx),
            handle: Some(handle),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn post_json(&self, path: &str, body: Value) -> (u16, Value) {
        let response = self
            .client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    async fn post_raw(&self, path: &str, body: &'static str) -> (u16, Value) {
        let response = self
            .client
            .post(self.url(path))
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.await.unwrap();
        }
    }
}

fn interakt_payload(phone: Value, message: Value) -> Value {
    json!({
        "type": "message_received",
        "data": {
            "customer": {
                "channel_phone_number": phone
            },
            "message": {
                "message": message
            }
        }
    })
}

#[cfg(test)]
mod webhook_tests {
    use super::*;

    #[tokio::test]
    async fn test_health_endpoints() {
        let server = TestServer::start(None).await;

        let index = server.client.get(server.url("/")).send().await.unwrap();
        assert_eq!(index.status().as_u16(), 200);
        assert_eq!(index.text().await.unwrap(), "Lead intake webhook is running");

        let health = server.client.get(server.url("/healthz")).send().await.unwrap();
        assert_eq!(health.status().as_u16(), 200);

        server.stop().await;
    }

    #[tokio::test]
    async fn test_digital_marketing_message_is_stored() {
        let server = TestServer::start(None).await;

        let (status, body) = server
            .post_json(
                "/webhook",
                interakt_payload(json!("91234"), json!("Hello Need info about Digital Marketing")),
            )
            .await;

        assert_eq!(status, 200);
        assert_eq!(body, json!({"status": "success"}));

        let doc = server
            .store
            .get_conversation("Digital_Marketing_4999", "91234")
            .await
            .unwrap()
            .expect("conversation should be stored");
        assert_eq!(doc.messages.len(), 1);
        assert_eq!(doc.messages[0].text, "Hello Need info about Digital Marketing");
        assert_eq!(doc.followup_status, "Pending");

        server.stop().await;
    }

    #[tokio::test]
    async fn test_numeric_phone_and_button_reply() {
        let server = TestServer::start(None).await;

        let (status, _) = server
            .post_json(
                "/webhook",
                interakt_payload(
                    json!(919876543210u64),
                    json!("{\"button_reply\": {\"title\": \"Ecommerce website\"}}"),
                ),
            )
            .await;
        assert_eq!(status, 200);

        let doc = server
            .store
            .get_conversation("E-Commerce_website_Leads", "919876543210")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.messages[0].text, "Ecommerce website");

        server.stop().await;
    }

    #[tokio::test]
    async fn test_invalid_json_is_rejected() {
        let server = TestServer::start(None).await;

        let (status, body) = server.post_raw("/webhook", "{not json").await;

        assert_eq!(status, 400);
        assert_eq!(body["status"], "error");
        assert_eq!(body["reason"], "invalid json");

        server.stop().await;
    }

    #[tokio::test]
    async fn test_non_object_payload_is_rejected() {
        let server = TestServer::start(None).await;

        let (status, body) = server.post_json("/webhook", json!([1, 2, 3])).await;

        assert_eq!(status, 400);
        assert_eq!(body["status"], "error");

        server.stop().await;
    }

    #[tokio::test]
    async fn test_missing_fields_are_ignored() {
        let server = TestServer::start(None).await;

        let (status, body) = server
            .post_json("/webhook", interakt_payload(Value::Null, json!("hi")))
            .await;
        assert_eq!(status, 200);
        assert_eq!(body, json!({"status": "ignored", "reason": "missing phone"}));

        let (status, body) = server
            .post_json("/webhook", interakt_payload(json!("555"), Value::Null))
            .await;
        assert_eq!(status, 200);
        assert_eq!(body, json!({"status": "ignored", "reason": "missing message"}));

        let (status, body) = server
            .post_json("/webhook", json!({"type": "message_delivered", "data": {}}))
            .await;
        assert_eq!(status, 200);
        assert_eq!(body["status"], "ignored");

        assert!(server
            .store
            .list_conversations("Unknown_Leads")
            .await
            .unwrap()
            .is_empty());

        server.stop().await;
    }
}

#[cfg(test)]
mod export_endpoint_tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_branch_is_rejected() {
        let server = TestServer::start(None).await;

        let (status, body) = server.post_json("/update/wholesale", json!({})).await;

        assert_eq!(status, 400);
        assert_eq!(body["status"], "error");
        assert!(body["reason"].as_str().unwrap().contains("wholesale"));

        server.stop().await;
    }

    #[tokio::test]
    async fn test_update_without_export_configured() {
        let server = TestServer::start(None).await;

        let (status, body) = server.post_json("/update_all", json!({})).await;
        assert_eq!(status, 500);
        assert_eq!(body["status"], "error");

        let (status, body) = server.post_json("/update/static", json!({})).await;
        assert_eq!(status, 500);
        assert_eq!(body["branch"], "static");

        server.stop().await;
    }

    #[tokio::test]
    async fn test_update_branch_writes_tab() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v4/spreadsheets/sheet-123/values/Static_Leads:clear"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/v4/spreadsheets/sheet-123/values/Static_Leads"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"updatedRows": 2})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let server = TestServer::start(Some(&mock_server.uri())).await;
        let (status, _) = server
            .post_json("/webhook", interakt_payload(json!("42"), json!("3999 website")))
            .await;
        assert_eq!(status, 200);

        let (status, body) = server.post_json("/update/Static_Leads", json!({})).await;

        assert_eq!(status, 200);
        assert_eq!(
            body,
            json!({"status": "success", "branch": "static", "tab": "Static_Leads", "rows": 1})
        );

        server.stop().await;
    }

    #[tokio::test]
    async fn test_update_all_reports_failures() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&mock_server)
            .await;

        let server = TestServer::start(Some(&mock_server.uri())).await;
        let (status, body) = server.post_json("/update_all", json!({})).await;

        assert_eq!(status, 500);
        assert_eq!(body["status"], "error");
        let errors = body["errors"].as_object().unwrap();
        assert_eq!(errors.len(), Branch::ALL.len());
        assert!(errors.contains_key("Unknown_Leads"));

        server.stop().await;
    }
}
