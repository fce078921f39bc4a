//! Integration tests for the wiki backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::config::{Config, ExtractionConfig, StorageMode};
use crate::errors::AppError;
use crate::extraction::{ExtractionInput, ExtractionService};
use crate::{build_state, create_router, AppState};

const ADMIN_PASSPHRASE: &str = "letmein";
const HUB_KEY: &str = "test-hub-key";
const DEBOUNCE: Duration = Duration::from_millis(50);

/// Replies to every extraction request with the same body.
struct CannedService(&'static str);

#[async_trait]
impl ExtractionService for CannedService {
    async fn generate(&self, _input: &ExtractionInput) -> Result<String, AppError> {
        Ok(self.0.to_string())
    }
}

fn test_config(temp_dir: &TempDir, storage: StorageMode) -> Config {
    Config {
        admin_passphrase: Some(ADMIN_PASSPHRASE.to_string()),
        db_path: temp_dir.path().join("test.sqlite"),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        log_level: "warn".to_string(),
        storage,
        hub_api_key: Some(HUB_KEY.to_string()),
        debounce: DEBOUNCE,
        poll_interval: Duration::from_millis(50),
        extraction: ExtractionConfig {
            api_key: None,
            model: "test-model".to_string(),
            base_url: "http://127.0.0.1:9".to_string(),
        },
    }
}

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    state: AppState,
    temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_storage(StorageMode::Local, None).await
    }

    async fn with_service(service: Arc<dyn ExtractionService>) -> Self {
        Self::with_storage(StorageMode::Local, Some(service)).await
    }

    async fn with_storage(
        storage: StorageMode,
        service: Option<Arc<dyn ExtractionService>>,
    ) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config = test_config(&temp_dir, storage);

        let state = build_state(config, service)
            .await
            .expect("Failed to build state");
        state.coordinator.initialize().await;

        let app = create_router(state.clone());

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(Duration::from_millis(100)).await;

        TestFixture {
            client: Client::new(),
            base_url,
            state,
            temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json(&self, path: &str) -> Value {
        self.client
            .get(self.url(path))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    async fn login(&self) {
        let resp = self
            .client
            .post(self.url("/api/session/login"))
            .json(&json!({ "passphrase": ADMIN_PASSPHRASE }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    async fn create_update(&self) -> Value {
        let resp = self
            .client
            .post(self.url("/api/updates"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        resp.json::<Value>().await.unwrap()["data"].clone()
    }

    /// Let the debounce timer fire and the write land.
    async fn settle(&self) {
        tokio::time::sleep(DEBOUNCE * 6).await;
    }
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_fresh_session_has_default_update() {
    let fixture = TestFixture::new().await;

    let body = fixture.get_json("/api/session").await;
    assert_eq!(body["success"], true);

    let data = &body["data"];
    assert_eq!(data["ready"], true);
    assert_eq!(data["isAdmin"], false);
    assert_eq!(data["activeUpdateId"], "1");
    assert_eq!(data["extractionStatus"], "idle");
    assert_eq!(data["updates"].as_array().unwrap().len(), 1);
    assert_eq!(data["updates"][0]["name"], "Update v1.0");
    assert_eq!(data["updates"][0]["units"], json!([]));
}

#[tokio::test]
async fn test_login_and_logout() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/session/login"))
        .json(&json!({ "passphrase": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    fixture.login().await;
    assert_eq!(fixture.get_json("/api/session").await["data"]["isAdmin"], true);

    let resp = fixture
        .client
        .post(fixture.url("/api/session/logout"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["isAdmin"], false);
}

#[tokio::test]
async fn test_admin_mode_is_shared_by_all_clients() {
    let fixture = TestFixture::new().await;
    let other = Client::new();
    fixture.login().await;

    let session: Value = other
        .get(fixture.url("/api/session"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(session["data"]["isAdmin"], true);

    let resp = other
        .post(fixture.url("/api/updates"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Logging out from any client ends admin mode for all of them
    let resp = other
        .post(fixture.url("/api/session/logout"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(fixture.get_json("/api/session").await["data"]["isAdmin"], false);
}

#[tokio::test]
async fn test_viewer_cannot_mutate() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/updates"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = fixture
        .client
        .put(fixture.url("/api/updates/1/name"))
        .json(&json!({ "name": "Hacked" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = fixture
        .client
        .delete(fixture.url("/api/updates/1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let session = fixture.get_json("/api/session").await;
    assert_eq!(session["data"]["updates"][0]["name"], "Update v1.0");
}

#[tokio::test]
async fn test_create_rename_patch_delete() {
    let fixture = TestFixture::new().await;
    fixture.login().await;

    let created = fixture.create_update().await;
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["name"], "Update 2");

    let session = fixture.get_json("/api/session").await;
    assert_eq!(session["data"]["activeUpdateId"], id.as_str());

    let resp = fixture
        .client
        .put(fixture.url(&format!("/api/updates/{}/name", id)))
        .json(&json!({ "name": "  Summer Patch  " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["name"], "Summer Patch");

    let resp = fixture
        .client
        .put(fixture.url(&format!("/api/updates/{}", id)))
        .json(&json!({
            "codes": [{ "code": "SUMMER", "reward": "500 Gems" }],
            "units": [{ "id": "u1", "name": "Goku", "imageUrl": "", "status": "Evo" }]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["codes"][0]["code"], "SUMMER");
    assert_eq!(body["data"]["units"][0]["status"], "Evo");

    let resp = fixture
        .client
        .delete(fixture.url(&format!("/api/updates/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"], true);

    let session = fixture.get_json("/api/session").await;
    assert_eq!(session["data"]["updates"].as_array().unwrap().len(), 1);
    assert_eq!(session["data"]["activeUpdateId"], "1");
}

#[tokio::test]
async fn test_last_update_cannot_be_deleted() {
    let fixture = TestFixture::new().await;
    fixture.login().await;

    let resp = fixture
        .client
        .delete(fixture.url("/api/updates/1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"], false);
    assert_eq!(
        fixture.get_json("/api/session").await["data"]["updates"]
            .as_array()
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_unknown_update_is_not_found() {
    let fixture = TestFixture::new().await;
    fixture.login().await;

    let resp = fixture
        .client
        .put(fixture.url("/api/updates/missing/name"))
        .json(&json!({ "name": "Nope" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let resp = fixture
        .client
        .get(fixture.url("/api/updates/missing/export/units"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_viewer_can_select_and_export() {
    let fixture = TestFixture::new().await;
    fixture.login().await;
    let second = fixture.create_update().await["id"]
        .as_str()
        .unwrap()
        .to_string();
    fixture
        .client
        .post(fixture.url("/api/session/logout"))
        .send()
        .await
        .unwrap();

    let resp = fixture
        .client
        .post(fixture.url("/api/updates/1/select"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"], "1");

    let resp = fixture
        .client
        .get(fixture.url(&format!("/api/updates/{}/export/codes", second)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    assert_eq!(
        resp.text().await.unwrap(),
        "**New Codes**\n*No active codes found.*"
    );
}

#[tokio::test]
async fn test_text_extraction_merges_into_active_update() {
    let fixture = TestFixture::with_service(Arc::new(CannedService(
        r#"{"units":[{"name":"Goku"}],"codes":[{"code":"free50","reward":"50 Gems"}],"contentItems":[],"qol":[{"title":"Vegeta buff","type":"Buff"}]}"#,
    )))
    .await;
    fixture.login().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/extract/text"))
        .json(&json!({ "text": "Goku joins. Code FREE50 for 50 Gems. Vegeta buffed." }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["units"][0]["name"], "Goku");
    assert_eq!(body["data"]["units"][0]["status"], "Unevo");

    let update = &fixture.get_json("/api/session").await["data"]["updates"][0];
    assert_eq!(update["units"].as_array().unwrap().len(), 1);
    assert_eq!(update["codes"][0]["code"], "FREE50");
    assert_eq!(update["qol"][0]["type"], "Buff");

    let resp = fixture
        .client
        .get(fixture.url("/api/updates/1/export/units"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.text().await.unwrap(), "**New Units**\n**1** - Goku:");
}

#[tokio::test]
async fn test_extraction_without_service_reports_single_message() {
    let fixture = TestFixture::new().await;
    fixture.login().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/extract/images"))
        .json(&json!({ "images": [{ "mimeType": "image/png", "data": "AQID" }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "EXTRACTION_ERROR");
    assert_eq!(
        body["error"]["message"],
        "AI failed to scan images. Check your network or API Key."
    );
}

#[tokio::test]
async fn test_extract_images_rejects_bad_uploads() {
    let fixture = TestFixture::with_service(Arc::new(CannedService("{}"))).await;
    fixture.login().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/extract/images"))
        .json(&json!({ "images": [{ "mimeType": "image/png", "data": "not base64!" }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = fixture
        .client
        .post(fixture.url("/api/extract/images"))
        .json(&json!({ "images": [{ "mimeType": "text/plain", "data": "AQID" }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_shared_hub_requires_key_for_writes() {
    let fixture = TestFixture::new().await;

    let body = fixture.get_json("/api/shared/snapshot").await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"], Value::Null);
    let start = body["revisionId"].as_i64().unwrap();

    let updates = json!([{ "id": "x", "name": "External" }]);

    let resp = fixture
        .client
        .put(fixture.url("/api/shared/snapshot"))
        .json(&updates)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = fixture
        .client
        .put(fixture.url("/api/shared/snapshot"))
        .header("x-api-key", "wrong-key")
        .json(&updates)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = fixture
        .client
        .put(fixture.url("/api/shared/snapshot"))
        .header("Authorization", format!("Bearer {}", HUB_KEY))
        .json(&updates)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let revision = fixture.get_json("/api/shared/revision").await;
    assert_eq!(revision["data"]["revisionId"].as_i64().unwrap(), start + 1);

    let body = fixture.get_json("/api/shared/snapshot").await;
    assert_eq!(body["data"][0]["name"], "External");
    assert_eq!(body["data"][0]["codes"], json!([]));
}

#[tokio::test]
async fn test_hub_mode_publishes_admin_edits() {
    let fixture = TestFixture::with_storage(StorageMode::Hub, None).await;
    fixture.login().await;

    fixture.create_update().await;
    fixture.settle().await;

    let body = fixture.get_json("/api/shared/snapshot").await;
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Update v1.0", "Update 2"]);
}

#[tokio::test]
async fn test_hub_mode_applies_external_writes() {
    let fixture = TestFixture::with_storage(StorageMode::Hub, None).await;

    let resp = fixture
        .client
        .put(fixture.url("/api/shared/snapshot"))
        .header("x-api-key", HUB_KEY)
        .json(&json!([
            { "id": "a", "name": "From another editor" },
            { "id": "b", "name": "Second" }
        ]))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    fixture.settle().await;

    let session = fixture.get_json("/api/session").await;
    let updates = session["data"]["updates"].as_array().unwrap();
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0]["name"], "From another editor");
    // The default update was active and no longer exists
    assert!(session["data"].get("activeUpdateId").is_none());
}

#[tokio::test]
async fn test_local_mode_survives_restart() {
    let fixture = TestFixture::new().await;
    fixture.login().await;
    let created = fixture.create_update().await;
    fixture.settle().await;
    fixture.state.coordinator.shutdown().await;

    let config = test_config(&fixture.temp_dir, StorageMode::Local);
    let restarted = build_state(config, None).await.unwrap();
    restarted.coordinator.initialize().await;

    let snapshot = restarted.coordinator.snapshot().await;
    assert_eq!(snapshot.updates.len(), 2);
    assert_eq!(
        snapshot.active_update_id.as_deref(),
        created["id"].as_str()
    );
    assert!(snapshot.is_admin);
}
