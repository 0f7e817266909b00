use std::sync::Arc;

use async_trait::async_trait;
use mdm_api::{
    api,
    auth::{
        dev::dev_subject_id, Authenticator, DevIdentityProvider, IdentityProvider,
        PermissionPolicy, VerifiedIdentity, VerifyError,
    },
    partnerships::PartnershipStore,
    state::AppState,
};
use mdm_testing::FakeWarehouse;
use mdm_warehouse::{Row, TableRef};
use reqwest::{header, StatusCode};
use serde_json::{json, Value};
use tokio::net::TcpListener;

const STAFF: &str = "Bearer user:staff@weedme.ca";
const BOSS: &str = "Bearer user:boss@weedme.ca";
const OUTSIDER: &str = "Bearer user:someone@gmail.com";

/// Dev tokens, plus two fixed tokens that simulate provider failures.
struct TestProvider;

#[async_trait]
impl IdentityProvider for TestProvider {
    async fn verify_token(&self, token: &str) -> Result<VerifiedIdentity, VerifyError> {
        match token {
            "expired-token" => Err(VerifyError::Expired),
            "outage-token" => Err(VerifyError::Unavailable("jwks unreachable".to_string())),
            other => DevIdentityProvider.verify_token(other).await,
        }
    }
}

struct ApiFixture {
    base_url: String,
    client: reqwest::Client,
    warehouse: FakeWarehouse,
}

impl ApiFixture {
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get(&self, path: &str, auth: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .header(header::AUTHORIZATION, auth)
            .send()
            .await
            .unwrap()
    }
}

fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => panic!("row must be an object"),
    }
}

fn stored(id: &str, name: &str, status: &str, region: &str) -> Row {
    row(json!({
        "id": id,
        "name": name,
        "status": status,
        "region": region,
        "tier": "Silver",
        "source_type": "Email",
        "created_at": "2024-01-01T00:00:00.000000Z",
        "updated_at": "2024-01-01T00:00:00.000000Z",
        "created_by": "usr_seed",
        "updated_by": "usr_seed"
    }))
}

/// Matches the rows a list or count statement would select, using the bound
/// filter values the same way the warehouse would.
fn matches_filter(stmt: &mdm_warehouse::Statement, row: &Row) -> bool {
    let text = |name: &str| row.get(name).and_then(Value::as_str).unwrap_or_default().to_string();
    let like = |name: &str| {
        stmt.param(name)
            .and_then(|v| v.as_str())
            .map(|p| p.trim_matches('%').to_string())
    };

    if let Some(status) = stmt.param("status").and_then(|v| v.as_str()) {
        if text("status") != status {
            return false;
        }
    }
    if let Some(region) = like("region") {
        if !text("region").contains(&region) {
            return false;
        }
    }
    if let Some(search) = like("search") {
        if !text("name").to_lowercase().contains(&search) && !text("id").to_lowercase().contains(&search) {
            return false;
        }
    }
    true
}

async fn start_api() -> ApiFixture {
    let warehouse = FakeWarehouse::new("id", "partnership_id");
    warehouse.seed(stored("LL", "Leaf Ltd", "Active", "AB,ON"));
    warehouse.seed(stored("PL", "Pine Labs", "Inactive", "BC"));

    warehouse.respond_to(
        |stmt| stmt.sql.contains("COUNT(*) AS total FROM"),
        |stmt, rows| {
            let total = rows.iter().filter(|r| matches_filter(stmt, r)).count();
            vec![row(json!({ "total": total }))]
        },
    );
    warehouse.respond_to(
        |stmt| stmt.sql.contains("ORDER BY name ASC"),
        |stmt, rows| {
            let mut selected: Vec<Row> =
                rows.iter().filter(|r| matches_filter(stmt, r)).cloned().collect();
            selected.sort_by_key(|r| r["name"].as_str().unwrap_or_default().to_string());
            selected
        },
    );
    warehouse.respond_to(
        |stmt| stmt.sql.contains("total_partnerships"),
        |_, rows| {
            let active = rows.iter().filter(|r| r["status"] == "Active").count();
            vec![row(json!({
                "total_partnerships": rows.len(),
                "active_partnerships": active,
                "inactive_partnerships": rows.len() - active,
                "unique_regions": 2,
                "unique_source_types": 1
            }))]
        },
    );

    let authenticator = Authenticator::new(
        Arc::new(TestProvider),
        PermissionPolicy::new("weedme.ca", ["boss@weedme.ca"]),
    );
    let store = PartnershipStore::new(
        Arc::new(warehouse.clone()),
        TableRef::new("proj", "mdm", "Partnership_Master_List"),
    );
    let state = AppState::new(authenticator, store, Arc::new(warehouse.clone()));
    let app = api::create_router(state, &["http://localhost:3000".to_string()]);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    ApiFixture {
        base_url: format!("http://{addr}"),
        client: reqwest::Client::new(),
        warehouse,
    }
}

#[tokio::test]
async fn health_endpoints_need_no_auth() {
    let api = start_api().await;

    let resp = api.client.get(api.url("/healthz")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-request-id"));

    let resp = api.client.get(api.url("/readyz")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    api.warehouse.set_unavailable(true);
    let resp = api.client.get(api.url("/readyz")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn missing_or_bad_tokens_get_401_with_challenge() {
    let api = start_api().await;

    let resp = api.client.get(api.url("/api/v1/partnerships")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers()[header::WWW_AUTHENTICATE], "Bearer");
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "unauthenticated");

    let resp = api.get("/api/v1/partnerships", "Bearer expired-token").await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "token_expired");

    let resp = api.get("/api/v1/partnerships", "Bearer not-a-dev-token").await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "token_invalid");

    let resp = api.get("/api/v1/partnerships", "Bearer outage-token").await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "unauthenticated");
}

#[tokio::test]
async fn list_filters_and_reports_total() {
    let api = start_api().await;

    let resp = api.get("/api/v1/partnerships?region=ON", OUTSIDER).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["total"], 1);
    assert_eq!(body["page"], 1);
    assert_eq!(body["page_size"], 100);
    assert_eq!(body["data"][0]["id"], "LL");

    let resp = api.get("/api/v1/partnerships?status=Active", STAFF).await;
    let body: Value = resp.json().await.unwrap();
    let ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["LL"]);

    let resp = api.get("/api/v1/partnerships?page_size=0", STAFF).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = api.get("/api/v1/partnerships?status=Archived", STAFF).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn outsiders_can_read_but_not_write() {
    let api = start_api().await;

    let resp = api.get("/api/v1/partnerships/LL", OUTSIDER).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["name"], "Leaf Ltd");

    let resp = api
        .client
        .post(api.url("/api/v1/partnerships"))
        .header(header::AUTHORIZATION, OUTSIDER)
        .json(&json!({ "id": "NEW", "name": "New Co", "region": "ON" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert!(resp.headers().get(header::WWW_AUTHENTICATE).is_none());
    let body: Value = resp.json().await.unwrap();
    assert!(body["detail"].as_str().unwrap().contains("write"));
    assert_eq!(api.warehouse.insert_count(), 0);
}

#[tokio::test]
async fn create_stamps_actor_and_rejects_duplicates() {
    let api = start_api().await;

    let resp = api
        .client
        .post(api.url("/api/v1/partnerships"))
        .header(header::AUTHORIZATION, STAFF)
        .json(&json!({
            "id": "NEW",
            "name": "New Co",
            "region": "ON,QC",
            "parent_name": "Leaf Ltd",
            "created_by": "spoofed"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["status"], "Active");
    assert_eq!(body["data"]["Parent_Partnership"], "Leaf Ltd");
    assert_eq!(body["data"]["created_by"], dev_subject_id("staff@weedme.ca"));

    let resp = api
        .client
        .post(api.url("/api/v1/partnerships"))
        .header(header::AUTHORIZATION, STAFF)
        .json(&json!({ "id": "LL", "name": "Dup", "region": "ON" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "duplicate_id");
    assert_eq!(api.warehouse.insert_count(), 1);
}

#[tokio::test]
async fn create_rejects_invalid_region_with_field_details() {
    let api = start_api().await;

    let resp = api
        .client
        .post(api.url("/api/v1/partnerships"))
        .header(header::AUTHORIZATION, STAFF)
        .json(&json!({ "id": "NEW", "name": "New Co", "region": "ON,XX" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/problem+json");
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["details"][0]["field"], "region");
    assert_eq!(body["details"][0]["value"], "XX");
    assert_eq!(api.warehouse.insert_count(), 0);
}

#[tokio::test]
async fn update_changes_only_supplied_fields() {
    let api = start_api().await;

    let resp = api
        .client
        .put(api.url("/api/v1/partnerships/LL"))
        .header(header::AUTHORIZATION, STAFF)
        .json(&json!({ "tier": "Gold" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["tier"], "Gold");
    assert_eq!(body["data"]["name"], "Leaf Ltd");
    assert_eq!(body["data"]["region"], "AB,ON");
    assert_eq!(body["data"]["updated_by"], dev_subject_id("staff@weedme.ca"));
    assert_eq!(body["data"]["created_by"], "usr_seed");

    let resp = api
        .client
        .put(api.url("/api/v1/partnerships/NOPE"))
        .header(header::AUTHORIZATION, STAFF)
        .json(&json!({ "tier": "Gold" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(api.warehouse.statements().len(), 1);
}

#[tokio::test]
async fn delete_is_soft_and_needs_delete_capability() {
    let api = start_api().await;

    let resp = api
        .client
        .delete(api.url("/api/v1/partnerships/LL"))
        .header(header::AUTHORIZATION, OUTSIDER)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = api
        .client
        .delete(api.url("/api/v1/partnerships/LL"))
        .header(header::AUTHORIZATION, STAFF)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = api.get("/api/v1/partnerships/LL", STAFF).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["status"], "Inactive");
    assert_eq!(body["data"]["tier"], "Silver");

    let resp = api
        .client
        .delete(api.url("/api/v1/partnerships/NOPE"))
        .header(header::AUTHORIZATION, STAFF)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bulk_create_reports_per_item_results() {
    let api = start_api().await;

    let resp = api
        .client
        .post(api.url("/api/v1/partnerships/bulk"))
        .header(header::AUTHORIZATION, STAFF)
        .json(&json!([
            { "id": "B1", "name": "One", "region": "ON" },
            { "id": "LL", "name": "Dup", "region": "ON" },
            { "id": "B3", "name": "Three", "region": "NS" }
        ]))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await.unwrap();
    let data = &body["data"];
    assert_eq!(data["summary"], json!({ "total_requested": 3, "successful": 2, "failed": 1 }));
    assert_eq!(data["created"][0]["id"], "B1");
    assert_eq!(data["created"][1]["id"], "B3");
    assert_eq!(data["errors"][0]["partnership_id"], "LL");
}

#[tokio::test]
async fn stats_and_csv_export() {
    let api = start_api().await;

    let resp = api.get("/api/v1/partnerships/stats/summary", OUTSIDER).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["total_partnerships"], 2);
    assert_eq!(body["data"]["active_partnerships"], 1);

    let resp = api.get("/api/v1/partnerships/export/csv?status=Active", OUTSIDER).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=partnerships.csv"
    );
    let text = resp.text().await.unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("ID,Name,Status,Region"));
    assert!(lines[1].starts_with("LL,Leaf Ltd,Active,\"AB,ON\",Silver"));
}

#[tokio::test]
async fn session_and_admin_catalogue() {
    let api = start_api().await;

    let resp = api.client.get(api.url("/api/v1/session")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["authenticated"], false);

    let resp = api.get("/api/v1/session", "Bearer expired-token").await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["authenticated"], false);

    let resp = api.get("/api/v1/session", BOSS).await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["principal"]["role"], "admin");
    assert_eq!(
        body["principal"]["capabilities"],
        json!(["read", "write", "delete", "approve", "admin"])
    );

    let resp = api.get("/api/v1/admin/capabilities", STAFF).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = api.get("/api/v1/admin/capabilities", BOSS).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 5);
}
