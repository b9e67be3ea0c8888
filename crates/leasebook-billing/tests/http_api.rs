use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use leasebook_billing::config::BillingConfig;
use leasebook_billing::domain::{Contract, ContractId, FixedClock, TenantId, UnitId};
use leasebook_billing::server::BillingServer;
use leasebook_billing::storage::{InMemoryLedgerStore, ReceivableRepository};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

async fn test_app() -> (Router, Arc<InMemoryLedgerStore>) {
    let store = Arc::new(InMemoryLedgerStore::new());
    store
        .insert_contract(Contract {
            id: ContractId::new("c-950"),
            unit_id: UnitId::new("unit-4b"),
            tenant_id: TenantId::new("tenant-17"),
            start_date: date(2024, 1, 15),
            end_date: Some(date(2024, 4, 10)),
            base_rent: dec!(800),
            utilities: dec!(100),
            heating: dec!(50),
            total_rent: dec!(950),
        })
        .await;

    let server = BillingServer::with_repositories(
        BillingConfig::default(),
        store.clone(),
        store.clone(),
        Arc::new(FixedClock(date(2024, 2, 1))),
    );
    (server.router(), store)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn recalculate(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/receivables/recalculate")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_recalculate_returns_counts() {
    let (app, _store) = test_app().await;

    let (status, body) = send(&app, recalculate(json!({ "contractId": "c-950" }).to_string())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["generatedCount"], json!(4));
    assert_eq!(body["deletedCount"], json!(0));
    assert!(body["message"].as_str().unwrap().contains("c-950"));

    let (status, body) = send(&app, recalculate(json!({ "contractId": "c-950" }).to_string())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["generatedCount"], json!(4));
    assert_eq!(body["deletedCount"], json!(4));
}

#[tokio::test]
async fn test_unknown_contract_is_404() {
    let (app, store) = test_app().await;

    let (status, body) =
        send(&app, recalculate(json!({ "contractId": "c-missing" }).to_string())).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "contract not found" }));
    assert!(store
        .list_items(&ContractId::new("c-missing"))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_invalid_requests_are_400() {
    let (app, store) = test_app().await;

    let bodies = [
        json!({}).to_string(),
        json!({ "contractId": "" }).to_string(),
        json!({ "contractId": "   " }).to_string(),
        json!({ "contractId": 42 }).to_string(),
        "not json".to_string(),
    ];

    for raw in bodies {
        let (status, body) = send(&app, recalculate(raw.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {}", raw);
        assert!(body["error"].is_string(), "body {}", raw);
    }

    let (_, body) = send(&app, recalculate(json!({}).to_string())).await;
    assert_eq!(body["error"], json!("contractId is required"));

    assert!(store
        .list_items(&ContractId::new("c-950"))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_list_receivables_after_recalculation() {
    let (app, _store) = test_app().await;
    send(&app, recalculate(json!({ "contractId": "c-950" }).to_string())).await;

    let (status, body) = send(&app, get("/api/v1/contracts/c-950/receivables")).await;

    assert_eq!(status, StatusCode::OK);
    let items = body["items"].as_array().unwrap();
    let months: Vec<&str> = items
        .iter()
        .map(|i| i["paymentMonth"].as_str().unwrap())
        .collect();
    assert_eq!(months, vec!["2024-01", "2024-02", "2024-03", "2024-04"]);
    assert_eq!(items[0]["dueDate"], json!("2024-01-01"));
    assert_eq!(items[0]["status"], json!("pending"));
    assert_eq!(items[0]["isAutogenerated"], json!(true));
    assert_eq!(body["totalExpected"], json!("3800.00"));
}

#[tokio::test]
async fn test_schedule_preview_does_not_write() {
    let (app, store) = test_app().await;

    let (status, body) = send(&app, get("/api/v1/contracts/c-950/schedule")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().unwrap().len(), 4);
    assert_eq!(body["window"], json!({ "start": "2024-01", "end": "2024-04" }));
    assert!(store
        .list_items(&ContractId::new("c-950"))
        .await
        .unwrap()
        .is_empty());

    let (status, body) = send(&app, get("/api/v1/contracts/c-404/schedule")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], json!("contract not found"));
}

#[tokio::test]
async fn test_health() {
    let (app, _store) = test_app().await;

    let (status, body) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("healthy"));
}
