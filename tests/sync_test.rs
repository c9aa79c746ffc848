use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde_json::{Value, json};
use stockroute::auth;
use stockroute::config::{Config, RemoteConfig, SyncRole};
use stockroute::db;
use stockroute::infrastructure::AppState;
use stockroute::models::{customer, operation_log, product, stock_adjustment, supplier};
use stockroute::models::sync_state::LAST_PULLED_AT;
use stockroute::server::build_router;
use stockroute::sync::{
    self, OperationStatus, SyncOperation, SyncService, count_operations, get_state, processor,
};
use tower::util::ServiceExt; // for `oneshot`
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn setup_test_db() -> DatabaseConnection {
    db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB")
}

fn remote(url: &str) -> RemoteConfig {
    RemoteConfig {
        url: url.to_string(),
        username: "device".to_string(),
        password: "device-password".to_string(),
    }
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn customer_row(id: &str, name: &str, updated_at: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "contact_person": null,
        "email": null,
        "phone": null,
        "address": null,
        "notes": null,
        "is_deleted": false,
        "deleted_date": null,
        "created_at": updated_at,
        "updated_at": updated_at
    })
}

async fn journal_supplier(db: &DatabaseConnection, id: &str) -> String {
    let row = json!({
        "id": id,
        "name": "Acme",
        "contact_person": null,
        "email": null,
        "phone": null,
        "address": null,
        "notes": null,
        "is_deleted": false,
        "deleted_date": null,
        "created_at": "2026-10-19T08:00:00.000000Z",
        "updated_at": "2026-10-19T08:00:00.000000Z"
    });
    sync::log_operation(db, sync::entity::SUPPLIER, id, sync::ops::UPSERT, Some(row))
        .await
        .unwrap()
}

async fn op_status(db: &DatabaseConnection, id: &str) -> operation_log::Model {
    operation_log::Entity::find_by_id(id.to_string())
        .one(db)
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn test_sync_pushes_then_pulls() {
    let server = MockServer::start().await;
    let db = setup_test_db().await;
    let op_id = journal_supplier(&db, "sup-1").await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "t-1" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/sync/push"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{ "id": op_id, "status": "applied" }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/sync/pull"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "server_time": "2026-10-19T09:00:00.000000Z",
            "customers": [customer_row("cus-1", "Corner Shop", "2026-10-19T08:30:00.000000Z")]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let service = SyncService::new(db.clone(), remote(&server.uri()), 50).unwrap();

    let report = service.sync().await.unwrap();
    assert_eq!(report.pushed, 1);
    assert_eq!(report.applied, 1);
    assert_eq!(report.pulled, 1);
    assert_eq!(report.merged, 1);
    assert_eq!(
        report.last_pulled_at.as_deref(),
        Some("2026-10-19T09:00:00.000000Z")
    );

    assert_eq!(op_status(&db, &op_id).await.status, "applied");
    let pulled = customer::Entity::find_by_id("cus-1".to_string())
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pulled.name, "Corner Shop");
    assert_eq!(
        get_state(&db, LAST_PULLED_AT).await.unwrap().as_deref(),
        Some("2026-10-19T09:00:00.000000Z")
    );

    // Nothing left to push and the same row again is not newer
    let report = service.sync().await.unwrap();
    assert_eq!(report.pushed, 0);
    assert_eq!(report.merged, 0);

    let status = service.status().await.unwrap();
    assert_eq!(status.role, "client");
    assert_eq!(status.pending_operations, 0);
    assert_eq!(status.remote_url.as_deref(), Some(server.uri().as_str()));
}

#[tokio::test]
async fn test_sync_logs_in_again_after_401() {
    let server = MockServer::start().await;
    let db = setup_test_db().await;
    let op_id = journal_supplier(&db, "sup-2").await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "fresh" })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/sync/push"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/sync/push"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{ "id": op_id, "status": "skipped" }]
        })))
        .mount(&server)
        .await;

    let report = service_push(&db, &server).await;
    assert_eq!(report.pushed, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(op_status(&db, &op_id).await.status, "skipped");
}

async fn service_push(db: &DatabaseConnection, server: &MockServer) -> sync::SyncReport {
    SyncService::new(db.clone(), remote(&server.uri()), 10)
        .unwrap()
        .push()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_rejected_operation_is_marked_failed() {
    let server = MockServer::start().await;
    let db = setup_test_db().await;
    let op_id = journal_supplier(&db, "sup-3").await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "t" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/sync/push"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{ "id": op_id, "status": "failed", "error": "Supplier payload rejected" }]
        })))
        .mount(&server)
        .await;

    let report = service_push(&db, &server).await;
    assert_eq!(report.failed, 1);

    let row = op_status(&db, &op_id).await;
    assert_eq!(row.status, "failed");
    assert_eq!(row.error_message.as_deref(), Some("Supplier payload rejected"));
    assert_eq!(count_operations(&db, OperationStatus::Failed).await.unwrap(), 1);
    assert_eq!(count_operations(&db, OperationStatus::Pending).await.unwrap(), 0);
}

#[tokio::test]
async fn test_unreachable_server_keeps_operations_pending() {
    let db = setup_test_db().await;
    journal_supplier(&db, "sup-4").await;

    let service = SyncService::new(db.clone(), remote("http://127.0.0.1:1"), 10).unwrap();
    let err = service.sync().await.unwrap_err();
    assert!(matches!(err, stockroute::domain::DomainError::External(_)));
    assert_eq!(count_operations(&db, OperationStatus::Pending).await.unwrap(), 1);
}

#[tokio::test]
async fn test_server_ignores_duplicate_pushes() {
    let db = setup_test_db().await;
    let op = SyncOperation {
        id: "op-1".to_string(),
        entity_type: sync::entity::CUSTOMER.to_string(),
        entity_id: "cus-9".to_string(),
        operation: sync::ops::UPSERT.to_string(),
        payload: Some(customer_row("cus-9", "Bistro", "2026-10-19T07:00:00.000000Z")),
        created_at: "2026-10-19T07:00:00.000000Z".to_string(),
    };

    assert_eq!(processor::store_operations(&db, &[op.clone()]).await.unwrap(), 1);
    assert_eq!(processor::drain(&db).await.unwrap(), 1);

    // The same operation again is neither stored nor applied twice
    assert_eq!(processor::store_operations(&db, &[op]).await.unwrap(), 0);
    assert_eq!(processor::drain(&db).await.unwrap(), 0);

    let results = processor::operation_results(&db, &["op-1".to_string(), "op-2".to_string()])
        .await
        .unwrap();
    assert_eq!(results[0].status, OperationStatus::Applied);
    assert_eq!(results[1].status, OperationStatus::Failed);
}

/// A device works offline, then syncs with a real server over HTTP
#[tokio::test]
async fn test_device_and_server_converge() {
    // Server side, with the device account
    let server_db = setup_test_db().await;
    let server_app = build_router(AppState::new(server_db.clone(), Config::default()));
    let (status, _) = send(
        &server_app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "username": "device", "password": "device-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let served = server_app.clone();
    tokio::spawn(async move {
        axum::serve(listener, served).await.unwrap();
    });

    // Device side
    let device_db = setup_test_db().await;
    let device_state = AppState::new(
        device_db.clone(),
        Config {
            sync_role: SyncRole::Client,
            remote: Some(remote(&format!("http://{}", addr))),
            ..Config::default()
        },
    );
    let device_app = build_router(device_state.clone());
    let token = auth::create_jwt("driver", "user").unwrap();

    let (_, body) = send(
        &device_app,
        "POST",
        "/api/suppliers",
        Some(&token),
        Some(json!({ "name": "Acme" })),
    )
    .await;
    let supplier_id = body["supplier"]["id"].as_str().unwrap().to_string();

    let (_, body) = send(
        &device_app,
        "POST",
        "/api/products",
        Some(&token),
        Some(json!({
            "sku": "CRATE-1",
            "name": "Crate",
            "unit_price": 3.0,
            "stock_quantity": 10,
            "reorder_level": 2,
            "supplier_id": supplier_id
        })),
    )
    .await;
    let product_id = body["product"]["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &device_app,
        "POST",
        "/api/stock/adjustments",
        Some(&token),
        Some(json!({ "product_id": product_id, "quantity_change": -4, "reason": "damaged" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = send(
        &device_app,
        "POST",
        "/api/customers",
        Some(&token),
        Some(json!({ "name": "Corner Shop" })),
    )
    .await;
    let customer_id = body["customer"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &device_app,
        "POST",
        "/api/deliveries",
        Some(&token),
        Some(json!({
            "delivery_type": "outgoing",
            "customer_id": customer_id,
            "items": [{ "product_id": product_id, "quantity": 3 }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let delivery_id = body["delivery"]["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &device_app,
        "POST",
        &format!("/api/deliveries/{}/process", delivery_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let pending = operation_log::Entity::find()
        .order_by_asc(operation_log::Column::CreatedAt)
        .all(&device_db)
        .await
        .unwrap();
    let journal: Vec<(String, String)> = pending
        .iter()
        .map(|op| (op.entity_type.clone(), op.operation.clone()))
        .collect();
    assert_eq!(
        journal,
        vec![
            ("supplier".to_string(), "upsert".to_string()),
            ("product".to_string(), "upsert".to_string()),
            ("stock_adjustment".to_string(), "upsert".to_string()),
            ("stock_adjustment".to_string(), "adjust".to_string()),
            ("customer".to_string(), "upsert".to_string()),
            ("delivery".to_string(), "upsert".to_string()),
            ("delivery_item".to_string(), "upsert".to_string()),
            ("delivery".to_string(), "process".to_string()),
        ]
    );

    let service = device_state.sync_service.clone().unwrap();
    let report = service.sync().await.unwrap();
    assert_eq!(report.pushed, 8);
    assert_eq!(report.applied, 8, "{:?}", report);
    assert_eq!(report.failed, 0);

    // Server replayed the workflow: 10 - 4 - 3
    let server_product = product::Entity::find_by_id(product_id.clone())
        .one(&server_db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(server_product.stock_quantity, 3);

    // Adjustments keep their ids on both sides
    let ids = |rows: Vec<stock_adjustment::Model>| {
        let mut ids: Vec<String> = rows.into_iter().map(|a| a.id).collect();
        ids.sort();
        ids
    };
    let on_server = stock_adjustment::Entity::find()
        .filter(stock_adjustment::Column::ProductId.eq(product_id.as_str()))
        .all(&server_db)
        .await
        .unwrap();
    let on_device = stock_adjustment::Entity::find()
        .filter(stock_adjustment::Column::ProductId.eq(product_id.as_str()))
        .all(&device_db)
        .await
        .unwrap();
    assert_eq!(on_server.len(), 3);
    assert_eq!(ids(on_server), ids(on_device));

    // Changes made on the server reach the device on the next pull
    let admin_token = auth::create_jwt("office", "admin").unwrap();
    let (status, _) = send(
        &server_app,
        "POST",
        "/api/suppliers",
        Some(&admin_token),
        Some(json!({ "name": "Mill & Co" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let report = service.sync().await.unwrap();
    assert_eq!(report.pushed, 0);
    assert!(report.merged >= 1);

    let names: Vec<String> = supplier::Entity::find()
        .all(&device_db)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert!(names.contains(&"Mill & Co".to_string()));

    let device_product = product::Entity::find_by_id(product_id)
        .one(&device_db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(device_product.stock_quantity, 3);
}
