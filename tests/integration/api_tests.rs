//! API integration tests
//!
//! Drive the full router in-process against the in-memory store.

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_test::assert_ok;
use tower::ServiceExt;
use uuid::Uuid;

use equiptrack_server::{
    api, models::enums::Role, models::user::UserClaims, repository::MemoryStore,
    services::Services, AppConfig, AppState,
};

struct TestApp {
    router: Router,
    secret: String,
}

impl TestApp {
    fn new() -> Self {
        let config = AppConfig::default();
        let secret = config.auth.jwt_secret.clone();
        let services = Services::new(Arc::new(MemoryStore::new()), config.reports.clone());
        let state = AppState {
            config: Arc::new(config),
            services: Arc::new(services),
        };
        Self {
            router: api::create_router(state),
            secret,
        }
    }

    fn token(&self, sub: Uuid, role: Role) -> String {
        let now = Utc::now().timestamp();
        let claims = UserClaims {
            sub,
            role,
            exp: now + 3600,
            iat: now,
        };
        assert_ok!(claims.create_token(&self.secret))
    }

    fn admin(&self) -> String {
        self.token(Uuid::new_v4(), Role::Admin)
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(token), None).await
    }

    async fn post(&self, uri: &str, token: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(token), body).await
    }

    /// Category plus one available equipment, returns the equipment id
    async fn seed_equipment(&self, admin: &str, name: &str) -> String {
        let (status, category) = self
            .post(
                "/api/v1/categories",
                admin,
                Some(json!({ "name": format!("{} category", name) })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, equipment) = self
            .post(
                "/api/v1/equipment",
                admin,
                Some(json!({ "name": name, "category_id": category["id"] })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(equipment["status"], "available");
        equipment["id"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.send(Method::GET, "/api/v1/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_authentication_required() {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/api/v1/equipment", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "NotAuthorized");

    let (status, _) = app
        .send(Method::GET, "/api/v1/equipment", Some("not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_inventory_writes_require_admin() {
    let app = TestApp::new();
    let user = app.token(Uuid::new_v4(), Role::User);

    let (status, _) = app
        .post("/api/v1/categories", &user, Some(json!({ "name": "Cameras" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_loan_return_cycle() {
    let app = TestApp::new();
    let admin = app.admin();
    let alice_id = Uuid::new_v4();
    let alice = app.token(alice_id, Role::User);
    let bob = app.token(Uuid::new_v4(), Role::User);
    let id = app.seed_equipment(&admin, "Canon EOS R6").await;

    let (status, loan) = app
        .post(&format!("/api/v1/equipment/{}/loan", id), &alice, None)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(loan["equipment"]["status"], "loaned");
    assert_eq!(loan["loan"]["user_id"], alice_id.to_string());
    let loan_id = loan["loan"]["id"].as_str().unwrap().to_string();

    let (status, err) = app
        .post(&format!("/api/v1/equipment/{}/loan", id), &bob, None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"], "InvalidState");
    assert_eq!(err["current_status"], "loaned");

    // Only the borrower or an administrator may return it
    let (status, _) = app
        .post(&format!("/api/v1/loans/{}/return", loan_id), &bob, None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, returned) = app
        .post(
            &format!("/api/v1/loans/{}/return", loan_id),
            &alice,
            Some(json!({ "notes": "battery low" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(returned["equipment"]["status"], "available");
    assert_eq!(returned["loan"]["status"], "returned");
    assert_eq!(returned["loan"]["notes"], "battery low");

    let (status, _) = app
        .post(&format!("/api/v1/loans/{}/return", loan_id), &alice, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .post(&format!("/api/v1/equipment/{}/loan", id), &bob, None)
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_maintenance_cycle() {
    let app = TestApp::new();
    let admin = app.admin();
    let user = app.token(Uuid::new_v4(), Role::User);
    let id = app.seed_equipment(&admin, "Bosch drill").await;

    let (status, started) = app
        .post(
            &format!("/api/v1/equipment/{}/maintenance", id),
            &admin,
            Some(json!({ "maintenance_type": "preventive" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(started["equipment"]["status"], "in_maintenance");
    let record_id = started["maintenance"]["id"].as_str().unwrap().to_string();

    let (status, err) = app
        .post(&format!("/api/v1/equipment/{}/loan", id), &user, None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["current_status"], "in_maintenance");

    let (status, closed) = app
        .post(
            &format!("/api/v1/maintenance/{}/close", record_id),
            &admin,
            Some(json!({ "notes": "replaced fan" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(closed["equipment"]["status"], "available");
    assert!(closed["maintenance"]["closed_at"].is_string());

    let (status, err) = app
        .post(&format!("/api/v1/maintenance/{}/close", record_id), &admin, None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"], "AlreadyClosed");
}

#[tokio::test]
async fn test_reservation_fulfill_and_cancel() {
    let app = TestApp::new();
    let admin = app.admin();
    let user = app.token(Uuid::new_v4(), Role::User);
    let first = app.seed_equipment(&admin, "Projector A").await;
    let second = app.seed_equipment(&admin, "Projector B").await;
    let date = json!({ "scheduled_at": "2025-01-10T09:00:00Z" });

    let (status, reserved) = app
        .post(
            &format!("/api/v1/equipment/{}/reservation", first),
            &user,
            Some(date.clone()),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(reserved["equipment"]["status"], "reserved");
    assert_eq!(reserved["loan"]["kind"], "reservation");

    let (status, err) = app
        .post(&format!("/api/v1/equipment/{}/loan", first), &user, None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["current_status"], "reserved");

    let reservation_id = reserved["loan"]["id"].as_str().unwrap();
    let (status, fulfilled) = app
        .post(&format!("/api/v1/loans/{}/fulfill", reservation_id), &user, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fulfilled["equipment"]["status"], "loaned");
    assert_eq!(fulfilled["reservation"]["status"], "fulfilled");
    assert_eq!(fulfilled["loan"]["reservation_id"], reservation_id);

    let (_, reserved) = app
        .post(
            &format!("/api/v1/equipment/{}/reservation", second),
            &user,
            Some(date),
        )
        .await;
    let reservation_id = reserved["loan"]["id"].as_str().unwrap();
    let (status, cancelled) = app
        .post(&format!("/api/v1/loans/{}/cancel", reservation_id), &user, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["equipment"]["status"], "available");
    assert_eq!(cancelled["loan"]["status"], "cancelled");
}

#[tokio::test]
async fn test_override_and_restore() {
    let app = TestApp::new();
    let admin = app.admin();
    let user = app.token(Uuid::new_v4(), Role::User);
    let id = app.seed_equipment(&admin, "Tripod").await;

    let (_, loan) = app
        .post(&format!("/api/v1/equipment/{}/loan", id), &user, None)
        .await;

    let (status, _) = app
        .post(&format!("/api/v1/equipment/{}/unavailable", id), &user, None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, overridden) = app
        .post(
            &format!("/api/v1/equipment/{}/unavailable", id),
            &admin,
            Some(json!({ "reason": "lost" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(overridden["equipment"]["status"], "unavailable");
    assert_eq!(overridden["closed_loan"]["id"], loan["loan"]["id"]);
    assert_eq!(overridden["closed_loan"]["status"], "cancelled");

    let (status, restored) = app
        .post(&format!("/api/v1/equipment/{}/restore", id), &admin, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(restored["status"], "available");
}

#[tokio::test]
async fn test_list_filters() {
    let app = TestApp::new();
    let admin = app.admin();
    let user = app.token(Uuid::new_v4(), Role::User);
    let id = app.seed_equipment(&admin, "Sony A7").await;
    app.seed_equipment(&admin, "Rode mic").await;
    app.post(&format!("/api/v1/equipment/{}/loan", id), &user, None)
        .await;

    let (status, loaned) = app.get("/api/v1/equipment?status=loaned", &user).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(loaned.as_array().unwrap().len(), 1);
    assert_eq!(loaned[0]["id"], id);

    let (status, named) = app.get("/api/v1/equipment?name=rode", &user).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(named.as_array().unwrap().len(), 1);

    let (status, err) = app.get("/api/v1/equipment?status=prestado", &user).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "BadValue");
}

#[tokio::test]
async fn test_removal_and_category_rules() {
    let app = TestApp::new();
    let admin = app.admin();
    let user = app.token(Uuid::new_v4(), Role::User);
    let used = app.seed_equipment(&admin, "Gimbal").await;
    let unused = app.seed_equipment(&admin, "Spare cable").await;

    let (_, loan) = app
        .post(&format!("/api/v1/equipment/{}/loan", used), &user, None)
        .await;
    let loan_id = loan["loan"]["id"].as_str().unwrap();
    app.post(&format!("/api/v1/loans/{}/return", loan_id), &user, None)
        .await;

    let (status, removal) = app
        .send(
            Method::DELETE,
            &format!("/api/v1/equipment/{}", unused),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(removal["outcome"], "deleted");

    let (status, removal) = app
        .send(
            Method::DELETE,
            &format!("/api/v1/equipment/{}", used),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(removal["outcome"], "retired");
    assert_eq!(removal["equipment"]["status"], "unavailable");

    let (_, equipment) = app.get(&format!("/api/v1/equipment/{}", used), &admin).await;
    let category = equipment["category_id"].as_str().unwrap();
    let (status, err) = app
        .send(
            Method::DELETE,
            &format!("/api/v1/categories/{}", category),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(err["error"], "Rejected");
}

#[tokio::test]
async fn test_reports() {
    let app = TestApp::new();
    let admin = app.admin();
    let alice_id = Uuid::new_v4();
    let alice = app.token(alice_id, Role::User);
    let bob = app.token(Uuid::new_v4(), Role::User);
    let id = app.seed_equipment(&admin, "iPad").await;
    app.seed_equipment(&admin, "Pencil").await;
    app.post(&format!("/api/v1/equipment/{}/loan", id), &alice, None)
        .await;

    let uri = format!("/api/v1/reports/users/{}/loans", alice_id);
    let (status, loans) = app.get(&uri, &alice).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(loans.as_array().unwrap().len(), 1);

    let (status, _) = app.get(&uri, &bob).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.get("/api/v1/reports/dashboard", &alice).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, summary) = app.get("/api/v1/reports/dashboard", &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["total_equipment"], 2);
    assert_eq!(summary["active_loans"], 1);

    let (status, counts) = app.get("/api/v1/reports/status-counts", &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(counts.as_array().unwrap().len(), 5);

    let (status, history) = app.get("/api/v1/reports/loans?kind=loan", &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 1);

    let (status, _) = app
        .get("/api/v1/reports/maintenance/stale?days=3", &admin)
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_stale_maintenance_rejects_out_of_range_days() {
    let app = TestApp::new();
    let admin = app.admin();

    for days in ["100000000", "9223372036854775807", "-1"] {
        let uri = format!("/api/v1/reports/maintenance/stale?days={}", days);
        let (status, body) = app.get(&uri, &admin).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "days={}", days);
        assert_eq!(body["error"], "BadValue");
    }
}

#[tokio::test]
async fn test_empty_description_clears_it() {
    let app = TestApp::new();
    let admin = app.admin();
    let id = app.seed_equipment(&admin, "Tripod").await;
    let uri = format!("/api/v1/equipment/{}", id);

    let (status, body) = app
        .send(
            Method::PUT,
            &uri,
            Some(&admin),
            Some(json!({ "description": "Manfrotto, black" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["description"], "Manfrotto, black");

    let (_, body) = app
        .send(Method::PUT, &uri, Some(&admin), Some(json!({ "name": "Tripod 2" })))
        .await;
    assert_eq!(body["description"], "Manfrotto, black");

    let (status, body) = app
        .send(Method::PUT, &uri, Some(&admin), Some(json!({ "description": "" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["description"].is_null());
}

#[tokio::test]
async fn test_request_approval_flow() {
    let app = TestApp::new();
    let admin = app.admin();
    let alice_id = Uuid::new_v4();
    let alice = app.token(alice_id, Role::User);
    let bob = app.token(Uuid::new_v4(), Role::User);
    let id = app.seed_equipment(&admin, "GoPro").await;
    let submit_uri = format!("/api/v1/equipment/{}/requests", id);

    let (status, request) = app
        .post(&submit_uri, &alice, Some(json!({ "kind": "loan" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(request["status"], "pending");
    assert_eq!(request["user_id"], alice_id.to_string());
    let request_id = request["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .post(&submit_uri, &alice, Some(json!({ "kind": "loan" })))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "Rejected");

    let (status, _) = app
        .post(&submit_uri, &bob, Some(json!({ "kind": "reservation" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .get(&format!("/api/v1/requests/{}", request_id), &bob)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let approve_uri = format!("/api/v1/requests/{}/approve", request_id);
    let (status, _) = app.post(&approve_uri, &alice, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, approved) = app.post(&approve_uri, &admin, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["request"]["status"], "approved");
    assert_eq!(approved["equipment"]["status"], "loaned");
    assert_eq!(approved["loan"]["user_id"], alice_id.to_string());
    assert_eq!(approved["request"]["loan_id"], approved["loan"]["id"]);

    let (status, body) = app.post(&approve_uri, &admin, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "AlreadyClosed");

    let (status, mine) = app.get("/api/v1/requests", &alice).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine.as_array().unwrap().len(), 1);
    let (_, others) = app.get("/api/v1/requests", &bob).await;
    assert!(others.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_request_rejection_and_unavailable_equipment() {
    let app = TestApp::new();
    let admin = app.admin();
    let alice = app.token(Uuid::new_v4(), Role::User);
    let bob = app.token(Uuid::new_v4(), Role::User);
    let id = app.seed_equipment(&admin, "Drone").await;
    let submit_uri = format!("/api/v1/equipment/{}/requests", id);

    let (_, first) = app
        .post(&submit_uri, &alice, Some(json!({ "kind": "loan" })))
        .await;
    let (_, second) = app
        .post(&submit_uri, &bob, Some(json!({ "kind": "loan" })))
        .await;

    let (status, rejected) = app
        .post(
            &format!("/api/v1/requests/{}/reject", first["id"].as_str().unwrap()),
            &admin,
            Some(json!({ "notes": "needs training first" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rejected["status"], "rejected");
    assert_eq!(rejected["notes"], "needs training first");

    app.post(
        &format!("/api/v1/equipment/{}/maintenance", id),
        &admin,
        Some(json!({ "maintenance_type": "preventive" })),
    )
    .await;
    let (status, body) = app
        .post(
            &format!("/api/v1/requests/{}/approve", second["id"].as_str().unwrap()),
            &admin,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "InvalidState");
    assert_eq!(body["current_status"], "in_maintenance");

    let (_, pending) = app.get("/api/v1/requests?status=pending", &admin).await;
    assert_eq!(pending.as_array().unwrap().len(), 1);
    assert_eq!(pending[0]["id"], second["id"]);
}

#[tokio::test]
async fn test_user_directory() {
    let app = TestApp::new();
    let admin = app.admin();
    let alice_id = Uuid::new_v4();
    let alice = app.token(alice_id, Role::User);
    let bob_id = Uuid::new_v4();
    let bob = app.token(bob_id, Role::User);

    let (status, _) = app.get("/api/v1/users/me", &alice).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, profile) = app
        .send(
            Method::PUT,
            "/api/v1/users/me",
            Some(&alice),
            Some(json!({ "name": "Alice", "email": "alice@example.org" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["id"], alice_id.to_string());
    assert_eq!(profile["role"], "user");

    let (status, body) = app
        .send(
            Method::PUT,
            "/api/v1/users/me",
            Some(&bob),
            Some(json!({ "name": "Bob", "email": "ALICE@example.org" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "Rejected");

    let (status, _) = app
        .send(
            Method::PUT,
            "/api/v1/users/me",
            Some(&bob),
            Some(json!({ "name": "Bob", "email": "not-an-email" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.get("/api/v1/users", &alice).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .get(&format!("/api/v1/users/{}", alice_id), &bob)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let user_uri = format!("/api/v1/users/{}", alice_id);
    let (status, promoted) = app
        .send(Method::PUT, &user_uri, Some(&admin), Some(json!({ "role": "admin" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(promoted["role"], "admin");

    let (status, admins) = app.get("/api/v1/users?role=admin", &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(admins.as_array().unwrap().len(), 1);

    let (status, _) = app
        .send(Method::DELETE, &user_uri, Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get(&user_uri, &admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
