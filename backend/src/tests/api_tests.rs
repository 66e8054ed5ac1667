use axum::http::StatusCode;
use axum::http::header;
use axum_test::multipart::{MultipartForm, Part};
use chrono::{Duration, Utc};
use serde_json::Value;
use serde_json::json;

use crate::services::{MockObjectStore, StorageError};
use crate::store::{Attendance, Employee, NewAttendance, PlanType};
use crate::tests::support::*;

fn new_employee_body(name: &str) -> Value {
    json!({
        "name": name,
        "photo_url": format!("http://localhost/photos/{name}.jpg"),
        "embedding": [0.2, 0.4, -0.1],
        "salary": 2500.5,
        "phone": "+91 98450 11111"
    })
}

async fn record_attendance(app: &TestApp, employee: &Employee, days_ago: i64) -> Attendance {
    app.context
        .db
        .attendance
        .create_once_per_day(&NewAttendance {
            tenant_id: employee.tenant_id,
            employee_id: employee.id,
            photo_url: "http://localhost/photos/checkin.jpg".to_string(),
            embedding: vec![0.3],
            check_in_time: Utc::now().naive_utc() - Duration::days(days_ago),
            confidence: None,
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn test_health_reports_database_up() {
    let app = spawn_app().await;

    let response = app.server.get("/health").await;

    response.assert_status(StatusCode::OK);
    response.assert_json(&json!({"result": "ok", "database": "up"}));
}

#[tokio::test]
async fn test_api_requires_access_token() {
    let app = spawn_app().await;
    let tenant = seed_tenant(&app.context, "acme", "TAX-1", PlanType::Free).await;

    app.server.get("/api/tenant").await.assert_status(StatusCode::UNAUTHORIZED);
    app.server
        .get("/api/tenant")
        .add_header(header::AUTHORIZATION, "Bearer not.a.token")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    // a refresh token is not an access token
    let refresh = app.context.tokens.issue_refresh_token(tenant.id).unwrap();
    app.server
        .get("/api/tenant")
        .add_header(header::AUTHORIZATION, bearer(&refresh.token))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_tenant_profile_round_trip() {
    let app = spawn_app().await;
    let tenant = seed_tenant(&app.context, "acme", "TAX-1", PlanType::Free).await;
    let token = access_token_for(&app.context, &tenant);

    let response = app
        .server
        .get("/api/tenant")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["tenant"]["username"], "acme");
    assert_eq!(body["tenant"]["plan_type"], "FREE");
    assert!(body["tenant"].get("password_hash").is_none());

    let response = app
        .server
        .put("/api/tenant")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({"name": "Acme Robotics", "latitude": 13.0}))
        .await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["tenant"]["name"], "Acme Robotics");
    assert_eq!(body["tenant"]["latitude"], 13.0);
    assert_eq!(body["tenant"]["longitude"], OFFICE.1);
    assert_eq!(body["tenant"]["tax_id"], "TAX-1");
}

#[tokio::test]
async fn test_tenant_update_rejects_bad_values() {
    let app = spawn_app().await;
    let tenant = seed_tenant(&app.context, "acme", "TAX-1", PlanType::Free).await;
    let token = access_token_for(&app.context, &tenant);

    for update in [json!({"longitude": 181.0}), json!({"latitude": -90.5}), json!({"name": "  "})] {
        app.server
            .put("/api/tenant")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .json(&update)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    let unchanged = app.context.db.tenants.get_by_id(tenant.id).await.unwrap();
    assert!((unchanged.longitude - OFFICE.1).abs() < f64::EPSILON);
    assert_eq!(unchanged.name, tenant.name);
}

#[tokio::test]
async fn test_employee_crud() {
    let app = spawn_app().await;
    let tenant = seed_tenant(&app.context, "acme", "TAX-1", PlanType::Free).await;
    let token = access_token_for(&app.context, &tenant);

    let response = app
        .server
        .post("/api/employees")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&new_employee_body("asha"))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    let id = body["employee"]["id"].as_i64().unwrap();
    assert_eq!(body["employee"]["tenant_id"], tenant.id);
    assert_eq!(body["employee"]["embedding"], json!([0.2, 0.4, -0.1]));
    assert_eq!(body["employee"]["salary"], 2500.5);
    assert_eq!(body["employee"]["alternate_phone"], "");

    let response = app
        .server
        .put(&format!("/api/employees/{id}"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({"salary": 3000, "phone": "+91 80 0000 0000"}))
        .await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["employee"]["salary"], 3000.0);
    assert_eq!(body["employee"]["phone"], "+91 80 0000 0000");
    assert_eq!(body["employee"]["name"], "asha");

    app.server
        .delete(&format!("/api/employees/{id}"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await
        .assert_status(StatusCode::OK);
    app.server
        .get(&format!("/api/employees/{id}"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_employee_list_is_paged_and_scoped_to_tenant() {
    let app = spawn_app().await;
    let acme = seed_tenant(&app.context, "acme", "TAX-1", PlanType::Free).await;
    let globex = seed_tenant(&app.context, "globex", "TAX-2", PlanType::Free).await;
    for name in ["a", "b", "c", "d", "e"] {
        seed_employee(&app.context, acme.id, name).await;
    }
    seed_employee(&app.context, globex.id, "outsider").await;
    let token = access_token_for(&app.context, &acme);

    let response = app
        .server
        .get("/api/employees")
        .add_query_param("page", 2)
        .add_query_param("per_page", 2)
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["total"], 5);
    assert_eq!(body["page"], 2);
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
    assert!(body["items"].as_array().unwrap().iter().all(|e| e["tenant_id"] == acme.id));

    app.server
        .get("/api/employees")
        .add_query_param("per_page", 1000)
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_other_tenants_employees_are_off_limits() {
    let app = spawn_app().await;
    let acme = seed_tenant(&app.context, "acme", "TAX-1", PlanType::Free).await;
    let globex = seed_tenant(&app.context, "globex", "TAX-2", PlanType::Free).await;
    let outsider = seed_employee(&app.context, globex.id, "outsider").await;
    let token = access_token_for(&app.context, &acme);
    let path = format!("/api/employees/{}", outsider.id);

    let response = app
        .server
        .get(&path)
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
    response.assert_json(&json!({"result": "error", "message": "Access denied"}));

    app.server
        .put(&path)
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({"name": "hijacked"}))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    app.server
        .delete(&path)
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let untouched = app.context.db.employees.get_by_id(outsider.id).await.unwrap();
    assert_eq!(untouched.name, "outsider");
}

#[tokio::test]
async fn test_employee_validation() {
    let app = spawn_app().await;
    let tenant = seed_tenant(&app.context, "acme", "TAX-1", PlanType::Free).await;
    let token = access_token_for(&app.context, &tenant);

    let mut negative_salary = new_employee_body("asha");
    negative_salary["salary"] = json!(-1);
    let mut empty_embedding = new_employee_body("asha");
    empty_embedding["embedding"] = json!([]);
    let mut textual_embedding = new_employee_body("asha");
    textual_embedding["embedding"] = json!(["0.1"]);
    let mut missing_photo = new_employee_body("asha");
    missing_photo["photo_url"] = json!("");

    for body in [negative_salary, empty_embedding, textual_embedding, missing_photo] {
        app.server
            .post("/api/employees")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .json(&body)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
    assert_eq!(app.context.db.employees.count_by_tenant(tenant.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_photo_upload_stores_images_only() {
    let app = spawn_app().await;
    let tenant = seed_tenant(&app.context, "acme", "TAX-1", PlanType::Free).await;
    let token = access_token_for(&app.context, &tenant);

    let form = MultipartForm::new().add_part(
        "photo",
        Part::bytes(vec![0xFF, 0xD8, 0xFF, 0xE0]).file_name("face.jpg").mime_type("image/jpeg"),
    );
    let response = app
        .server
        .post("/api/uploads")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .multipart(form)
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    let url = body["url"].as_str().unwrap();
    let file_name = url.strip_prefix("http://localhost/photos/").unwrap();

    // stored photos are served back under /photos
    let served = app.server.get(&format!("/photos/{file_name}")).await;
    served.assert_status(StatusCode::OK);
    assert_eq!(served.as_bytes().as_ref(), &[0xFF, 0xD8, 0xFF, 0xE0]);

    let form = MultipartForm::new().add_part(
        "photo",
        Part::text("not an image").file_name("notes.txt").mime_type("text/plain"),
    );
    app.server
        .post("/api/uploads")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .multipart(form)
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let form = MultipartForm::new().add_text("caption", "no photo here");
    app.server
        .post("/api/uploads")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .multipart(form)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_storage_outage_is_reported_as_upstream_failure() {
    let mut store = MockObjectStore::new();
    store
        .expect_put()
        .withf(|bytes, content_type| bytes.len() == 4 && content_type == "image/png")
        .times(1)
        .returning(|_, _| Err(StorageError::WriteFailed(std::io::Error::other("disk full"))));
    let app = spawn_app_with_store(std::sync::Arc::new(store)).await;
    let tenant = seed_tenant(&app.context, "acme", "TAX-1", PlanType::Free).await;
    let token = access_token_for(&app.context, &tenant);

    let form = MultipartForm::new().add_part(
        "photo",
        Part::bytes(vec![0x89, b'P', b'N', b'G']).file_name("face.png").mime_type("image/png"),
    );
    let response = app
        .server
        .post("/api/uploads")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .multipart(form)
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    response.assert_json(&json!({"result": "error", "message": "Photo storage is unavailable, please retry"}));
}

#[tokio::test]
async fn test_oversized_photo_is_refused() {
    let app = spawn_app_with(oracle_answering(true, 99.0), |settings| {
        settings.storage.max_upload_bytes = 16;
    })
    .await;
    let tenant = seed_tenant(&app.context, "acme", "TAX-1", PlanType::Free).await;
    let token = access_token_for(&app.context, &tenant);

    let form = MultipartForm::new().add_part(
        "photo",
        Part::bytes(vec![0u8; 17]).file_name("big.png").mime_type("image/png"),
    );
    app.server
        .post("/api/uploads")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .multipart(form)
        .await
        .assert_status(StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_attendance_report_filters() {
    let app = spawn_app().await;
    let tenant = seed_tenant(&app.context, "acme", "TAX-1", PlanType::Free).await;
    let asha = seed_employee(&app.context, tenant.id, "asha").await;
    let ravi = seed_employee(&app.context, tenant.id, "ravi").await;
    record_attendance(&app, &asha, 0).await;
    record_attendance(&app, &asha, 3).await;
    record_attendance(&app, &ravi, 0).await;
    let token = access_token_for(&app.context, &tenant);

    let response = app
        .server
        .get("/api/attendance")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["total"], 3);

    let response = app
        .server
        .get("/api/attendance")
        .add_query_param("employee_id", asha.id)
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    let body: Value = response.json();
    assert_eq!(body["total"], 2);

    let today = Utc::now().date_naive();
    let response = app
        .server
        .get("/api/attendance")
        .add_query_param("from", today)
        .add_query_param("to", today)
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    let body: Value = response.json();
    assert_eq!(body["total"], 2);
    assert!(body["items"].as_array().unwrap().iter().all(|a| a["check_in_date"] == today.to_string()));

    let response = app
        .server
        .get("/api/attendance")
        .add_query_param("from", today)
        .add_query_param("to", today - Duration::days(1))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_attendance_is_tenant_scoped() {
    let app = spawn_app().await;
    let acme = seed_tenant(&app.context, "acme", "TAX-1", PlanType::Free).await;
    let globex = seed_tenant(&app.context, "globex", "TAX-2", PlanType::Free).await;
    let outsider = seed_employee(&app.context, globex.id, "outsider").await;
    let foreign_record = record_attendance(&app, &outsider, 0).await;
    let token = access_token_for(&app.context, &acme);

    let response = app
        .server
        .get("/api/attendance")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    let body: Value = response.json();
    assert_eq!(body["total"], 0);

    app.server
        .get("/api/attendance")
        .add_query_param("employee_id", outsider.id)
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    app.server
        .get(&format!("/api/attendance/{}", foreign_record.id))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let owner_token = access_token_for(&app.context, &globex);
    let response = app
        .server
        .get(&format!("/api/attendance/{}", foreign_record.id))
        .add_header(header::AUTHORIZATION, bearer(&owner_token))
        .await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["attendance"]["employee_id"], outsider.id);
}

#[tokio::test]
async fn test_public_routes_are_rate_limited() {
    let app = spawn_app_with(oracle_answering(true, 99.0), |settings| {
        settings.rate_limit.max_requests = 2;
    })
    .await;
    let login = json!({"username": "nobody", "password": TEST_PASSWORD});

    for _ in 0..2 {
        app.server
            .post("/auth/login")
            .json(&login)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }
    app.server
        .post("/auth/login")
        .json(&login)
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);

    // authenticated and health routes are not counted
    app.server.get("/health").await.assert_status(StatusCode::OK);
}
