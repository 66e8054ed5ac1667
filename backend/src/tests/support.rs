use std::sync::Arc;

use axum_test::TestServer;
use tempfile::TempDir;

use crate::app;
use crate::auth;
use crate::cfg;
use crate::core;
use crate::services::{FaceMatch, FaceOracle, LocalObjectStore, MockFaceOracle, ObjectStore};
use crate::store::{Employee, NewEmployee, NewTenant, PlanType, Tenant};

pub const TEST_PASSWORD: &str = "abcdefghijklmnopqrstuvwxyz";

/// Office of the seeded tenants
pub const OFFICE: (f64, f64) = (12.9716, 77.5946);

/// About 1.5 km north of `OFFICE`
pub const AWAY: (f64, f64) = (12.9851, 77.5946);

pub struct TestApp {
    pub server: TestServer,
    pub context: core::ArcContext,
    _storage: TempDir,
}

pub fn test_settings(storage_dir: &TempDir) -> cfg::AppSettings {
    cfg::AppSettings {
        database: cfg::DatabaseSettings {
            url: "sqlite::memory:".to_string(),
            max_connections: 1, // every connection would get its own in-memory database
            run_migrations_on_startup: true,
        },
        jwt: cfg::JwtSettings {
            access_token_secret: "test__access__secret__key__for__jwt__testing".to_string(),
            refresh_token_secret: "test__refresh__secret__key__for__jwt__testing".to_string(),
            location_token_secret: "test__location__secret__key__for__jwt__testing".to_string(),
            ..Default::default()
        },
        storage: cfg::StorageSettings {
            directory: storage_dir.path().to_string_lossy().to_string(),
            public_base_url: "http://localhost/photos".to_string(),
            ..Default::default()
        },
        rate_limit: cfg::RateLimitSettings {
            max_requests: 1_000,
            window_secs: 60,
        },
        ..Default::default()
    }
}

pub fn test_tokens(settings: &cfg::AppSettings) -> auth::TokenCodec {
    let secrets = auth::TokenSecrets {
        access: settings.jwt.access_token_secret.clone(),
        refresh: settings.jwt.refresh_token_secret.clone(),
        location: settings.jwt.location_token_secret.clone(),
    };
    auth::TokenCodec::new(&settings.jwt, &secrets)
}

/// An oracle that always answers with `similarity`
pub fn oracle_answering(matched: bool, similarity: f64) -> Arc<dyn FaceOracle> {
    let mut oracle = MockFaceOracle::new();
    oracle
        .expect_compare()
        .returning(move |_, _, _| Ok(FaceMatch { matched, similarity }));
    Arc::new(oracle)
}

pub async fn spawn_app_with(oracle: Arc<dyn FaceOracle>, configure: impl FnOnce(&mut cfg::AppSettings)) -> TestApp {
    build_app(oracle, None, configure).await
}

/// App whose photo uploads go to `object_store` instead of a temporary directory
pub async fn spawn_app_with_store(object_store: Arc<dyn ObjectStore>) -> TestApp {
    build_app(oracle_answering(true, 99.0), Some(object_store), |_| {}).await
}

async fn build_app(
    oracle: Arc<dyn FaceOracle>,
    object_store: Option<Arc<dyn ObjectStore>>,
    configure: impl FnOnce(&mut cfg::AppSettings),
) -> TestApp {
    let storage = tempfile::tempdir().unwrap();
    let mut settings = test_settings(&storage);
    configure(&mut settings);

    let db = core::Database::connect(&settings.database).await.unwrap();
    app::run_migrations(db.pool()).await.unwrap();

    let tokens = test_tokens(&settings);
    let object_store = object_store.unwrap_or_else(|| Arc::new(LocalObjectStore::new(&settings.storage)));
    let context = core::Context::new(db, tokens, settings, oracle, object_store);

    let router = app::create_router(context.clone());
    TestApp {
        server: TestServer::new(router).unwrap(),
        context,
        _storage: storage,
    }
}

/// Context over an on-disk database, so that pooled connections share one file
pub async fn file_backed_context(dir: &TempDir, max_connections: u32) -> core::ArcContext {
    let mut settings = test_settings(dir);
    settings.database.url = format!("sqlite://{}", dir.path().join("attendance.db").display());
    settings.database.max_connections = max_connections;

    let db = core::Database::connect(&settings.database).await.unwrap();
    app::run_migrations(db.pool()).await.unwrap();

    let tokens = test_tokens(&settings);
    let object_store = Arc::new(LocalObjectStore::new(&settings.storage));
    core::Context::new(db, tokens, settings, oracle_answering(true, 99.0), object_store)
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(oracle_answering(true, 99.0), |_| {}).await
}

pub async fn seed_tenant(context: &core::Context, username: &str, tax_id: &str, plan_type: PlanType) -> Tenant {
    let new_tenant = NewTenant {
        name: format!("{username} Ltd"),
        tax_id: tax_id.to_string(),
        address: "1 MG Road".to_string(),
        latitude: OFFICE.0,
        longitude: OFFICE.1,
        username: username.to_string(),
        password_hash: auth::hash_password(TEST_PASSWORD).unwrap(),
        plan_type,
    };
    context.db.tenants.create(&new_tenant).await.unwrap()
}

pub async fn seed_employee(context: &core::Context, tenant_id: i64, name: &str) -> Employee {
    let new_employee = NewEmployee {
        tenant_id,
        name: name.to_string(),
        photo_url: format!("http://localhost/photos/{name}.jpg"),
        embedding: vec![0.12, -0.5, 0.33],
        salary: 1200.0,
        phone: "+91 98450 00000".to_string(),
        alternate_phone: String::new(),
    };
    context.db.employees.create(&new_employee).await.unwrap()
}

pub fn access_token_for(context: &core::Context, tenant: &Tenant) -> String {
    context
        .tokens
        .issue_access_token(tenant.id, &tenant.username, tenant.plan_type)
        .unwrap()
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}
