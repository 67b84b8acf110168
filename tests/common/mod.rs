#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, EntityTrait, DatabaseConnection, DbBackend, Set, Statement,
};
use serde_json::Value;
use sppg_production::{
    auth::{consts, SharedPermissionChecker, StaticPermissionChecker, USER_ID_HEADER},
    config::{AppConfig, ProductionConfig},
    db::{self, DbConfig},
    entities::{
        inventory_lot, production_batch, production_batch::BatchStatus, raw_material, recipe,
        recipe_ingredient,
    },
    services::production::ProductionService,
    AppState,
};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

/// User granted every production permission
pub const PLANNER: &str = "planner";
/// User that may only preview
pub const VIEWER: &str = "viewer";

/// Application state and router over a fresh, migrated SQLite file.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_production(ProductionConfig::default()).await
    }

    pub async fn with_production(production: ProductionConfig) -> Self {
        Self::with_pool(production, 1).await
    }

    /// Like [`TestApp::with_production`], with `max_connections` pooled
    /// connections so requests can overlap.
    pub async fn with_pool(production: ProductionConfig, max_connections: u32) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("sppg.db").display());

        let mut cfg = AppConfig::new(url, "127.0.0.1".to_string(), 0, "test".to_string());
        cfg.db_max_connections = max_connections;
        cfg.db_min_connections = 1;
        cfg.production = production;

        let pool = db::establish_connection_with_config(&DbConfig::from(&cfg))
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let checker: SharedPermissionChecker = Arc::new(StaticPermissionChecker::new(vec![
            (
                PLANNER,
                vec![consts::PRODUCTION_READ, consts::PRODUCTION_CREATE],
            ),
            (VIEWER, vec![consts::PRODUCTION_READ]),
        ]));

        let state = AppState::new(Arc::new(pool), cfg);
        let router = sppg_production::app(state.clone(), checker);

        Self {
            router,
            state,
            _dir: dir,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        self.state.db.as_ref()
    }

    pub fn service(&self) -> &ProductionService {
        self.state.production.as_ref()
    }

    /// Send a request against the router, optionally as `user`.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Body>,
        user: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(USER_ID_HEADER, user);
        }
        let body = match body {
            Some(body) => {
                builder = builder.header("content-type", "application/json");
                body
            }
            None => Body::empty(),
        };

        self.router
            .clone()
            .oneshot(builder.body(body).expect("failed to build request"))
            .await
            .expect("router error during test request")
    }

    pub async fn request_raw(&self, request: Request<Body>) -> axum::response::Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// POST a JSON body and decode the JSON response.
    pub async fn post_json(&self, uri: &str, body: Value, user: Option<&str>) -> (StatusCode, Value) {
        let bytes = serde_json::to_vec(&body).expect("serialize request body");
        let response = self
            .request(Method::POST, uri, Some(Body::from(bytes)), user)
            .await;
        read_json(response).await
    }

    pub async fn seed_material(&self, code: &str, name: &str, unit: &str) -> raw_material::Model {
        raw_material::ActiveModel {
            code: Set(code.to_string()),
            name: Set(name.to_string()),
            unit: Set(unit.to_string()),
            category: Set(None),
            ..Default::default()
        }
        .insert(self.db())
        .await
        .expect("seed raw material")
    }

    pub async fn seed_recipe(&self, name: &str, serving_size: i32, is_active: bool) -> recipe::Model {
        recipe::ActiveModel {
            name: Set(name.to_string()),
            description: Set(None),
            serving_size: Set(serving_size),
            prep_time_minutes: Set(30),
            cook_time_minutes: Set(45),
            is_active: Set(is_active),
            ..Default::default()
        }
        .insert(self.db())
        .await
        .expect("seed recipe")
    }

    pub async fn seed_ingredient(
        &self,
        recipe_id: Uuid,
        material_id: Uuid,
        quantity: Decimal,
        unit: &str,
        position: i32,
    ) -> recipe_ingredient::Model {
        recipe_ingredient::ActiveModel {
            recipe_id: Set(recipe_id),
            raw_material_id: Set(material_id),
            quantity: Set(quantity),
            unit: Set(unit.to_string()),
            notes: Set(None),
            position: Set(position),
            ..Default::default()
        }
        .insert(self.db())
        .await
        .expect("seed recipe ingredient")
    }

    pub async fn seed_lot(
        &self,
        material_id: Uuid,
        quantity: Decimal,
        unit_price: Decimal,
        received_at: DateTime<Utc>,
        quality_status: &str,
    ) -> inventory_lot::Model {
        inventory_lot::ActiveModel {
            raw_material_id: Set(material_id),
            batch_number: Set(Some(format!("LOT-{}", received_at.format("%Y%m%d%H%M")))),
            quantity: Set(quantity),
            unit_price: Set(unit_price),
            received_at: Set(received_at),
            expiry_date: Set(None),
            quality_status: Set(quality_status.to_string()),
            supplier_id: Set(None),
            notes: Set(None),
            ..Default::default()
        }
        .insert(self.db())
        .await
        .expect("seed inventory lot")
    }

    pub async fn set_batch_status(&self, batch_id: Uuid, status: BatchStatus) {
        let batch = production_batch::Entity::find_by_id(batch_id)
            .one(self.db())
            .await
            .expect("load batch")
            .expect("batch exists");
        let mut active: production_batch::ActiveModel = batch.into();
        active.status = Set(status.to_string());
        active.update(self.db()).await.expect("update batch status");
    }

    pub async fn count(&self, table: &str) -> i64 {
        let row = self
            .db()
            .query_one(Statement::from_string(
                DbBackend::Sqlite,
                format!("SELECT COUNT(*) AS n FROM {}", table),
            ))
            .await
            .expect("count query")
            .expect("count row");
        row.try_get::<i64>("", "n").expect("count value")
    }

    pub async fn execute(&self, sql: &str) {
        self.db()
            .execute_unprepared(sql)
            .await
            .expect("execute raw sql");
    }
}

pub async fn read_json(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response body is json")
    };
    (status, value)
}

/// Decimal string fields compare by value, not by scale.
pub fn dec_field(value: &Value) -> Decimal {
    value
        .as_str()
        .unwrap_or_else(|| panic!("expected decimal string, got {value}"))
        .parse()
        .expect("decimal string")
}
