#![allow(dead_code)]

use std::net::TcpListener;

use reqwest::Response;
use serde_json::{json, Value};
use shoply::auth::TokenIssuer;
use shoply::configuration::{DatabaseSettings, JwtSettings};
use shoply::startup::{get_connection_pool, run, run_migrations};
use sqlx::SqlitePool;
use tempfile::TempDir;

pub struct TestApp {
    pub address: String,
    pub db_pool: SqlitePool,
    pub client: reqwest::Client,
    // Keeps an on-disk database alive for the lifetime of the app
    _db_dir: Option<TempDir>,
}

/// Start the server on a random port over a fresh in-memory database.
pub async fn spawn_app() -> TestApp {
    let settings = DatabaseSettings {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
    };
    spawn_app_with_database(settings, None).await
}

/// Start the server over a file database with several pooled connections,
/// so concurrent requests really hit the database concurrently.
pub async fn spawn_app_on_disk() -> TestApp {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let settings = DatabaseSettings {
        url: format!("sqlite://{}", dir.path().join("shoply.db").display()),
        max_connections: 5,
    };
    spawn_app_with_database(settings, Some(dir)).await
}

async fn spawn_app_with_database(settings: DatabaseSettings, db_dir: Option<TempDir>) -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let db_pool = get_connection_pool(&settings)
        .await
        .expect("Failed to open database");
    run_migrations(&db_pool)
        .await
        .expect("Failed to migrate the database");

    let issuer = TokenIssuer::new(&JwtSettings {
        secret: "integration-test-secret-of-reasonable-length".to_string(),
        algorithm: "HS256".to_string(),
        access_token_expire_minutes: 15,
        refresh_token_expire_days: 30,
    })
    .expect("Invalid JWT settings");

    let server = run(listener, db_pool.clone(), issuer).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        db_pool,
        client: reqwest::Client::new(),
        _db_dir: db_dir,
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn register(&self, email: &str, password: &str) -> Response {
        self.post_json("/auth/register", &json!({ "email": email, "password": password }))
            .await
    }

    pub async fn login(&self, email: &str, password: &str) -> Response {
        self.post_json("/auth/token", &json!({ "email": email, "password": password }))
            .await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Response {
        self.post_json("/auth/refresh", &json!({ "refresh_token": refresh_token }))
            .await
    }

    /// Register and log in, returning the token pair body.
    pub async fn signed_in_user(&self, email: &str) -> Value {
        assert_eq!(self.register(email, "password123").await.status().as_u16(), 201);
        let response = self.login(email, "password123").await;
        assert_eq!(response.status().as_u16(), 200);
        response.json().await.expect("Failed to parse token pair")
    }

    /// Access token of a freshly registered user promoted to admin.
    pub async fn admin_token(&self) -> String {
        let email = "admin@example.com";
        assert_eq!(self.register(email, "password123").await.status().as_u16(), 201);
        sqlx::query("UPDATE users SET role = 'admin' WHERE email = ?")
            .bind(email)
            .execute(&self.db_pool)
            .await
            .expect("Failed to promote user");

        let pair: Value = self
            .login(email, "password123")
            .await
            .json()
            .await
            .expect("Failed to parse token pair");
        pair["access_token"].as_str().unwrap().to_string()
    }
}
