use std::sync::Arc;

use serde_json::{json, Value};
use uuid::Uuid;

use common::photos::MemoryPhotoStore;
use common::storage::MemoryObjectStore;
use events::MockEventBus;
use plugin_core::{PluginConfig, PluginSupervisor};

use server::auth::{AuthConfig, AuthService, RateLimiter};
use server::build_router;
use server::config::AppConfig;
use server::state::AppState;
use server::users::{MemoryUserStore, UserManager};

pub mod routes {
    pub const TOKEN: &str = "/api/auth/token";
    pub const REVOKE: &str = "/api/auth/revoke";
    pub const LOGIN: &str = "/api/auth/login";
    pub const RECREATE_ADMIN: &str = "/api/auth/recreate-admin";
    pub const UPLOAD: &str = "/api/upload";
    pub const PHOTOS: &str = "/api/photos";
    pub const TRASH: &str = "/api/photos/trash";
    pub const USERS: &str = "/api/users/";

    pub fn photo(id: &str) -> String {
        format!("/api/photo/{id}")
    }

    pub fn trash_photo(id: &str) -> String {
        format!("/api/photos/trash/{id}")
    }

    pub fn restore_photo(id: &str) -> String {
        format!("/api/photos/trash/{id}/restore")
    }

    pub fn user(id: &str) -> String {
        format!("/api/users/{id}")
    }
}

/// A server bound on an ephemeral port with the in-memory adapters behind it.
pub struct TestApp {
    pub base: String,
    pub client: reqwest::Client,
    pub photos: Arc<MemoryPhotoStore>,
    pub storage: Arc<MemoryObjectStore>,
    pub bus: Arc<MockEventBus>,
    pub state: AppState,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with_token_lifetime(3600).await
}

pub async fn spawn_app_with_token_lifetime(token_expiration_secs: u64) -> TestApp {
    let photos = Arc::new(MemoryPhotoStore::new());
    let storage = Arc::new(MemoryObjectStore::new());
    let bus = Arc::new(MockEventBus::new());

    let auth = Arc::new(
        AuthService::new(&AuthConfig {
            jwt_algo: "HS256".into(),
            jwt_secret: "integration-test-secret".into(),
            jwt_public_key_file: String::new(),
            jwt_private_key_file: String::new(),
            token_expiration_secs,
        })
        .unwrap()
        // Tests validate far more often than the production sizing allows.
        .with_limiter(RateLimiter::new(100_000.0, 1_000_000)),
    );

    let users = Arc::new(UserManager::new(Arc::new(MemoryUserStore::new())));
    users.ensure_seed_admin().await.unwrap();

    let plugins_dir =
        std::env::temp_dir().join(format!("pixie-test-plugins-{}", Uuid::new_v4()));
    let plugins = Arc::new(PluginSupervisor::new(PluginConfig {
        plugins_dir,
        ..PluginConfig::default()
    }));

    let state = AppState {
        config: AppConfig::default(),
        photos: photos.clone(),
        storage: storage.clone(),
        publisher: Some(bus.clone()),
        auth,
        users,
        plugins,
    };

    let app = build_router(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        base,
        client: reqwest::Client::new(),
        photos,
        storage,
        bus,
        state,
    }
}

impl TestApp {
    pub fn url(&self, path: impl AsRef<str>) -> String {
        format!("{}{}", self.base, path.as_ref())
    }

    /// A token with `role = user`, minted directly through the auth core.
    pub fn user_token(&self) -> String {
        let mut custom = serde_json::Map::new();
        custom.insert("role".into(), json!("user"));
        self.state.auth.generate_token("test-user", custom).unwrap()
    }

    /// Log in as the seeded admin account and return its token.
    pub async fn admin_token(&self) -> String {
        let response = self
            .client
            .post(self.url(routes::LOGIN))
            .json(&json!({"username": "admin", "password": "admin123"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    /// Upload `data` through the real multipart endpoint; returns the new id.
    pub async fn upload(
        &self,
        token: &str,
        filename: &str,
        mime: &str,
        data: Vec<u8>,
    ) -> String {
        let part = reqwest::multipart::Part::bytes(data)
            .file_name(filename.to_string())
            .mime_str(mime)
            .unwrap();
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.url(routes::UPLOAD))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);

        let body: Value = response.json().await.unwrap();
        body["id"].as_str().unwrap().to_string()
    }

    pub async fn get_json(&self, token: &str, path: impl AsRef<str>) -> Value {
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        response.json().await.unwrap()
    }
}
