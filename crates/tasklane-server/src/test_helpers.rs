use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{Extension, Router};
use tempfile::TempDir;
use tokio::net::TcpListener;

use tasklane_cache::{Cache, MemoryCache};
use tasklane_db::{Database, SqliteDatabase};
use tasklane_service::{AuthConfig, AuthService, TaskService};
use tasklane_store::StoreConfig;

use crate::routes::{build_router, InnerAppState};

pub const TEST_JWT_SECRET: &str = "test-secret";

const FAST_HASH: NonZeroU32 = match NonZeroU32::new(1_000) {
    Some(n) => n,
    None => unreachable!(),
};

/// Services over in-memory SQLite, an in-process cache and a temp upload
/// dir. No mailer and no weather client are configured; tests may swap
/// fields of `inner` before starting a router.
pub struct TestState {
    pub inner: InnerAppState,
    pub upload_dir: TempDir,
}

pub fn test_state(require_auth: bool) -> TestState {
    let db: Arc<dyn Database> = Arc::new(SqliteDatabase::open_in_memory().unwrap());
    let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
    let upload_dir = tempfile::tempdir().unwrap();
    let store = tasklane_store::create_store(&StoreConfig {
        upload_dir: Some(upload_dir.path().to_string_lossy().to_string()),
    });
    let auth_config = AuthConfig {
        hash_iterations: FAST_HASH,
        ..AuthConfig::new(TEST_JWT_SECRET)
    };

    TestState {
        inner: InnerAppState {
            tasks: TaskService::new(db.clone(), cache, store, Duration::from_secs(60)),
            auth: AuthService::new(db, &auth_config),
            weather: None,
            require_auth,
        },
        upload_dir,
    }
}

impl TestState {
    /// The router owns the upload dir; it is removed with the last clone.
    pub fn into_router(self) -> Router {
        build_router(Arc::new(self.inner)).layer(Extension(Arc::new(self.upload_dir)))
    }
}

/// Build a test router with auth off for the task routes.
pub async fn test_router() -> Router {
    test_state(false).into_router()
}

/// Build a test router with auth required, returning (router, token) for a
/// registered user.
pub async fn test_router_with_auth() -> (Router, String) {
    let state = test_state(true);
    let session = state.inner.auth.register("tester", "password").await.unwrap();
    (state.into_router(), session.token)
}

/// A running test server with base_url and background task handle.
pub struct TestServer {
    pub base_url: String,
    _handle: tokio::task::JoinHandle<()>,
    _upload_dir: TempDir,
}

/// Spawn a server for `state` on a random port.
pub async fn spawn_server_with(state: TestState) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{addr}");
    let app = build_router(Arc::new(state.inner));
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    TestServer {
        base_url,
        _handle: handle,
        _upload_dir: state.upload_dir,
    }
}

/// Spawn an axum test server on a random port. Returns the TestServer
/// with the `base_url` (e.g. "http://127.0.0.1:12345").
pub async fn spawn_test_server() -> TestServer {
    spawn_server_with(test_state(false)).await
}
