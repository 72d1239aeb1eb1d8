//! In-process mock backend for service tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::http::HeaderMap;

use crate::config::{ClientConfig, StorageConfig};
use crate::net::ApiClient;
use crate::session::{AuthContext, MemorySessionStore, Session};

pub(crate) const TEST_TOKEN: &str = "test-access-token";

/// Serve `router` on an ephemeral port and return its base URL.
pub(crate) async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

pub(crate) fn config_for(base_url: &str) -> ClientConfig {
    ClientConfig { api_url: base_url.to_owned(), ..ClientConfig::default() }
}

/// Config with the avatar bucket pointed at `url`.
pub(crate) fn storage_config(url: &str) -> ClientConfig {
    ClientConfig {
        storage: Some(StorageConfig { url: url.to_owned(), key: "anon-key".to_owned(), bucket: "avatars".to_owned() }),
        ..config_for(url)
    }
}

/// Client with no session.
pub(crate) fn anonymous_client(base_url: &str) -> ApiClient {
    ApiClient::new(&config_for(base_url), Arc::new(AuthContext::anonymous())).unwrap()
}

/// Signed-in client plus a counter of invalidation callbacks.
pub(crate) fn signed_in_client(base_url: &str) -> (ApiClient, Arc<AtomicUsize>) {
    let invalidations = Arc::new(AtomicUsize::new(0));
    let counter = invalidations.clone();
    let store = MemorySessionStore::with_session(Session {
        access: TEST_TOKEN.to_owned(),
        refresh: Some("test-refresh-token".to_owned()),
    });
    let auth = AuthContext::load(store).unwrap().on_invalidate(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let client = ApiClient::new(&config_for(base_url), Arc::new(auth)).unwrap();
    (client, invalidations)
}

/// Token from an `Authorization: Bearer` header.
pub(crate) fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_owned)
}
