use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::Path;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;

use super::*;
use crate::test_helpers::{serve, storage_config};

#[test]
fn object_key_uses_user_prefix_and_lowercase_extension() {
    let key = AvatarStorage::object_key(UserId(42), "Me.PNG").unwrap();
    let (prefix, rest) = key.split_once('/').unwrap();
    assert_eq!(prefix, "42");
    let (stem, ext) = rest.rsplit_once('.').unwrap();
    assert_eq!(ext, "png");
    assert!(Uuid::parse_str(stem).is_ok());

    assert!(AvatarStorage::object_key(UserId(42), "cv.pdf").is_err());
    assert!(AvatarStorage::object_key(UserId(42), "noext").is_err());
}

#[test]
fn unconfigured_bucket_is_a_storage_error() {
    assert!(matches!(AvatarStorage::from_config(&ClientConfig::default()), Err(ApiError::Storage(_))));
}

#[tokio::test]
async fn upload_upserts_and_returns_public_url() {
    let seen = Arc::new(Mutex::new(None));
    let sink = seen.clone();
    let router = Router::new().route(
        "/storage/v1/object/{bucket}/{*key}",
        post(move |Path((bucket, key)): Path<(String, String)>, headers: HeaderMap, body: Bytes| {
            let sink = sink.clone();
            async move {
                let upsert = headers.get("x-upsert").and_then(|v| v.to_str().ok()).map(str::to_owned);
                let apikey = headers.get("apikey").and_then(|v| v.to_str().ok()).map(str::to_owned);
                *sink.lock().unwrap() = Some((bucket, key.clone(), upsert, apikey, body.len()));
                Json(json!({"Key": format!("avatars/{key}")}))
            }
        }),
    );
    let base = serve(router).await;
    let storage = AvatarStorage::from_config(&storage_config(&base)).unwrap();

    let url = storage.upload("42/abc.png", vec![1, 2, 3]).await.unwrap();
    assert_eq!(url, format!("{base}/storage/v1/object/public/avatars/42/abc.png"));
    let (bucket, key, upsert, apikey, size) = seen.lock().unwrap().clone().unwrap();
    assert_eq!(bucket, "avatars");
    assert_eq!(key, "42/abc.png");
    assert_eq!(upsert.as_deref(), Some("true"));
    assert_eq!(apikey.as_deref(), Some("anon-key"));
    assert_eq!(size, 3);
}

#[tokio::test]
async fn bucket_rejection_carries_its_message() {
    let router = Router::new().route(
        "/storage/v1/object/{bucket}/{*key}",
        post(|| async { (StatusCode::FORBIDDEN, Json(json!({"message": "new row violates row-level security policy"}))) }),
    );
    let storage = AvatarStorage::from_config(&storage_config(&serve(router).await)).unwrap();

    let err = storage.upload("42/abc.png", vec![1]).await.unwrap_err();
    assert!(matches!(&err, ApiError::Storage(msg) if msg == "403: new row violates row-level security policy"));
}
