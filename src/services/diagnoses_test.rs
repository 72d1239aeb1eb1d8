use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::{Multipart, Path};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

use super::*;
use crate::config::PollConfig;
use crate::models::DiagnosisStatus;
use crate::poll::{PollState, spawn_poll};
use crate::test_helpers::{serve, signed_in_client};

async fn upload(mut multipart: Multipart) -> Json<Value> {
    let mut seen = serde_json::Map::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_owned();
        if name == "image" {
            seen.insert("file_name".to_owned(), json!(field.file_name()));
            seen.insert("content_type".to_owned(), json!(field.content_type()));
            seen.insert("size".to_owned(), json!(field.bytes().await.unwrap().len()));
        } else {
            seen.insert(name, json!(field.text().await.unwrap()));
        }
    }
    Json(json!({
        "id": 77,
        "patientId": seen["patient_id"].as_str().unwrap().parse::<i64>().unwrap(),
        "patientName": "Ana Silva",
        "uploadedAt": "2024-03-01T10:00:00Z",
        "status": "pending",
        "imageUrl": format!("https://cdn.example.test/{}", seen["file_name"].as_str().unwrap()),
        "echo": seen,
    }))
}

#[tokio::test]
async fn upload_sends_multipart_image_and_patient() {
    let router = Router::new().route("/ai/upload/", post(upload));
    let (client, _) = signed_in_client(&serve(router).await);

    let diagnosis = client.upload_scan_bytes(PatientId(7), "bitewing.png", vec![0x89, 0x50, 0x4e, 0x47]).await.unwrap();
    assert_eq!(diagnosis.id, DiagnosisId(77));
    assert_eq!(diagnosis.patient, Some(PatientId(7)));
    assert_eq!(diagnosis.status, DiagnosisStatus::Pending);
    assert_eq!(diagnosis.image_url, "https://cdn.example.test/bitewing.png");
}

#[tokio::test]
async fn upload_from_disk_reads_the_file() {
    let router = Router::new().route("/ai/upload/", post(upload));
    let (client, _) = signed_in_client(&serve(router).await);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("panoramic.jpg");
    std::fs::write(&path, [0xff, 0xd8, 0xff]).unwrap();

    let diagnosis = client.upload_scan(PatientId(3), &path).await.unwrap();
    assert_eq!(diagnosis.image_url, "https://cdn.example.test/panoramic.jpg");

    let missing = client.upload_scan(PatientId(3), &dir.path().join("nope.png")).await.unwrap_err();
    assert!(matches!(missing, ApiError::Invalid(_)));
}

#[tokio::test]
async fn non_image_upload_is_rejected_locally() {
    let (client, _) = signed_in_client("http://127.0.0.1:9");
    let err = client.upload_scan_bytes(PatientId(7), "notes.txt", b"hello".to_vec()).await.unwrap_err();
    assert!(matches!(err, ApiError::Invalid(_)));
    let empty = client.upload_scan_bytes(PatientId(7), "scan.png", Vec::new()).await.unwrap_err();
    assert!(matches!(empty, ApiError::Invalid(_)));
}

#[tokio::test]
async fn list_get_delete_and_explain() {
    let router = Router::new()
        .route(
            "/ai/diagnosis/all/",
            get(|| async {
                Json(json!([
                    {"id": 1, "image_url": "a.png", "uploaded_at": "2024-03-01T10:00:00Z", "status": "completed",
                     "has_caries": true, "confidence_score": 87, "lesion_boxes": [[10, 20, 30, 40]]},
                    {"id": 2, "imageUrl": "b.png", "uploadedAt": "2024-03-02T10:00:00Z", "status": "processing"},
                ]))
            }),
        )
        .route(
            "/ai/diagnosis/{id}/",
            get(|Path(id): Path<i64>| async move { Json(json!({"id": id, "image_url": "a.png", "status": "processing"})) }),
        )
        .route("/ai/diagnosis/{id}/delete/", delete(|| async { Json(json!({"message": "deleted"})) }))
        .route(
            "/ai/explain/{id}/",
            get(|Path(id): Path<i64>| async move {
                Json(json!({"diagnosis_id": id, "explanation_image": "https://cdn.example.test/gradcam.png"}))
            }),
        )
        .route(
            "/ai/explain/quick/{id}/",
            get(|| async { (StatusCode::NOT_FOUND, Json(json!({"error": "Diagnosis not completed yet"}))) }),
        );
    let (client, _) = signed_in_client(&serve(router).await);

    let all = client.list_diagnoses().await.unwrap();
    assert_eq!(all.len(), 2);
    assert!((all[0].confidence.unwrap().percent() - 87.0).abs() < 1e-9);
    assert_eq!(all[0].visible_lesions().len(), 1);
    assert!(all[1].visible_lesions().is_empty());

    assert_eq!(client.get_diagnosis(DiagnosisId(2)).await.unwrap().status, DiagnosisStatus::Processing);
    client.delete_diagnosis(DiagnosisId(2)).await.unwrap();

    let explanation = client.explain(DiagnosisId(1)).await.unwrap();
    assert_eq!(explanation.image_url, "https://cdn.example.test/gradcam.png");

    let err = client.quick_explain(DiagnosisId(2)).await.unwrap_err();
    assert_eq!(err.to_string(), "Diagnosis not completed yet");
}

#[tokio::test]
async fn api_client_drives_a_poll_to_completion() {
    let fetches = Arc::new(AtomicUsize::new(0));
    let counter = fetches.clone();
    let router = Router::new().route(
        "/ai/diagnosis/{id}/",
        get(move |Path(id): Path<i64>| {
            let counter = counter.clone();
            async move {
                let status = if counter.fetch_add(1, Ordering::SeqCst) < 2 { "processing" } else { "completed" };
                Json(json!({"id": id, "image_url": "a.png", "status": status, "has_caries": false}))
            }
        }),
    );
    let (client, _) = signed_in_client(&serve(router).await);
    let config = PollConfig { interval: Duration::from_millis(10), ..PollConfig::default() };

    let handle = spawn_poll(Arc::new(client), DiagnosisId(11), config);
    let state = handle.wait().await;
    assert!(matches!(state, PollState::Completed(_)));
    assert_eq!(fetches.load(Ordering::SeqCst), 3);
}
