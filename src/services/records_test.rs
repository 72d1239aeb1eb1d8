use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query as AxumQuery};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use time::macros::date;

use super::*;
use crate::test_helpers::{serve, signed_in_client};

fn record_json(id: i64, body: &Value) -> Value {
    let mut record = body.clone();
    record["id"] = json!(id);
    record["created_by"] = json!(2);
    record
}

#[tokio::test]
async fn list_maps_patient_filter_to_patient_id() {
    let seen = Arc::new(Mutex::new(HashMap::new()));
    let sink = seen.clone();
    let router = Router::new().route(
        "/records/",
        get(move |AxumQuery(params): AxumQuery<HashMap<String, String>>| {
            let sink = sink.clone();
            async move {
                *sink.lock().unwrap() = params;
                Json(json!({"count": 1, "results": [
                    {"id": 5, "patient": 7, "title": "Cleaning", "record_type": "", "visit_date": "2024-02-02"}
                ]}))
            }
        }),
    );
    let (client, _) = signed_in_client(&serve(router).await);

    let query = RecordQuery {
        patient: Some(PatientId(7)),
        sort_by: Some("visit_date".to_owned()),
        order: Some(SortOrder::Desc),
        ..RecordQuery::default()
    };
    let rows = client.list_records(&query).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].record_type, "general");

    let params = seen.lock().unwrap().clone();
    assert_eq!(params.get("patient_id").map(String::as_str), Some("7"));
    assert_eq!(params.get("order").map(String::as_str), Some("desc"));
    assert!(!params.contains_key("search"));
}

#[tokio::test]
async fn create_update_replace_delete() {
    let router = Router::new()
        .route(
            "/records/",
            post(|Json(body): Json<Value>| async move { (StatusCode::CREATED, Json(record_json(9, &body))) }),
        )
        .route(
            "/records/{id}/",
            get(|Path(id): Path<i64>| async move {
                Json(json!({"id": id, "patient": 7, "title": "Annual exam", "notes": "sensitivity"}))
            })
            .patch(|Path(id): Path<i64>, Json(body): Json<Value>| async move {
                let mut record = json!({"id": id, "patient": 7, "title": "Annual exam"});
                for (k, v) in body.as_object().unwrap() {
                    record[k] = v.clone();
                }
                Json(record)
            })
            .put(|Path(id): Path<i64>, Json(body): Json<Value>| async move { Json(record_json(id, &body)) })
            .delete(|| async { StatusCode::NO_CONTENT }),
        );
    let (client, _) = signed_in_client(&serve(router).await);

    let mut create = RecordCreate::new(PatientId(7), "checkup", "Annual exam");
    create.visit_date = Some(date!(2024 - 03 - 01));
    let created = client.create_record(&create).await.unwrap();
    assert_eq!(created.id, RecordId(9));
    assert_eq!(created.visit_date, Some(date!(2024 - 03 - 01)));

    let fetched = client.get_record(created.id).await.unwrap();
    assert_eq!(fetched.notes.as_deref(), Some("sensitivity"));

    let update = RecordUpdate { prescription: Some("chlorhexidine rinse".to_owned()), ..RecordUpdate::default() };
    let updated = client.update_record(created.id, &update).await.unwrap();
    assert_eq!(updated.prescription.as_deref(), Some("chlorhexidine rinse"));

    create.title = "Annual exam (revised)".to_owned();
    let replaced = client.replace_record(created.id, &create).await.unwrap();
    assert_eq!(replaced.title, "Annual exam (revised)");

    client.delete_record(created.id).await.unwrap();
}

#[tokio::test]
async fn invalid_record_is_not_sent() {
    let (client, _) = signed_in_client("http://127.0.0.1:9");
    let create = RecordCreate::new(PatientId(7), "checkup", "  ");
    assert!(matches!(client.create_record(&create).await, Err(ApiError::Invalid(_))));
}
