use super::*;
use serde_json::json;

fn completed_json() -> Value {
    json!({
        "id": 501,
        "user": 2,
        "patient": 7,
        "image_url": "https://cdn.example.test/scans/501.png",
        "uploaded_at": "2024-03-01T10:00:00Z",
        "status": "completed",
        "has_caries": true,
        "severity": "Moderate",
        "confidence_score": 0.94,
        "lesion_boxes": [
            {"x": 100, "y": 120, "width": 40, "height": 30, "confidence": 94},
            [300, 310, 20, 25, 0.65]
        ],
        "explanation_image": "https://cdn.example.test/explain/501.png",
    })
}

#[test]
fn completed_diagnosis_exposes_lesions() {
    let diagnosis: Diagnosis = serde_json::from_value(completed_json()).unwrap();
    assert_eq!(diagnosis.id, DiagnosisId(501));
    assert_eq!(diagnosis.status, DiagnosisStatus::Completed);
    assert_eq!(diagnosis.severity, Some(Severity::Moderate));
    assert_eq!(diagnosis.confidence.map(Confidence::fraction), Some(0.94));
    assert_eq!(diagnosis.explanation_url.as_deref(), Some("https://cdn.example.test/explain/501.png"));

    let lesions = diagnosis.visible_lesions();
    assert_eq!(lesions.len(), 2);
    assert_eq!(lesions[0].width, 40.0);
    assert_eq!(lesions[0].confidence.map(Confidence::fraction), Some(0.94));
    assert_eq!(lesions[1].x, 300.0);
    assert_eq!(lesions[1].caption(), "Caries (65%)");
}

#[test]
fn lesions_hidden_until_completed() {
    let mut raw = completed_json();
    raw["status"] = json!("processing");
    let diagnosis: Diagnosis = serde_json::from_value(raw).unwrap();
    assert!(diagnosis.visible_lesions().is_empty());
    assert!(!diagnosis.is_terminal());
}

#[test]
fn camel_case_upload_response_parses() {
    let diagnosis: Diagnosis = serde_json::from_value(json!({
        "id": 9,
        "patientName": "Ana Silva",
        "patientId": 7,
        "uploadedAt": "2024-03-01T10:00:00Z",
        "status": "pending",
        "imageUrl": "https://cdn.example.test/scans/9.png",
    }))
    .unwrap();
    assert_eq!(diagnosis.patient, Some(PatientId(7)));
    assert_eq!(diagnosis.patient_name.as_deref(), Some("Ana Silva"));
    assert_eq!(diagnosis.image_url, "https://cdn.example.test/scans/9.png");
    assert_eq!(diagnosis.status, DiagnosisStatus::Pending);
}

#[test]
fn missing_status_with_grade_is_completed() {
    let diagnosis: Diagnosis = serde_json::from_value(json!({
        "id": 4,
        "image_url": "x.png",
        "has_caries": false,
    }))
    .unwrap();
    assert_eq!(diagnosis.status, DiagnosisStatus::Completed);
}

#[test]
fn unknown_status_is_rejected() {
    let mut raw = completed_json();
    raw["status"] = json!("sleeping");
    assert!(serde_json::from_value::<Diagnosis>(raw).is_err());
}

#[test]
fn stringified_lesion_boxes_are_decoded() {
    let mut raw = completed_json();
    raw["lesion_boxes"] = json!("[{\"x\": 1, \"y\": 2, \"w\": 3, \"h\": 4}]");
    let diagnosis: Diagnosis = serde_json::from_value(raw).unwrap();
    assert_eq!(diagnosis.visible_lesions(), &[LesionBox::new(1.0, 2.0, 3.0, 4.0)]);
}

#[test]
fn negative_box_size_is_rejected() {
    let mut raw = completed_json();
    raw["lesion_boxes"] = json!([{"x": 1, "y": 2, "width": -3, "height": 4}]);
    assert!(serde_json::from_value::<Diagnosis>(raw).is_err());
}

#[test]
fn confidence_units_normalize_to_fraction() {
    assert_eq!(Confidence::from_wire(0.5).unwrap().fraction(), 0.5);
    assert_eq!(Confidence::from_wire(50.0).unwrap().fraction(), 0.5);
    assert_eq!(Confidence::from_wire(1.0).unwrap().percent(), 100.0);
    assert!(Confidence::from_wire(-0.1).is_err());
    assert!(Confidence::from_wire(120.0).is_err());
    assert!(Confidence::from_wire(f64::NAN).is_err());
    assert_eq!(Confidence::from_wire(94.0).unwrap().to_string(), "94%");
}

#[test]
fn status_terminality() {
    assert!(!DiagnosisStatus::Pending.is_terminal());
    assert!(!DiagnosisStatus::Processing.is_terminal());
    assert!(DiagnosisStatus::Completed.is_terminal());
    assert!(DiagnosisStatus::Failed.is_terminal());
    assert!(DiagnosisStatus::Pending.rank() < DiagnosisStatus::Processing.rank());
}

#[test]
fn severity_aliases() {
    assert_eq!(Severity::parse("severe"), Severity::Advanced);
    assert_eq!(Severity::parse(" Initial "), Severity::Initial);
    assert_eq!(Severity::parse("grade 4"), Severity::Other("grade 4".to_owned()));
}

#[test]
fn explanation_requires_image_url() {
    let explanation: Explanation = serde_json::from_value(json!({
        "diagnosis_id": 501,
        "heatmap_url": "https://cdn.example.test/explain/501.png",
        "method": "grad-cam",
    }))
    .unwrap();
    assert_eq!(explanation.diagnosis, Some(DiagnosisId(501)));
    assert_eq!(explanation.method.as_deref(), Some("grad-cam"));

    assert!(serde_json::from_value::<Explanation>(json!({"method": "grad-cam"})).is_err());
}

#[test]
fn file_field_alongside_computed_url_parses() {
    let diagnosis: Diagnosis = serde_json::from_value(json!({
        "id": 1,
        "patient": 3,
        "patient_id": 3,
        "image": "/media/scans/1.png",
        "image_url": "https://cdn.example.test/scans/1.png",
        "created_at": "2024-03-01T09:00:00Z",
        "uploaded_at": "2024-03-01T10:00:00Z",
        "confidence": 81,
        "confidence_score": 0.9,
        "status": "completed",
    }))
    .unwrap();
    assert_eq!(diagnosis.image_url, "https://cdn.example.test/scans/1.png");
    assert_eq!(diagnosis.patient, Some(PatientId(3)));
    assert_eq!(diagnosis.uploaded_at.as_deref(), Some("2024-03-01T10:00:00Z"));
    assert_eq!(diagnosis.confidence.map(Confidence::fraction), Some(0.9));
}

#[test]
fn bare_file_field_is_used_when_url_is_blank() {
    let diagnosis: Diagnosis = serde_json::from_value(json!({
        "id": 2,
        "image": "/media/scans/2.png",
        "image_url": "",
        "status": "pending",
    }))
    .unwrap();
    assert_eq!(diagnosis.image_url, "/media/scans/2.png");
}

#[test]
fn explanation_with_several_url_keys_prefers_image_url() {
    let explanation: Explanation = serde_json::from_value(json!({
        "id": 7,
        "diagnosis_id": 501,
        "image_url": "https://cdn.example.test/explain/501.png",
        "url": "https://cdn.example.test/other.png",
        "explanation": "Occlusal lesion on 36",
    }))
    .unwrap();
    assert_eq!(explanation.diagnosis, Some(DiagnosisId(501)));
    assert_eq!(explanation.image_url, "https://cdn.example.test/explain/501.png");
    assert_eq!(explanation.summary.as_deref(), Some("Occlusal lesion on 36"));
}
