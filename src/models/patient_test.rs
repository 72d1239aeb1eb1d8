use super::*;
use serde_json::json;
use time::macros::date;

fn patient_json() -> serde_json::Value {
    json!({
        "id": 7,
        "first_name": "Ana",
        "last_name": "Silva",
        "date_of_birth": "1964-05-20",
        "gender": "female",
        "email": "",
        "phone": "555-0101",
        "last_visit": "2024-02-01T10:00:00Z",
    })
}

#[test]
fn risk_boundary_at_sixty() {
    assert_eq!(RiskLevel::from_age(59), RiskLevel::Low);
    assert_eq!(RiskLevel::from_age(60), RiskLevel::High);
}

#[test]
fn age_counts_only_completed_birthdays() {
    let dob = date!(1964 - 05 - 20);
    assert_eq!(age_on(dob, date!(2024 - 05 - 19)), 59);
    assert_eq!(age_on(dob, date!(2024 - 05 - 20)), 60);
    assert_eq!(age_on(dob, date!(1960 - 01 - 01)), 0);
}

#[test]
fn patient_parses_and_normalizes_blank_fields() {
    let patient: Patient = serde_json::from_value(patient_json()).unwrap();
    assert_eq!(patient.id, PatientId(7));
    assert_eq!(patient.full_name(), "Ana Silva");
    assert_eq!(patient.email, None);
    assert_eq!(patient.last_visit, Some(date!(2024 - 02 - 01)));
    assert_eq!(patient.display_id(), "#0007");
    assert_eq!(patient.risk_on(date!(2024 - 05 - 19)), RiskLevel::Low);
    assert_eq!(patient.risk_on(date!(2024 - 05 - 20)), RiskLevel::High);
}

#[test]
fn patient_with_bad_birth_date_is_rejected() {
    let mut raw = patient_json();
    raw["date_of_birth"] = json!("20/05/1964");
    let err = serde_json::from_value::<Patient>(raw).unwrap_err().to_string();
    assert!(err.contains("date_of_birth"));
}

#[test]
fn patient_serializes_dates_as_iso_days() {
    let patient: Patient = serde_json::from_value(patient_json()).unwrap();
    let value = serde_json::to_value(&patient).unwrap();
    assert_eq!(value["date_of_birth"], "1964-05-20");
    assert_eq!(value["last_visit"], "2024-02-01");
}

#[test]
fn create_payload_omits_unset_optionals() {
    let mut create = PatientCreate::new(" Ana ", "Silva", date!(1964 - 05 - 20), "female");
    create.phone = Some("555-0101".to_owned());
    let value = serde_json::to_value(&create).unwrap();
    assert_eq!(
        value,
        json!({
            "first_name": "Ana",
            "last_name": "Silva",
            "date_of_birth": "1964-05-20",
            "gender": "female",
            "phone": "555-0101",
        })
    );
    create.validate().unwrap();
}

#[test]
fn create_rejects_blank_name_and_bad_email() {
    let blank = PatientCreate::new("", "Silva", date!(1964 - 05 - 20), "female");
    assert!(matches!(blank.validate(), Err(ApiError::Invalid(_))));

    let mut bad_email = PatientCreate::new("Ana", "Silva", date!(1964 - 05 - 20), "female");
    bad_email.email = Some("ana.example.test".to_owned());
    assert!(matches!(bad_email.validate(), Err(ApiError::Invalid(_))));
}

#[test]
fn update_sends_only_set_fields_and_rejects_empty_patch() {
    let update = PatientUpdate { phone: Some("555-0199".to_owned()), ..PatientUpdate::default() };
    assert_eq!(serde_json::to_value(&update).unwrap(), json!({"phone": "555-0199"}));
    update.validate().unwrap();

    assert!(matches!(PatientUpdate::default().validate(), Err(ApiError::Invalid(_))));
    let blanked = PatientUpdate { last_name: Some("  ".to_owned()), ..PatientUpdate::default() };
    assert!(blanked.validate().is_err());
}
