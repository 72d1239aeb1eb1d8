use super::*;
use serde_json::json;

#[test]
fn register_requires_matching_passwords() {
    let mut request = RegisterRequest {
        username: "drsilva".to_owned(),
        email: "silva@clinic.test".to_owned(),
        password: "s3cret!".to_owned(),
        password2: "s3cret?".to_owned(),
    };
    assert!(matches!(request.validate(), Err(ApiError::Invalid(msg)) if msg.contains("do not match")));
    request.password2 = "s3cret!".to_owned();
    request.validate().unwrap();
}

#[test]
fn empty_access_token_is_not_a_session() {
    let pair = TokenPair { access: " ".to_owned(), refresh: None };
    assert!(Session::try_from(pair).is_err());

    let pair: TokenPair = serde_json::from_value(json!({"access": "a", "refresh": "", "user": {"id": 1}})).unwrap();
    let session = Session::try_from(pair).unwrap();
    assert_eq!(session.refresh, None);
}

#[test]
fn notice_reads_message_or_detail() {
    assert_eq!(AuthNotice::from_body(Some(&json!({"detail": "Email sent"}))).message.as_deref(), Some("Email sent"));
    assert_eq!(AuthNotice::from_body(Some(&json!("done"))).message.as_deref(), Some("done"));
    assert_eq!(AuthNotice::from_body(None), AuthNotice::default());
}
