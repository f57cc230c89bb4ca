use std::time::Duration;

use reqwest::StatusCode;

use super::client::rejection;
use super::response::EnrollResponse;
use super::{AuthClient, AuthError, AuthSession, MfaChallenge, TotpCode, TotpEnrollment};

fn client() -> AuthClient {
    AuthClient::new("https://fleet.supabase.co", "anon-key", Duration::from_secs(5))
        .expect("client")
}

#[test]
fn totp_code_must_be_six_ascii_digits() {
    assert_eq!(TotpCode::parse(" 123456 ").expect("valid").as_str(), "123456");
    for bad in ["12345", "1234567", "12a456", "", "١٢٣٤٥٦"] {
        assert!(
            matches!(TotpCode::parse(bad), Err(AuthError::InvalidCode)),
            "{bad:?}"
        );
    }
}

#[test]
fn totp_code_is_redacted_in_debug_output() {
    let code = TotpCode::parse("654321").expect("valid");
    assert!(!format!("{code:?}").contains("654321"));
}

#[test]
fn bad_code_fails_before_any_request() {
    // Unroutable endpoint: reaching the network would surface a Request error.
    let unreachable =
        AuthClient::new("http://127.0.0.1:9", "anon", Duration::from_millis(50)).expect("client");
    let err = unreachable
        .challenge_and_verify("token", "factor-1", "12 34")
        .expect_err("invalid");
    assert!(matches!(err, AuthError::InvalidCode));
}

#[test]
fn endpoints_live_under_auth_v1() {
    let auth = client();
    assert_eq!(
        auth.url("factors/f-1/verify").expect("url").as_str(),
        "https://fleet.supabase.co/auth/v1/factors/f-1/verify"
    );

    let request = auth
        .post(auth.url("factors").expect("url"), Some("user-jwt"))
        .build()
        .expect("request");
    assert_eq!(request.headers()["apikey"], "anon-key");
    assert_eq!(request.headers()["authorization"], "Bearer user-jwt");

    let anonymous = auth
        .post(auth.url("token").expect("url"), None)
        .build()
        .expect("request");
    assert_eq!(anonymous.headers()["authorization"], "Bearer anon-key");
}

#[test]
fn rejection_prefers_gotrue_message_fields() {
    let err = rejection(
        StatusCode::BAD_REQUEST,
        r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
    );
    assert!(matches!(
        err,
        AuthError::Rejected { status: 400, ref message } if message == "Invalid login credentials"
    ));

    let err = rejection(StatusCode::UNPROCESSABLE_ENTITY, r#"{"msg":"Invalid TOTP code entered"}"#);
    assert!(err.to_string().contains("Invalid TOTP code entered"));

    let err = rejection(StatusCode::BAD_GATEWAY, "");
    assert!(err.to_string().contains("Bad Gateway"));
}

#[test]
fn enrolment_payload_exposes_qr_secret_and_uri() {
    let response: EnrollResponse = serde_json::from_str(
        r#"{
            "id": "factor-1",
            "type": "totp",
            "totp": {
                "qr_code": "data:image/svg+xml;utf-8,<svg/>",
                "secret": "JBSWY3DPEHPK3PXP",
                "uri": "otpauth://totp/fleet:driver@example.com?secret=JBSWY3DPEHPK3PXP"
            }
        }"#,
    )
    .expect("json");

    let enrollment = TotpEnrollment::from(response);
    assert_eq!(enrollment.factor_id, "factor-1");
    assert_eq!(enrollment.secret, "JBSWY3DPEHPK3PXP");
    assert!(enrollment.qr_code.starts_with("data:image/svg+xml"));
    assert!(enrollment.uri.starts_with("otpauth://totp/"));
}

#[test]
fn session_and_challenge_payloads_decode() {
    let session: AuthSession = serde_json::from_str(
        r#"{
            "access_token": "jwt",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "refresh",
            "user": { "id": "user-1", "email": "driver@example.com" }
        }"#,
    )
    .expect("session");
    assert_eq!(session.access_token, "jwt");
    assert_eq!(session.user.expect("user").id, "user-1");

    let challenge: MfaChallenge =
        serde_json::from_str(r#"{"id":"challenge-1","expires_at":1700000000}"#).expect("challenge");
    assert_eq!(challenge.id, "challenge-1");
    assert_eq!(
        challenge.expires_at.map(|at| at.timestamp()),
        Some(1_700_000_000)
    );
}
