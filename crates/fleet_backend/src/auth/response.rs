use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tokens returned by sign-in and by a successful MFA verify.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<AuthUser>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// What the user needs to register an authenticator app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TotpEnrollment {
    pub factor_id: String,
    /// SVG image, usually a `data:` URI.
    pub qr_code: String,
    pub secret: String,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MfaChallenge {
    pub id: String,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub(super) struct EnrollResponse {
    pub(super) id: String,
    pub(super) totp: EnrollTotp,
}

#[derive(Deserialize)]
pub(super) struct EnrollTotp {
    pub(super) qr_code: String,
    pub(super) secret: String,
    pub(super) uri: String,
}

impl From<EnrollResponse> for TotpEnrollment {
    fn from(response: EnrollResponse) -> Self {
        Self {
            factor_id: response.id,
            qr_code: response.totp.qr_code,
            secret: response.totp.secret,
            uri: response.totp.uri,
        }
    }
}

/// GoTrue error payloads name the message differently per endpoint.
#[derive(Default, Deserialize)]
pub(super) struct ErrorBody {
    msg: Option<String>,
    error_description: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

impl ErrorBody {
    pub(super) fn into_message(self) -> Option<String> {
        self.msg
            .or(self.error_description)
            .or(self.message)
            .or(self.error)
            .filter(|message| !message.trim().is_empty())
    }
}
