use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::json;

use super::error::AuthError;
use super::response::{AuthSession, EnrollResponse, ErrorBody, MfaChallenge, TotpEnrollment};
use super::totp::TotpCode;
use crate::{endpoint, http_client, ClientError};

#[derive(Debug, Clone)]
pub struct AuthClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl AuthClient {
    pub fn new(base_url: &str, anon_key: &str, timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: endpoint(base_url)?,
            anon_key: anon_key.to_string(),
        })
    }

    pub fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, AuthError> {
        let mut url = self.url("token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");
        let session: AuthSession = read(
            self.post(url, None)
                .json(&json!({ "email": email, "password": password }))
                .send()?,
        )?;
        tracing::info!(
            user_id = session.user.as_ref().map(|user| user.id.as_str()).unwrap_or_default(),
            "signed in"
        );
        Ok(session)
    }

    /// Register a new TOTP factor for the signed-in user.
    pub fn enroll_totp(
        &self,
        access_token: &str,
        friendly_name: Option<&str>,
    ) -> Result<TotpEnrollment, AuthError> {
        let url = self.url("factors")?;
        let mut body = json!({ "factor_type": "totp" });
        if let Some(name) = friendly_name {
            body["friendly_name"] = json!(name);
        }
        let response: EnrollResponse =
            read(self.post(url, Some(access_token)).json(&body).send()?)?;
        Ok(response.into())
    }

    pub fn challenge(&self, access_token: &str, factor_id: &str) -> Result<MfaChallenge, AuthError> {
        let url = self.url(&format!("factors/{factor_id}/challenge"))?;
        read(self.post(url, Some(access_token)).json(&json!({})).send()?)
    }

    /// Returns the upgraded (AAL2) session.
    pub fn verify(
        &self,
        access_token: &str,
        factor_id: &str,
        challenge_id: &str,
        code: &TotpCode,
    ) -> Result<AuthSession, AuthError> {
        let url = self.url(&format!("factors/{factor_id}/verify"))?;
        read(
            self.post(url, Some(access_token))
                .json(&json!({ "challenge_id": challenge_id, "code": code.as_str() }))
                .send()?,
        )
    }

    /// Validate `raw`, then challenge and verify in one go.
    pub fn challenge_and_verify(
        &self,
        access_token: &str,
        factor_id: &str,
        raw_code: &str,
    ) -> Result<AuthSession, AuthError> {
        let code = TotpCode::parse(raw_code)?;
        let challenge = self.challenge(access_token, factor_id)?;
        self.verify(access_token, factor_id, &challenge.id, &code)
    }

    pub(super) fn url(&self, path: &str) -> Result<Url, AuthError> {
        Url::parse(&format!("{}/auth/v1/{path}", self.base_url))
            .map_err(|err| AuthError::Decode(format!("invalid auth URL: {err}")))
    }

    pub(super) fn post(&self, url: Url, access_token: Option<&str>) -> RequestBuilder {
        self.client
            .post(url)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token.unwrap_or(&self.anon_key))
    }
}

fn read<T: DeserializeOwned>(response: Response) -> Result<T, AuthError> {
    let status = response.status();
    let body = response.text()?;
    if !status.is_success() {
        return Err(rejection(status, &body));
    }
    serde_json::from_str(&body).map_err(|err| AuthError::Decode(err.to_string()))
}

pub(super) fn rejection(status: StatusCode, body: &str) -> AuthError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(ErrorBody::into_message)
        .or_else(|| Some(body.trim().to_string()).filter(|text| !text.is_empty()))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());
    AuthError::Rejected {
        status: status.as_u16(),
        message,
    }
}
