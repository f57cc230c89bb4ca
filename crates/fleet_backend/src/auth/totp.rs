use std::fmt;

use super::error::AuthError;

const CODE_LEN: usize = 6;

/// A six-digit TOTP code, validated before it is sent anywhere.
#[derive(Clone, PartialEq, Eq)]
pub struct TotpCode(String);

impl TotpCode {
    pub fn parse(raw: &str) -> Result<Self, AuthError> {
        let code = raw.trim();
        if code.len() == CODE_LEN && code.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(code.to_string()))
        } else {
            Err(AuthError::InvalidCode)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Codes are short-lived secrets; keep them out of logs.
impl fmt::Debug for TotpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TotpCode(******)")
    }
}
