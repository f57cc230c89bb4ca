//! Supabase Auth (GoTrue): password sign-in and TOTP second factor.
//!
//! Enrolment returns the QR code, shared secret and `otpauth://` URI to show
//! the user. A challenge followed by a successful verify upgrades the session
//! to assurance level 2; codes are checked locally for shape only.

mod client;
mod error;
mod response;
mod totp;

#[cfg(test)]
mod tests;

pub use client::AuthClient;
pub use error::AuthError;
pub use response::{AuthSession, AuthUser, MfaChallenge, TotpEnrollment};
pub use totp::TotpCode;
