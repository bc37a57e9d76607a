use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};

use crate::AuthError;

/// A bearer token and the instant it stops being accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    /// Builds a token whose expiry is read from the JWT `exp` claim.
    ///
    /// The signature is not verified; the gateway does that.
    pub fn from_jwt(raw: &str) -> Result<Self, AuthError> {
        let exp = jwt_expiry(raw)?;
        Ok(Self::new(raw, exp))
    }

    pub fn has_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

fn jwt_expiry(raw: &str) -> Result<DateTime<Utc>, AuthError> {
    let payload = raw
        .split('.')
        .nth(1)
        .ok_or_else(|| AuthError::MalformedToken("not a JWT".into()))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| AuthError::MalformedToken(format!("payload: {e}")))?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::MalformedToken(format!("claims: {e}")))?;
    let exp = claims
        .get("exp")
        .and_then(serde_json::Value::as_i64)
        .ok_or_else(|| AuthError::MalformedToken("missing exp claim".into()))?;
    DateTime::from_timestamp(exp, 0)
        .ok_or_else(|| AuthError::MalformedToken(format!("exp out of range: {exp}")))
}

#[cfg(test)]
pub(crate) fn make_jwt(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let claims = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"svc","exp":{exp}}}"#));
    format!("{header}.{claims}.c2lnbmF0dXJl")
}
