use std::path::Path;

use serde::Deserialize;

use crate::AuthError;

/// Client-credentials grant parameters.
///
/// Stored on disk as JSON: `{"ClientID": ..., "ClientSecret": ..., "Url": ...}`
/// where `Url` is the token endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
}

#[derive(Deserialize)]
struct CredentialsFile {
    #[serde(rename = "ClientID")]
    client_id: Option<String>,
    #[serde(rename = "ClientSecret")]
    client_secret: Option<String>,
    #[serde(rename = "Url")]
    url: Option<String>,
}

impl Credentials {
    /// Loads credentials from a JSON file.
    pub fn load(path: &Path) -> Result<Self, AuthError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    /// Parses the credentials file format. Each missing field is reported
    /// separately.
    pub fn from_json(data: &str) -> Result<Self, AuthError> {
        let file: CredentialsFile = serde_json::from_str(data)?;
        let token_url = non_empty(file.url).ok_or(AuthError::MissingField("Url"))?;
        let client_id = non_empty(file.client_id).ok_or(AuthError::MissingField("ClientID"))?;
        let client_secret =
            non_empty(file.client_secret).ok_or(AuthError::MissingField("ClientSecret"))?;
        Ok(Self {
            client_id,
            client_secret,
            token_url,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
