use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::Deserialize;
use url::Url;

/// Endpoints and client credentials for an OAuth2 PIN provider.
#[derive(Debug, Clone)]
pub struct PinClient {
    pub authorize_url: &'static str,
    pub token_url: &'static str,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug)]
pub struct PinTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub account_username: Option<String>,
    pub account_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: i64,
    account_username: Option<String>,
    account_id: Option<serde_json::Value>,
    error: Option<String>,
    error_description: Option<String>,
}

impl PinClient {
    /// URL the user opens to obtain a PIN.
    pub fn pin_url(&self) -> Result<Url> {
        let state: String = rand::thread_rng()
            .sample_iter(&rand::distributions::Alphanumeric)
            .take(16)
            .map(char::from)
            .collect();

        let mut url = Url::parse(self.authorize_url)?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("response_type", "pin")
            .append_pair("state", &state);
        Ok(url)
    }

    pub fn exchange_pin(&self, pin: &str) -> Result<PinTokens> {
        self.request_tokens("pin", &[("pin", pin.trim())])
            .context("PIN exchange failed")
    }

    pub fn refresh(&self, refresh_token: &str) -> Result<PinTokens> {
        self.request_tokens("refresh_token", &[("refresh_token", refresh_token)])
            .context("Token refresh failed")
    }

    fn request_tokens(&self, grant_type: &str, extra: &[(&str, &str)]) -> Result<PinTokens> {
        let client = reqwest::blocking::Client::new();

        let mut params = HashMap::new();
        params.insert("client_id", self.client_id.as_str());
        params.insert("client_secret", self.client_secret.as_str());
        params.insert("grant_type", grant_type);
        for &(key, value) in extra {
            params.insert(key, value);
        }

        let response: TokenResponse = client
            .post(self.token_url)
            .form(&params)
            .send()?
            .json()?;

        if let Some(error) = response.error {
            let desc = response.error_description.unwrap_or_default();
            anyhow::bail!("{} - {}", error, desc);
        }

        Ok(PinTokens {
            access_token: response.access_token.context("No access token received")?,
            refresh_token: response.refresh_token.context("No refresh token received")?,
            expires_at: Utc::now() + Duration::seconds(response.expires_in),
            account_username: response.account_username,
            account_id: response.account_id.map(|v| match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            }),
        })
    }
}
