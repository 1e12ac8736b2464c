use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::auth::pin::{PinClient, PinTokens};
use crate::error::StoreError;
use crate::storage::Account;

use super::{into_object, AccountType, AuthFlow};

pub const ACCESS_TOKEN: &str = "accessToken";
pub const REFRESH_TOKEN: &str = "refreshToken";
pub const ACCOUNT_ID: &str = "accountId";
pub const EXPIRES_AT: &str = "expiresAt";

const AUTHORIZE_URL: &str = "https://api.imgur.com/oauth2/authorize";
const TOKEN_URL: &str = "https://api.imgur.com/oauth2/token";

pub struct ImgurAccountType {
    client: PinClient,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImgurEntry {
    #[serde(default)]
    username: String,
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

impl ImgurAccountType {
    pub fn new(client_id: &str, client_secret: &str) -> Self {
        Self {
            client: PinClient {
                authorize_url: AUTHORIZE_URL,
                token_url: TOKEN_URL,
                client_id: client_id.to_string(),
                client_secret: client_secret.to_string(),
            },
        }
    }

    /// Reads `IMGUR_CLIENT_ID` / `IMGUR_CLIENT_SECRET`. Without a client id the
    /// type reports itself unavailable.
    pub fn from_env() -> Self {
        let id = std::env::var("IMGUR_CLIENT_ID").unwrap_or_default();
        let secret = std::env::var("IMGUR_CLIENT_SECRET").unwrap_or_default();
        Self::new(&id, &secret)
    }

    fn apply_tokens(account: &mut Account, tokens: PinTokens) {
        account.set_token(ACCESS_TOKEN, tokens.access_token);
        account.set_token(REFRESH_TOKEN, tokens.refresh_token);
        account.set_token(EXPIRES_AT, tokens.expires_at.to_rfc3339());
        if let Some(id) = tokens.account_id {
            account.set_token(ACCOUNT_ID, id);
        }
        if let Some(name) = tokens.account_username {
            account.username = name;
        }
    }
}

/// Whether the stored access token has passed its expiry time.
pub fn is_expired(account: &Account, now: DateTime<Utc>) -> bool {
    account
        .token(EXPIRES_AT)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|at| at.with_timezone(&Utc) <= now)
        .unwrap_or(true)
}

impl AccountType for ImgurAccountType {
    fn text(&self) -> &str {
        "Imgur"
    }

    fn icon(&self) -> &str {
        "icon:imgur"
    }

    fn username_text(&self) -> &str {
        "Username"
    }

    fn password_text(&self) -> &str {
        "PIN"
    }

    fn flow(&self) -> AuthFlow {
        AuthFlow::OAuth2Pin
    }

    fn oauth2_pin_url(&self) -> Option<Url> {
        self.client.pin_url().ok()
    }

    fn is_available(&self) -> bool {
        !self.client.client_id.is_empty()
    }

    fn load(&self, account: &mut Account, _format_version: i64, entry: &Value) -> Result<(), StoreError> {
        let stored = ImgurEntry::deserialize(entry).map_err(|e| StoreError::entry("imgur", e))?;
        account.username = stored.username;
        account.set_token(ACCESS_TOKEN, stored.access_token);
        account.set_token(REFRESH_TOKEN, stored.refresh_token);
        if let Some(id) = stored.account_id {
            account.set_token(ACCOUNT_ID, id);
        }
        if let Some(at) = stored.expires_at {
            account.set_token(EXPIRES_AT, at.to_rfc3339());
        }
        Ok(())
    }

    fn save(&self, account: &Account) -> Result<Map<String, Value>, StoreError> {
        let expires_at = match account.token(EXPIRES_AT) {
            Some(s) => Some(
                DateTime::parse_from_rfc3339(s)
                    .map_err(|e| StoreError::entry("imgur", e))?
                    .with_timezone(&Utc),
            ),
            None => None,
        };
        let stored = ImgurEntry {
            username: account.username.clone(),
            access_token: account.token(ACCESS_TOKEN).unwrap_or_default().to_string(),
            refresh_token: account.token(REFRESH_TOKEN).unwrap_or_default().to_string(),
            account_id: account.token(ACCOUNT_ID).map(str::to_string),
            expires_at,
        };
        into_object("imgur", &stored)
    }

    fn login(&self, account: &mut Account, _username: &str, secret: &str) -> Result<()> {
        let tokens = self.client.exchange_pin(secret)?;
        Self::apply_tokens(account, tokens);
        debug!(username = %account.username, "imgur login succeeded");
        Ok(())
    }

    fn check(&self, account: &mut Account) -> Result<bool> {
        if !is_expired(account, Utc::now()) {
            return Ok(true);
        }
        let refresh_token = account
            .token(REFRESH_TOKEN)
            .filter(|t| !t.is_empty())
            .context("No refresh token stored")?
            .to_string();
        let tokens = self.client.refresh(&refresh_token)?;
        Self::apply_tokens(account, tokens);
        Ok(true)
    }
}
