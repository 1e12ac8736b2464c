use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::auth::yggdrasil;
use crate::error::StoreError;
use crate::storage::{Account, StoredProfile};

use super::{apply_profiles, into_object, AccountType, AuthFlow};

pub const CLIENT_TOKEN: &str = "clientToken";
pub const ACCESS_TOKEN: &str = "accessToken";

/// Key in [`Account::extra`] holding the stored `user` object.
pub const USER: &str = "user";

const AVATAR_URL: &str = "https://crafatar.com/avatars";

pub struct MojangAccountType;

/// Persisted layout, shared by format versions 2 and 3.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MojangEntry {
    #[serde(default)]
    username: String,
    #[serde(default)]
    client_token: String,
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    profiles: Vec<StoredProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    active_profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user: Option<Value>,
}

pub fn avatar_url(profile_id: &str) -> String {
    format!("{}/{}?size=16&overlay", AVATAR_URL, profile_id)
}

fn new_client_token() -> String {
    format!("{:032x}", rand::random::<u128>())
}

fn set_profiles(account: &mut Account, profiles: &[StoredProfile], active: Option<&str>) {
    apply_profiles(account, profiles, active);
    let ids: Vec<String> = account.profiles().iter().map(|p| p.id.clone()).collect();
    for id in ids {
        if let Some(profile) = account.profile_mut(&id) {
            profile.avatar = Some(avatar_url(&id));
        }
    }
}

fn apply_session(account: &mut Account, session: yggdrasil::Session) {
    account.set_token(ACCESS_TOKEN, session.access_token);
    account.set_token(CLIENT_TOKEN, session.client_token);
    let selected = session.selected_profile.map(|p| p.id);
    if !session.available_profiles.is_empty() {
        set_profiles(account, &session.available_profiles, selected.as_deref());
    } else {
        account.set_active_profile(selected.as_deref());
    }
}

impl AccountType for MojangAccountType {
    fn text(&self) -> &str {
        "Mojang"
    }

    fn icon(&self) -> &str {
        "icon:mojang"
    }

    fn username_text(&self) -> &str {
        "Email/Username"
    }

    fn password_text(&self) -> &str {
        "Password"
    }

    fn flow(&self) -> AuthFlow {
        AuthFlow::UsernamePassword
    }

    fn prepare(&self, account: &mut Account) {
        account.set_token(CLIENT_TOKEN, new_client_token());
    }

    fn load(&self, account: &mut Account, _format_version: i64, entry: &Value) -> Result<(), StoreError> {
        let stored = MojangEntry::deserialize(entry).map_err(|e| StoreError::entry("mojang", e))?;
        account.username = stored.username;
        account.set_token(CLIENT_TOKEN, stored.client_token);
        account.set_token(ACCESS_TOKEN, stored.access_token);
        set_profiles(account, &stored.profiles, stored.active_profile.as_deref());
        match stored.user {
            Some(user) => account.extra.insert(USER.to_string(), user),
            None => account.extra.remove(USER),
        };
        Ok(())
    }

    fn save(&self, account: &Account) -> Result<Map<String, Value>, StoreError> {
        let stored = MojangEntry {
            username: account.username.clone(),
            client_token: account.token(CLIENT_TOKEN).unwrap_or_default().to_string(),
            access_token: account.token(ACCESS_TOKEN).unwrap_or_default().to_string(),
            profiles: account.profiles().iter().map(StoredProfile::from_profile).collect(),
            active_profile: account.active_profile().map(|p| p.id.clone()),
            user: account.extra.get(USER).cloned(),
        };
        into_object("mojang", &stored)
    }

    fn login(&self, account: &mut Account, username: &str, secret: &str) -> Result<()> {
        let client_token = match account.token(CLIENT_TOKEN) {
            Some(token) if !token.is_empty() => token.to_string(),
            _ => new_client_token(),
        };
        let session = yggdrasil::authenticate(username, secret, &client_token)
            .context("Mojang login failed")?;
        account.username = username.to_string();
        apply_session(account, session);
        debug!(username, profiles = account.profiles().len(), "mojang login succeeded");
        Ok(())
    }

    fn check(&self, account: &mut Account) -> Result<bool> {
        let access = account.token(ACCESS_TOKEN).unwrap_or_default().to_string();
        let client = account.token(CLIENT_TOKEN).unwrap_or_default().to_string();
        if access.is_empty() {
            return Ok(false);
        }
        if yggdrasil::validate(&access, &client)? {
            return Ok(true);
        }
        match yggdrasil::refresh(&access, &client) {
            Ok(session) => {
                apply_session(account, session);
                Ok(true)
            }
            Err(e) => {
                warn!(username = %account.username, "session refresh rejected: {:#}", e);
                Ok(false)
            }
        }
    }

    fn logout(&self, account: &Account) -> Result<()> {
        let access = account.token(ACCESS_TOKEN).unwrap_or_default();
        let client = account.token(CLIENT_TOKEN).unwrap_or_default();
        if access.is_empty() {
            return Ok(());
        }
        yggdrasil::invalidate(access, client)
    }
}
