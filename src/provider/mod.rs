pub mod imgur;
pub mod mojang;

use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::StoreError;
use crate::model::presentation::{CellData, Role};
use crate::storage::{Account, StoredProfile};

/// How a type's login flow collects credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFlow {
    /// The user visits an authorization URL and pastes back a PIN.
    OAuth2Pin,
    UsernamePassword,
}

/// A kind of account: display metadata, persistence, and network operations.
///
/// The network operations are blocking; the caller decides where they run.
pub trait AccountType {
    fn text(&self) -> &str;
    fn icon(&self) -> &str;
    fn username_text(&self) -> &str;
    fn password_text(&self) -> &str;
    fn flow(&self) -> AuthFlow;

    fn oauth2_pin_url(&self) -> Option<Url> {
        None
    }

    fn is_available(&self) -> bool {
        true
    }

    /// Initializes a freshly created account.
    fn prepare(&self, _account: &mut Account) {}

    /// Fills `account` from one persisted entry.
    fn load(&self, account: &mut Account, _format_version: i64, entry: &Value) -> Result<(), StoreError> {
        load_generic(account, entry)
    }

    /// Serializes `account`. The codec adds the `type` key.
    fn save(&self, account: &Account) -> Result<Map<String, Value>, StoreError> {
        save_generic(account)
    }

    /// Authenticates `account`. For PIN flows `secret` is the PIN and `username` is ignored.
    fn login(&self, _account: &mut Account, _username: &str, _secret: &str) -> Result<()> {
        anyhow::bail!("{} accounts do not support logging in", self.text())
    }

    /// Verifies the stored session, refreshing tokens in place when possible.
    fn check(&self, _account: &mut Account) -> Result<bool> {
        Ok(true)
    }

    fn logout(&self, _account: &Account) -> Result<()> {
        Ok(())
    }
}

// -- Generic entry layout -----------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenericEntry {
    #[serde(default)]
    username: String,
    #[serde(default)]
    tokens: BTreeMap<String, String>,
    #[serde(default)]
    profiles: Vec<StoredProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    active_profile: Option<String>,
}

fn load_generic(account: &mut Account, entry: &Value) -> Result<(), StoreError> {
    let stored = GenericEntry::deserialize(entry)
        .map_err(|e| StoreError::entry(account.account_type(), e))?;
    account.username = stored.username;
    account.tokens = stored.tokens;
    apply_profiles(account, &stored.profiles, stored.active_profile.as_deref());
    Ok(())
}

fn save_generic(account: &Account) -> Result<Map<String, Value>, StoreError> {
    let stored = GenericEntry {
        username: account.username.clone(),
        tokens: account.tokens.clone(),
        profiles: account.profiles().iter().map(StoredProfile::from_profile).collect(),
        active_profile: account.active_profile().map(|p| p.id.clone()),
    };
    into_object(account.account_type(), &stored)
}

/// Replaces the profiles of `account` with the persisted ones.
pub(crate) fn apply_profiles(account: &mut Account, profiles: &[StoredProfile], active: Option<&str>) {
    account.clear_profiles();
    for stored in profiles {
        account.add_profile(&stored.id, &stored.name).legacy = stored.legacy;
    }
    account.set_active_profile(active);
}

pub(crate) fn into_object<T: Serialize>(account_type: &str, value: &T) -> Result<Map<String, Value>, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::entry(account_type, "entry did not serialize to an object")),
    }
}

// -- Registry -----------------------------------------------------------------

struct RegisteredType {
    storage_id: String,
    account_type: Box<dyn AccountType>,
}

/// Maps storage ids to account types. Types stay registered for the process.
#[derive(Default)]
pub struct AccountTypeRegistry {
    entries: Vec<RegisteredType>,
}

impl AccountTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a type under `storage_id`. Unavailable types and duplicate ids are
    /// rejected and logged; returns whether the type was added.
    pub fn register(&mut self, storage_id: &str, account_type: impl AccountType + 'static) -> bool {
        if !account_type.is_available() {
            info!(storage_id, "account type is unavailable, not registering");
            return false;
        }
        if self.contains(storage_id) {
            warn!(storage_id, "account type already registered");
            return false;
        }
        debug!(storage_id, "registered account type");
        self.entries.push(RegisteredType {
            storage_id: storage_id.to_string(),
            account_type: Box::new(account_type),
        });
        true
    }

    pub fn lookup(&self, storage_id: &str) -> Option<&dyn AccountType> {
        self.entries
            .iter()
            .find(|e| e.storage_id == storage_id)
            .map(|e| e.account_type.as_ref())
    }

    pub fn contains(&self, storage_id: &str) -> bool {
        self.entries.iter().any(|e| e.storage_id == storage_id)
    }

    /// Builds a new, unauthenticated account of the given type.
    pub fn create(&self, storage_id: &str) -> Option<Account> {
        let account_type = self.lookup(storage_id)?;
        let mut account = Account::new(storage_id);
        account_type.prepare(&mut account);
        Some(account)
    }

    pub fn types(&self) -> TypesView<'_> {
        TypesView { registry: self }
    }
}

/// Registry with the built-in types: `mojang`, and `imgur` when configured.
pub fn default_registry() -> AccountTypeRegistry {
    let mut registry = AccountTypeRegistry::new();
    registry.register("mojang", mojang::MojangAccountType);
    registry.register("imgur", imgur::ImgurAccountType::from_env());
    registry
}

/// Read-only, insertion-ordered view of the registered types.
#[derive(Clone, Copy)]
pub struct TypesView<'a> {
    registry: &'a AccountTypeRegistry,
}

impl<'a> TypesView<'a> {
    pub fn len(&self) -> usize {
        self.registry.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a dyn AccountType)> + 'a {
        self.registry
            .entries
            .iter()
            .map(|e| (e.storage_id.as_str(), e.account_type.as_ref()))
    }

    pub fn get(&self, row: usize) -> Option<(&'a str, &'a dyn AccountType)> {
        self.registry
            .entries
            .get(row)
            .map(|e| (e.storage_id.as_str(), e.account_type.as_ref()))
    }

    pub fn data(&self, row: usize, role: Role) -> CellData {
        let Some((storage_id, account_type)) = self.get(row) else {
            return CellData::Empty;
        };
        match role {
            Role::Display => CellData::Text(account_type.text().to_string()),
            Role::Decoration => CellData::Icon(account_type.icon().to_string()),
            Role::User => CellData::Text(storage_id.to_string()),
            _ => CellData::Empty,
        }
    }
}
