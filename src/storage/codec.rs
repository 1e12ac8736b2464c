//! Versioned JSON layout of `accounts.json`.
//!
//! ```json
//! { "formatVersion": 3,
//!   "accounts": [ { "type": "mojang", ... } ],
//!   "defaults": [ { "type": "mojang", "account": 0 } ] }
//! ```
//!
//! Defaults reference accounts by their position in `accounts`, so the two
//! arrays are only meaningful together.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::provider::AccountTypeRegistry;

use super::types::{Account, AccountId};

pub const FORMAT_VERSION: i64 = 3;
/// Single-type layout used before multiple account types existed.
pub const LEGACY_FORMAT_VERSION: i64 = 2;
pub const LEGACY_ACCOUNT_TYPE: &str = "mojang";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    format_version: i64,
    accounts: Vec<Value>,
    defaults: Vec<DefaultEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DefaultEntry {
    #[serde(rename = "type")]
    account_type: String,
    account: i64,
}

/// An entry whose type is not registered. It is not loaded into the model
/// but is written back on save so its credentials survive.
#[derive(Debug, Clone, PartialEq)]
pub struct PreservedEntry {
    pub account_type: String,
    /// The entry exactly as read, including its `type` key.
    pub entry: Value,
    /// Whether the file named this entry as the default of its type.
    pub is_default: bool,
}

/// Result of decoding a stored account list.
#[derive(Debug)]
pub enum Decoded {
    Current {
        accounts: Vec<Account>,
        defaults: Vec<(String, AccountId)>,
        preserved: Vec<PreservedEntry>,
    },
    /// A version 2 file. The caller is expected to back it up and re-save.
    Legacy {
        accounts: Vec<Account>,
        defaults: Vec<(String, AccountId)>,
        latest: Option<AccountId>,
    },
    Unsupported { format_version: i64 },
}

/// Encodes `accounts` followed by the `preserved` entries.
///
/// Accounts whose type is not in `registry` are left out with a warning.
pub fn encode(
    accounts: &[Account],
    defaults: &BTreeMap<String, AccountId>,
    preserved: &[PreservedEntry],
    registry: &AccountTypeRegistry,
) -> Result<Vec<u8>, StoreError> {
    let mut entries = Vec::with_capacity(accounts.len() + preserved.len());
    let mut positions = BTreeMap::new();
    for account in accounts {
        let storage_id = account.account_type();
        let Some(account_type) = registry.lookup(storage_id) else {
            warn!(
                id = %account.id(),
                account_type = storage_id,
                "account type is not registered, leaving account out of the saved list"
            );
            continue;
        };
        let mut obj = account_type.save(account)?;
        obj.insert("type".to_string(), Value::String(storage_id.to_string()));
        positions.insert(account.id(), entries.len());
        entries.push(Value::Object(obj));
    }

    let mut stored_defaults: Vec<DefaultEntry> = defaults
        .iter()
        .filter_map(|(storage_id, id)| {
            let index = positions.get(id)?;
            Some(DefaultEntry {
                account_type: storage_id.clone(),
                account: *index as i64,
            })
        })
        .collect();

    for kept in preserved {
        if kept.is_default && !defaults.contains_key(&kept.account_type) {
            stored_defaults.push(DefaultEntry {
                account_type: kept.account_type.clone(),
                account: entries.len() as i64,
            });
        }
        entries.push(kept.entry.clone());
    }

    let envelope = Envelope {
        format_version: FORMAT_VERSION,
        accounts: entries,
        defaults: stored_defaults,
    };
    Ok(serde_json::to_vec_pretty(&envelope)?)
}

pub fn decode(bytes: &[u8], registry: &AccountTypeRegistry) -> Result<Decoded, StoreError> {
    let root: Value = serde_json::from_slice(bytes)?;
    let root = root
        .as_object()
        .ok_or_else(|| StoreError::Format("root is not an object".into()))?;

    let format_version = root
        .get("formatVersion")
        .and_then(Value::as_i64)
        .unwrap_or(0);

    match format_version {
        FORMAT_VERSION => decode_current(root, registry),
        LEGACY_FORMAT_VERSION => decode_legacy(root, registry),
        _ => Ok(Decoded::Unsupported { format_version }),
    }
}

fn account_entries<'a>(
    root: &'a serde_json::Map<String, Value>,
) -> Result<impl Iterator<Item = &'a serde_json::Map<String, Value>>, StoreError> {
    let entries = root
        .get("accounts")
        .and_then(Value::as_array)
        .ok_or_else(|| StoreError::Format("'accounts' is missing or not an array".into()))?;
    if entries.iter().any(|e| !e.is_object()) {
        return Err(StoreError::Format("'accounts' contains a non-object entry".into()));
    }
    Ok(entries.iter().filter_map(Value::as_object))
}

/// Where an entry of the stored `accounts` array ended up.
enum Slot {
    Loaded(usize),
    Preserved(usize),
}

fn decode_current(
    root: &serde_json::Map<String, Value>,
    registry: &AccountTypeRegistry,
) -> Result<Decoded, StoreError> {
    let mut accounts: Vec<Account> = Vec::new();
    let mut preserved: Vec<PreservedEntry> = Vec::new();
    let mut slots = Vec::new();
    for entry in account_entries(root)? {
        let storage_id = entry
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::Format("account entry has no 'type'".into()))?;
        let Some(account_type) = registry.lookup(storage_id) else {
            warn!(
                account_type = storage_id,
                "unable to load account of unknown type, keeping it for write-back"
            );
            slots.push(Slot::Preserved(preserved.len()));
            preserved.push(PreservedEntry {
                account_type: storage_id.to_string(),
                entry: Value::Object(entry.clone()),
                is_default: false,
            });
            continue;
        };
        let mut account = Account::new(storage_id);
        account_type.load(&mut account, FORMAT_VERSION, &Value::Object(entry.clone()))?;
        slots.push(Slot::Loaded(accounts.len()));
        accounts.push(account);
    }

    let mut defaults = Vec::new();
    let stored_defaults = match root.get("defaults") {
        Some(value) => Vec::<DefaultEntry>::deserialize(value)?,
        None => Vec::new(),
    };
    for def in stored_defaults {
        let Some(slot) = usize::try_from(def.account).ok().and_then(|i| slots.get(i)) else {
            debug!(account_type = %def.account_type, index = def.account, "default index out of range");
            continue;
        };
        let slot_type = match *slot {
            Slot::Loaded(i) => accounts[i].account_type(),
            Slot::Preserved(i) => preserved[i].account_type.as_str(),
        };
        if slot_type != def.account_type {
            warn!(
                account_type = %def.account_type,
                index = def.account,
                "default points at an account of another type, ignoring"
            );
            continue;
        }
        match *slot {
            Slot::Loaded(i) => defaults.push((def.account_type, accounts[i].id())),
            Slot::Preserved(i) => preserved[i].is_default = true,
        }
    }

    Ok(Decoded::Current {
        accounts,
        defaults,
        preserved,
    })
}

fn decode_legacy(
    root: &serde_json::Map<String, Value>,
    registry: &AccountTypeRegistry,
) -> Result<Decoded, StoreError> {
    let account_type = registry
        .lookup(LEGACY_ACCOUNT_TYPE)
        .ok_or_else(|| StoreError::MissingLegacyType(LEGACY_ACCOUNT_TYPE.to_string()))?;
    let active = root
        .get("activeAccount")
        .and_then(Value::as_str)
        .unwrap_or_default();

    let mut accounts = Vec::new();
    let mut defaults = Vec::new();
    let mut latest = None;
    for entry in account_entries(root)? {
        let mut account = Account::new(LEGACY_ACCOUNT_TYPE);
        account_type.load(&mut account, LEGACY_FORMAT_VERSION, &Value::Object(entry.clone()))?;
        if !active.is_empty() && account.username == active && latest.is_none() {
            defaults.push((LEGACY_ACCOUNT_TYPE.to_string(), account.id()));
            latest = Some(account.id());
        }
        accounts.push(account);
    }
    debug!(count = accounts.len(), "decoded legacy account list");

    Ok(Decoded::Legacy {
        accounts,
        defaults,
        latest,
    })
}
