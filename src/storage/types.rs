use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;

static NEXT_ACCOUNT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-local handle for an account. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccountId(u64);

impl AccountId {
    fn next() -> Self {
        AccountId(NEXT_ACCOUNT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A stored identity for one authentication backend.
#[derive(Debug, Clone)]
pub struct Account {
    id: AccountId,
    account_type: String,
    pub username: String,
    /// Opaque session fields. Which keys exist depends on the account type.
    pub tokens: BTreeMap<String, String>,
    profiles: Vec<Profile>,
    active_profile: Option<String>,
    pub avatar: Option<String>,
    /// Type-specific stored fields the account carries without interpreting.
    pub extra: BTreeMap<String, Value>,
}

impl Account {
    /// Builds an empty account of the given registered type.
    pub fn new(account_type: &str) -> Self {
        Self {
            id: AccountId::next(),
            account_type: account_type.to_string(),
            username: String::new(),
            tokens: BTreeMap::new(),
            profiles: Vec::new(),
            active_profile: None,
            avatar: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    /// Storage id of the type this account belongs to.
    pub fn account_type(&self) -> &str {
        &self.account_type
    }

    pub fn token(&self, key: &str) -> Option<&str> {
        self.tokens.get(key).map(|s| s.as_str())
    }

    pub fn set_token(&mut self, key: &str, value: impl Into<String>) {
        self.tokens.insert(key.to_string(), value.into());
    }

    // -- Profiles -------------------------------------------------------------

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn profile(&self, id: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    pub fn profile_mut(&mut self, id: &str) -> Option<&mut Profile> {
        self.profiles.iter_mut().find(|p| p.id == id)
    }

    /// Adds a profile, or updates the nickname of an existing one with the same id.
    pub fn add_profile(&mut self, id: &str, nickname: &str) -> &mut Profile {
        let parent = self.id;
        let pos = match self.profiles.iter().position(|p| p.id == id) {
            Some(pos) => pos,
            None => {
                self.profiles.push(Profile {
                    id: id.to_string(),
                    nickname: String::new(),
                    legacy: false,
                    avatar: None,
                    parent,
                });
                self.profiles.len() - 1
            }
        };
        let profile = &mut self.profiles[pos];
        profile.nickname = nickname.to_string();
        profile
    }

    pub fn clear_profiles(&mut self) {
        self.profiles.clear();
        self.active_profile = None;
    }

    pub fn active_profile(&self) -> Option<&Profile> {
        let id = self.active_profile.as_deref()?;
        self.profile(id)
    }

    /// Selects the active profile. Unknown ids clear the selection.
    pub fn set_active_profile(&mut self, id: Option<&str>) {
        self.active_profile = id
            .filter(|id| self.profiles.iter().any(|p| p.id == *id))
            .map(|id| id.to_string());
    }

    // -- Presentation ---------------------------------------------------------

    /// The profile this account stands in for, if it has exactly one.
    pub fn sole_profile(&self) -> Option<&Profile> {
        match self.profiles.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    /// Name shown in views. A single-profile account is shown as its profile.
    pub fn display_name(&self) -> &str {
        match self.sole_profile() {
            Some(profile) if !profile.nickname.is_empty() => &profile.nickname,
            _ => &self.username,
        }
    }

    pub fn display_avatar(&self) -> Option<&str> {
        self.sole_profile()
            .and_then(|p| p.avatar.as_deref())
            .or(self.avatar.as_deref())
    }
}

/// A named persona belonging to an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: String,
    pub nickname: String,
    pub legacy: bool,
    pub avatar: Option<String>,
    parent: AccountId,
}

impl Profile {
    /// The owning account. Resolve through the model that holds it.
    pub fn parent(&self) -> AccountId {
        self.parent
    }
}

/// Profile layout used inside persisted account entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredProfile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub legacy: bool,
}

impl StoredProfile {
    pub fn from_profile(profile: &Profile) -> Self {
        Self {
            id: profile.id.clone(),
            name: profile.nickname.clone(),
            legacy: profile.legacy,
        }
    }
}
