//! Account storage for a game launcher: account types, the live account
//! model, and the `accounts.json` format.

pub mod auth;
pub mod config;
pub mod error;
pub mod model;
pub mod provider;
pub mod storage;

pub use error::StoreError;
pub use model::{AccountModel, LoadOutcome, ModelEvent};
pub use provider::{default_registry, AccountType, AccountTypeRegistry, AuthFlow};
pub use storage::{Account, AccountFile, AccountId, Profile};
