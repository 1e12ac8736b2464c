pub mod codec;
mod store;
mod types;

pub use store::{AccountFile, ACCOUNTS_FILE};
pub use types::{Account, AccountId, Profile, StoredProfile};
