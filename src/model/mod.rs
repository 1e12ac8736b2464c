//! The live account list: registration, per-type defaults, latest-account
//! tracking, table presentation, and deferred persistence.

pub mod events;
pub mod presentation;
pub mod schedule;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::error::StoreError;
use crate::provider::{AccountType, AccountTypeRegistry, TypesView};
use crate::storage::codec::{self, Decoded, PreservedEntry};
use crate::storage::{Account, AccountFile, AccountId};

use events::Observers;
pub use events::{ModelEvent, Observer, SubscriptionId};
use presentation::{CellData, Column, ItemFlags, Role, COLUMN_COUNT};
use schedule::SaveSchedule;

pub const DEFAULT_SAVE_DELAY: Duration = Duration::from_millis(500);

/// What [`AccountModel::load`] found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The model has no backing file.
    Detached,
    /// No file exists yet; the model is empty.
    Missing,
    Loaded,
    /// A legacy file was converted; the original was copied to `backup`.
    Migrated { backup: PathBuf },
    /// The file had an unknown format version and was renamed to `moved_to`.
    /// The model is empty.
    FormatMismatch { format_version: i64, moved_to: PathBuf },
}

pub struct AccountModel {
    registry: AccountTypeRegistry,
    accounts: Vec<Account>,
    defaults: BTreeMap<String, AccountId>,
    latest: Option<AccountId>,
    /// Stored entries of types missing from the registry.
    preserved: Vec<PreservedEntry>,
    file: Option<AccountFile>,
    schedule: SaveSchedule,
    observers: Observers,
}

impl AccountModel {
    /// A model without a backing file. Saves only clear the dirty flag.
    pub fn new(registry: AccountTypeRegistry) -> Self {
        Self {
            registry,
            accounts: Vec::new(),
            defaults: BTreeMap::new(),
            latest: None,
            preserved: Vec::new(),
            file: None,
            schedule: SaveSchedule::new(DEFAULT_SAVE_DELAY),
            observers: Observers::default(),
        }
    }

    pub fn with_file(registry: AccountTypeRegistry, file: AccountFile, save_delay: Duration) -> Self {
        let mut model = Self::new(registry);
        model.file = Some(file);
        model.schedule.set_delay(save_delay);
        model
    }

    pub fn registry(&self) -> &AccountTypeRegistry {
        &self.registry
    }

    pub fn account_type(&self, storage_id: &str) -> Option<&dyn AccountType> {
        self.registry.lookup(storage_id)
    }

    pub fn types(&self) -> TypesView<'_> {
        self.registry.types()
    }

    pub fn file(&self) -> Option<&AccountFile> {
        self.file.as_ref()
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&ModelEvent) + 'static) -> SubscriptionId {
        self.observers.subscribe(Box::new(observer))
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    // -- Queries --------------------------------------------------------------

    pub fn row_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn column_count(&self) -> usize {
        COLUMN_COUNT
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    /// The account shown at `row`, if any.
    pub fn get_account(&self, row: usize) -> Option<&Account> {
        self.accounts.get(row)
    }

    pub fn account(&self, id: AccountId) -> Option<&Account> {
        self.accounts.iter().find(|a| a.id() == id)
    }

    pub fn row_of(&self, id: AccountId) -> Option<usize> {
        self.accounts.iter().position(|a| a.id() == id)
    }

    pub fn get_default(&self, storage_id: &str) -> Option<&Account> {
        let id = *self.defaults.get(storage_id)?;
        self.account(id)
    }

    pub fn is_default(&self, id: AccountId) -> bool {
        self.account(id)
            .map(|a| self.defaults.get(a.account_type()) == Some(&id))
            .unwrap_or(false)
    }

    pub fn accounts_for_type(&self, storage_id: &str) -> Vec<&Account> {
        self.accounts
            .iter()
            .filter(|a| a.account_type() == storage_id)
            .collect()
    }

    pub fn has_any(&self, storage_id: &str) -> bool {
        self.accounts.iter().any(|a| a.account_type() == storage_id)
    }

    /// Stored entries that were kept but not loaded because their type is
    /// not registered. They are written back on every save.
    pub fn preserved(&self) -> &[PreservedEntry] {
        &self.preserved
    }

    /// The most recently registered or changed account.
    pub fn latest(&self) -> Option<&Account> {
        self.latest.and_then(|id| self.account(id))
    }

    // -- Mutations ------------------------------------------------------------

    /// Appends an account. Accounts of a type missing from the registry are
    /// listed but never saved.
    pub fn register_account(&mut self, account: Account) -> AccountId {
        let id = account.id();
        let row = self.accounts.len();
        if self.registry.contains(account.account_type()) {
            debug!(%id, account_type = account.account_type(), "registering account");
        } else {
            warn!(
                %id,
                account_type = account.account_type(),
                "registering account of an unregistered type, it will not be saved"
            );
        }

        self.observers.emit(ModelEvent::RowsAboutToBeInserted { first: row, last: row });
        self.accounts.push(account);
        self.observers.emit(ModelEvent::RowsInserted { first: row, last: row });
        self.observers.emit(ModelEvent::ListChanged);

        self.set_latest(Some(id));
        self.schedule_save();
        id
    }

    /// Removes an account and returns it.
    ///
    /// # Panics
    ///
    /// If `id` is not registered in this model.
    pub fn unregister_account(&mut self, id: AccountId) -> Account {
        let Some(row) = self.row_of(id) else {
            panic!("account {} is not registered", id);
        };

        self.observers.emit(ModelEvent::RowsAboutToBeRemoved { first: row, last: row });
        let account = self.accounts.remove(row);
        let account_type = account.account_type().to_string();
        let was_default = self.defaults.get(&account_type) == Some(&id);
        if was_default {
            self.defaults.remove(&account_type);
        }
        self.observers.emit(ModelEvent::RowsRemoved { first: row, last: row });
        self.observers.emit(ModelEvent::ListChanged);

        if was_default {
            self.observers.emit(ModelEvent::DefaultChanged {
                account_type,
                old: Some(id),
                new: None,
            });
        }

        self.set_latest(None);
        self.schedule_save();
        account
    }

    /// Applies `change` to an account and treats it as changed: its row is
    /// refreshed, it becomes the latest account, and a save is scheduled.
    pub fn update_account<R>(&mut self, id: AccountId, change: impl FnOnce(&mut Account) -> R) -> Option<R> {
        let row = self.row_of(id)?;
        let result = change(&mut self.accounts[row]);

        self.emit_row_changed(row);
        self.set_latest(Some(id));
        self.schedule_save();
        Some(result)
    }

    /// Makes `id` the default for its type, replacing any previous default.
    pub fn set_default(&mut self, id: AccountId) {
        let Some(row) = self.row_of(id) else {
            warn!(%id, "cannot make an unregistered account the default");
            return;
        };
        let account_type = self.accounts[row].account_type().to_string();
        let old = self.defaults.get(&account_type).copied();
        if old == Some(id) {
            return;
        }

        if let Some(old_row) = old.and_then(|old| self.row_of(old)) {
            self.emit_row_changed(old_row);
        }
        self.defaults.insert(account_type.clone(), id);
        self.emit_row_changed(row);
        self.observers.emit(ModelEvent::DefaultChanged {
            account_type,
            old,
            new: Some(id),
        });

        self.set_latest(Some(id));
        self.schedule_save();
    }

    pub fn unset_default(&mut self, storage_id: &str) {
        let Some(old) = self.defaults.remove(storage_id) else {
            return;
        };
        if let Some(row) = self.row_of(old) {
            self.emit_row_changed(row);
        }
        self.observers.emit(ModelEvent::DefaultChanged {
            account_type: storage_id.to_string(),
            old: Some(old),
            new: None,
        });
        self.schedule_save();
    }

    fn emit_row_changed(&mut self, row: usize) {
        self.observers.emit(ModelEvent::RowChanged { row });
        self.observers.emit(ModelEvent::ListChanged);
    }

    fn set_latest(&mut self, latest: Option<AccountId>) {
        self.latest = latest;
        self.observers.emit(ModelEvent::LatestChanged);
    }

    // -- Presentation ---------------------------------------------------------

    pub fn data(&self, row: usize, column: Column, role: Role) -> CellData {
        let Some(account) = self.accounts.get(row) else {
            return CellData::Empty;
        };
        presentation::cell_data(
            account,
            self.registry.lookup(account.account_type()),
            self.is_default(account.id()),
            column,
            role,
        )
    }

    pub fn header_data(&self, column: Column, role: Role) -> CellData {
        presentation::header_data(column, role)
    }

    pub fn flags(&self, row: usize) -> ItemFlags {
        if row < self.accounts.len() {
            ItemFlags::ROW
        } else {
            ItemFlags::NONE
        }
    }

    /// Check-box edit: checking a row makes it the default for its type,
    /// unchecking clears that type's default.
    pub fn set_data(&mut self, row: usize, role: Role, checked: bool) -> bool {
        if role != Role::CheckState {
            return false;
        }
        let Some(account) = self.accounts.get(row) else {
            return false;
        };
        if checked {
            let id = account.id();
            self.set_default(id);
        } else {
            let account_type = account.account_type().to_string();
            self.unset_default(&account_type);
        }
        true
    }

    // -- Persistence ----------------------------------------------------------

    pub fn schedule_save(&mut self) {
        self.schedule.mark(Instant::now());
    }

    pub fn is_dirty(&self) -> bool {
        self.schedule.is_dirty()
    }

    pub fn save_delay(&self) -> Duration {
        self.schedule.delay()
    }

    /// Writes the list if the debounce deadline has passed. Returns whether it wrote.
    pub fn poll_save(&mut self) -> Result<bool, StoreError> {
        self.poll_save_at(Instant::now())
    }

    pub fn poll_save_at(&mut self, now: Instant) -> Result<bool, StoreError> {
        if !self.schedule.is_due(now) {
            return Ok(false);
        }
        self.save_now()?;
        Ok(true)
    }

    /// Encodes the current list in the current format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, StoreError> {
        codec::encode(&self.accounts, &self.defaults, &self.preserved, &self.registry)
    }

    pub fn save_now(&mut self) -> Result<(), StoreError> {
        if let Some(file) = &self.file {
            let bytes = self.to_bytes()?;
            file.write(&bytes)?;
        }
        self.schedule.clear();
        Ok(())
    }

    /// Replaces the in-memory list with the contents of the backing file.
    pub fn load(&mut self) -> Result<LoadOutcome, StoreError> {
        let Some(file) = self.file.clone() else {
            return Ok(LoadOutcome::Detached);
        };
        let Some(bytes) = file.read()? else {
            return Ok(LoadOutcome::Missing);
        };

        match codec::decode(&bytes, &self.registry)? {
            Decoded::Current {
                accounts,
                defaults,
                preserved,
            } => {
                debug!(count = accounts.len(), kept = preserved.len(), "loaded account list");
                self.reset(accounts, defaults, None);
                self.preserved = preserved;
                self.schedule.clear();
                Ok(LoadOutcome::Loaded)
            }
            Decoded::Legacy {
                accounts,
                defaults,
                latest,
            } => {
                info!(count = accounts.len(), "migrating legacy account list");
                let backup = file.backup()?;
                self.reset(accounts, defaults, latest);
                self.save_now()?;
                Ok(LoadOutcome::Migrated { backup })
            }
            Decoded::Unsupported { format_version } => {
                let target = file.aside_path();
                warn!(
                    format_version,
                    target = %target.display(),
                    "format version mismatch when loading account list, moving it aside"
                );
                let moved_to = file.move_aside()?;
                self.reset(Vec::new(), Vec::new(), None);
                self.schedule.clear();
                Ok(LoadOutcome::FormatMismatch {
                    format_version,
                    moved_to,
                })
            }
        }
    }

    fn reset(&mut self, accounts: Vec<Account>, defaults: Vec<(String, AccountId)>, latest: Option<AccountId>) {
        self.observers.emit(ModelEvent::ModelAboutToBeReset);
        self.accounts = accounts;
        self.preserved.clear();
        self.defaults = defaults.into_iter().collect();
        self.observers.emit(ModelEvent::ModelReset);
        self.observers.emit(ModelEvent::ListChanged);
        self.set_latest(latest);
    }
}

impl Drop for AccountModel {
    fn drop(&mut self) {
        if !self.schedule.is_dirty() {
            return;
        }
        if let Err(e) = self.save_now() {
            error!("failed to save account list: {}", e);
        }
    }
}
