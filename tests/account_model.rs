use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use launcher_accounts::provider::imgur::ImgurAccountType;
use launcher_accounts::provider::mojang::{MojangAccountType, ACCESS_TOKEN, CLIENT_TOKEN};
use launcher_accounts::{
    AccountFile, AccountModel, AccountType, AccountTypeRegistry, AuthFlow, LoadOutcome, StoreError,
};
use tempfile::TempDir;

struct AsdfAccountType;

impl AccountType for AsdfAccountType {
    fn text(&self) -> &str {
        "Asdf"
    }
    fn icon(&self) -> &str {
        "icon:asdf"
    }
    fn username_text(&self) -> &str {
        "Name"
    }
    fn password_text(&self) -> &str {
        "Secret"
    }
    fn flow(&self) -> AuthFlow {
        AuthFlow::UsernamePassword
    }
}

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data").join(name)
}

fn registry() -> AccountTypeRegistry {
    let mut registry = AccountTypeRegistry::new();
    registry.register("mojang", MojangAccountType);
    registry.register("asdf", AsdfAccountType);
    registry
}

fn model_in(dir: &Path) -> AccountModel {
    AccountModel::with_file(registry(), AccountFile::in_dir(dir), Duration::from_secs(3600))
}

fn check_model(model: &AccountModel) {
    assert_eq!(model.row_count(), 2);
    assert!(model.has_any("mojang"));
    let mojang = model.accounts_for_type("mojang");
    assert_eq!(mojang.len(), 2);

    let first = mojang[0];
    assert_eq!(first.username, "arthur.philip@dent.co.uk");
    assert_eq!(first.token(CLIENT_TOKEN), Some("f11bc5a96e8428cae87df606c6ed05cb"));
    assert_eq!(first.token(ACCESS_TOKEN), Some("214c57e4fe0b58253e3409cdd5e63053"));
    assert_eq!(first.profiles().len(), 1);
    assert_eq!(first.profiles()[0].id, "d716718a0ede7865c8a4a00e9cb1b6f5");
    assert!(!first.profiles()[0].legacy);
    assert_eq!(first.profiles()[0].nickname, "IWantTea");

    let second = mojang[1];
    assert_eq!(second.username, "zaphod.beeblebrox@galaxy.gov");
    assert_eq!(second.token(CLIENT_TOKEN), Some("d03a2bcf2d1cc467042c7b2680ba947d"));
    assert_eq!(second.token(ACCESS_TOKEN), Some("204fe2edcee69f8c207c392e6cc25c9c"));
    assert_eq!(second.profiles().len(), 1);
    assert_eq!(second.profiles()[0].id, "40db0352edab1d1afb8443a34680ef10");
    assert_eq!(second.profiles()[0].nickname, "IAmTheBest");

    assert!(model.is_default(first.id()));
    assert!(!model.is_default(second.id()));
}

fn format_round_trip(original: &str, backup_expected: bool) {
    let dir = TempDir::new().unwrap();
    let file = AccountFile::in_dir(dir.path());
    fs::copy(fixture(original), file.path()).unwrap();

    let mut model = model_in(dir.path());
    let outcome = model.load().unwrap();
    check_model(&model);
    model.save_now().unwrap();

    if backup_expected {
        assert!(matches!(outcome, LoadOutcome::Migrated { .. }));
        let saved: serde_json::Value = serde_json::from_slice(&fs::read(file.path()).unwrap()).unwrap();
        assert_eq!(saved["accounts"][0]["user"]["id"], "a8b0c2d1e6f34a9b8c7d6e5f4a3b2c1d");
        assert_eq!(
            fs::read(file.backup_path()).unwrap(),
            fs::read(fixture(original)).unwrap()
        );
    } else {
        assert_eq!(outcome, LoadOutcome::Loaded);
        assert!(!file.backup_path().exists());
    }
    drop(model);

    let saved: serde_json::Value = serde_json::from_slice(&fs::read(file.path()).unwrap()).unwrap();
    assert_eq!(saved["formatVersion"], 3);

    let mut reloaded = model_in(dir.path());
    assert_eq!(reloaded.load().unwrap(), LoadOutcome::Loaded);
    check_model(&reloaded);
}

#[test]
fn migrate_v2_to_v3() {
    format_round_trip("accounts_v2.json", true);
}

#[test]
fn round_trip_v3() {
    format_round_trip("accounts_v3.json", false);
}

#[test]
fn migrated_model_marks_active_account_latest() {
    let dir = TempDir::new().unwrap();
    fs::copy(fixture("accounts_v2.json"), dir.path().join("accounts.json")).unwrap();

    let mut model = model_in(dir.path());
    model.load().unwrap();
    assert_eq!(
        model.latest().map(|a| a.username.as_str()),
        Some("arthur.philip@dent.co.uk")
    );
    assert!(!model.is_dirty());
}

#[test]
fn unknown_types_survive_a_save() {
    let dir = TempDir::new().unwrap();
    let file = AccountFile::in_dir(dir.path());
    let ford = serde_json::json!({
        "type": "imgur",
        "username": "ford",
        "accessToken": "towel",
        "refreshToken": "42"
    });
    let doc = serde_json::json!({
        "formatVersion": 3,
        "accounts": [ford.clone(), { "type": "mojang", "username": "arthur.philip@dent.co.uk" }],
        "defaults": [{ "type": "imgur", "account": 0 }]
    });
    fs::write(file.path(), doc.to_string()).unwrap();

    let mut model = model_in(dir.path());
    model.load().unwrap();
    assert_eq!(model.row_count(), 1);
    assert_eq!(model.preserved().len(), 1);
    let arthur = model.get_account(0).unwrap().id();
    model.set_default(arthur);
    model.save_now().unwrap();
    drop(model);

    let saved: serde_json::Value = serde_json::from_slice(&fs::read(file.path()).unwrap()).unwrap();
    let accounts = saved["accounts"].as_array().unwrap();
    assert_eq!(accounts.len(), 2);
    assert!(accounts.contains(&ford));

    let mut registry = registry();
    registry.register("imgur", ImgurAccountType::new("client", "secret"));
    let mut model = AccountModel::with_file(registry, AccountFile::in_dir(dir.path()), Duration::from_secs(3600));
    model.load().unwrap();
    assert_eq!(model.row_count(), 2);
    assert_eq!(model.get_default("imgur").unwrap().username, "ford");
    assert_eq!(model.get_default("mojang").unwrap().username, "arthur.philip@dent.co.uk");
    assert!(model.preserved().is_empty());
}

#[test]
fn unknown_types_are_skipped_on_load() {
    let dir = TempDir::new().unwrap();
    let doc = serde_json::json!({
        "formatVersion": 3,
        "accounts": [
            { "type": "mojang", "username": "arthur.philip@dent.co.uk" },
            { "type": "from-the-future", "token": "x" },
            { "type": "asdf", "username": "someone" }
        ],
        "defaults": []
    });
    fs::write(dir.path().join("accounts.json"), doc.to_string()).unwrap();

    let mut model = model_in(dir.path());
    assert_eq!(model.load().unwrap(), LoadOutcome::Loaded);
    assert_eq!(model.row_count(), 2);
    assert_eq!(model.get_account(1).unwrap().username, "someone");
}

#[test]
fn unknown_format_is_moved_aside() {
    let dir = TempDir::new().unwrap();
    let file = AccountFile::in_dir(dir.path());
    fs::write(file.path(), r#"{ "formatVersion": 9, "accounts": [] }"#).unwrap();

    let mut model = model_in(dir.path());
    let outcome = model.load().unwrap();
    assert_eq!(
        outcome,
        LoadOutcome::FormatMismatch {
            format_version: 9,
            moved_to: file.aside_path(),
        }
    );
    assert_eq!(model.row_count(), 0);
    assert!(!file.path().exists());
    assert_eq!(
        fs::read_to_string(file.aside_path()).unwrap(),
        r#"{ "formatVersion": 9, "accounts": [] }"#
    );
}

#[test]
fn earlier_moved_aside_file_is_not_replaced() {
    let dir = TempDir::new().unwrap();
    let file = AccountFile::in_dir(dir.path());
    fs::write(file.aside_path(), "earlier credentials").unwrap();
    fs::write(file.path(), r#"{ "formatVersion": 9, "accounts": [] }"#).unwrap();

    let mut model = model_in(dir.path());
    let err = model.load().unwrap_err();
    assert!(matches!(err, StoreError::MoveAside { .. }));
    assert_eq!(fs::read_to_string(file.aside_path()).unwrap(), "earlier credentials");
    assert!(file.path().exists());
}

#[cfg(unix)]
#[test]
fn failed_move_aside_is_an_error() {
    let dir = TempDir::new().unwrap();
    let file = AccountFile::in_dir(dir.path());
    fs::write(file.path(), r#"{ "formatVersion": 1 }"#).unwrap();
    fs::create_dir(file.aside_path()).unwrap();
    fs::write(file.aside_path().join("occupied"), "x").unwrap();

    let mut model = model_in(dir.path());
    let err = model.load().unwrap_err();
    assert!(matches!(err, StoreError::MoveAside { .. }));
    assert!(file.path().exists());
}

#[test]
fn missing_file_is_an_empty_model() {
    let dir = TempDir::new().unwrap();
    let mut model = model_in(dir.path());
    assert_eq!(model.load().unwrap(), LoadOutcome::Missing);
    assert_eq!(model.row_count(), 0);
}

#[test]
fn pending_save_is_flushed_on_drop() {
    let dir = TempDir::new().unwrap();
    let file = AccountFile::in_dir(dir.path());
    {
        let mut model = model_in(dir.path());
        let mut account = model.registry().create("asdf").unwrap();
        account.username = "someone".to_string();
        account.set_token("session", "abc");
        model.register_account(account);

        assert!(!model.poll_save().unwrap());
        assert!(!file.path().exists());
    }

    let mut model = model_in(dir.path());
    model.load().unwrap();
    let account = model.get_account(0).unwrap();
    assert_eq!(account.username, "someone");
    assert_eq!(account.token("session"), Some("abc"));
}

#[test]
fn defaults_of_several_types_survive_reload() {
    let dir = TempDir::new().unwrap();
    let registry_with_imgur = || {
        let mut registry = registry();
        registry.register("imgur", ImgurAccountType::new("client", "secret"));
        registry
    };
    {
        let mut model = AccountModel::with_file(
            registry_with_imgur(),
            AccountFile::in_dir(dir.path()),
            Duration::ZERO,
        );
        for (ty, name) in [("mojang", "m1"), ("imgur", "i1"), ("mojang", "m2"), ("asdf", "a1")] {
            let mut account = model.registry().create(ty).unwrap();
            account.username = name.to_string();
            model.register_account(account);
        }
        let m2 = model.get_account(2).unwrap().id();
        let i1 = model.get_account(1).unwrap().id();
        model.set_default(m2);
        model.set_default(i1);
        assert!(model.poll_save().unwrap());
    }

    let mut model = AccountModel::with_file(
        registry_with_imgur(),
        AccountFile::in_dir(dir.path()),
        Duration::ZERO,
    );
    model.load().unwrap();
    assert_eq!(model.get_default("mojang").unwrap().username, "m2");
    assert_eq!(model.get_default("imgur").unwrap().username, "i1");
    assert!(model.get_default("asdf").is_none());

    // Without the imgur type its entry is kept aside and the mojang default
    // still resolves against the stored positions
    drop(model);
    let mut model = model_in(dir.path());
    model.load().unwrap();
    assert_eq!(model.row_count(), 3);
    assert!(model.get_default("imgur").is_none());
    assert_eq!(model.get_default("mojang").unwrap().username, "m2");
    model.schedule_save();
    model.save_now().unwrap();
    drop(model);

    let mut model = AccountModel::with_file(
        registry_with_imgur(),
        AccountFile::in_dir(dir.path()),
        Duration::ZERO,
    );
    model.load().unwrap();
    assert_eq!(model.row_count(), 4);
    assert_eq!(model.get_default("imgur").unwrap().username, "i1");
    assert_eq!(model.get_default("mojang").unwrap().username, "m2");
}
