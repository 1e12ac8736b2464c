use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};

use launcher_accounts::config::Settings;
use launcher_accounts::{default_registry, AccountFile, AccountId, AccountModel, AuthFlow, LoadOutcome};

fn open_model(data_dir: Option<&Path>) -> Result<(AccountModel, LoadOutcome)> {
    let settings = Settings::load()?;
    let dir = match data_dir {
        Some(dir) => dir.to_path_buf(),
        None => settings.data_dir()?,
    };

    let mut model = AccountModel::with_file(
        default_registry(),
        AccountFile::in_dir(&dir),
        settings.save_delay(),
    );
    let outcome = model.load().context("Failed to load account list")?;

    match &outcome {
        LoadOutcome::Migrated { backup } => {
            eprintln!("Converted old account list. Backup: {}", backup.display());
        }
        LoadOutcome::FormatMismatch {
            format_version,
            moved_to,
        } => {
            eprintln!(
                "Account list has unknown format version {}; moved to {} and starting empty.",
                format_version,
                moved_to.display()
            );
        }
        _ => {}
    }

    Ok((model, outcome))
}

fn prompt(label: &str) -> Result<String> {
    eprint!("{}: ", label);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Finds an account by username or display name.
fn find_account(model: &AccountModel, name: &str, account_type: Option<&str>) -> Result<AccountId> {
    let matches: Vec<AccountId> = model
        .accounts()
        .iter()
        .filter(|a| account_type.map_or(true, |t| a.account_type() == t))
        .filter(|a| a.username == name || a.display_name() == name)
        .map(|a| a.id())
        .collect();

    match matches.as_slice() {
        [] => anyhow::bail!("Account '{}' not found", name),
        [id] => Ok(*id),
        _ => anyhow::bail!("Account '{}' is ambiguous; pass --type", name),
    }
}

pub fn cmd_types(data_dir: Option<&Path>) -> Result<()> {
    let (model, _) = open_model(data_dir)?;

    for (storage_id, account_type) in model.types().iter() {
        let flow = match account_type.flow() {
            AuthFlow::OAuth2Pin => "oauth2 pin",
            AuthFlow::UsernamePassword => "username/password",
        };
        let default = model
            .get_default(storage_id)
            .map(|a| a.display_name().to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<10} {:<10} {:<18} default: {}",
            storage_id,
            account_type.text(),
            flow,
            default
        );
    }

    Ok(())
}

pub fn cmd_list(data_dir: Option<&Path>, type_filter: Option<&str>) -> Result<()> {
    let (model, _) = open_model(data_dir)?;

    if model.row_count() == 0 && model.preserved().is_empty() {
        eprintln!("No accounts configured. Run `accounts add <type>` to get started.");
        return Ok(());
    }

    if let Some(t) = type_filter {
        if !model.has_any(t) {
            eprintln!("No accounts of type '{}'.", t);
            return Ok(());
        }
    }

    for account in model.accounts() {
        if type_filter.is_some_and(|t| account.account_type() != t) {
            continue;
        }
        let marker = if model.is_default(account.id()) { " *" } else { "" };
        let profiles = account.profiles().len();
        println!(
            "{}/{}{} ({} profile{})",
            account.account_type(),
            account.display_name(),
            marker,
            profiles,
            if profiles == 1 { "" } else { "s" }
        );
    }

    if type_filter.is_none() && !model.preserved().is_empty() {
        eprintln!(
            "{} stored account(s) of unavailable types are kept but not shown.",
            model.preserved().len()
        );
    }

    Ok(())
}

pub fn cmd_add(data_dir: Option<&Path>, type_name: &str, username: Option<&str>) -> Result<()> {
    let (mut model, _) = open_model(data_dir)?;

    let account_type = model
        .account_type(type_name)
        .with_context(|| format!("Unknown account type '{}'", type_name))?;
    let mut account = model
        .registry()
        .create(type_name)
        .with_context(|| format!("Unknown account type '{}'", type_name))?;

    eprintln!("Adding {} account...", account_type.text());

    match account_type.flow() {
        AuthFlow::UsernamePassword => {
            let login = match username {
                Some(name) => name.to_string(),
                None => prompt(account_type.username_text())?,
            };
            let password = prompt(account_type.password_text())?;
            account_type.login(&mut account, &login, &password)?;
        }
        AuthFlow::OAuth2Pin => {
            let url = account_type
                .oauth2_pin_url()
                .context("Account type has no authorization URL")?;
            eprintln!("Open this URL and authorize access:\n\n  {}\n", url);
            let pin = prompt(account_type.password_text())?;
            account_type.login(&mut account, username.unwrap_or_default(), &pin)?;
        }
    }

    let name = account.display_name().to_string();
    let id = model.register_account(account);

    // First account of its type becomes the default
    if model.get_default(type_name).is_none() {
        model.set_default(id);
    }

    model.save_now()?;
    eprintln!("Account saved: {}/{}", type_name, name);
    Ok(())
}

pub fn cmd_remove(data_dir: Option<&Path>, name: &str, account_type: Option<&str>) -> Result<()> {
    let (mut model, _) = open_model(data_dir)?;
    let id = find_account(&model, name, account_type)?;

    if let Some(account) = model.account(id) {
        if let Some(ty) = model.account_type(account.account_type()) {
            if let Err(e) = ty.logout(account) {
                eprintln!("Logout failed ({:#}), removing anyway.", e);
            }
        }
    }

    let removed = model.unregister_account(id);
    model.save_now()?;
    eprintln!("Removed {}/{}.", removed.account_type(), removed.display_name());
    Ok(())
}

pub fn cmd_default(data_dir: Option<&Path>, name: &str, account_type: Option<&str>) -> Result<()> {
    let (mut model, _) = open_model(data_dir)?;
    let id = find_account(&model, name, account_type)?;

    model.set_default(id);
    model.save_now()?;

    if let Some(account) = model.account(id) {
        eprintln!(
            "Default {} account set to '{}'.",
            account.account_type(),
            account.display_name()
        );
    }
    Ok(())
}

pub fn cmd_unset_default(data_dir: Option<&Path>, account_type: &str) -> Result<()> {
    let (mut model, _) = open_model(data_dir)?;

    if model.get_default(account_type).is_none() {
        eprintln!("No default {} account set.", account_type);
        return Ok(());
    }
    model.unset_default(account_type);
    model.save_now()?;
    eprintln!("Cleared default {} account.", account_type);
    Ok(())
}

pub fn cmd_check(data_dir: Option<&Path>, name: &str, account_type: Option<&str>) -> Result<()> {
    let (mut model, _) = open_model(data_dir)?;
    let id = find_account(&model, name, account_type)?;

    let mut checked = model.account(id).cloned().context("Account vanished")?;
    let ty = model
        .account_type(checked.account_type())
        .with_context(|| format!("Unknown account type '{}'", checked.account_type()))?;

    eprintln!("Checking {}/{}...", checked.account_type(), checked.display_name());
    let valid = ty.check(&mut checked)?;

    model.update_account(id, |account| *account = checked);
    model.save_now()?;

    if valid {
        eprintln!("Session is valid.");
        Ok(())
    } else {
        anyhow::bail!("Session is no longer valid; remove and add the account again")
    }
}

pub fn cmd_status(data_dir: Option<&Path>) -> Result<()> {
    let (model, outcome) = open_model(data_dir)?;

    if let Some(file) = model.file() {
        println!("File:     {}", file.path().display());
        if file.backup_path().exists() {
            println!("Backup:   {}", file.backup_path().display());
        }
    }
    let state = match outcome {
        LoadOutcome::Detached => "in memory",
        LoadOutcome::Missing => "no file yet",
        LoadOutcome::Loaded => "loaded",
        LoadOutcome::Migrated { .. } => "migrated from legacy format",
        LoadOutcome::FormatMismatch { .. } => "unknown format, moved aside",
    };
    println!("State:    {}", state);
    println!("Accounts: {}", model.row_count());
    if !model.preserved().is_empty() {
        println!("Kept:     {} of unavailable types", model.preserved().len());
    }
    println!("Types:    {}", model.types().len());
    if let Some(latest) = model.latest() {
        println!("Latest:   {}/{}", latest.account_type(), latest.display_name());
    }

    Ok(())
}
