use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::storage::StoredProfile;

const AUTH_SERVER: &str = "https://authserver.mojang.com";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_token: String,
    pub client_token: String,
    #[serde(default)]
    pub available_profiles: Vec<StoredProfile>,
    pub selected_profile: Option<StoredProfile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    error: String,
    #[serde(default)]
    error_message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenPair<'a> {
    access_token: &'a str,
    client_token: &'a str,
}

pub fn authenticate(username: &str, password: &str, client_token: &str) -> Result<Session> {
    let body = json!({
        "agent": { "name": "Minecraft", "version": 1 },
        "username": username,
        "password": password,
        "clientToken": client_token,
        "requestUser": true,
    });
    post_for_session("authenticate", &body)
}

pub fn refresh(access_token: &str, client_token: &str) -> Result<Session> {
    let body = json!({
        "accessToken": access_token,
        "clientToken": client_token,
        "requestUser": true,
    });
    post_for_session("refresh", &body)
}

/// Returns whether the server still accepts the token pair.
pub fn validate(access_token: &str, client_token: &str) -> Result<bool> {
    let client = reqwest::blocking::Client::new();
    let resp = client
        .post(format!("{}/validate", AUTH_SERVER))
        .json(&TokenPair {
            access_token,
            client_token,
        })
        .send()
        .context("Failed to reach the Mojang auth server")?;
    Ok(resp.status().is_success())
}

pub fn invalidate(access_token: &str, client_token: &str) -> Result<()> {
    let client = reqwest::blocking::Client::new();
    let resp = client
        .post(format!("{}/invalidate", AUTH_SERVER))
        .json(&TokenPair {
            access_token,
            client_token,
        })
        .send()
        .context("Failed to reach the Mojang auth server")?;
    if !resp.status().is_success() {
        anyhow::bail!("Invalidate failed with status {}", resp.status());
    }
    Ok(())
}

fn post_for_session(endpoint: &str, body: &serde_json::Value) -> Result<Session> {
    let client = reqwest::blocking::Client::new();
    let resp = client
        .post(format!("{}/{}", AUTH_SERVER, endpoint))
        .json(body)
        .send()
        .context("Failed to reach the Mojang auth server")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let err: ErrorResponse = resp.json().unwrap_or(ErrorResponse {
            error: status.to_string(),
            error_message: String::new(),
        });
        anyhow::bail!("Mojang {} failed: {} - {}", endpoint, err.error, err.error_message);
    }

    resp.json().context("Malformed response from the Mojang auth server")
}
