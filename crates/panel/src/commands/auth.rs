// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `login` and `logout`.

use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::error::{Error, Result};

pub fn login(config: &Config, store: &dyn CredentialStore, token: &str) -> Result<()> {
    let token = token.trim();
    if token.is_empty() {
        return Err(Error::Config("access token must not be empty".to_string()));
    }
    let key = config.environment.credential_key();
    store.store(key, token)?;
    println!("Stored access token ({})", key);
    Ok(())
}

pub fn logout(config: &Config, store: &dyn CredentialStore) -> Result<()> {
    let key = config.environment.credential_key();
    if store.load(key)?.is_none() {
        println!("No access token stored ({})", key);
        return Ok(());
    }
    store.remove(key)?;
    println!("Removed access token ({})", key);
    Ok(())
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
