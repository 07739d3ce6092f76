// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot REST access to the backend.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use gp_core::EntityState;
use tracing::debug;

use crate::config::states_url;
use crate::connection::TransportError;
use crate::credentials::Credentials;
use crate::error::Result;

const HTTP_TIMEOUT_SECS: u64 = 10;

pub type StatesFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<EntityState>>> + Send + 'a>>;

/// Source of the full entity collection.
pub trait StatesSource: Send + Sync {
    fn fetch_states(&self) -> StatesFuture<'_>;
}

/// Bearer-authenticated client for `GET /api/states`.
pub struct RestClient {
    client: reqwest::Client,
    states_url: String,
    token: String,
}

impl RestClient {
    pub fn new(credentials: &Credentials) -> Result<Self> {
        Ok(RestClient {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
                .build()?,
            states_url: states_url(&credentials.base_url),
            token: credentials.token.clone(),
        })
    }

    async fn get_states(&self) -> Result<Vec<EntityState>> {
        let response = self
            .client
            .get(&self.states_url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Http {
                status: status.as_u16(),
            }
            .into());
        }

        let states: Vec<EntityState> = response.json().await?;
        debug!(count = states.len(), "fetched entity states");
        Ok(states)
    }
}

impl StatesSource for RestClient {
    fn fetch_states(&self) -> StatesFuture<'_> {
        Box::pin(self.get_states())
    }
}

#[cfg(test)]
#[path = "rest_tests.rs"]
mod tests;
