//! HTTP-backed [`AccountStore`] speaking to a stash-server instance.
//!
//! Available behind the `http` feature. The wire shape mirrors the server's
//! account routes: `GET /account/{user_id}` and `PUT /account/{user_id}`.

use crate::account::{AccountStore, RemoteRecord};
use crate::error::{Error, Result};
use crate::snapshot::{CookieSnapshot, LocalSnapshot};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Account store client for the stash-server REST API.
#[derive(Debug, Clone)]
pub struct HttpAccountStore {
    client: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl HttpAccountStore {
    /// Create a client for the server at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            bearer_token: None,
        }
    }

    /// Attach a bearer token to every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    fn account_url(&self, user_id: &str) -> String {
        format!("{}/account/{}", self.base_url.trim_end_matches('/'), user_id)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpsertBody<'a> {
    local_storage: &'a LocalSnapshot,
    cookies: &'a CookieSnapshot,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountBody {
    user_id: String,
    local_storage: LocalSnapshot,
    cookies: CookieSnapshot,
}

#[async_trait]
impl AccountStore for HttpAccountStore {
    async fn push(
        &self,
        user_id: &str,
        local: &LocalSnapshot,
        cookies: &CookieSnapshot,
    ) -> Result<()> {
        let request = self
            .client
            .put(self.account_url(user_id))
            .json(&UpsertBody {
                local_storage: local,
                cookies,
            });

        self.authorize(request)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| Error::AccountStore(err.to_string()))?;

        Ok(())
    }

    async fn pull(&self, user_id: &str) -> Result<Option<RemoteRecord>> {
        let request = self.client.get(self.account_url(user_id));
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|err| Error::AccountStore(err.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body: AccountBody = response
            .error_for_status()
            .map_err(|err| Error::AccountStore(err.to_string()))?
            .json()
            .await
            .map_err(|err| Error::AccountStore(err.to_string()))?;

        Ok(Some(RemoteRecord {
            user_id: body.user_id,
            local_storage: body.local_storage,
            cookies: body.cookies,
        }))
    }
}
