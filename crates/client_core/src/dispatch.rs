use std::sync::{Arc, RwLock};

use reqwest::{Client, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use shared::error::ErrorBody;
use tracing::debug;
use url::Url;

use crate::error::DispatchError;

/// Clones share one slot. Only the session manager writes it.
#[derive(Clone, Default)]
pub struct CredentialSlot {
    inner: Arc<RwLock<Option<String>>>,
}

impl CredentialSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<String> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub(crate) fn set(&self, credential: Option<String>) {
        match self.inner.write() {
            Ok(mut guard) => *guard = credential,
            Err(poisoned) => *poisoned.into_inner() = credential,
        }
    }
}

#[derive(Clone)]
pub struct RequestDispatcher {
    http: Client,
    base_url: Url,
    credential: CredentialSlot,
}

impl RequestDispatcher {
    pub fn new(base_url: &str, credential: CredentialSlot) -> Result<Self, DispatchError> {
        Self::with_client(Client::new(), base_url, credential)
    }

    pub fn with_client(
        http: Client,
        base_url: &str,
        credential: CredentialSlot,
    ) -> Result<Self, DispatchError> {
        let mut base_url = Url::parse(base_url.trim())?;
        // without the trailing slash `join` would drop the last path segment
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            http,
            base_url,
            credential,
        })
    }

    pub fn endpoint(&self, path: &str) -> Result<Url, DispatchError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    pub async fn get_json<T, Q>(&self, path: &str, query: &Q) -> Result<T, DispatchError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let credential = self.credential.get();
        let request = self
            .request(Method::GET, path, credential.as_deref())?
            .query(query);
        self.send_json(request).await
    }

    // verify and logout present a token the slot may not hold
    pub async fn post_json<T, B>(
        &self,
        path: &str,
        body: &B,
        credential: Option<&str>,
    ) -> Result<T, DispatchError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = self.request(Method::POST, path, credential)?.json(body);
        self.send_json(request).await
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        credential: Option<&str>,
    ) -> Result<RequestBuilder, DispatchError> {
        let url = self.endpoint(path)?;
        debug!(%method, %url, authenticated = credential.is_some(), "dispatching request");
        let builder = self.http.request(method, url);
        Ok(match credential {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, DispatchError> {
        let response = request.send().await.map_err(DispatchError::Transport)?;
        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let message = ErrorBody::from_json(&raw).and_then(ErrorBody::into_message);
            return Err(DispatchError::Status {
                status: status.as_u16(),
                message,
            });
        }
        response.json::<T>().await.map_err(DispatchError::Decode)
    }
}

#[cfg(test)]
#[path = "tests/dispatch_tests.rs"]
mod tests;
