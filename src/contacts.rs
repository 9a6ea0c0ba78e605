//! Contact API client.

use std::{fmt::Display, sync::Arc};

use reqwest::Method;
use serde::Serialize;
use serde_json::{Value, json};

use crate::{
    case::{from_wire, to_wire},
    client::ClientInner,
    core::require_field,
    errors::Result,
};

#[derive(Clone)]
pub struct ContactsClient {
    inner: Arc<ClientInner>,
}

impl ContactsClient {
    pub(crate) fn new(inner: Arc<ClientInner>) -> Self {
        Self { inner }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Value> {
        let email = require_field(email, "email")?;
        let body = self
            .inner
            .execute(
                Method::GET,
                "api/Contact/Find",
                Some(&json!({ "email": email })),
                None,
            )
            .await?;
        Ok(from_wire(body))
    }

    pub async fn get(&self, id: impl Display) -> Result<Value> {
        let id = require_field(id, "id")?;
        let body = self
            .inner
            .execute(Method::GET, &format!("api/Contact/{id}"), None, None)
            .await?;
        Ok(from_wire(body))
    }

    /// Queues a contact transaction for import. The response is returned as sent
    /// by the API.
    pub async fn import(&self, data: impl Serialize) -> Result<Option<Value>> {
        let payload = to_wire(&data)?;
        self.inner
            .execute(Method::POST, "api/Contact/Transaction", None, Some(&payload))
            .await
    }

    pub async fn create(&self, data: impl Serialize) -> Result<Value> {
        let payload = to_wire(&data)?;
        let body = self
            .inner
            .execute(Method::POST, "api/Contact", None, Some(&payload))
            .await?;
        Ok(from_wire(body))
    }

    pub async fn update(&self, id: impl Display, data: impl Serialize) -> Result<Value> {
        let id = require_field(id, "id")?;
        let payload = to_wire(&data)?;
        let body = self
            .inner
            .execute(Method::PUT, &format!("api/Contact/{id}"), None, Some(&payload))
            .await?;
        Ok(from_wire(body))
    }
}
