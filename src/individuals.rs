//! Contact individual (`ContactIndividual`) API client.

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
pub struct IndividualsClient {
    inner: Arc<ClientInner>,
}

impl IndividualsClient {
    pub(crate) fn new(inner: Arc<ClientInner>) -> Self {
        Self { inner }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Value> {
        let email = require_field(email, "email")?;
        let body = self
            .inner
            .execute(
                Method::GET,
                "api/ContactIndividual/Find",
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
            .execute(Method::GET, &format!("api/ContactIndividual/{id}"), None, None)
            .await?;
        Ok(from_wire(body))
    }

    pub async fn create(&self, data: impl Serialize) -> Result<Value> {
        let payload = to_wire(&data)?;
        let body = self
            .inner
            .execute(Method::POST, "api/ContactIndividual", None, Some(&payload))
            .await?;
        Ok(from_wire(body))
    }

    pub async fn update(&self, id: impl Display, data: impl Serialize) -> Result<Value> {
        let id = require_field(id, "id")?;
        let payload = to_wire(&data)?;
        let body = self
            .inner
            .execute(
                Method::PUT,
                &format!("api/ContactIndividual/{id}"),
                None,
                Some(&payload),
            )
            .await?;
        Ok(from_wire(body))
    }

    /// Deletes an individual. The API usually answers 204, giving `None`.
    pub async fn delete(&self, id: impl Display) -> Result<Option<Value>> {
        let id = require_field(id, "id")?;
        self.inner
            .execute(
                Method::DELETE,
                &format!("api/ContactIndividual/{id}"),
                None,
                None,
            )
            .await
    }
}
