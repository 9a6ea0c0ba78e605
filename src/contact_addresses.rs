use std::{fmt::Display, sync::Arc};

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use crate::{
    case::{from_wire, list_from_wire, to_wire},
    client::ClientInner,
    core::require_field,
    errors::Result,
};

#[derive(Clone)]
pub struct ContactAddressesClient {
    inner: Arc<ClientInner>,
}

impl ContactAddressesClient {
    pub(crate) fn new(inner: Arc<ClientInner>) -> Self {
        Self { inner }
    }

    /// All addresses of a contact.
    pub async fn list_for_contact(&self, contact_id: impl Display) -> Result<Vec<Value>> {
        let contact_id = require_field(contact_id, "contact_id")?;
        let body = self
            .inner
            .execute(
                Method::GET,
                &format!("api/ContactAddress/ByContact/{contact_id}"),
                None,
                None,
            )
            .await?;
        list_from_wire(body)
    }

    pub async fn create(&self, data: impl Serialize) -> Result<Value> {
        let payload = to_wire(&data)?;
        let body = self
            .inner
            .execute(Method::POST, "api/ContactAddress", None, Some(&payload))
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
                &format!("api/ContactAddress/{id}"),
                None,
                Some(&payload),
            )
            .await?;
        Ok(from_wire(body))
    }
}
