use std::{fmt::Display, sync::Arc};

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use crate::{
    case::{from_wire, to_wire},
    client::ClientInner,
    core::require_field,
    errors::Result,
};

#[derive(Clone)]
pub struct RecurringGiftsClient {
    inner: Arc<ClientInner>,
}

impl RecurringGiftsClient {
    pub(crate) fn new(inner: Arc<ClientInner>) -> Self {
        Self { inner }
    }

    pub async fn get(&self, id: impl Display) -> Result<Value> {
        let id = require_field(id, "id")?;
        let body = self
            .inner
            .execute(Method::GET, &format!("api/RecurringGift/{id}"), None, None)
            .await?;
        Ok(from_wire(body))
    }

    pub async fn create(&self, data: impl Serialize) -> Result<Value> {
        let payload = to_wire(&data)?;
        let body = self
            .inner
            .execute(Method::POST, "api/RecurringGift", None, Some(&payload))
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
                &format!("api/RecurringGift/{id}"),
                None,
                Some(&payload),
            )
            .await?;
        Ok(from_wire(body))
    }
}
