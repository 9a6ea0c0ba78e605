//! Gift API client.

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

/// Paging and sorting for [`GiftsClient::list_for_contact`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct GiftListOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descending: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take: Option<u32>,
}

impl GiftListOptions {
    pub fn with_sort_by(mut self, sort_by: impl Into<String>) -> Self {
        self.sort_by = Some(sort_by.into());
        self
    }

    pub fn with_descending(mut self, descending: bool) -> Self {
        self.descending = Some(descending);
        self
    }

    pub fn with_skip(mut self, skip: u32) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_take(mut self, take: u32) -> Self {
        self.take = Some(take);
        self
    }
}

/// Batch of gift transactions for [`GiftsClient::import_many`].
///
/// The shared fields apply to every transaction that does not set them itself.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GiftImport {
    pub transactions: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_import: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_gift_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_gift_type: Option<String>,
}

impl GiftImport {
    pub fn new(transactions: Vec<Value>) -> Self {
        Self {
            transactions,
            ..Default::default()
        }
    }
}

#[derive(Clone)]
pub struct GiftsClient {
    inner: Arc<ClientInner>,
}

impl GiftsClient {
    pub(crate) fn new(inner: Arc<ClientInner>) -> Self {
        Self { inner }
    }

    /// Gifts of a contact, one page at a time.
    pub async fn list_for_contact(
        &self,
        contact_id: impl Display,
        options: GiftListOptions,
    ) -> Result<Value> {
        let contact_id = require_field(contact_id, "contact_id")?;
        let query = to_wire(&options)?;
        let body = self
            .inner
            .execute(
                Method::GET,
                &format!("api/Gift/ByContact/{contact_id}"),
                Some(&query),
                None,
            )
            .await?;
        Ok(from_wire(body))
    }

    pub async fn get(&self, id: impl Display) -> Result<Value> {
        let id = require_field(id, "id")?;
        let body = self
            .inner
            .execute(Method::GET, &format!("api/Gift/{id}"), None, None)
            .await?;
        Ok(from_wire(body))
    }

    /// Looks a gift up by the transaction source and the source system's id.
    pub async fn get_by_transaction(
        &self,
        transaction_source: &str,
        transaction_id: impl Display,
    ) -> Result<Value> {
        let source = require_field(transaction_source, "transaction_source")?;
        let transaction_id = require_field(transaction_id, "transaction_id")?;
        let body = self
            .inner
            .execute(
                Method::GET,
                &format!("api/Gift/{source}/{transaction_id}"),
                None,
                None,
            )
            .await?;
        Ok(from_wire(body))
    }

    pub async fn create(&self, data: impl Serialize) -> Result<Value> {
        let payload = to_wire(&data)?;
        let body = self
            .inner
            .execute(Method::POST, "api/Gift", None, Some(&payload))
            .await?;
        Ok(from_wire(body))
    }

    /// Creates several gifts in one request.
    pub async fn create_many<T: Serialize>(&self, gifts: &[T]) -> Result<Vec<Value>> {
        let payload = to_wire(gifts)?;
        let body = self
            .inner
            .execute(Method::POST, "api/Gift/Bulk", None, Some(&payload))
            .await?;
        list_from_wire(body)
    }

    pub async fn update(&self, id: impl Display, data: impl Serialize) -> Result<Value> {
        let id = require_field(id, "id")?;
        let payload = to_wire(&data)?;
        let body = self
            .inner
            .execute(Method::PUT, &format!("api/Gift/{id}"), None, Some(&payload))
            .await?;
        Ok(from_wire(body))
    }

    pub async fn delete(&self, id: impl Display) -> Result<Option<Value>> {
        let id = require_field(id, "id")?;
        self.inner
            .execute(Method::DELETE, &format!("api/Gift/{id}"), None, None)
            .await
    }

    /// Queues a single gift transaction for import.
    pub async fn import(&self, data: impl Serialize) -> Result<Option<Value>> {
        let payload = to_wire(&data)?;
        self.inner
            .execute(Method::POST, "api/v2/Gift/Transaction", None, Some(&payload))
            .await
    }

    /// Queues a batch of gift transactions for import.
    pub async fn import_many(&self, import: GiftImport) -> Result<Option<Value>> {
        let payload = to_wire(&import)?;
        self.inner
            .execute(Method::POST, "api/v2/Gift/Transactions", None, Some(&payload))
            .await
    }
}
