use std::sync::Arc;

use serde_json::Value;

use crate::{
    client::ClientInner,
    errors::Result,
    query::{QueryOptions, query_options, run_query},
};

const RESOURCE: &str = "api/GiftDesignation";

#[derive(Clone)]
pub struct GiftDesignationsClient {
    inner: Arc<ClientInner>,
}

impl GiftDesignationsClient {
    pub(crate) fn new(inner: Arc<ClientInner>) -> Self {
        Self { inner }
    }

    /// Parameters and operators accepted by [`GiftDesignationsClient::query`].
    pub async fn query_options(&self) -> Result<Value> {
        query_options(&self.inner, RESOURCE).await
    }

    /// Returns a page of designations as `{ list, total }`.
    pub async fn query(&self, options: QueryOptions) -> Result<Value> {
        run_query(&self.inner, RESOURCE, &options).await
    }
}
