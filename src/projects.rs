use std::sync::Arc;

use serde_json::Value;

use crate::{
    client::ClientInner,
    errors::Result,
    query::{QueryOptions, query_options, run_query},
};

const RESOURCE: &str = "api/Project";

#[derive(Clone)]
pub struct ProjectsClient {
    inner: Arc<ClientInner>,
}

impl ProjectsClient {
    pub(crate) fn new(inner: Arc<ClientInner>) -> Self {
        Self { inner }
    }

    pub async fn query_options(&self) -> Result<Value> {
        query_options(&self.inner, RESOURCE).await
    }

    pub async fn query(&self, options: QueryOptions) -> Result<Value> {
        run_query(&self.inner, RESOURCE, &options).await
    }
}
