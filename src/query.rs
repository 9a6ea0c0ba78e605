//! Shared query builder for the `Query` endpoints (gift designations, projects).

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    case::{from_wire, to_wire},
    client::ClientInner,
    errors::Result,
};

/// One filter of a query, e.g. `Gift Id` `Is` `102`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryCondition {
    pub parameter: String,
    pub operator: String,
    pub value: Value,
}

impl QueryCondition {
    pub fn new(
        parameter: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            parameter: parameter.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }
}

/// Paging, sorting and filtering for a `Query` endpoint.
///
/// `take` and `skip` travel in the URL; the rest forms the JSON body.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub take: Option<u32>,
    pub skip: Option<u32>,
    pub sort_by: Option<String>,
    pub descending: Option<bool>,
    pub conditions: Option<Vec<QueryCondition>>,
}

impl QueryOptions {
    pub fn with_take(mut self, take: u32) -> Self {
        self.take = Some(take);
        self
    }

    pub fn with_skip(mut self, skip: u32) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_sort_by(mut self, sort_by: impl Into<String>) -> Self {
        self.sort_by = Some(sort_by.into());
        self
    }

    pub fn with_descending(mut self, descending: bool) -> Self {
        self.descending = Some(descending);
        self
    }

    pub fn with_condition(mut self, condition: QueryCondition) -> Self {
        self.conditions.get_or_insert_with(Vec::new).push(condition);
        self
    }

    pub(crate) fn query(&self) -> Value {
        let mut query = Map::new();
        if let Some(take) = self.take {
            query.insert("take".into(), take.into());
        }
        if let Some(skip) = self.skip {
            query.insert("skip".into(), skip.into());
        }
        Value::Object(query)
    }

    /// Request body in snake_case; conditions are wrapped in a single group.
    pub(crate) fn body(&self) -> Result<Value> {
        let mut body = Map::new();
        if let Some(sort_by) = &self.sort_by {
            body.insert("sort_by".into(), sort_by.clone().into());
        }
        if let Some(descending) = self.descending {
            body.insert("descending".into(), descending.into());
        }
        if let Some(conditions) = &self.conditions {
            let conditions = serde_json::to_value(conditions)?;
            body.insert(
                "groups".into(),
                Value::Array(vec![serde_json::json!({ "conditions": conditions })]),
            );
        }
        Ok(Value::Object(body))
    }
}

/// `GET {resource}/QueryOptions`.
pub(crate) async fn query_options(inner: &ClientInner, resource: &str) -> Result<Value> {
    let body = inner
        .execute(Method::GET, &format!("{resource}/QueryOptions"), None, None)
        .await?;
    Ok(from_wire(body))
}

/// `POST {resource}/Query`.
pub(crate) async fn run_query(
    inner: &ClientInner,
    resource: &str,
    options: &QueryOptions,
) -> Result<Value> {
    let payload = to_wire(&options.body()?)?;
    let body = inner
        .execute(
            Method::POST,
            &format!("{resource}/Query"),
            Some(&options.query()),
            Some(&payload),
        )
        .await?;
    Ok(from_wire(body))
}
