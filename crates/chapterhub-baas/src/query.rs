use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{BaasError, Database, Result, check_status, read_json};

const RETURN_REPRESENTATION: &str = "return=representation";

/// PostgREST-style query against one table.
///
/// Filters become query parameters (`column=eq.value`); they scope reads as
/// well as updates and deletes.
pub struct Query<'a> {
    db: &'a Database,
    table: String,
    select: String,
    filters: Vec<(String, String)>,
    order: Option<String>,
    limit: Option<usize>,
}

impl<'a> Query<'a> {
    pub(crate) fn new(db: &'a Database, table: &str) -> Self {
        Self {
            db,
            table: table.to_string(),
            select: "*".to_string(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.select = columns.to_string();
        self
    }

    pub fn eq(self, column: &str, value: impl ToString) -> Self {
        self.filter(column, format!("eq.{}", value.to_string()))
    }

    pub fn gte(self, column: &str, value: impl ToString) -> Self {
        self.filter(column, format!("gte.{}", value.to_string()))
    }

    pub fn is_null(self, column: &str) -> Self {
        self.filter(column, "is.null".to_string())
    }

    pub fn in_list<V: ToString>(self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        let joined = values
            .into_iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.filter(column, format!("in.({joined})"))
    }

    /// Raw disjunction, e.g. `recipient_id.eq.<id>,recipient_id.is.null`.
    pub fn or(self, expr: &str) -> Self {
        self.filter("or", format!("({expr})"))
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let dir = if ascending { "asc" } else { "desc" };
        self.order = Some(match self.order.take() {
            Some(prev) => format!("{prev},{column}.{dir}"),
            None => format!("{column}.{dir}"),
        });
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    fn filter(mut self, column: &str, expr: String) -> Self {
        self.filters.push((column.to_string(), expr));
        self
    }

    fn url(&self) -> String {
        format!("{}/rest/v1/{}", self.db.base_url(), self.table)
    }

    pub(crate) fn params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), self.select.clone())];
        params.extend(self.filters.iter().cloned());
        if let Some(order) = &self.order {
            params.push(("order".to_string(), order.clone()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }

    pub async fn fetch<T: DeserializeOwned>(self) -> Result<Vec<T>> {
        debug!(table = %self.table, filters = ?self.filters, "select");
        let resp = self
            .db
            .request(Method::GET, &self.url())
            .query(&self.params())
            .send()
            .await?;
        read_json(resp).await
    }

    /// First matching row, or [`BaasError::NotFound`].
    pub async fn single<T: DeserializeOwned>(self) -> Result<T> {
        self.maybe_single().await?.ok_or(BaasError::NotFound)
    }

    pub async fn maybe_single<T: DeserializeOwned>(self) -> Result<Option<T>> {
        let rows: Vec<T> = self.limit(1).fetch().await?;
        Ok(rows.into_iter().next())
    }

    /// Insert one row and return it as stored.
    pub async fn insert<B, T>(self, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(table = %self.table, "insert");
        let resp = self
            .db
            .request(Method::POST, &self.url())
            .query(&[("select", self.select.as_str())])
            .header("Prefer", RETURN_REPRESENTATION)
            .json(body)
            .send()
            .await?;
        let rows: Vec<T> = read_json(resp).await?;
        rows.into_iter().next().ok_or(BaasError::NotFound)
    }

    /// Insert, or merge into the row that collides on `on_conflict`.
    pub async fn upsert<B, T>(self, body: &B, on_conflict: &str) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(table = %self.table, on_conflict, "upsert");
        let resp = self
            .db
            .request(Method::POST, &self.url())
            .query(&[("select", self.select.as_str()), ("on_conflict", on_conflict)])
            .header(
                "Prefer",
                format!("{RETURN_REPRESENTATION},resolution=merge-duplicates"),
            )
            .json(body)
            .send()
            .await?;
        let rows: Vec<T> = read_json(resp).await?;
        rows.into_iter().next().ok_or(BaasError::NotFound)
    }

    /// Patch every row matching the filters; returns the updated rows.
    pub async fn update<B, T>(self, body: &B) -> Result<Vec<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        if self.filters.is_empty() {
            return Err(BaasError::Unfiltered("update", self.table));
        }
        debug!(table = %self.table, filters = ?self.filters, "update");
        let resp = self
            .db
            .request(Method::PATCH, &self.url())
            .query(&self.params())
            .header("Prefer", RETURN_REPRESENTATION)
            .json(body)
            .send()
            .await?;
        read_json(resp).await
    }

    /// Delete every row matching the filters; returns the deleted rows.
    pub async fn delete<T: DeserializeOwned>(self) -> Result<Vec<T>> {
        if self.filters.is_empty() {
            return Err(BaasError::Unfiltered("delete", self.table));
        }
        debug!(table = %self.table, filters = ?self.filters, "delete");
        let resp = self
            .db
            .request(Method::DELETE, &self.url())
            .query(&self.params())
            .header("Prefer", RETURN_REPRESENTATION)
            .send()
            .await?;
        read_json(resp).await
    }

    /// Delete without reading rows back.
    pub async fn delete_quiet(self) -> Result<()> {
        if self.filters.is_empty() {
            return Err(BaasError::Unfiltered("delete", self.table));
        }
        let resp = self
            .db
            .request(Method::DELETE, &self.url())
            .query(&self.filters)
            .send()
            .await?;
        check_status(resp).await
    }
}
