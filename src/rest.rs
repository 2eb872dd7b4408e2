use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::RemoteError;
use crate::remote::{Collection, Operation, Order, RemoteDataService};
use crate::session::Session;

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// HTTP client for the hosted PostgREST backend
#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: Arc<str>,
    anon_key: Arc<str>,
    session: Session,
}

impl RestClient {
    pub fn new(base_url: &str, anon_key: &str, session: Session) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: Arc::from(base_url.trim_end_matches('/')),
            anon_key: Arc::from(anon_key),
            session,
        }
    }

    fn url(&self, collection: Collection) -> String {
        collection_url(&self.base_url, collection)
    }

    /// Attach the project key and the caller's bearer token.
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self
            .session
            .current()
            .and_then(|identity| identity.access_token)
            .unwrap_or_else(|| self.anon_key.to_string());
        request
            .header("apikey", &*self.anon_key)
            .header("Authorization", format!("Bearer {}", bearer))
    }

    #[tracing::instrument(skip(self))]
    async fn get_many(&self, collection: Collection, owner: Uuid, order: Order) -> Result<Vec<Value>> {
        let response = self
            .authorize(self.client.get(self.url(collection)))
            .query(&owner_query(collection, owner, order))
            .send()
            .await
            .context("Failed to send select request")?;
        let response = check(response, "Select").await?;
        response
            .json()
            .await
            .context("Failed to parse select response")
    }

    #[tracing::instrument(skip(self))]
    async fn get_one(&self, collection: Collection, id: Uuid) -> Result<Value> {
        let response = self
            .authorize(self.client.get(self.url(collection)))
            .header("Accept", SINGLE_OBJECT)
            .query(&id_query(collection, id))
            .send()
            .await
            .context("Failed to send select request")?;
        let response = check(response, "Select").await?;
        response
            .json()
            .await
            .context("Failed to parse select response")
    }

    #[tracing::instrument(skip(self, row))]
    async fn post(&self, collection: Collection, row: &Value) -> Result<Value> {
        let response = self
            .authorize(self.client.post(self.url(collection)))
            .header("Prefer", "return=representation")
            .header("Accept", SINGLE_OBJECT)
            .query(&[("select", collection.projection())])
            .json(row)
            .send()
            .await
            .context("Failed to send insert request")?;
        let response = check(response, "Insert").await?;
        response
            .json()
            .await
            .context("Failed to parse insert response")
    }

    #[tracing::instrument(skip(self, patch))]
    async fn patch(&self, collection: Collection, id: Uuid, patch: &Value) -> Result<Value> {
        let response = self
            .authorize(self.client.patch(self.url(collection)))
            .header("Prefer", "return=representation")
            .header("Accept", SINGLE_OBJECT)
            .query(&id_query(collection, id))
            .json(patch)
            .send()
            .await
            .context("Failed to send update request")?;
        let response = check(response, "Update").await?;
        response
            .json()
            .await
            .context("Failed to parse update response")
    }

    #[tracing::instrument(skip(self))]
    async fn remove(&self, collection: Collection, id: Uuid) -> Result<()> {
        let response = self
            .authorize(self.client.delete(self.url(collection)))
            .query(&[("id", format!("eq.{}", id))])
            .send()
            .await
            .context("Failed to send delete request")?;
        check(response, "Delete").await?;
        Ok(())
    }
}

async fn check(response: Response, what: &str) -> Result<Response> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read body".to_string());
        anyhow::bail!("{} failed with status {}: {}", what, status, body);
    }
    Ok(response)
}

fn collection_url(base_url: &str, collection: Collection) -> String {
    format!("{}/rest/v1/{}", base_url, collection.table())
}

fn owner_query(collection: Collection, owner: Uuid, order: Order) -> Vec<(&'static str, String)> {
    let direction = if order.ascending { "asc" } else { "desc" };
    vec![
        ("select", collection.projection().to_string()),
        (collection.owner_column(), format!("eq.{}", owner)),
        ("order", format!("{}.{}", order.column, direction)),
    ]
}

fn id_query(collection: Collection, id: Uuid) -> Vec<(&'static str, String)> {
    vec![
        ("select", collection.projection().to_string()),
        ("id", format!("eq.{}", id)),
    ]
}

fn failure(collection: Collection, operation: Operation, err: anyhow::Error) -> RemoteError {
    RemoteError::new(collection, operation, format!("{:#}", err))
}

#[async_trait]
impl RemoteDataService for RestClient {
    async fn select_by_owner(
        &self,
        collection: Collection,
        owner: Uuid,
        order: Order,
    ) -> Result<Vec<Value>, RemoteError> {
        self.get_many(collection, owner, order)
            .await
            .map_err(|e| failure(collection, Operation::Select, e))
    }

    async fn select_by_id(&self, collection: Collection, id: Uuid) -> Result<Value, RemoteError> {
        self.get_one(collection, id)
            .await
            .map_err(|e| failure(collection, Operation::SelectById, e))
    }

    async fn insert(&self, collection: Collection, row: Value) -> Result<Value, RemoteError> {
        self.post(collection, &row)
            .await
            .map_err(|e| failure(collection, Operation::Insert, e))
    }

    async fn update(
        &self,
        collection: Collection,
        id: Uuid,
        patch: Value,
    ) -> Result<Value, RemoteError> {
        self.patch(collection, id, &patch)
            .await
            .map_err(|e| failure(collection, Operation::Update, e))
    }

    async fn delete(&self, collection: Collection, id: Uuid) -> Result<(), RemoteError> {
        self.remove(collection, id)
            .await
            .map_err(|e| failure(collection, Operation::Delete, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Identity;

    #[test]
    fn test_collection_url_has_rest_prefix() {
        assert_eq!(
            collection_url("https://demo.example.co", Collection::Reminders),
            "https://demo.example.co/rest/v1/reminders"
        );
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let client = RestClient::new("https://demo.example.co/", "anon", Session::new());
        assert_eq!(client.url(Collection::Jobs), "https://demo.example.co/rest/v1/jobs");
    }

    #[test]
    fn test_owner_query_filters_and_orders() {
        let owner = Uuid::new_v4();
        let query = owner_query(Collection::Notes, owner, Order::newest_first());
        assert_eq!(
            query,
            vec![
                ("select", "*,jobs(company,position)".to_string()),
                ("user_id", format!("eq.{}", owner)),
                ("order", "created_at.desc".to_string()),
            ]
        );
    }

    #[test]
    fn test_profile_is_filtered_by_id() {
        let owner = Uuid::new_v4();
        let query = owner_query(Collection::Profiles, owner, Order::newest_first());
        assert_eq!(query[0], ("select", "*".to_string()));
        assert_eq!(query[1], ("id", format!("eq.{}", owner)));
    }

    #[test]
    fn test_id_query() {
        let id = Uuid::new_v4();
        let query = id_query(Collection::Jobs, id);
        assert_eq!(query[1], ("id", format!("eq.{}", id)));
    }

    #[test]
    fn test_bearer_prefers_access_token() {
        let session = Session::new();
        let client = RestClient::new("https://demo.example.co", "anon-key", session.clone());

        let request = client
            .authorize(client.client.get(client.url(Collection::Jobs)))
            .build()
            .unwrap();
        assert_eq!(request.headers()["apikey"], "anon-key");
        assert_eq!(request.headers()["Authorization"], "Bearer anon-key");

        session.sign_in(Identity::new(Uuid::new_v4(), "alice@example.com").with_access_token("jwt"));
        let request = client
            .authorize(client.client.get(client.url(Collection::Jobs)))
            .build()
            .unwrap();
        assert_eq!(request.headers()["Authorization"], "Bearer jwt");
    }
}
