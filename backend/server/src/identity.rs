//! # Identity Store
//!
//! Managed authentication service holding per-user existence and
//! enabled/disabled state. We only ever issue commands against it, the user
//! record itself is owned by the service.
//!
//! ## Protocol
//!
//! Identity Toolkit admin REST API, authenticated with a bearer token.
//!
//! - Disable/enable: `POST /v1/projects/{project}/accounts:update` with `{ localId, disableUser }`
//! - Delete: `POST /v1/projects/{project}/accounts:delete` with `{ localId }`
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::{error::StoreError, utils::endpoint};

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn disable(&self, user_id: &str) -> Result<(), StoreError>;

    async fn enable(&self, user_id: &str) -> Result<(), StoreError>;

    async fn delete(&self, user_id: &str) -> Result<(), StoreError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateAccount<'a> {
    local_id: &'a str,
    disable_user: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteAccount<'a> {
    local_id: &'a str,
}

pub struct HttpIdentityStore {
    client: Client,
    base_url: String,
    project_id: String,
    access_token: String,
}

impl HttpIdentityStore {
    pub fn new(client: Client, base_url: &str, project_id: &str, access_token: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            project_id: project_id.to_string(),
            access_token: access_token.to_string(),
        }
    }

    async fn call<T: Serialize + Sync>(&self, action: &str, body: &T) -> Result<(), StoreError> {
        let url = endpoint(
            &self.base_url,
            &["v1", "projects", &self.project_id, &format!("accounts:{action}")],
        )?;

        debug!(%url, "Identity store request");

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await?;

        StoreError::check(response).await?;

        Ok(())
    }

    async fn set_disabled(&self, user_id: &str, disabled: bool) -> Result<(), StoreError> {
        self.call(
            "update",
            &UpdateAccount {
                local_id: user_id,
                disable_user: disabled,
            },
        )
        .await
    }
}

#[async_trait]
impl IdentityStore for HttpIdentityStore {
    async fn disable(&self, user_id: &str) -> Result<(), StoreError> {
        self.set_disabled(user_id, true).await
    }

    async fn enable(&self, user_id: &str) -> Result<(), StoreError> {
        self.set_disabled(user_id, false).await
    }

    async fn delete(&self, user_id: &str) -> Result<(), StoreError> {
        self.call("delete", &DeleteAccount { local_id: user_id }).await
    }
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};
    use serde_json::json;

    use super::*;

    fn store(server: &Server) -> HttpIdentityStore {
        HttpIdentityStore::new(Client::new(), &server.url(), "coach-test", "secret-token")
    }

    #[tokio::test]
    async fn test_disable_sends_update() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/projects/coach-test/accounts:update")
            .match_header("authorization", "Bearer secret-token")
            .match_body(Matcher::Json(json!({ "localId": "u-1", "disableUser": true })))
            .with_status(200)
            .with_body(r#"{"localId":"u-1"}"#)
            .create_async()
            .await;

        store(&server).disable("u-1").await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_enable_clears_disabled() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/projects/coach-test/accounts:update")
            .match_body(Matcher::Json(json!({ "localId": "u-1", "disableUser": false })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        store(&server).enable("u-1").await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/projects/coach-test/accounts:delete")
            .match_body(Matcher::Json(json!({ "localId": "u-1" })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        store(&server).delete("u-1").await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upstream_message_surfaces() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/projects/coach-test/accounts:delete")
            .with_status(400)
            .with_body(r#"{"error":{"code":400,"message":"USER_NOT_FOUND"}}"#)
            .create_async()
            .await;

        let err = store(&server).delete("ghost").await.unwrap_err();

        assert!(matches!(err, StoreError::Upstream { status: 400, .. }));
        assert_eq!(err.to_string(), "USER_NOT_FOUND");
    }
}
