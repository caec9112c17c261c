//! # Document Store
//!
//! Managed per-collection document database holding the application-level
//! user documents.
//!
//! ## Protocol
//!
//! Firestore REST v1, authenticated with a bearer token. Documents live at
//! `/v1/projects/{project}/databases/(default)/documents/{collection}/{id}`.
//!
//! - `get`: `GET`, a 404 means the document does not exist
//! - `update`: `PATCH` with one `updateMask.fieldPaths` per touched field and
//!   `currentDocument.exists=true`, so updating a missing document fails like
//!   an admin SDK `update` would. A masked field left out of the body is removed.
//! - `delete`: `DELETE`, succeeds whether or not the document existed
//!
//! ## Values
//!
//! Every field is wrapped in a typed value object such as
//! `{ "stringValue": "active" }`. Updates only ever write strings and
//! timestamps. Reads hand the fields back still wrapped.
use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{error::StoreError, utils::endpoint};

pub const DEFAULT_DATABASE: &str = "(default)";

/// Field changes for a partial update, keyed by top-level field name.
pub type Fields = BTreeMap<String, FieldValue>;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Timestamp(DateTime<Utc>),
    /// Drop the field from the document.
    Remove,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    /// Raw field values as the store returned them.
    pub fields: Map<String, Value>,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;
}

/// Only the value types `update` writes.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum TypedValue {
    StringValue(String),
    TimestampValue(String),
}

impl TypedValue {
    fn encode(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Text(s) => Some(TypedValue::StringValue(s.clone())),
            FieldValue::Timestamp(ts) => Some(TypedValue::TimestampValue(
                ts.to_rfc3339_opts(SecondsFormat::Millis, true),
            )),
            FieldValue::Remove => None,
        }
    }
}

#[derive(Deserialize)]
struct RawDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Serialize)]
struct PatchBody {
    fields: BTreeMap<String, TypedValue>,
}

pub struct HttpDocumentStore {
    client: Client,
    base_url: String,
    project_id: String,
    access_token: String,
}

impl HttpDocumentStore {
    pub fn new(client: Client, base_url: &str, project_id: &str, access_token: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            project_id: project_id.to_string(),
            access_token: access_token.to_string(),
        }
    }

    fn document_url(&self, collection: &str, id: &str) -> Result<Url, StoreError> {
        endpoint(
            &self.base_url,
            &[
                "v1",
                "projects",
                &self.project_id,
                "databases",
                DEFAULT_DATABASE,
                "documents",
                collection,
                id,
            ],
        )
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let url = self.document_url(collection, id)?;
        debug!(%url, "Document store get");

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let response = match StoreError::check(response).await {
            Ok(response) => response,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        let raw: RawDocument = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        let id = raw
            .name
            .rsplit('/')
            .next()
            .unwrap_or(id)
            .to_string();

        Ok(Some(Document {
            id,
            fields: raw.fields,
        }))
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        let mut url = self.document_url(collection, id)?;
        {
            let mut query = url.query_pairs_mut();
            for key in fields.keys() {
                query.append_pair("updateMask.fieldPaths", key);
            }
            query.append_pair("currentDocument.exists", "true");
        }
        debug!(%url, "Document store update");

        let body = PatchBody {
            fields: fields
                .iter()
                .filter_map(|(key, value)| Some((key.clone(), TypedValue::encode(value)?)))
                .collect(),
        };

        let response = self
            .client
            .patch(url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;

        StoreError::check(response).await?;

        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let url = self.document_url(collection, id)?;
        debug!(%url, "Document store delete");

        let response = self
            .client
            .delete(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        StoreError::check(response).await?;

        Ok(())
    }
}
