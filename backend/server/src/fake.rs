//! In-memory identity and document stores.
//!
//! Both share a [`Journal`] so the order of calls across the two stores can
//! be asserted on. Every call is journaled before the injected failure (if
//! any) is returned.
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::SecondsFormat;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::{
    accounts::{STATUS_FIELD, UserStatus},
    documents::{Document, DocumentStore, FieldValue, Fields},
    error::StoreError,
    identity::IdentityStore,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Disable(String),
    Enable(String),
    DeleteAccount(String),
    Get {
        collection: String,
        id: String,
    },
    Update {
        collection: String,
        id: String,
        fields: Fields,
    },
    DeleteDocument {
        collection: String,
        id: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Call>>>);

impl Journal {
    pub async fn record(&self, call: Call) {
        self.0.lock().await.push(call);
    }

    pub async fn calls(&self) -> Vec<Call> {
        self.0.lock().await.clone()
    }
}

fn injected(failure: &Option<String>) -> Result<(), StoreError> {
    match failure {
        Some(message) => Err(StoreError::Upstream {
            status: 500,
            message: message.clone(),
        }),
        None => Ok(()),
    }
}

#[derive(Default)]
pub struct FakeIdentity {
    journal: Journal,
    disabled: Mutex<HashSet<String>>,
    deleted: Mutex<HashSet<String>>,
    failure: Mutex<Option<String>>,
}

impl FakeIdentity {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            ..Default::default()
        }
    }

    pub async fn fail_with(&self, message: &str) {
        *self.failure.lock().await = Some(message.to_string());
    }

    pub async fn is_disabled(&self, user_id: &str) -> bool {
        self.disabled.lock().await.contains(user_id)
    }

    pub async fn is_deleted(&self, user_id: &str) -> bool {
        self.deleted.lock().await.contains(user_id)
    }
}

#[async_trait]
impl IdentityStore for FakeIdentity {
    async fn disable(&self, user_id: &str) -> Result<(), StoreError> {
        self.journal.record(Call::Disable(user_id.to_string())).await;
        injected(&*self.failure.lock().await)?;

        self.disabled.lock().await.insert(user_id.to_string());
        Ok(())
    }

    async fn enable(&self, user_id: &str) -> Result<(), StoreError> {
        self.journal.record(Call::Enable(user_id.to_string())).await;
        injected(&*self.failure.lock().await)?;

        self.disabled.lock().await.remove(user_id);
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> Result<(), StoreError> {
        self.journal
            .record(Call::DeleteAccount(user_id.to_string()))
            .await;
        injected(&*self.failure.lock().await)?;

        self.disabled.lock().await.remove(user_id);
        self.deleted.lock().await.insert(user_id.to_string());
        Ok(())
    }
}

type DocumentKey = (String, String);

#[derive(Default)]
pub struct FakeDocuments {
    journal: Journal,
    documents: Mutex<HashMap<DocumentKey, Map<String, Value>>>,
    failure: Mutex<Option<String>>,
}

impl FakeDocuments {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            ..Default::default()
        }
    }

    pub async fn fail_with(&self, message: &str) {
        *self.failure.lock().await = Some(message.to_string());
    }

    pub async fn insert(&self, collection: &str, id: &str, status: UserStatus) {
        let mut fields = Map::new();
        fields.insert(STATUS_FIELD.to_string(), Value::from(status.as_str()));

        self.documents
            .lock()
            .await
            .insert((collection.to_string(), id.to_string()), fields);
    }

    pub async fn stored(&self, collection: &str, id: &str) -> Option<Map<String, Value>> {
        self.documents
            .lock()
            .await
            .get(&(collection.to_string(), id.to_string()))
            .cloned()
    }
}

#[async_trait]
impl DocumentStore for FakeDocuments {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.journal
            .record(Call::Get {
                collection: collection.to_string(),
                id: id.to_string(),
            })
            .await;
        injected(&*self.failure.lock().await)?;

        Ok(self.stored(collection, id).await.map(|fields| Document {
            id: id.to_string(),
            fields,
        }))
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        self.journal
            .record(Call::Update {
                collection: collection.to_string(),
                id: id.to_string(),
                fields: fields.clone(),
            })
            .await;
        injected(&*self.failure.lock().await)?;

        let mut documents = self.documents.lock().await;
        let document = documents
            .get_mut(&(collection.to_string(), id.to_string()))
            .ok_or_else(|| StoreError::Upstream {
                status: 404,
                message: format!("No document to update: {collection}/{id}"),
            })?;

        for (key, value) in fields {
            match value {
                FieldValue::Text(s) => {
                    document.insert(key, Value::String(s));
                }
                FieldValue::Timestamp(ts) => {
                    document.insert(
                        key,
                        Value::String(ts.to_rfc3339_opts(SecondsFormat::Millis, true)),
                    );
                }
                FieldValue::Remove => {
                    document.remove(&key);
                }
            }
        }

        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.journal
            .record(Call::DeleteDocument {
                collection: collection.to_string(),
                id: id.to_string(),
            })
            .await;
        injected(&*self.failure.lock().await)?;

        self.documents
            .lock()
            .await
            .remove(&(collection.to_string(), id.to_string()));
        Ok(())
    }
}
