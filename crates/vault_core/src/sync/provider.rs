//! Provider SPI for hosted document databases.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Sync operation that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    Subscribe,
    Add,
    Update,
    Delete,
}

impl SyncStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Subscribe => "subscribe",
            Self::Add => "add",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// Normalized provider failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub provider_id: String,
    pub stage: SyncStage,
    /// Stable machine-readable code, e.g. `not_found`.
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

impl ProviderError {
    pub fn new(
        provider_id: impl Into<String>,
        stage: SyncStage,
        code: impl Into<String>,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            stage,
            code: code.into(),
            message: message.into(),
            retryable,
        }
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} failed ({}): {}",
            self.provider_id,
            self.stage.as_str(),
            self.code,
            self.message
        )
    }
}

impl Error for ProviderError {}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// One remote document; `body` is the record JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudDocument {
    pub id: String,
    pub body: Value,
}

/// Callback receiving the full collection after every remote change.
pub type SnapshotFn = Arc<dyn Fn(Vec<CloudDocument>) + Send + Sync>;

/// Live remote subscription; unsubscribes when dropped.
pub struct CloudSubscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl CloudSubscription {
    pub fn new(unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    pub fn unsubscribe(mut self) {
        self.run();
    }

    fn run(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for CloudSubscription {
    fn drop(&mut self) {
        self.run();
    }
}

/// Adapter over one hosted document database.
///
/// Collections are named after record slot keys (`notes`, `lists`, ...).
pub trait CloudProvider: Send + Sync {
    fn provider_id(&self) -> &str;

    /// Registers `on_change`; providers deliver the current snapshot first.
    fn subscribe(
        &self,
        collection: &str,
        on_change: SnapshotFn,
    ) -> ProviderResult<CloudSubscription>;

    /// Adds a document and returns its id; a blank id is assigned by the
    /// provider.
    fn add(&self, collection: &str, document: CloudDocument) -> ProviderResult<String>;

    /// Replaces an existing document.
    fn update(&self, collection: &str, document: CloudDocument) -> ProviderResult<()>;

    fn delete(&self, collection: &str, id: &str) -> ProviderResult<()>;
}
