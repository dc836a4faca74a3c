//! Cloud sync plumbing.
//!
//! # Responsibility
//! - Define the provider SPI hosted document databases are adapted to.
//! - Keep a registry of providers with one active selection.
//! - Mirror remote collection snapshots into local record collections and
//!   publish local mutations back.
//!
//! # Invariants
//! - Remote records win by id (last write wins); there is no conflict
//!   detection.
//! - Local records the remote has never acknowledged are never dropped by a
//!   snapshot.
//! - Provider ids are lowercase `[a-z0-9_-]+` and unique per registry.

pub mod memory;
pub mod mirror;
pub mod provider;
pub mod provider_registry;

pub use memory::MemoryCloud;
pub use mirror::CollectionMirror;
pub use provider::{
    CloudDocument, CloudProvider, CloudSubscription, ProviderError, ProviderResult, SnapshotFn,
    SyncStage,
};
pub use provider_registry::{ProviderRegistry, ProviderRegistryError};
