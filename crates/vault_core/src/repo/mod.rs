//! Record collection layer over store bindings.
//!
//! # Responsibility
//! - Provide id-based CRUD over one `Vec<T>` slot per record kind.
//! - Keep store/binding details away from use-case services.
//!
//! # Invariants
//! - Ids are unique within a collection; inserts re-key on collision.
//! - New records are prepended; relative order of others is preserved.
//! - A missing id is reported as `NotFound`, and nothing is written.
//! - The observer hears committed local mutations only; `reconcile` is silent.

pub mod collection;

pub use collection::{fresh_id, CollectionObserver, RecordCollection, RepoError, RepoResult};
