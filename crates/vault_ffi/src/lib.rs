//! Flutter-facing bindings over `vault_core`.

pub mod api;
