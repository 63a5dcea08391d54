//! Multi-tenant bucket file storage service.
//!
//! Files are grouped into buckets and served over HTTP. All metadata (the
//! bucket registry, the permission registry and the per-bucket file indexes)
//! lives in JSON documents next to the payloads, guarded by marker-file
//! locks so concurrent writers never clobber each other.

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
