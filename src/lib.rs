//! Multi-source listing synchronization and tenant notification engine.
//!
//! Listings are pulled from each configured provider on its own schedule,
//! scored against active leads, and the ranked matches are stored. Provider
//! push events and match notifications flow to tenants through signed,
//! best-effort webhooks.

pub mod api;
pub mod config;
pub mod leads;
pub mod matching;
pub mod models;
pub mod sources;
pub mod sync;
pub mod telemetry;
pub mod webhooks;
