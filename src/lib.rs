//! Rate-limit policy agent.
//!
//! Periodically reads bandwidth and connection-rate tiers from an Open
//! Policy Agent data store and reconciles the matching rate-limit templates
//! onto a managed network appliance through its authenticated REST API.
//!
//! The flow is strictly downward: the reconciliation loop resolves rules
//! through the [`policy`] client and realizes them through the [`reconcile`]
//! adapter, which drives the [`appliance`] session client.

pub mod appliance;
pub mod config;
pub mod policy;
pub mod reconcile;
