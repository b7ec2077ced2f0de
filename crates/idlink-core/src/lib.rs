//! # idlink-core
//!
//! Core types for cross-tenant account linking.
//!
//! This crate defines the foundational types used across all other idlink crates:
//! - [`IdentityRef`]: a (tenant, user) pair naming one account
//! - [`Link`]: an undirected edge between two identities
//! - [`TenantContext`]: explicit tenant scope threaded through every lookup
//! - [`LinkConfig`]: on-disk configuration
//! - Error hierarchy ([`LinkError`])

pub mod config;
pub mod error;
pub mod identity;
pub mod link;
pub mod tenant;

pub use config::LinkConfig;
pub use error::{LinkError, Result};
pub use identity::IdentityRef;
pub use link::Link;
pub use tenant::{TenantContext, TenantScope};
