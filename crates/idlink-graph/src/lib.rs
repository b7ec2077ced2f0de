//! # idlink-graph
//!
//! The link graph manager and the link token protocol.
//!
//! Includes:
//! - Breadth-first closure over link edges ([`traversal`])
//! - Link lifecycle: link, unlink, membership checks ([`LinkManager`])
//! - Proof-of-control tokens for the target account ([`LinkTokenService`])
//!
//! [`LinkManager::link`] does not verify tokens. Callers that require proof
//! of control must call [`LinkTokenService::verify_link_token`] first.

pub mod manager;
pub mod token;
pub mod traversal;

pub use manager::LinkManager;
pub use token::{
    LinkTokenService, CONFIRM_EMAIL_PURPOSE, LINK_TOKEN_PROVIDER, LINK_TOKEN_PURPOSE,
    RESET_PASSWORD_PURPOSE,
};
pub use traversal::{breadth_first_links, NeighborSource};

pub use tokio_util::sync::CancellationToken;
