//! # idlink-identity
//!
//! Account-side collaborators of the link manager:
//! - [`IdentityLookup`] / [`MemoryAccountDirectory`]: resolve a user inside a tenant
//! - [`UserTokenIssuer`] / [`SecretTokenIssuer`]: purpose-scoped, single-use secrets
//! - [`IdAllocator`]: link id generation

pub mod account;
pub mod ids;
pub mod token;

pub use account::{Account, IdentityLookup, MemoryAccountDirectory};
pub use ids::{IdAllocator, SequentialIds, UuidAllocator};
pub use token::{Clock, ManualClock, SecretTokenIssuer, SystemClock, UserTokenIssuer};
