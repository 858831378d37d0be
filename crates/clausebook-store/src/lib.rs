//! Storage layer: the clause store adapter, its in-memory and DuckDB backends,
//! change subscriptions, identity, and device-local state.

mod adapter;
pub mod archive;
pub mod auth;
mod error;
pub mod flag;
mod memory;
mod subscribe;

pub use adapter::{ClauseSnapshot, ClauseStore, ProfileStore};
pub use archive::{DirArchive, LegacyArchive, MemoryArchive};
pub use auth::{AuthError, AuthHandle, Identity, LocalIdentityProvider};
pub use error::StoreError;
pub use flag::{FileFlagStore, FlagStore, MemoryFlagStore, MigrationState};
pub use memory::MemoryStore;
pub use subscribe::Subscription;

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::DuckStore;
