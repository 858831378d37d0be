//! Core types for Clausebook: clauses, canonical ordering, cross-reference
//! annotation, contract naming, backups, and user roles.

pub mod annotate;
pub mod backup;
pub mod clause;
pub mod contract;
pub mod decode;
mod error;
pub mod saved;
pub mod search;
pub mod sort_key;
pub mod user;

pub use annotate::{annotate_clause, link_cross_references};
pub use backup::{backup_file_name, export_backup, parse_backup};
pub use clause::{Clause, ConditionType};
pub use contract::{
    ContractMeta, ContractSummary, contract_id_from_name, derive_contract_id,
    detect_contract_name, explicit_contract_id, iso_timestamp,
};
pub use decode::{ClauseDocument, decode_clause, encode_clause};
pub use error::ValidationError;
pub use saved::{ContractMetadata, SavedContract};
pub use search::search_clauses;
pub use sort_key::{clause_key, compare_clause_numbers, sort_clauses};
pub use user::{Capabilities, Role, UserProfile};
