//! Commerce Client - Admin GraphQL client for the storefront platform
//!
//! One GraphQL POST per logical query; each query names the top-level
//! `data` member holding its answer. Responses decode into the typed
//! payload model in `types`.

pub mod client;
pub mod config;
pub mod error;
pub mod queries;
pub mod types;

pub use client::{CommerceClient, GraphQlTransport, HttpGraphQlTransport, QueryDescriptor};
pub use config::{CommerceConfig, Storefront};
pub use error::{CommerceError, CommerceResult};
