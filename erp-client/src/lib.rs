//! ERP Client - JSON-RPC client for the back-office ERP
//!
//! Generic record CRUD over the ERP's `execute_kw` RPC surface, plus the
//! layers the sync engine builds on:
//!
//! - **Domains** (`domain`): search-filter expressions
//! - **Commands** (`command`): relational-field mutation vocabulary
//! - **External ids** (`xid`): source-system id ↔ ERP record resolution
//! - **Reference data** (`reference`): cached lookup-table snapshot

pub mod client;
pub mod command;
pub mod config;
pub mod domain;
pub mod error;
pub mod reference;
pub mod rpc;
pub mod xid;

pub use client::{ErpClient, ErpContext, Fields, DATE_FORMAT};
pub use command::Command;
pub use config::ErpConfig;
pub use domain::{Condition, Domain, DomainNode};
pub use error::{ErpError, ErpResult};
pub use reference::{ReferenceData, ReferenceSnapshot, SnapshotFetcher};
pub use rpc::{ErpTransport, HttpTransport};
pub use xid::XidMapping;
