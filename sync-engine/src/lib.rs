//! Sync Engine - commerce → ERP reconciliation core
//!
//! Keeps the storefront platform and the back-office ERP consistent:
//! every commerce entity (customer, company, order, order line, payment
//! transaction) is reflected exactly once as an ERP record, keyed by a
//! stable external id. Re-delivery of the same upstream event is safe.
//!
//! # Module structure
//!
//! ```text
//! sync-engine/src/
//! ├── context.rs       # per-request scope: clients, cache, companies
//! ├── ids.rs           # source global id → external id derivation
//! ├── partners.rs      # customer/company/address upsert
//! ├── orders.rs        # order reconciliation and line diffing
//! ├── transactions.rs  # payment transaction synchronization
//! ├── schedule.rs      # scheduled-delivery date calculator
//! ├── deadline.rs      # deadline racing for bounded units of work
//! └── error.rs         # failure taxonomy
//! ```

pub mod context;
pub mod deadline;
pub mod error;
pub mod ids;
pub mod orders;
pub mod partners;
pub mod schedule;
pub mod transactions;

// Re-export public types
pub use context::{CompanyProfile, CompanyRegistry, SyncContext};
pub use error::{SyncError, SyncResult};
pub use orders::LineDiff;
