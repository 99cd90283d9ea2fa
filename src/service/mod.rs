//! The review engine proper.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     ReviewWorkflow                          │
//! │         (JSON request validation, camelCase replies)        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     VersionService                          │
//! │   (create / approve / list / read, approval invariant)      │
//! └─────────────────────────────────────────────────────────────┘
//!        │                     │                     │
//!        ▼                     ▼                     ▼
//!  ┌─────────────┐     ┌───────────────┐     ┌───────────────┐
//!  │ContentStore │     │  Approval     │     │   Version     │
//!  │  (blobs)    │     │ Coordinator   │     │  Repository   │
//!  └─────────────┘     └───────────────┘     └───────────────┘
//! ```

mod error;
mod version_service;
mod workflow;

pub use error::{EntityRef, ReviewError, ReviewResult, StorageFailure};
pub use version_service::VersionService;
pub use workflow::ReviewWorkflow;
