//! Approval coordination.
//!
//! Each store operation is atomic on its own, but approving a version is a
//! check followed by a write: "is another version approved?" then "set
//! this one". This module makes that pair atomic per prediction.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   ApprovalCoordinator                       │
//! │      (lock a prediction, check exclusivity, then write)     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//!                  ┌───────────────────────┐
//!                  │   PredictionLocks     │
//!                  │ (one mutex per id,    │
//!                  │  pruned when unused)  │
//!                  └───────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let guard = coordinator.lock(&prediction_id);
//! coordinator.ensure_exclusive(&guard, repo, Some(&version_id))?;
//! repo.update_approval(&version_id, true, Utc::now())?;
//! drop(guard);
//! ```

mod coordinator;
mod locks;

pub use coordinator::ApprovalCoordinator;
pub use locks::{PredictionGuard, PredictionLocks};
