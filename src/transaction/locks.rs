//! Per-prediction mutual exclusion.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{ArcMutexGuard, Mutex, RawMutex};

use crate::model::PredictionId;

type LockTable = Mutex<HashMap<PredictionId, Arc<Mutex<()>>>>;

/// A table of mutexes keyed by prediction.
///
/// Entries are created on first use and removed when the last guard for
/// the prediction is dropped, so the table only holds predictions that
/// are currently locked or awaited.
#[derive(Clone, Default)]
pub struct PredictionLocks {
    table: Arc<LockTable>,
}

impl PredictionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the prediction's lock is held.
    pub fn lock(&self, prediction_id: &PredictionId) -> PredictionGuard {
        let entry = {
            let mut table = self.table.lock();
            Arc::clone(table.entry(prediction_id.clone()).or_default())
        };

        // the table lock is released before blocking here
        let guard = entry.lock_arc();

        PredictionGuard {
            prediction_id: prediction_id.clone(),
            guard: Some(guard),
            entry,
            table: Arc::clone(&self.table),
        }
    }

    /// Number of predictions currently locked or awaited.
    pub fn tracked(&self) -> usize {
        self.table.lock().len()
    }
}

impl fmt::Debug for PredictionLocks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredictionLocks")
            .field("tracked", &self.tracked())
            .finish()
    }
}

/// Proof that a prediction's lock is held. Releases it on drop.
pub struct PredictionGuard {
    prediction_id: PredictionId,
    guard: Option<ArcMutexGuard<RawMutex, ()>>,
    entry: Arc<Mutex<()>>,
    table: Arc<LockTable>,
}

impl PredictionGuard {
    pub fn prediction_id(&self) -> &PredictionId {
        &self.prediction_id
    }
}

impl Drop for PredictionGuard {
    fn drop(&mut self) {
        drop(self.guard.take());

        // Waiters clone the entry under the table lock, so a count of two
        // (the table and `entry`) means nobody else wants it.
        let mut table = self.table.lock();
        if Arc::strong_count(&self.entry) == 2 {
            table.remove(&self.prediction_id);
        }
    }
}

impl fmt::Debug for PredictionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredictionGuard")
            .field("prediction_id", &self.prediction_id)
            .finish()
    }
}
