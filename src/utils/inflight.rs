// src/utils/inflight.rs

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

/// Submission ids currently being marked.
///
/// A second request for an id already in the set is turned away, so one
/// submission can never cause two concurrent marking calls.
#[derive(Clone, Default)]
pub struct InFlight {
    ids: Arc<Mutex<HashSet<Uuid>>>,
}

impl InFlight {
    /// Claims `id`; `None` when another request holds it.
    pub fn try_claim(&self, id: Uuid) -> Option<InFlightGuard> {
        if lock(&self.ids).insert(id) {
            Some(InFlightGuard {
                ids: self.ids.clone(),
                id,
            })
        } else {
            None
        }
    }

    pub fn is_claimed(&self, id: &Uuid) -> bool {
        lock(&self.ids).contains(id)
    }
}

/// Releases the claim on drop, including on error paths.
pub struct InFlightGuard {
    ids: Arc<Mutex<HashSet<Uuid>>>,
    id: Uuid,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock(&self.ids).remove(&self.id);
    }
}

fn lock(ids: &Mutex<HashSet<Uuid>>) -> MutexGuard<'_, HashSet<Uuid>> {
    ids.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
