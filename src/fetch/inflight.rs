use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Identifiers currently being fetched.
#[derive(Debug, Default)]
pub struct InFlight {
    ids: Mutex<HashSet<String>>,
}

impl InFlight {
    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim `id`, or `None` if another fetch holds it. The claim is released
    /// when the guard drops.
    pub fn begin(&self, id: &str) -> Option<InFlightGuard<'_>> {
        self.lock().insert(id.to_string()).then(|| InFlightGuard {
            set: self,
            id: id.to_string(),
        })
    }

    #[cfg(test)]
    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains(id)
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[derive(Debug)]
pub struct InFlightGuard<'a> {
    set: &'a InFlight,
    id: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.lock().remove(&self.id);
    }
}
