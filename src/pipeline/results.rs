//! Per-run inference results keyed by window index
//!
//! A key moves `absent -> InFlight -> Ready -> absent` (taken by the
//! scheduler), or `InFlight -> absent` when inference fails. Evicting a run
//! removes all of its keys; tasks completing afterwards find nothing to fill.

use std::collections::HashMap;
use std::sync::Mutex;

use super::session::RunId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ResultKey {
    pub run: RunId,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    InFlight,
    Ready(String),
}

#[derive(Debug, Default)]
pub struct ResultTable {
    slots: Mutex<HashMap<ResultKey, Slot>>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut HashMap<ResultKey, Slot>) -> R) -> R {
        let mut guard = self.slots.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut guard)
    }

    /// Whether the key is in flight or ready
    pub(crate) fn contains(&self, key: ResultKey) -> bool {
        self.with(|slots| slots.contains_key(&key))
    }

    /// Mark in flight. False if the key was already present.
    pub(crate) fn claim(&self, key: ResultKey) -> bool {
        self.with(|slots| {
            if slots.contains_key(&key) {
                false
            } else {
                slots.insert(key, Slot::InFlight);
                true
            }
        })
    }

    /// Store a finished result. False if the claim was evicted meanwhile.
    pub(crate) fn complete(&self, key: ResultKey, text: String) -> bool {
        self.with(|slots| match slots.get_mut(&key) {
            Some(slot @ Slot::InFlight) => {
                *slot = Slot::Ready(text);
                true
            }
            _ => false,
        })
    }

    /// Forget a failed claim so it can be retried
    pub(crate) fn release(&self, key: ResultKey) {
        self.with(|slots| {
            if slots.get(&key) == Some(&Slot::InFlight) {
                slots.remove(&key);
            }
        });
    }

    /// Remove and return a ready result
    pub(crate) fn take_ready(&self, key: ResultKey) -> Option<String> {
        self.with(|slots| match slots.remove(&key) {
            Some(Slot::Ready(text)) => Some(text),
            Some(Slot::InFlight) => {
                slots.insert(key, Slot::InFlight);
                None
            }
            None => None,
        })
    }

    /// Drop every key of a run. Returns how many were removed.
    pub(crate) fn evict_run(&self, run: RunId) -> usize {
        self.with(|slots| {
            let before = slots.len();
            slots.retain(|k, _| k.run != run);
            before - slots.len()
        })
    }

    /// Keys currently held (in flight or ready)
    pub fn len(&self) -> usize {
        self.with(|slots| slots.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys currently in flight
    pub fn in_flight(&self) -> usize {
        self.with(|slots| slots.values().filter(|s| **s == Slot::InFlight).count())
    }
}
