//! State contracts and the accessor scripts use to read/write slots.
//!
//! Slot identity is an opaque newtype minted from a monotonic counter per
//! `create_state` call, not a string — so collisions across modes are
//! impossible by construction. A legacy string-keyed contract shape is
//! layered on top for scripts that still address slots by name.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;

use crate::store::Store;

static NEXT_SLOT_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque slot identity, unique per `StateContract::declare_slot` call —
/// the clean-rewrite primary addressing scheme called for over raw
/// string keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateSlot(u64);

impl StateSlot {
    fn next() -> Self {
        Self(NEXT_SLOT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Clone)]
struct SlotDef {
    name: String,
    default: Value,
    #[allow(dead_code)]
    description: Option<String>,
}

/// A mode's declared set of state slots. Two registration shapes are
/// supported: the newer `StateSlot`-keyed shape (primary) and a legacy
/// string-keyed shape that wraps it via a per-mode name→slot map.
#[derive(Default, Clone)]
pub struct StateContract {
    slots: HashMap<StateSlot, SlotDef>,
    by_name: HashMap<String, StateSlot>,
}

impl StateContract {
    pub fn new() -> Self {
        Self::default()
    }

    /// Newer shape: `tui.createState(modeName, contractDef)`. Mints a
    /// fresh opaque token for this slot.
    pub fn declare_slot(&mut self, name: impl Into<String>, default: Value, description: Option<String>) -> StateSlot {
        let slot = StateSlot::next();
        let name = name.into();
        self.by_name.insert(name.clone(), slot);
        self.slots.insert(slot, SlotDef { name, default, description });
        slot
    }

    /// Legacy shape: `tui.createStateContract(modeName, {slotName: {...}})`.
    /// Equivalent to `declare_slot` but documents the string-keyed entry
    /// point scripts written against the older API call into.
    pub fn declare_slot_legacy(&mut self, name: impl Into<String>, default: Value) -> StateSlot {
        self.declare_slot(name, default, None)
    }

    pub fn slot_by_name(&self, name: &str) -> Option<StateSlot> {
        self.by_name.get(name).copied()
    }

    pub fn default_for(&self, slot: StateSlot) -> Option<&Value> {
        self.slots.get(&slot).map(|s| &s.default)
    }

    fn key_for(&self, slot: StateSlot) -> String {
        self.slots
            .get(&slot)
            .map(|s| s.name.clone())
            .unwrap_or_else(|| format!("slot-{}", slot.0))
    }
}

/// Bound to one session + mode; reads return the contract default when a
/// slot was never written, and writes persist immediately to the store
/// under the composite key `(mode, slot)`.
#[derive(Clone)]
pub struct StateAccessor {
    store: Arc<dyn Store>,
    session_id: String,
    mode_name: String,
}

impl StateAccessor {
    pub fn new(store: Arc<dyn Store>, session_id: String, mode_name: String) -> Self {
        Self { store, session_id, mode_name }
    }

    fn composite_key(&self, slot_key: &str) -> String {
        format!("{}:{}", self.mode_name, slot_key)
    }

    pub fn get(&self, contract: &StateContract, slot: StateSlot) -> Value {
        let key = self.composite_key(&contract.key_for(slot));
        match self.store.get(&self.session_id, &key) {
            Ok(Some(v)) => v,
            _ => contract.default_for(slot).cloned().unwrap_or(Value::Null),
        }
    }

    pub fn set(&self, contract: &StateContract, slot: StateSlot, value: Value) -> Result<(), crate::store::StoreError> {
        let key = self.composite_key(&contract.key_for(slot));
        self.store.set(&self.session_id, &key, &value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn fresh_session_reports_declared_default() {
        let mut contract = StateContract::new();
        let slot = contract.declare_slot("items", serde_json::json!([]), None);

        let store = Arc::new(MemoryStore::new());
        let accessor = StateAccessor::new(store, "s1".to_string(), "review".to_string());

        assert_eq!(accessor.get(&contract, slot), serde_json::json!([]));
    }

    #[test]
    fn set_then_get_round_trips_until_overwritten() {
        let mut contract = StateContract::new();
        let slot = contract.declare_slot("count", serde_json::json!(0), None);

        let store = Arc::new(MemoryStore::new());
        let accessor = StateAccessor::new(store, "s1".to_string(), "review".to_string());

        accessor.set(&contract, slot, serde_json::json!(5)).unwrap();
        assert_eq!(accessor.get(&contract, slot), serde_json::json!(5));

        accessor.set(&contract, slot, serde_json::json!(7)).unwrap();
        assert_eq!(accessor.get(&contract, slot), serde_json::json!(7));
    }

    #[test]
    fn a_new_accessor_for_the_same_session_sees_prior_writes() {
        let mut contract = StateContract::new();
        let slot = contract.declare_slot("count", serde_json::json!(0), None);

        let store = Arc::new(MemoryStore::new());
        let first = StateAccessor::new(store.clone(), "s1".to_string(), "review".to_string());
        first.set(&contract, slot, serde_json::json!(9)).unwrap();

        let second = StateAccessor::new(store, "s1".to_string(), "review".to_string());
        assert_eq!(second.get(&contract, slot), serde_json::json!(9));
    }

    #[test]
    fn slots_are_scoped_per_mode_even_with_same_declared_name() {
        let mut review_contract = StateContract::new();
        let review_slot = review_contract.declare_slot("items", serde_json::json!([]), None);

        let mut flow_contract = StateContract::new();
        let flow_slot = flow_contract.declare_slot("items", serde_json::json!("different-default"), None);

        let store = Arc::new(MemoryStore::new());
        let review = StateAccessor::new(store.clone(), "s1".to_string(), "review".to_string());
        let flow = StateAccessor::new(store, "s1".to_string(), "flow".to_string());

        review.set(&review_contract, review_slot, serde_json::json!(["a"])).unwrap();
        assert_eq!(flow.get(&flow_contract, flow_slot), serde_json::json!("different-default"));
    }
}
