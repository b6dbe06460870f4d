//! Membership Tracker - which observers watch which element.
//!
//! A side table keyed by element, so nothing is stashed on host objects.
//! Each element maps observer id → [`Membership`]; an element whose last
//! membership goes away is dropped from the table entirely.

use std::collections::HashMap;

use crate::types::{ElementId, MedusaCallback};

/// One (element, observer) pairing.
#[derive(Clone)]
pub(crate) struct Membership {
    pub(crate) membership_id: String,
    /// Overrides the observer's default callback for this element.
    pub(crate) callback: Option<MedusaCallback>,
}

#[derive(Default)]
pub(crate) struct MembershipTracker {
    records: HashMap<ElementId, HashMap<String, Membership>>,
}

impl MembershipTracker {
    pub(crate) fn get(&self, element: ElementId, observer_id: &str) -> Option<&Membership> {
        self.records.get(&element)?.get(observer_id)
    }

    pub(crate) fn contains(&self, element: ElementId, observer_id: &str) -> bool {
        self.get(element, observer_id).is_some()
    }

    /// Record a membership. Returns false if the pair already exists.
    pub(crate) fn insert(
        &mut self,
        element: ElementId,
        observer_id: &str,
        membership: Membership,
    ) -> bool {
        let record = self.records.entry(element).or_default();
        if record.contains_key(observer_id) {
            return false;
        }
        record.insert(observer_id.to_string(), membership);
        true
    }

    /// Remove a membership, dropping the element's record once empty.
    pub(crate) fn remove(&mut self, element: ElementId, observer_id: &str) -> Option<Membership> {
        let record = self.records.get_mut(&element)?;
        let membership = record.remove(observer_id);
        if record.is_empty() {
            self.records.remove(&element);
        }
        membership
    }

    /// Observer ids watching `element`, sorted.
    pub(crate) fn observers_of(&self, element: ElementId) -> Vec<String> {
        let mut ids: Vec<String> = self
            .records
            .get(&element)
            .map(|record| record.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    #[cfg(test)]
    pub(crate) fn has_record(&self, element: ElementId) -> bool {
        self.records.contains_key(&element)
    }

    /// Number of elements with at least one membership.
    pub(crate) fn record_count(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
    }
}
