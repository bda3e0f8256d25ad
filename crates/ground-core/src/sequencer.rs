//! Ordering of aircraft competing for shared resources.
//!
//! One queue per contended resource (runway or critical taxi segment).
//! Only the head of a queue may proceed; everyone else holds. Admission
//! additionally checks the resource's reservation state so an exclusive
//! resource is never granted twice.

use crate::airport::EdgeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// A contended exclusive resource.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceId {
    Runway { runway_id: String },
    TaxiSegment { edge: EdgeId },
}

impl ResourceId {
    pub fn runway(id: impl Into<String>) -> Self {
        ResourceId::Runway {
            runway_id: id.into(),
        }
    }
}

/// One aircraft's claim on a resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceEntry {
    pub aircraft_id: String,
    pub resource: ResourceId,
    pub emergency: bool,
    /// When the aircraft is estimated ready to use the resource.
    pub ready_at: DateTime<Utc>,
    /// First time the aircraft asked; FIFO tie-break key.
    pub requested_at: DateTime<Utc>,
}

impl SequenceEntry {
    /// Priority key: emergencies first, then earlier ready time, then
    /// FIFO by first request, then aircraft id for full determinism.
    fn priority_key(&self) -> (Reverse<bool>, DateTime<Utc>, DateTime<Utc>, String) {
        (
            Reverse(self.emergency),
            self.ready_at,
            self.requested_at,
            self.aircraft_id.clone(),
        )
    }
}

/// Per-resource ordered queues, re-sorted once per slow cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sequencer {
    queues: BTreeMap<ResourceId, Vec<SequenceEntry>>,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or refresh an entry. A later enqueue for the same aircraft and
    /// resource updates the ready time but keeps the original request
    /// timestamp, so waiting aircraft don't lose their FIFO position.
    pub fn enqueue(&mut self, entry: SequenceEntry) {
        let queue = self.queues.entry(entry.resource.clone()).or_default();
        if let Some(existing) = queue
            .iter_mut()
            .find(|e| e.aircraft_id == entry.aircraft_id)
        {
            existing.emergency = entry.emergency;
            existing.ready_at = entry.ready_at;
        } else {
            queue.push(entry);
        }
    }

    /// Drop an aircraft from every queue.
    pub fn remove_aircraft(&mut self, aircraft_id: &str) {
        for queue in self.queues.values_mut() {
            queue.retain(|e| e.aircraft_id != aircraft_id);
        }
        self.queues.retain(|_, queue| !queue.is_empty());
    }

    /// Drop one aircraft's claim on one resource (after it was admitted
    /// and has used the resource).
    pub fn remove(&mut self, resource: &ResourceId, aircraft_id: &str) {
        if let Some(queue) = self.queues.get_mut(resource) {
            queue.retain(|e| e.aircraft_id != aircraft_id);
            if queue.is_empty() {
                self.queues.remove(resource);
            }
        }
    }

    /// Re-sort every queue by priority. Called once per slow cycle.
    pub fn resort(&mut self) {
        for queue in self.queues.values_mut() {
            queue.sort_by_key(|e| e.priority_key());
        }
    }

    /// Head of a resource's queue, admitted only when the resource is
    /// free. Everyone behind the head keeps holding.
    pub fn admit(&self, resource: &ResourceId, resource_free: bool) -> Option<&SequenceEntry> {
        if !resource_free {
            return None;
        }
        self.queues.get(resource)?.first()
    }

    /// Zero-based queue position of an aircraft for a resource.
    pub fn position_of(&self, aircraft_id: &str, resource: &ResourceId) -> Option<usize> {
        self.queues
            .get(resource)?
            .iter()
            .position(|e| e.aircraft_id == aircraft_id)
    }

    pub fn queued_resources(&self) -> impl Iterator<Item = &ResourceId> {
        self.queues.keys()
    }

    /// Entries waiting on a resource, in current queue order.
    pub fn entries(&self, resource: &ResourceId) -> impl Iterator<Item = &SequenceEntry> {
        self.queues.get(resource).into_iter().flatten()
    }

    pub fn queue_len(&self, resource: &ResourceId) -> usize {
        self.queues.get(resource).map(|q| q.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry(
        aircraft: &str,
        resource: ResourceId,
        emergency: bool,
        ready_offset_s: i64,
        requested_offset_s: i64,
        base: DateTime<Utc>,
    ) -> SequenceEntry {
        SequenceEntry {
            aircraft_id: aircraft.to_string(),
            resource,
            emergency,
            ready_at: base + Duration::seconds(ready_offset_s),
            requested_at: base + Duration::seconds(requested_offset_s),
        }
    }

    #[test]
    fn test_emergency_jumps_the_queue() {
        let base = Utc::now();
        let rwy = ResourceId::runway("24");
        let mut seq = Sequencer::new();
        seq.enqueue(entry("AC1", rwy.clone(), false, 0, 0, base));
        seq.enqueue(entry("AC2", rwy.clone(), false, 5, 1, base));
        seq.enqueue(entry("AC3", rwy.clone(), true, 60, 2, base));
        seq.resort();
        assert_eq!(seq.admit(&rwy, true).unwrap().aircraft_id, "AC3");
    }

    #[test]
    fn test_ready_time_then_fifo() {
        let base = Utc::now();
        let rwy = ResourceId::runway("24");
        let mut seq = Sequencer::new();
        // Same ready time: FIFO by first request
        seq.enqueue(entry("AC2", rwy.clone(), false, 10, 5, base));
        seq.enqueue(entry("AC1", rwy.clone(), false, 10, 8, base));
        // Earlier ready time wins outright
        seq.enqueue(entry("AC3", rwy.clone(), false, 2, 9, base));
        seq.resort();
        assert_eq!(seq.position_of("AC3", &rwy), Some(0));
        assert_eq!(seq.position_of("AC2", &rwy), Some(1));
        assert_eq!(seq.position_of("AC1", &rwy), Some(2));
    }

    #[test]
    fn test_admit_blocked_while_resource_held() {
        let base = Utc::now();
        let rwy = ResourceId::runway("24");
        let mut seq = Sequencer::new();
        seq.enqueue(entry("AC1", rwy.clone(), false, 0, 0, base));
        seq.resort();
        assert!(seq.admit(&rwy, false).is_none());
        assert_eq!(seq.admit(&rwy, true).unwrap().aircraft_id, "AC1");
    }

    #[test]
    fn test_reenqueue_keeps_fifo_position() {
        let base = Utc::now();
        let rwy = ResourceId::runway("24");
        let mut seq = Sequencer::new();
        seq.enqueue(entry("AC1", rwy.clone(), false, 10, 0, base));
        seq.enqueue(entry("AC2", rwy.clone(), false, 10, 1, base));
        // AC1 refreshes its estimate; request timestamp must not move
        seq.enqueue(entry("AC1", rwy.clone(), false, 10, 99, base));
        seq.resort();
        assert_eq!(seq.position_of("AC1", &rwy), Some(0));
    }

    #[test]
    fn test_remove_aircraft_clears_all_queues() {
        let base = Utc::now();
        let rwy = ResourceId::runway("24");
        let seg = ResourceId::TaxiSegment { edge: EdgeId(3) };
        let mut seq = Sequencer::new();
        seq.enqueue(entry("AC1", rwy.clone(), false, 0, 0, base));
        seq.enqueue(entry("AC1", seg.clone(), false, 0, 0, base));
        seq.enqueue(entry("AC2", rwy.clone(), false, 1, 1, base));
        seq.remove_aircraft("AC1");
        assert_eq!(seq.position_of("AC1", &rwy), None);
        assert_eq!(seq.position_of("AC1", &seg), None);
        assert_eq!(seq.queue_len(&rwy), 1);
        assert_eq!(seq.queue_len(&seg), 0);
    }
}
