use crate::types::CloudEvent;
use serde::{Deserialize, Serialize};

/// An ordered sequence of envelopes encoded together.
///
/// Order is preserved end-to-end. Events are independent; the batch adds no
/// cross-event invariants and trusts each event's own construction-time
/// validation.
#[derive(Clone, Eq, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct CloudEventBatch(Vec<CloudEvent>);

impl CloudEventBatch {
    pub fn new(events: Vec<CloudEvent>) -> Self {
        Self(events)
    }

    pub fn events(&self) -> &[CloudEvent] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CloudEvent> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<CloudEvent>> for CloudEventBatch {
    fn from(events: Vec<CloudEvent>) -> Self {
        Self(events)
    }
}

impl FromIterator<CloudEvent> for CloudEventBatch {
    fn from_iter<T: IntoIterator<Item = CloudEvent>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for CloudEventBatch {
    type Item = CloudEvent;
    type IntoIter = std::vec::IntoIter<CloudEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a CloudEventBatch {
    type Item = &'a CloudEvent;
    type IntoIter = std::slice::Iter<'a, CloudEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use fxhash::FxHashMap;
    use pretty_assertions::assert_eq;

    fn event(id: &str) -> CloudEvent {
        CloudEvent::new(id, "/s", "1.0", "t", FxHashMap::default(), None).unwrap()
    }

    #[test]
    fn preserves_order_and_restarts() {
        let batch = CloudEventBatch::new(vec![event("b"), event("a"), event("c")]);
        let ids: Vec<_> = batch.iter().map(|e| e.id()).collect();
        assert_eq!(ids, ["b", "a", "c"]);
        // Iteration restarts from the beginning
        let ids_again: Vec<_> = batch.iter().map(|e| e.id()).collect();
        assert_eq!(ids, ids_again);
    }

    #[test]
    fn empty_batch_is_valid() {
        let batch = CloudEventBatch::default();
        assert!(batch.is_empty());
        assert_eq!(batch.len(), 0);
        assert!(batch.iter().next().is_none());
    }
}
