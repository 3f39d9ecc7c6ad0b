//! Routing decision audit log.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Serialize, Serializer};

/// One routing choice made by the adaptive router.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    #[serde(serialize_with = "unix_millis")]
    pub time: SystemTime,
    #[serde(rename = "algo")]
    pub algorithm: &'static str,
    pub reason: &'static str,
    pub backend: String,
}

fn unix_millis<S: Serializer>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
    let millis = time
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    serializer.serialize_u64(millis)
}

#[derive(Debug)]
struct Inner {
    entries: VecDeque<Decision>,
    total: u64,
}

/// Bounded, append-only decision log. Once full, the oldest entry is evicted.
#[derive(Debug)]
pub struct DecisionLog {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl DecisionLog {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: Mutex::new(Inner {
                entries: VecDeque::with_capacity(capacity.min(1024)),
                total: 0,
            }),
        }
    }

    pub fn record(&self, decision: Decision) {
        self.record_with(Some(decision), || ());
    }

    /// Append `decision`, if any, and run `publish` under the same lock.
    pub fn record_with(&self, decision: Option<Decision>, publish: impl FnOnce()) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(decision) = decision {
            if inner.entries.len() == self.capacity {
                inner.entries.pop_front();
            }
            inner.entries.push_back(decision);
            inner.total += 1;
        }
        publish();
    }

    /// Copy of the retained decisions, oldest first.
    pub fn snapshot(&self) -> Vec<Decision> {
        self.snapshot_with(|| ()).0
    }

    /// Copy of the retained decisions plus whatever `read` returns, both
    /// taken under the lock that `record_with` publishes under.
    pub fn snapshot_with<R>(&self, read: impl FnOnce() -> R) -> (Vec<Decision>, R) {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let entries = inner.entries.iter().cloned().collect();
        (entries, read())
    }

    /// Decisions ever recorded, including evicted ones.
    pub fn total_recorded(&self) -> u64 {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).total
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(backend: &str) -> Decision {
        Decision {
            time: SystemTime::now(),
            algorithm: "roundrobin",
            reason: "normal_conditions",
            backend: backend.to_string(),
        }
    }

    #[test]
    fn test_evicts_oldest_when_full() {
        let log = DecisionLog::with_capacity(2);
        log.record(decision("a:1"));
        log.record(decision("b:1"));
        log.record(decision("c:1"));

        let entries: Vec<_> = log.snapshot().into_iter().map(|d| d.backend).collect();
        assert_eq!(entries, vec!["b:1", "c:1"]);
        assert_eq!(log.total_recorded(), 3);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_serializes_with_wire_names() {
        let mut d = decision("a:1");
        d.time = UNIX_EPOCH + std::time::Duration::from_millis(1234);
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["time"], 1234);
        assert_eq!(json["algo"], "roundrobin");
        assert_eq!(json["reason"], "normal_conditions");
        assert_eq!(json["backend"], "a:1");
    }
}
