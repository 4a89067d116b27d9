//! Per-method performance records.
//!
//! Each method keeps a ring of its most recent durations, capped at the
//! configured window. Records are diagnostic only; concurrent appends to the
//! same method serialize on its map shard.
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Summary of one method's recent durations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodTiming {
    pub samples: usize,
    pub mean_ms: f64,
    pub max_ms: u64,
    pub last_ms: u64,
}

#[derive(Debug)]
pub struct PerformanceMetrics {
    window: usize,
    durations: DashMap<String, VecDeque<u64>>,
}

impl PerformanceMetrics {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            durations: DashMap::new(),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn record(&self, method: &str, elapsed_ms: u64) {
        let mut ring = self.durations.entry(method.to_string()).or_default();
        if ring.len() == self.window {
            ring.pop_front();
        }
        ring.push_back(elapsed_ms);
    }

    /// Recorded durations for `method`, oldest first.
    pub fn durations(&self, method: &str) -> Vec<u64> {
        self.durations
            .get(method)
            .map(|ring| ring.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn summary(&self) -> BTreeMap<String, MethodTiming> {
        self.durations
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| {
                let ring = entry.value();
                let total: u64 = ring.iter().sum();
                let timing = MethodTiming {
                    samples: ring.len(),
                    mean_ms: total as f64 / ring.len() as f64,
                    max_ms: ring.iter().copied().max().unwrap_or(0),
                    last_ms: ring.back().copied().unwrap_or(0),
                };
                (entry.key().clone(), timing)
            })
            .collect()
    }

    pub fn clear(&self) {
        self.durations.clear();
    }
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self::new(1000)
    }
}
