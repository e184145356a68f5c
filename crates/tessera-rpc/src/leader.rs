//! Leader discovery among metadata replicas
//!
//! A [`LeaderResolver`] decides the order in which replica endpoints are
//! tried for each metadata call and learns which endpoint accepted. The
//! retry loop itself lives in [`crate::MetaStoreClient`]: it skips endpoints
//! answering `NotLeader`, stops at the first one that completes the call, and
//! fails with `StoreError::NoLeader` once every candidate refused.

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::trace;

/// Endpoint-ordering strategy for metadata calls
pub trait LeaderResolver: Send + Sync {
    /// Endpoints to try for the next call, in order
    fn candidates(&self) -> Vec<String>;

    /// Records that `endpoint` completed a call
    fn accepted(&self, endpoint: &str);

    /// Records that `endpoint` answered `NotLeader`
    fn refused(&self, _endpoint: &str) {}
}

/// Tries endpoints in configured order, starting from the last one that
/// accepted a call
#[derive(Debug)]
pub struct SequentialResolver {
    endpoints: Vec<String>,
    start: AtomicUsize,
}

impl SequentialResolver {
    pub fn new(endpoints: Vec<String>) -> Self {
        Self {
            endpoints,
            start: AtomicUsize::new(0),
        }
    }

    /// Configured endpoints, in configured order
    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }
}

impl LeaderResolver for SequentialResolver {
    fn candidates(&self) -> Vec<String> {
        let len = self.endpoints.len();
        if len == 0 {
            return Vec::new();
        }
        let start = self.start.load(Ordering::Relaxed) % len;
        self.endpoints[start..]
            .iter()
            .chain(&self.endpoints[..start])
            .cloned()
            .collect()
    }

    fn accepted(&self, endpoint: &str) {
        if let Some(pos) = self.endpoints.iter().position(|e| e == endpoint) {
            trace!(endpoint, "Remembering metadata leader");
            self.start.store(pos, Ordering::Relaxed);
        }
    }
}
