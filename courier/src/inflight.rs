//! In-flight request table used for deduplication.

use std::sync::{Mutex, PoisonError};

use courier_core::{Endpoint, RequestResult};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

#[cfg(feature = "metrics")]
use crate::metrics::REQUESTS_DEDUPLICATED;

/// A callback waiting for the result of one logical request.
pub(crate) type Completion = Box<dyn FnOnce(RequestResult) + Send>;

/// Role of a call after [`InflightTable::join`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    /// First call for the endpoint; it must dispatch.
    Leader,
    /// Attached to an outstanding call; it must not dispatch.
    Follower,
}

/// Outstanding calls keyed by endpoint.
///
/// A key is present iff a dispatch for that endpoint is outstanding. The key
/// is removed before its waiters are called, so a call arriving during the
/// fan-out starts a fresh dispatch.
#[derive(Default)]
pub(crate) struct InflightTable {
    requests: DashMap<Endpoint, Mutex<Vec<Completion>>>,
}

impl InflightTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers `completion` as a waiter for `endpoint`.
    pub(crate) fn join(&self, endpoint: &Endpoint, completion: Completion) -> Admission {
        match self.requests.entry(endpoint.clone()) {
            Entry::Occupied(entry) => {
                entry
                    .get()
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(completion);
                debug!(url = endpoint.url(), "joined in-flight request");
                #[cfg(feature = "metrics")]
                metrics::counter!(*REQUESTS_DEDUPLICATED).increment(1);
                Admission::Follower
            }
            Entry::Vacant(entry) => {
                entry.insert(Mutex::new(vec![completion]));
                Admission::Leader
            }
        }
    }

    /// Removes `endpoint` and hands `result` to every waiter, in join order.
    pub(crate) fn complete(&self, endpoint: &Endpoint, result: RequestResult) {
        let waiters = self
            .requests
            .remove(endpoint)
            .map(|(_, waiters)| waiters.into_inner().unwrap_or_else(PoisonError::into_inner))
            .unwrap_or_default();
        debug!(
            url = endpoint.url(),
            waiters = waiters.len(),
            "fanning out in-flight result"
        );
        for waiter in waiters {
            waiter(result.clone());
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.requests.len()
    }
}
