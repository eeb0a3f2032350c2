use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::time::Instant;

use imlink_core::error::CorrelatorError;
use imlink_core::protocol::text::Envelope;

/// Failure reason used when a deadline passes.
pub const TIMEOUT_REASON: &str = "request timed out";

type ResolveFn = Box<dyn FnOnce(Reply) + Send + Sync + 'static>;
type FailFn = Box<dyn FnOnce(String) + Send + Sync + 'static>;

/// Matched response for a pending request.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub envelope: Envelope,
    /// `type`/`action` equal what was requested. A mismatched reply still
    /// retires the request but is an application-level failure notice.
    pub confirmed: bool,
}

/// Receipt for an issued request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    request_id: String,
    issued_at: Instant,
}

impl Ticket {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn issued_at(&self) -> Instant {
        self.issued_at
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Handled { request_id: String, confirmed: bool },
    /// No pending request had this id; treat as an unsolicited push.
    Unmatched(Envelope),
}

struct PendingRequest {
    expected_type: String,
    expected_action: String,
    issued_at: Instant,
    deadline: Option<Instant>,
    on_resolve: ResolveFn,
    on_failure: Option<FailFn>,
}

impl PendingRequest {
    fn fail(self, reason: &str) {
        if let Some(f) = self.on_failure {
            f(reason.to_owned());
        }
    }
}

/// Pending requests keyed by request id.
///
/// `DashMap::remove` is the single lookup-and-remove step: whichever caller
/// removes an entry owns its callbacks, so a request resolves at most once.
/// Callbacks always run after the entry is out of the map. The correlator is
/// `Sync`; deliveries may race from several threads.
#[derive(Default)]
pub struct Correlator {
    pending: DashMap<String, PendingRequest>,
    timeout: Option<Duration>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests issued from now on expire after `timeout`.
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self {
            pending: DashMap::new(),
            timeout,
        }
    }

    pub fn issue<R>(&self, envelope: &Envelope, on_resolve: R) -> Result<Ticket, CorrelatorError>
    where
        R: FnOnce(Reply) + Send + Sync + 'static,
    {
        self.register(envelope, Box::new(on_resolve), None)
    }

    pub fn issue_with_failure<R, F>(
        &self,
        envelope: &Envelope,
        on_resolve: R,
        on_failure: F,
    ) -> Result<Ticket, CorrelatorError>
    where
        R: FnOnce(Reply) + Send + Sync + 'static,
        F: FnOnce(String) + Send + Sync + 'static,
    {
        self.register(envelope, Box::new(on_resolve), Some(Box::new(on_failure)))
    }

    fn register(
        &self,
        envelope: &Envelope,
        on_resolve: ResolveFn,
        on_failure: Option<FailFn>,
    ) -> Result<Ticket, CorrelatorError> {
        let issued_at = Instant::now();
        match self.pending.entry(envelope.request_id.clone()) {
            Entry::Occupied(_) => {
                tracing::error!(
                    request_id = %envelope.request_id,
                    "duplicate request id, dropping new request"
                );
                Err(CorrelatorError::DuplicateId(envelope.request_id.clone()))
            }
            Entry::Vacant(slot) => {
                slot.insert(PendingRequest {
                    expected_type: envelope.msg_type.clone(),
                    expected_action: envelope.action.clone(),
                    issued_at,
                    deadline: self.timeout.map(|t| issued_at + t),
                    on_resolve,
                    on_failure,
                });
                tracing::debug!(request_id = %envelope.request_id, "request pending");
                Ok(Ticket {
                    request_id: envelope.request_id.clone(),
                    issued_at,
                })
            }
        }
    }

    /// Route an inbound envelope to its pending request, if any.
    pub fn dispatch_incoming(&self, envelope: Envelope) -> Dispatch {
        if envelope.request_id.is_empty() {
            return Dispatch::Unmatched(envelope);
        }
        let Some((request_id, pending)) = self.pending.remove(&envelope.request_id) else {
            return Dispatch::Unmatched(envelope);
        };

        let confirmed = envelope.is(&pending.expected_type, &pending.expected_action);
        if !confirmed {
            tracing::warn!(
                %request_id,
                expected = %format!("{}/{}", pending.expected_type, pending.expected_action),
                got = %format!("{}/{}", envelope.msg_type, envelope.action),
                "response type/action mismatch"
            );
        }
        tracing::debug!(
            %request_id,
            elapsed_ms = pending.issued_at.elapsed().as_millis() as u64,
            "request resolved"
        );
        (pending.on_resolve)(Reply { envelope, confirmed });
        Dispatch::Handled {
            request_id,
            confirmed,
        }
    }

    /// Fail one pending request. Returns false if it was not pending.
    pub fn cancel(&self, request_id: &str, reason: &str) -> bool {
        match self.pending.remove(request_id) {
            Some((_, pending)) => {
                pending.fail(reason);
                true
            }
            None => false,
        }
    }

    /// Fail every pending request with `reason` and clear the set.
    pub fn cancel_all(&self, reason: &str) -> usize {
        let ids: Vec<String> = self.pending.iter().map(|e| e.key().clone()).collect();
        let mut cancelled = 0;
        for id in ids {
            if self.cancel(&id, reason) {
                cancelled += 1;
            }
        }
        if cancelled > 0 {
            tracing::info!(cancelled, %reason, "pending requests cancelled");
        }
        cancelled
    }

    /// Fail every request whose deadline is at or before `now`.
    pub fn expire(&self, now: Instant) -> usize {
        let due: Vec<String> = self
            .pending
            .iter()
            .filter(|e| e.value().deadline.is_some_and(|d| d <= now))
            .map(|e| e.key().clone())
            .collect();
        let mut expired = 0;
        for id in due {
            if self.cancel(&id, TIMEOUT_REASON) {
                tracing::warn!(request_id = %id, "request timed out");
                expired += 1;
            }
        }
        expired
    }

    /// Earliest deadline among pending requests.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.iter().filter_map(|e| e.value().deadline).min()
    }

    pub fn is_pending(&self, request_id: &str) -> bool {
        self.pending.contains_key(request_id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
