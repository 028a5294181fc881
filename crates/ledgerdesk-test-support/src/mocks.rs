//! Fake collaborators for the grid client.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use ledgerdesk_grid::client::{HttpRequest, HttpResponse, Transport};
use ledgerdesk_grid::error::TransportError;
use ledgerdesk_grid::session::Navigator;
use tokio::sync::{Notify, oneshot};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Navigator that records every path it was asked to open.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visits: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    /// Paths visited so far, in order.
    #[must_use]
    pub fn visits(&self) -> Vec<String> {
        lock(&self.visits).clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate_to(&self, path: &str) {
        lock(&self.visits).push(path.to_string());
    }
}

/// Transport answering from a fixed queue of responses.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    /// Transport that will answer with `responses` in order.
    #[must_use]
    pub fn new(responses: impl IntoIterator<Item = Result<HttpResponse, TransportError>>) -> Self {
        Self {
            script: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::default(),
        }
    }

    /// Queue another response.
    pub fn push(&self, response: Result<HttpResponse, TransportError>) {
        lock(&self.script).push_back(response);
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        lock(&self.requests).push(request);
        lock(&self.script)
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Other("script exhausted".into())))
    }
}

type Reply = oneshot::Sender<Result<HttpResponse, TransportError>>;

#[derive(Default)]
struct Gate {
    requests: Vec<HttpRequest>,
    replies: Vec<Option<Reply>>,
}

/// Transport that holds every request until the test releases it, so
/// responses can be delivered in any order.
#[derive(Default)]
pub struct GatedTransport {
    gate: Mutex<Gate>,
    arrived: Notify,
}

impl std::fmt::Debug for GatedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatedTransport")
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

impl GatedTransport {
    /// Empty gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until at least `count` requests have arrived.
    pub async fn wait_for(&self, count: usize) {
        loop {
            let arrived = self.arrived.notified();
            if lock(&self.gate).requests.len() >= count {
                return;
            }
            arrived.await;
        }
    }

    /// Answer the request that arrived `position`-th (zero-based).
    /// Returns `false` when no such request is waiting.
    pub fn release(&self, position: usize, response: Result<HttpResponse, TransportError>) -> bool {
        let reply = lock(&self.gate)
            .replies
            .get_mut(position)
            .and_then(Option::take);
        reply.is_some_and(|reply| reply.send(response).is_ok())
    }

    /// Requests received so far, in arrival order.
    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.gate).requests.clone()
    }

    /// Number of requests still waiting for an answer.
    #[must_use]
    pub fn pending(&self) -> usize {
        lock(&self.gate).replies.iter().flatten().count()
    }
}

#[async_trait]
impl Transport for GatedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let (reply, answer) = oneshot::channel();
        {
            let mut gate = lock(&self.gate);
            gate.requests.push(request);
            gate.replies.push(Some(reply));
        }
        self.arrived.notify_waiters();
        answer
            .await
            .unwrap_or_else(|_| Err(TransportError::Other("gate closed without a reply".into())))
    }
}
