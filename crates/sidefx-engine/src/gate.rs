use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use futures::future::{self, BoxFuture, Shared};
use tokio::sync::oneshot;

static NEXT_GATE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("readiness gate rejected: {reason}")]
pub struct GateRejected {
    pub reason: String,
}

impl GateRejected {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

pub type GateResult = Result<(), GateRejected>;

/// Cloneable readiness signal awaited before an effect may run.
///
/// Every clone observes the same outcome. Gates carry an id so that callers
/// can tell which registration a stored gate came from.
#[derive(Clone)]
pub struct ReadinessGate {
    id: u64,
    signal: Shared<BoxFuture<'static, GateResult>>,
}

impl ReadinessGate {
    /// A gate that is already open.
    pub fn ready() -> Self {
        Self::from_future(future::ready(Ok(())))
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::from_future(future::ready(Err(GateRejected::new(reason))))
    }

    pub fn from_future<F>(signal: F) -> Self
    where
        F: Future<Output = GateResult> + Send + 'static,
    {
        Self {
            id: NEXT_GATE_ID.fetch_add(1, Ordering::Relaxed),
            signal: signal.boxed().shared(),
        }
    }

    /// A gate opened or rejected through the returned trigger. Dropping the
    /// trigger rejects the gate.
    pub fn channel() -> (Self, GateTrigger) {
        let (tx, rx) = oneshot::channel();
        let gate = Self::from_future(async move {
            rx.await
                .unwrap_or_else(|_| Err(GateRejected::new("gate trigger dropped")))
        });
        (gate, GateTrigger { tx })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub async fn wait(&self) -> GateResult {
        self.signal.clone().await
    }
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::ready()
    }
}

impl fmt::Debug for ReadinessGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadinessGate").field("id", &self.id).finish()
    }
}

#[derive(Debug)]
pub struct GateTrigger {
    tx: oneshot::Sender<GateResult>,
}

impl GateTrigger {
    pub fn open(self) {
        let _ = self.tx.send(Ok(()));
    }

    pub fn reject(self, reason: impl Into<String>) {
        let _ = self.tx.send(Err(GateRejected::new(reason)));
    }
}
