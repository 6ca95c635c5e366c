// Rendezvous between relayed operations and the add-in runtimes that can
// execute them.
//
// A relayed operation becomes a job queued for the session its locator
// names. Add-in runtimes long-poll for jobs routed to their own session,
// execute them, and post the outcome back, which wakes the waiting
// submitter. Jobs are matched FIFO.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sheetbridge_common::protocol::rpc_methods::OperationKind;
use sheetbridge_common::types::SessionLocator;
use tokio::sync::{oneshot, Notify};
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

/// One relayed operation as handed to an add-in runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayJob {
    pub id: Uuid,
    pub operation: OperationKind,
    pub method: String,
    pub params: Value,
}

impl RelayJob {
    fn new(operation: OperationKind, params: Value) -> Self {
        Self { id: Uuid::new_v4(), operation, method: operation.rpc_method().to_string(), params }
    }

    pub fn target(&self) -> SessionLocator {
        SessionLocator::from_params(&self.params)
    }
}

/// What an add-in runtime reports after executing a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    #[error("relay job {job_id} was not completed within {after:?}")]
    TimedOut { job_id: Uuid, after: Duration },

    #[error("relay job {0} was dropped before it completed")]
    Abandoned(Uuid),

    #[error("relay job {0} is unknown or already finished")]
    UnknownJob(Uuid),
}

#[derive(Debug, Clone)]
pub struct RelayHub {
    inner: Arc<HubInner>,
}

#[derive(Debug)]
struct HubInner {
    state: Mutex<HubState>,
    job_arrived: Notify,
    job_timeout: Duration,
}

#[derive(Debug, Default)]
struct HubState {
    queued: VecDeque<QueuedJob>,
    waiting: HashMap<Uuid, oneshot::Sender<JobOutcome>>,
}

#[derive(Debug)]
struct QueuedJob {
    job: RelayJob,
    target: SessionLocator,
}

impl RelayHub {
    pub fn new(job_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(HubInner {
                state: Mutex::new(HubState::default()),
                job_arrived: Notify::new(),
                job_timeout,
            }),
        }
    }

    pub fn job_timeout(&self) -> Duration {
        self.inner.job_timeout
    }

    /// Queue an operation and wait for an add-in to report its outcome.
    ///
    /// Dropping the returned future withdraws the job if it has not been
    /// claimed yet and discards any late outcome.
    pub async fn submit(&self, operation: OperationKind, params: Value) -> Result<JobOutcome, HubError> {
        let job = RelayJob::new(operation, params);
        let job_id = job.id;
        let target = job.target();
        let (sender, receiver) = oneshot::channel();

        {
            let mut state = self.lock_state();
            state.waiting.insert(job_id, sender);
            state.queued.push_back(QueuedJob { job, target: target.clone() });
        }
        let _withdraw = WithdrawOnDrop { hub: self, job_id };
        self.inner.job_arrived.notify_waiters();

        debug!(
            %job_id,
            %operation,
            workbook_id = target.workbook_id.as_deref(),
            session_id = target.session_id.as_deref(),
            "relay job queued"
        );

        match tokio::time::timeout(self.inner.job_timeout, receiver).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(_)) => Err(HubError::Abandoned(job_id)),
            Err(_) => {
                warn!(%job_id, %operation, "relay job timed out");
                Err(HubError::TimedOut { job_id, after: self.inner.job_timeout })
            }
        }
    }

    /// Hand the oldest job routed to `session` to its runtime, waiting up to
    /// `wait` for one to arrive.
    pub async fn claim(&self, session: &SessionLocator, wait: Duration) -> Option<RelayJob> {
        let deadline = Instant::now() + wait;
        loop {
            // Register interest before checking the queue so a job queued in
            // between still wakes this poll.
            let notified = self.inner.job_arrived.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(job) = self.take_next(session) {
                debug!(job_id = %job.id, operation = %job.operation, "relay job claimed");
                return Some(job);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return None;
            }
        }
    }

    /// Deliver an add-in's outcome to the waiting submitter.
    pub fn complete(&self, job_id: Uuid, outcome: JobOutcome) -> Result<(), HubError> {
        let sender = {
            let mut state = self.lock_state();
            state.queued.retain(|queued| queued.job.id != job_id);
            state.waiting.remove(&job_id)
        };
        let sender = sender.ok_or(HubError::UnknownJob(job_id))?;
        sender.send(outcome).map_err(|_| HubError::Abandoned(job_id))
    }

    pub fn queued_len(&self) -> usize {
        self.lock_state().queued.len()
    }

    pub fn waiting_len(&self) -> usize {
        self.lock_state().waiting.len()
    }

    fn take_next(&self, session: &SessionLocator) -> Option<RelayJob> {
        let mut state = self.lock_state();
        let position = state.queued.iter().position(|queued| queued.target.routes_to(session))?;
        state.queued.remove(position).map(|queued| queued.job)
    }

    fn withdraw(&self, job_id: Uuid) {
        let mut state = self.lock_state();
        state.queued.retain(|queued| queued.job.id != job_id);
        state.waiting.remove(&job_id);
    }

    fn lock_state(&self) -> MutexGuard<'_, HubState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct WithdrawOnDrop<'a> {
    hub: &'a RelayHub,
    job_id: Uuid,
}

impl Drop for WithdrawOnDrop<'_> {
    fn drop(&mut self) {
        self.hub.withdraw(self.job_id);
    }
}
