use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::types::{RequestBody, ResponseBody, ResponseShapeError, SimulationRequest, SimulationResponse};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("simulation engine unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("simulation engine answered with status {0}")]
    Status(u16),
    #[error("simulation engine returned an unexpected response: {0}")]
    Shape(#[from] ResponseShapeError),
}

/// The remote scenario engine, seen from the client.
#[async_trait]
pub trait SimulationEngine: Send + Sync + 'static {
    async fn simulate(&self, request: &SimulationRequest) -> Result<SimulationResponse, ClientError>;
}

/// POSTs requests to a separately deployed engine over HTTP.
#[derive(Clone, Debug)]
pub struct HttpEngine {
    http: reqwest::Client,
    endpoint: reqwest::Url,
}

impl HttpEngine {
    pub fn new(endpoint: reqwest::Url, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(HttpEngine { http, endpoint })
    }

    pub fn endpoint(&self) -> &reqwest::Url {
        &self.endpoint
    }
}

#[async_trait]
impl SimulationEngine for HttpEngine {
    async fn simulate(&self, request: &SimulationRequest) -> Result<SimulationResponse, ClientError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&RequestBody::from(request))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status.as_u16()));
        }
        let body = response.json::<ResponseBody>().await?;
        Ok(SimulationResponse::from_body(body, request.goal)?)
    }
}

/// Identifies one issued request; later requests have larger ids.
pub type RequestId = u64;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum RequestStatus {
    Idle,
    /// `last_failure` carries an unresolved failure forward until a request
    /// succeeds.
    Pending {
        id: RequestId,
        #[serde(skip_serializing_if = "Option::is_none")]
        last_failure: Option<String>,
    },
    Resolved { id: RequestId },
    Failed { id: RequestId, message: String },
}

impl RequestStatus {
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            RequestStatus::Resolved { .. } | RequestStatus::Failed { .. }
        )
    }
}

/// Holds the latest accepted response. Only the client writes to it.
#[derive(Debug)]
pub struct ResponseSlot {
    tx: watch::Sender<Option<Arc<SimulationResponse>>>,
}

impl ResponseSlot {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        ResponseSlot { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<SimulationResponse>>> {
        self.tx.subscribe()
    }

    pub fn latest(&self) -> Option<Arc<SimulationResponse>> {
        self.tx.borrow().clone()
    }

    fn accept(&self, response: SimulationResponse) {
        self.tx.send_replace(Some(Arc::new(response)));
    }
}

#[derive(Debug, Default)]
struct InFlight {
    generation: RequestId,
    handle: Option<JoinHandle<()>>,
}

#[derive(Debug)]
struct Shared {
    slot: ResponseSlot,
    status: watch::Sender<RequestStatus>,
    inflight: Mutex<InFlight>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, InFlight> {
        self.inflight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Issues simulation requests with at most one in flight.
///
/// `submit` aborts the previous task and bumps the generation under the
/// same lock a completing task must hold to publish, so a superseded
/// request can never reach the slot even if its network call finished.
pub struct SimulationClient<E> {
    engine: Arc<E>,
    shared: Arc<Shared>,
}

impl<E: SimulationEngine> SimulationClient<E> {
    pub fn new(engine: Arc<E>) -> Self {
        let (status, _rx) = watch::channel(RequestStatus::Idle);
        SimulationClient {
            engine,
            shared: Arc::new(Shared {
                slot: ResponseSlot::new(),
                status,
                inflight: Mutex::new(InFlight::default()),
            }),
        }
    }

    pub fn slot(&self) -> &ResponseSlot {
        &self.shared.slot
    }

    pub fn status(&self) -> watch::Receiver<RequestStatus> {
        self.shared.status.subscribe()
    }

    /// Cancels any pending request and issues `request`. Must be called
    /// from within a tokio runtime.
    pub fn submit(&self, request: SimulationRequest) -> RequestId {
        let mut inflight = self.shared.lock();
        if let Some(previous) = inflight.handle.take() {
            if !previous.is_finished() {
                debug!(request_id = inflight.generation, "cancelling superseded request");
            }
            previous.abort();
        }
        inflight.generation += 1;
        let id = inflight.generation;
        let last_failure = match &*self.shared.status.borrow() {
            RequestStatus::Failed { message, .. } => Some(message.clone()),
            RequestStatus::Pending { last_failure, .. } => last_failure.clone(),
            RequestStatus::Idle | RequestStatus::Resolved { .. } => None,
        };
        self.shared
            .status
            .send_replace(RequestStatus::Pending { id, last_failure });
        info!(
            request_id = id,
            initial_investment = request.initial_investment,
            monthly_addition = request.monthly_addition,
            bond_fraction = request.bond_fraction,
            goal_price = ?request.goal.price(),
            "issuing simulation request"
        );

        let engine = Arc::clone(&self.engine);
        let shared = Arc::clone(&self.shared);
        inflight.handle = Some(tokio::spawn(async move {
            let outcome = engine.simulate(&request).await;
            let mut inflight = shared.lock();
            if inflight.generation != id {
                debug!(request_id = id, "dropping result of superseded request");
                return;
            }
            inflight.handle = None;
            match outcome {
                Ok(response) => {
                    debug!(
                        request_id = id,
                        scenarios = response.scenario_count(),
                        "simulation resolved"
                    );
                    shared.slot.accept(response);
                    shared.status.send_replace(RequestStatus::Resolved { id });
                }
                Err(err) => {
                    warn!(request_id = id, error = %err, "simulation failed");
                    shared.status.send_replace(RequestStatus::Failed {
                        id,
                        message: err.to_string(),
                    });
                }
            }
        }));
        id
    }

    /// Cancels the pending request, if any, leaving the slot untouched.
    pub fn cancel(&self) {
        let mut inflight = self.shared.lock();
        if let Some(handle) = inflight.handle.take() {
            handle.abort();
            inflight.generation += 1;
            self.shared.status.send_replace(RequestStatus::Idle);
        }
    }
}

impl<E> Drop for SimulationClient<E> {
    fn drop(&mut self) {
        let mut inflight = self.shared.lock();
        if let Some(handle) = inflight.handle.take() {
            handle.abort();
        }
        inflight.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{ScriptedEngine, goal_free_response, goal_set_response, sample_request};
    use tokio::time::sleep;

    fn settled_response(client: &SimulationClient<ScriptedEngine>) -> Option<Arc<SimulationResponse>> {
        client.slot().latest()
    }

    #[tokio::test(start_paused = true)]
    async fn resolved_request_writes_slot() {
        let engine = Arc::new(ScriptedEngine::new());
        engine.respond_to(2_500, Duration::from_millis(50), Ok(goal_free_response()));
        let client = SimulationClient::new(Arc::clone(&engine));
        let mut status = client.status();

        let id = client.submit(sample_request(2_500));
        assert_eq!(
            *status.borrow_and_update(),
            RequestStatus::Pending {
                id,
                last_failure: None
            }
        );
        assert!(settled_response(&client).is_none());

        let settled = status
            .wait_for(RequestStatus::is_settled)
            .await
            .expect("client alive")
            .clone();
        assert_eq!(settled, RequestStatus::Resolved { id });
        assert_eq!(
            settled_response(&client).as_deref(),
            Some(&goal_free_response())
        );
        assert_eq!(engine.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn later_request_wins_even_when_earlier_resolves_last() {
        let engine = Arc::new(ScriptedEngine::new());
        let slow_a = goal_free_response();
        let mut fast_b = goal_free_response();
        fast_b.bank_trajectory = vec![1.0, 2.0];
        engine.respond_to(1_000, Duration::from_millis(300), Ok(slow_a));
        engine.respond_to(2_000, Duration::from_millis(50), Ok(fast_b.clone()));
        let client = SimulationClient::new(Arc::clone(&engine));

        client.submit(sample_request(1_000));
        sleep(Duration::from_millis(10)).await;
        let b = client.submit(sample_request(2_000));

        sleep(Duration::from_millis(500)).await;
        assert_eq!(settled_response(&client).as_deref(), Some(&fast_b));
        assert_eq!(*client.status().borrow(), RequestStatus::Resolved { id: b });
        assert_eq!(engine.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn earlier_resolution_is_replaced_by_later_request() {
        let engine = Arc::new(ScriptedEngine::new());
        let first = goal_free_response();
        let second = goal_set_response();
        engine.respond_to(1_000, Duration::from_millis(10), Ok(first.clone()));
        engine.respond_to(2_000, Duration::from_millis(10), Ok(second.clone()));
        let client = SimulationClient::new(Arc::clone(&engine));

        client.submit(sample_request(1_000));
        sleep(Duration::from_millis(50)).await;
        assert_eq!(settled_response(&client).as_deref(), Some(&first));

        client.submit(sample_request(2_000));
        sleep(Duration::from_millis(50)).await;
        assert_eq!(settled_response(&client).as_deref(), Some(&second));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_leaves_slot_unchanged_and_surfaces_status() {
        let engine = Arc::new(ScriptedEngine::new());
        engine.respond_to(1_000, Duration::from_millis(10), Ok(goal_free_response()));
        engine.respond_to(2_000, Duration::from_millis(10), Err(ClientError::Status(503)));
        let client = SimulationClient::new(Arc::clone(&engine));

        client.submit(sample_request(1_000));
        sleep(Duration::from_millis(50)).await;
        let failing = client.submit(sample_request(2_000));
        sleep(Duration::from_millis(50)).await;

        assert_eq!(
            settled_response(&client).as_deref(),
            Some(&goal_free_response())
        );
        match &*client.status().borrow() {
            RequestStatus::Failed { id, message } => {
                assert_eq!(*id, failing);
                assert!(message.contains("503"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failure_is_carried_into_retry_until_it_resolves() {
        let engine = Arc::new(ScriptedEngine::new());
        engine.respond_to(2_000, Duration::from_millis(10), Err(ClientError::Status(503)));
        engine.respond_to(3_000, Duration::from_millis(10), Ok(goal_free_response()));
        let client = SimulationClient::new(Arc::clone(&engine));

        client.submit(sample_request(2_000));
        sleep(Duration::from_millis(50)).await;
        let retry = client.submit(sample_request(3_000));
        match &*client.status().borrow() {
            RequestStatus::Pending { id, last_failure } => {
                assert_eq!(*id, retry);
                assert!(last_failure.as_deref().is_some_and(|m| m.contains("503")));
            }
            other => panic!("expected pending retry, got {other:?}"),
        }

        sleep(Duration::from_millis(50)).await;
        assert_eq!(*client.status().borrow(), RequestStatus::Resolved { id: retry });
        let next = client.submit(sample_request(1_000));
        assert_eq!(
            *client.status().borrow(),
            RequestStatus::Pending {
                id: next,
                last_failure: None
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_failure_is_never_surfaced() {
        let engine = Arc::new(ScriptedEngine::new());
        engine.respond_to(1_000, Duration::from_millis(20), Err(ClientError::Status(500)));
        engine.respond_to(2_000, Duration::from_millis(100), Ok(goal_free_response()));
        let client = SimulationClient::new(Arc::clone(&engine));
        let mut status = client.status();

        client.submit(sample_request(1_000));
        let latest = client.submit(sample_request(2_000));

        let settled = status
            .wait_for(RequestStatus::is_settled)
            .await
            .expect("client alive")
            .clone();
        assert_eq!(settled, RequestStatus::Resolved { id: latest });
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_and_drop_abort_without_writing() {
        let engine = Arc::new(ScriptedEngine::new());
        engine.respond_to(1_000, Duration::from_millis(100), Ok(goal_free_response()));
        engine.respond_to(1_000, Duration::from_millis(100), Ok(goal_free_response()));
        let client = SimulationClient::new(Arc::clone(&engine));
        let slot = client.slot().subscribe();

        client.submit(sample_request(1_000));
        client.cancel();
        assert_eq!(*client.status().borrow(), RequestStatus::Idle);
        sleep(Duration::from_millis(200)).await;
        assert!(slot.borrow().is_none());

        client.submit(sample_request(1_000));
        drop(client);
        sleep(Duration::from_millis(200)).await;
        assert!(slot.borrow().is_none());
    }
}
