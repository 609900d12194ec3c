//! In-process engine doubles shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::client::{ClientError, SimulationEngine};
use super::types::{GoalMode, GoalOutcome, GoalPath, SimulationRequest, SimulationResponse};

type Scripted = (Duration, Result<SimulationResponse, ClientError>);

/// Answers each request with a scripted result after a scripted delay.
/// Scripts are keyed by `monthly_addition` so tests do not depend on which
/// superseded requests actually reached the engine.
#[derive(Default)]
pub struct ScriptedEngine {
    scripts: Mutex<HashMap<u64, VecDeque<Scripted>>>,
    calls: Mutex<Vec<SimulationRequest>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_to(
        &self,
        monthly_addition: u64,
        delay: Duration,
        result: Result<SimulationResponse, ClientError>,
    ) {
        self.scripts
            .lock()
            .expect("scripts lock")
            .entry(monthly_addition)
            .or_default()
            .push_back((delay, result));
    }

    pub fn calls(&self) -> Vec<SimulationRequest> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl SimulationEngine for ScriptedEngine {
    async fn simulate(&self, request: &SimulationRequest) -> Result<SimulationResponse, ClientError> {
        self.calls.lock().expect("calls lock").push(request.clone());
        let scripted = self
            .scripts
            .lock()
            .expect("scripts lock")
            .get_mut(&request.monthly_addition)
            .and_then(VecDeque::pop_front);
        let (delay, result) = match scripted {
            Some(scripted) => scripted,
            None => (Duration::from_millis(10), Ok(echo_response(request))),
        };
        tokio::time::sleep(delay).await;
        result
    }
}

pub fn sample_request(monthly_addition: u64) -> SimulationRequest {
    SimulationRequest {
        initial_investment: 10_000,
        monthly_addition,
        bond_fraction: 0.7,
        goal: GoalMode::GoalFree,
    }
}

pub fn goal_free_response() -> SimulationResponse {
    SimulationResponse {
        gain_probability: vec![0.1, 0.2],
        loss_probability: vec![0.9, 0.8],
        bank_trajectory: vec![10_000.0, 12_500.0],
        outcome: GoalOutcome::Free {
            savings_paths: vec![vec![10_000.0, 12_600.0], vec![10_000.0, 12_300.0]],
        },
    }
}

pub fn goal_set_response() -> SimulationResponse {
    SimulationResponse {
        gain_probability: vec![0.1, 0.2],
        loss_probability: vec![0.9, 0.8],
        bank_trajectory: vec![10_000.0, 12_500.0],
        outcome: GoalOutcome::Set {
            price: 50_000,
            success_probability: vec![0.05, 0.1],
            paths: vec![
                GoalPath {
                    savings: vec![10_000.0, 12_600.0],
                    goal: vec![50_000.0, 50_100.0],
                },
                GoalPath {
                    savings: vec![10_000.0, 12_300.0],
                    goal: vec![50_000.0, 50_100.0],
                },
            ],
        },
    }
}

/// Default answer for unscripted requests: shaped after the request's goal
/// mode, with the bank baseline starting at the initial investment.
pub fn echo_response(request: &SimulationRequest) -> SimulationResponse {
    let mut response = match request.goal {
        GoalMode::GoalFree => goal_free_response(),
        GoalMode::GoalSet { price } => {
            let mut response = goal_set_response();
            if let GoalOutcome::Set { price: scripted, .. } = &mut response.outcome {
                *scripted = price;
            }
            response
        }
    };
    let start = request.initial_investment as f64;
    response.bank_trajectory = vec![start, start + request.monthly_addition as f64];
    response
}
