use serde::{Deserialize, Serialize};

/// Whether the user is saving toward a known purchase price.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum GoalMode {
    GoalFree,
    GoalSet { price: u64 },
}

impl GoalMode {
    pub fn price(self) -> Option<u64> {
        match self {
            GoalMode::GoalFree => None,
            GoalMode::GoalSet { price } => Some(price),
        }
    }

    pub fn is_goal_set(self) -> bool {
        matches!(self, GoalMode::GoalSet { .. })
    }
}

impl From<Option<u64>> for GoalMode {
    fn from(value: Option<u64>) -> Self {
        match value {
            Some(price) => GoalMode::GoalSet { price },
            None => GoalMode::GoalFree,
        }
    }
}

/// One simulation request, derived from the session parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationRequest {
    pub initial_investment: u64,
    pub monthly_addition: u64,
    pub bond_fraction: f64,
    pub goal: GoalMode,
}

/// JSON body posted to the simulation engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    pub initial_investment: u64,
    pub monthly_addition: u64,
    pub bond_fraction: f64,
    pub goal_price: Option<u64>,
}

impl From<&SimulationRequest> for RequestBody {
    fn from(value: &SimulationRequest) -> Self {
        RequestBody {
            initial_investment: value.initial_investment,
            monthly_addition: value.monthly_addition,
            bond_fraction: value.bond_fraction,
            goal_price: value.goal.price(),
        }
    }
}

impl From<RequestBody> for SimulationRequest {
    fn from(value: RequestBody) -> Self {
        SimulationRequest {
            initial_investment: value.initial_investment,
            monthly_addition: value.monthly_addition,
            bond_fraction: value.bond_fraction,
            goal: value.goal_price.into(),
        }
    }
}

/// JSON body returned by the simulation engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResponseBody {
    pub success_probability: Option<Vec<f64>>,
    pub gain_probability: Vec<f64>,
    pub loss_probability: Vec<f64>,
    pub bank_trajectory: Vec<f64>,
    pub scenarios: Vec<ScenarioBody>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioBody {
    pub savings_trajectory: Vec<f64>,
    pub goal_trajectory: Option<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResponseShapeError {
    #[error("goal-set response is missing success_probability")]
    MissingSuccessProbability,
    #[error("goal-set response scenario {index} is missing goal_trajectory")]
    MissingGoalTrajectory { index: usize },
}

#[derive(Clone, Debug, PartialEq)]
pub struct GoalPath {
    pub savings: Vec<f64>,
    pub goal: Vec<f64>,
}

/// The goal-dependent half of a response. Goal-free and goal-set data
/// cannot coexist in one value.
#[derive(Clone, Debug, PartialEq)]
pub enum GoalOutcome {
    Free {
        savings_paths: Vec<Vec<f64>>,
    },
    Set {
        price: u64,
        success_probability: Vec<f64>,
        paths: Vec<GoalPath>,
    },
}

/// An accepted simulation response, checked against the goal mode of the
/// request that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationResponse {
    pub gain_probability: Vec<f64>,
    pub loss_probability: Vec<f64>,
    pub bank_trajectory: Vec<f64>,
    pub outcome: GoalOutcome,
}

impl SimulationResponse {
    pub fn from_body(body: ResponseBody, goal: GoalMode) -> Result<Self, ResponseShapeError> {
        let outcome = match goal {
            GoalMode::GoalFree => GoalOutcome::Free {
                savings_paths: body
                    .scenarios
                    .into_iter()
                    .map(|scenario| scenario.savings_trajectory)
                    .collect(),
            },
            GoalMode::GoalSet { price } => {
                let success_probability = body
                    .success_probability
                    .ok_or(ResponseShapeError::MissingSuccessProbability)?;
                let paths = body
                    .scenarios
                    .into_iter()
                    .enumerate()
                    .map(|(index, scenario)| {
                        let goal = scenario
                            .goal_trajectory
                            .ok_or(ResponseShapeError::MissingGoalTrajectory { index })?;
                        Ok(GoalPath {
                            savings: scenario.savings_trajectory,
                            goal,
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                GoalOutcome::Set {
                    price,
                    success_probability,
                    paths,
                }
            }
        };

        Ok(SimulationResponse {
            gain_probability: body.gain_probability,
            loss_probability: body.loss_probability,
            bank_trajectory: body.bank_trajectory,
            outcome,
        })
    }

    pub fn goal_mode(&self) -> GoalMode {
        match &self.outcome {
            GoalOutcome::Free { .. } => GoalMode::GoalFree,
            GoalOutcome::Set { price, .. } => GoalMode::GoalSet { price: *price },
        }
    }

    pub fn scenario_count(&self) -> usize {
        match &self.outcome {
            GoalOutcome::Free { savings_paths } => savings_paths.len(),
            GoalOutcome::Set { paths, .. } => paths.len(),
        }
    }
}
