mod chart;
mod client;
mod debounce;
mod params;
mod session;
mod summary;
#[cfg(test)]
mod testing;
mod types;

pub use chart::{
    ChartLabels, ChartSpec, ChartSpecs, ChartView, Emphasis, PROBABILITY_RANGE, Series,
    SeriesRole, render,
};
pub use client::{
    ClientError, HttpEngine, RequestId, RequestStatus, ResponseSlot, SimulationClient,
    SimulationEngine,
};
pub use debounce::{DEFAULT_QUIESCENCE_WINDOW, Debouncer};
pub use params::{Fraction, GoalAnswer, ParameterStore, Parameters, parse_money};
pub use session::{ParameterEvent, Session, SessionView};
pub use summary::{
    Allocation, DEFAULT_CURRENCY_SUFFIX, HoldingText, MonthlySplit, PlanSummary, SummaryText,
    format_money,
};
pub use types::{
    GoalMode, GoalOutcome, GoalPath, RequestBody, ResponseBody, ResponseShapeError,
    ScenarioBody, SimulationRequest, SimulationResponse,
};
