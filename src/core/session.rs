use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use super::chart::{ChartLabels, ChartView};
use super::client::{RequestId, RequestStatus, SimulationClient, SimulationEngine};
use super::debounce::Debouncer;
use super::params::{Fraction, ParameterStore, Parameters};
use super::summary::PlanSummary;
use super::types::{SimulationRequest, SimulationResponse};
use crate::config::SessionConfig;

/// Raw input from the wizard's widgets.
#[derive(Clone, Debug, PartialEq)]
pub enum ParameterEvent {
    CurrentSavings(String),
    MonthlyIncome(String),
    GoalKnown(bool),
    GoalPrice(String),
    SavedFraction(f64),
    RiskPreference(f64),
}

/// One user's planning session: parameters, slider stabilization and the
/// request pipeline feeding the charts.
///
/// Monetary and goal inputs re-issue the simulation immediately; the two
/// sliders only do so once their debouncer settles. Requests are derived
/// from the live store values with the sliders replaced by their settled
/// positions.
pub struct Session<E> {
    store: ParameterStore,
    settled_saved_fraction: Fraction,
    settled_risk_preference: Fraction,
    saved_fraction_slider: Debouncer<Fraction>,
    saved_fraction_settled: mpsc::UnboundedReceiver<Fraction>,
    risk_preference_slider: Debouncer<Fraction>,
    risk_preference_settled: mpsc::UnboundedReceiver<Fraction>,
    client: SimulationClient<E>,
    last_issued: Option<SimulationRequest>,
}

impl<E: SimulationEngine> Session<E> {
    pub fn new(engine: Arc<E>, config: SessionConfig) -> Self {
        let (saved_fraction_slider, saved_fraction_settled) = Debouncer::new(config.debounce_window);
        let (risk_preference_slider, risk_preference_settled) =
            Debouncer::new(config.debounce_window);
        Session {
            store: ParameterStore::new(Parameters::new(
                config.initial_saved_fraction,
                config.initial_risk_preference,
            )),
            settled_saved_fraction: config.initial_saved_fraction,
            settled_risk_preference: config.initial_risk_preference,
            saved_fraction_slider,
            saved_fraction_settled,
            risk_preference_slider,
            risk_preference_settled,
            client: SimulationClient::new(engine),
            last_issued: None,
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            parameters: self.store.subscribe(),
            responses: self.client.slot().subscribe(),
            status: self.client.status(),
        }
    }

    /// Parameters as the simulation sees them.
    pub fn stabilized_parameters(&self) -> Parameters {
        let mut params = self.store.snapshot();
        params.saved_fraction = self.settled_saved_fraction;
        params.risk_preference = self.settled_risk_preference;
        params
    }

    /// Applies one widget event. Must be called from within a tokio runtime.
    pub fn apply(&mut self, event: ParameterEvent) -> Option<RequestId> {
        debug!(?event, "applying parameter event");
        match event {
            ParameterEvent::CurrentSavings(raw) => {
                self.store.set_current_savings(&raw);
            }
            ParameterEvent::MonthlyIncome(raw) => {
                self.store.set_monthly_income(&raw);
            }
            ParameterEvent::GoalKnown(known) => {
                self.store.set_goal_known(known);
            }
            ParameterEvent::GoalPrice(raw) => {
                self.store.set_goal_price(&raw);
            }
            ParameterEvent::SavedFraction(raw) => {
                self.store.set_saved_fraction(raw);
                self.saved_fraction_slider.push(self.store.saved_fraction());
                return None;
            }
            ParameterEvent::RiskPreference(raw) => {
                self.store.set_risk_preference(raw);
                self.risk_preference_slider.push(self.store.risk_preference());
                return None;
            }
        }
        self.refresh()
    }

    /// Processes widget events and settled slider values until `events`
    /// closes. Pending slider timers and the in-flight request are torn
    /// down with the session.
    pub async fn run(mut self, mut events: mpsc::Receiver<ParameterEvent>) {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        self.apply(event);
                    }
                    None => break,
                },
                Some(value) = self.saved_fraction_settled.recv() => {
                    self.settled_saved_fraction = value;
                    self.refresh();
                }
                Some(value) = self.risk_preference_settled.recv() => {
                    self.settled_risk_preference = value;
                    self.refresh();
                }
            }
        }
        info!("planning session closed");
    }

    fn refresh(&mut self) -> Option<RequestId> {
        let request = self.stabilized_parameters().simulation_request()?;
        if self.last_issued.as_ref() == Some(&request) {
            return None;
        }
        self.last_issued = Some(request.clone());
        Some(self.client.submit(request))
    }
}

/// Read side of a session, for whoever draws the wizard.
#[derive(Clone, Debug)]
pub struct SessionView {
    parameters: watch::Receiver<Parameters>,
    responses: watch::Receiver<Option<Arc<SimulationResponse>>>,
    status: watch::Receiver<RequestStatus>,
}

impl SessionView {
    /// Live parameters, including sliders still being dragged.
    pub fn parameters(&self) -> Parameters {
        *self.parameters.borrow()
    }

    pub fn summary(&self) -> Option<PlanSummary> {
        PlanSummary::from_parameters(&self.parameters())
    }

    pub fn status(&self) -> RequestStatus {
        self.status.borrow().clone()
    }

    pub fn latest_response(&self) -> Option<Arc<SimulationResponse>> {
        self.responses.borrow().clone()
    }

    pub fn chart_view(&self, labels: &ChartLabels) -> ChartView {
        let latest = self.latest_response();
        ChartView::project(latest.as_deref(), &self.status(), labels)
    }

    /// Waits until the latest request resolves or fails. Returns `None` if
    /// the session is gone.
    pub async fn settled(&mut self) -> Option<RequestStatus> {
        self.status
            .wait_for(RequestStatus::is_settled)
            .await
            .ok()
            .map(|status| status.clone())
    }
}
