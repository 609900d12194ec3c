use serde::Serialize;

use super::client::RequestStatus;
use super::types::{GoalMode, GoalOutcome, SimulationResponse};

/// Probability axis range, fixed so the chart does not jump between updates.
pub const PROBABILITY_RANGE: [f64; 2] = [-0.05, 1.05];

const GAIN_COLOR: &str = "#2ca02c";
const LOSS_COLOR: &str = "#d62728";
const SUCCESS_COLOR: &str = "#1f77b4";
const BANK_COLOR: &str = "#ff7f0e";
const SAVINGS_COLOR: &str = "#7f7f7f";
const GOAL_COLOR: &str = "#9467bd";

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeriesRole {
    Gain,
    Loss,
    Success,
    Bank,
    Savings,
    Goal,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Emphasis {
    Primary,
    Muted,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Series {
    pub role: SeriesRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub color: &'static str,
    pub emphasis: Emphasis,
    pub show_legend: bool,
    pub values: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSpec {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_range: Option<[f64; 2]>,
    pub series: Vec<Series>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSpecs {
    pub goal_mode: GoalMode,
    pub probability: ChartSpec,
    pub trajectory: ChartSpec,
}

/// User-facing chart text.
#[derive(Clone, Debug)]
pub struct ChartLabels {
    pub probability_title: String,
    pub trajectory_title: String,
    pub months_axis: String,
    pub probability_axis: String,
    pub amount_axis: String,
    pub gain: String,
    pub loss: String,
    pub success: String,
    pub bank: String,
    pub savings: String,
    pub goal: String,
}

impl Default for ChartLabels {
    fn default() -> Self {
        ChartLabels {
            probability_title: "Probabilities".to_string(),
            trajectory_title: "Savings over time".to_string(),
            months_axis: "Months".to_string(),
            probability_axis: "Probability".to_string(),
            amount_axis: "Amount".to_string(),
            gain: "Chance of gain".to_string(),
            loss: "Chance of loss".to_string(),
            success: "Chance of reaching the goal".to_string(),
            bank: "Bank deposit".to_string(),
            savings: "Possible outcomes".to_string(),
            goal: "Goal price".to_string(),
        }
    }
}

/// What the chart area shows.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "lowercase")]
pub enum ChartView {
    /// No response has been accepted yet.
    Hidden,
    Failed { message: String },
    Charts(ChartSpecs),
}

impl ChartView {
    /// A failure replaces the charts with a failure indicator until a later
    /// request resolves; otherwise a pending request keeps showing the last
    /// accepted response.
    pub fn project(
        latest: Option<&SimulationResponse>,
        status: &RequestStatus,
        labels: &ChartLabels,
    ) -> ChartView {
        match (status, latest) {
            (RequestStatus::Failed { message, .. }, _)
            | (
                RequestStatus::Pending {
                    last_failure: Some(message),
                    ..
                },
                _,
            ) => ChartView::Failed {
                message: message.clone(),
            },
            (_, Some(response)) => ChartView::Charts(render(response, labels)),
            (_, None) => ChartView::Hidden,
        }
    }
}

pub fn render(response: &SimulationResponse, labels: &ChartLabels) -> ChartSpecs {
    ChartSpecs {
        goal_mode: response.goal_mode(),
        probability: probability_chart(response, labels),
        trajectory: trajectory_chart(response, labels),
    }
}

fn probability_chart(response: &SimulationResponse, labels: &ChartLabels) -> ChartSpec {
    let series = match &response.outcome {
        GoalOutcome::Free { .. } => vec![
            labeled(SeriesRole::Gain, &labels.gain, GAIN_COLOR, &response.gain_probability),
            labeled(SeriesRole::Loss, &labels.loss, LOSS_COLOR, &response.loss_probability),
        ],
        GoalOutcome::Set {
            success_probability,
            ..
        } => vec![labeled(
            SeriesRole::Success,
            &labels.success,
            SUCCESS_COLOR,
            success_probability,
        )],
    };

    ChartSpec {
        title: labels.probability_title.clone(),
        x_label: labels.months_axis.clone(),
        y_label: labels.probability_axis.clone(),
        y_range: Some(PROBABILITY_RANGE),
        series,
    }
}

fn trajectory_chart(response: &SimulationResponse, labels: &ChartLabels) -> ChartSpec {
    let mut series = vec![labeled(
        SeriesRole::Bank,
        &labels.bank,
        BANK_COLOR,
        &response.bank_trajectory,
    )];

    match &response.outcome {
        GoalOutcome::Free { savings_paths } => {
            series.extend(muted_group(
                SeriesRole::Savings,
                &labels.savings,
                SAVINGS_COLOR,
                savings_paths.iter().map(Vec::as_slice),
            ));
        }
        GoalOutcome::Set { paths, .. } => {
            series.extend(muted_group(
                SeriesRole::Savings,
                &labels.savings,
                SAVINGS_COLOR,
                paths.iter().map(|path| path.savings.as_slice()),
            ));
            series.extend(muted_group(
                SeriesRole::Goal,
                &labels.goal,
                GOAL_COLOR,
                paths.iter().map(|path| path.goal.as_slice()),
            ));
        }
    }

    ChartSpec {
        title: labels.trajectory_title.clone(),
        x_label: labels.months_axis.clone(),
        y_label: labels.amount_axis.clone(),
        y_range: None,
        series,
    }
}

fn labeled(role: SeriesRole, name: &str, color: &'static str, values: &[f64]) -> Series {
    Series {
        role,
        name: Some(name.to_string()),
        color,
        emphasis: Emphasis::Primary,
        show_legend: true,
        values: values.to_vec(),
    }
}

/// One muted series per path; only the first carries a name and legend entry.
fn muted_group<'a>(
    role: SeriesRole,
    name: &'a str,
    color: &'static str,
    paths: impl Iterator<Item = &'a [f64]> + 'a,
) -> impl Iterator<Item = Series> + 'a {
    paths.enumerate().map(move |(index, values)| {
        let first = index == 0;
        Series {
            role,
            name: first.then(|| name.to_string()),
            color,
            emphasis: Emphasis::Muted,
            show_legend: first,
            values: values.to_vec(),
        }
    })
}
