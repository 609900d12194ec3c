use axum::{
    Router,
    extract::Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::{ENGINE_TIMEOUT_ENV, ENGINE_URL_ENV, EngineConfig, SessionConfig};
use crate::core::{
    ChartLabels, ChartView, DEFAULT_CURRENCY_SUFFIX, Fraction, HttpEngine, ParameterEvent,
    RequestBody, RequestStatus, ResponseBody, ScenarioBody, Session, SimulationRequest,
    SummaryText,
};

const STUB_MONTHS: usize = 50 * 12;
const STUB_SCENARIOS: usize = 10;
const STUB_ANNUAL_INFLATION: f64 = 0.025;

#[derive(Parser, Debug)]
#[command(
    name = "hypofin",
    about = "Savings planner: preview simulation charts against a scenario engine"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one planning session and print the plan summary and charts as JSON
    Preview(PreviewArgs),
    /// Serve a deterministic stand-in for the scenario engine
    StubEngine {
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
}

#[derive(Args, Debug, Clone)]
struct PreviewArgs {
    #[arg(long, env = "HYPOFIN_ENGINE_URL", help = "Scenario engine endpoint")]
    engine_url: String,
    #[arg(
        long,
        env = "HYPOFIN_ENGINE_TIMEOUT_MS",
        help = "Engine request timeout in milliseconds [default: 30000]"
    )]
    timeout_ms: Option<u64>,
    #[arg(long, help = "Current savings, whole currency units")]
    savings: u64,
    #[arg(long, help = "Monthly income, whole currency units")]
    income: u64,
    #[arg(
        long,
        default_value_t = 0.5,
        help = "Share of monthly income saved, between 0 and 1"
    )]
    saved_fraction: f64,
    #[arg(
        long,
        default_value_t = 0.5,
        help = "Share of savings in higher-variance assets, between 0 and 1"
    )]
    risk_preference: f64,
    #[arg(long, help = "Price of the savings goal; omit when there is no known goal")]
    goal_price: Option<u64>,
}

#[derive(Debug)]
struct Preview {
    engine: EngineConfig,
    session: SessionConfig,
    events: Vec<ParameterEvent>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PreviewReport {
    summary: Option<SummaryText>,
    status: RequestStatus,
    chart: ChartView,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub async fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Command::Preview(args) => {
            let preview = build_preview(args)?;
            let report = run_preview(preview).await?;
            let json = serde_json::to_string_pretty(&report)
                .map_err(|e| format!("failed to encode report: {e}"))?;
            println!("{json}");
            Ok(())
        }
        Command::StubEngine { port } => run_stub_engine(port)
            .await
            .map_err(|e| format!("Server error: {e}")),
    }
}

fn build_preview(args: PreviewArgs) -> Result<Preview, String> {
    let timeout_ms = args.timeout_ms.map(|ms| ms.to_string());
    let engine = EngineConfig::from_lookup(|key| match key {
        ENGINE_URL_ENV => Some(args.engine_url.clone()),
        ENGINE_TIMEOUT_ENV => timeout_ms.clone(),
        _ => None,
    })
    .map_err(|e| e.to_string())?;

    if !(0.0..=1.0).contains(&args.saved_fraction) {
        return Err("--saved-fraction must be between 0 and 1".to_string());
    }

    if !(0.0..=1.0).contains(&args.risk_preference) {
        return Err("--risk-preference must be between 0 and 1".to_string());
    }

    let mut events = vec![
        ParameterEvent::CurrentSavings(args.savings.to_string()),
        ParameterEvent::MonthlyIncome(args.income.to_string()),
    ];
    match args.goal_price {
        Some(price) => {
            events.push(ParameterEvent::GoalKnown(true));
            events.push(ParameterEvent::GoalPrice(price.to_string()));
        }
        None => events.push(ParameterEvent::GoalKnown(false)),
    }

    Ok(Preview {
        engine,
        session: SessionConfig {
            initial_saved_fraction: Fraction::clamped(args.saved_fraction),
            initial_risk_preference: Fraction::clamped(args.risk_preference),
            ..SessionConfig::default()
        },
        events,
    })
}

async fn run_preview(preview: Preview) -> Result<PreviewReport, String> {
    let engine = HttpEngine::new(preview.engine.endpoint, preview.engine.timeout)
        .map_err(|e| format!("failed to build engine client: {e}"))?;
    info!(endpoint = %engine.endpoint(), "previewing plan");
    let mut session = Session::new(Arc::new(engine), preview.session);
    let mut view = session.view();
    for event in preview.events {
        session.apply(event);
    }
    let status = view
        .settled()
        .await
        .ok_or_else(|| "session ended before the simulation settled".to_string())?;

    Ok(PreviewReport {
        summary: view
            .summary()
            .map(|summary| summary.text(DEFAULT_CURRENCY_SUFFIX)),
        status,
        chart: view.chart_view(&ChartLabels::default()),
    })
}

pub fn stub_router() -> Router {
    Router::new()
        .route("/", post(stub_simulate_handler))
        .fallback(not_found_handler)
}

pub async fn run_stub_engine(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "stub scenario engine listening");
    axum::serve(listener, stub_router()).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn stub_simulate_handler(Json(body): Json<RequestBody>) -> Response {
    if !(0.0..=1.0).contains(&body.bond_fraction) {
        return error_response(
            StatusCode::BAD_REQUEST,
            "bond_fraction must be between 0 and 1",
        );
    }
    let request = SimulationRequest::from(body);
    json_response(StatusCode::OK, stub_response(&request))
}

/// A fixed fan of blended stock/bond growth paths, one per scenario.
fn stub_response(request: &SimulationRequest) -> ResponseBody {
    let initial = request.initial_investment as f64;
    let monthly = request.monthly_addition as f64;
    let bond_fraction = request.bond_fraction;

    let bank_trajectory: Vec<f64> = (0..=STUB_MONTHS)
        .map(|month| initial + monthly * month as f64)
        .collect();
    let goal_trajectory: Option<Vec<f64>> = request.goal.price().map(|price| {
        (0..=STUB_MONTHS)
            .map(|month| price as f64 * (1.0 + STUB_ANNUAL_INFLATION).powf(month as f64 / 12.0))
            .collect()
    });

    let savings_paths: Vec<Vec<f64>> = (0..STUB_SCENARIOS)
        .map(|scenario| {
            let spread = scenario as f64 / (STUB_SCENARIOS - 1) as f64;
            let stock_annual = -0.02 + 0.14 * spread;
            let bond_annual = 0.02 + 0.02 * spread;
            let annual = bond_fraction * bond_annual + (1.0 - bond_fraction) * stock_annual;
            let monthly_return = (1.0 + annual).powf(1.0 / 12.0) - 1.0;
            let mut path = Vec::with_capacity(STUB_MONTHS + 1);
            let mut balance = initial;
            path.push(balance);
            for _ in 0..STUB_MONTHS {
                balance = balance * (1.0 + monthly_return) + monthly;
                path.push(balance);
            }
            path
        })
        .collect();

    let share = |hits: usize| hits as f64 / STUB_SCENARIOS as f64;
    let gain_probability: Vec<f64> = (0..=STUB_MONTHS)
        .map(|month| {
            share(
                savings_paths
                    .iter()
                    .filter(|path| path[month] > bank_trajectory[month])
                    .count(),
            )
        })
        .collect();
    let loss_probability = gain_probability.iter().map(|gain| 1.0 - gain).collect();

    let success_probability = goal_trajectory.as_ref().map(|goal| {
        // Reaching the goal once counts as success from then on.
        let reached_at: Vec<Option<usize>> = savings_paths
            .iter()
            .map(|path| (0..=STUB_MONTHS).find(|&month| path[month] >= goal[month]))
            .collect();
        (0..=STUB_MONTHS)
            .map(|month| {
                share(
                    reached_at
                        .iter()
                        .filter(|reached| reached.is_some_and(|at| at <= month))
                        .count(),
                )
            })
            .collect()
    });

    ResponseBody {
        success_probability,
        gain_probability,
        loss_probability,
        bank_trajectory,
        scenarios: savings_paths
            .into_iter()
            .map(|savings_trajectory| ScenarioBody {
                savings_trajectory,
                goal_trajectory: goal_trajectory.clone(),
            })
            .collect(),
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
