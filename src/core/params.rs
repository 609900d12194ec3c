use tokio::sync::watch;

use super::types::{GoalMode, SimulationRequest};

/// A slider position, always within [0, 1].
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd)]
pub struct Fraction(f64);

impl Fraction {
    pub const ZERO: Fraction = Fraction(0.0);
    pub const ONE: Fraction = Fraction(1.0);

    /// Clamps any raw slider value into [0, 1]. NaN maps to 0.
    pub fn clamped(raw: f64) -> Self {
        if raw.is_nan() {
            return Fraction::ZERO;
        }
        Fraction(raw.clamp(0.0, 1.0))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn complement(self) -> Self {
        Fraction(1.0 - self.0)
    }
}

/// Answer to "do you know what you are saving for?".
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GoalAnswer {
    #[default]
    Unknown,
    Known {
        price: Option<u64>,
    },
    NotKnown,
}

impl GoalAnswer {
    pub fn goal_known(self) -> Option<bool> {
        match self {
            GoalAnswer::Unknown => None,
            GoalAnswer::Known { .. } => Some(true),
            GoalAnswer::NotKnown => Some(false),
        }
    }

    pub fn goal_price(self) -> Option<u64> {
        match self {
            GoalAnswer::Known { price } => price,
            GoalAnswer::Unknown | GoalAnswer::NotKnown => None,
        }
    }

    pub fn goal_mode(self) -> GoalMode {
        self.goal_price().into()
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Parameters {
    pub current_savings: Option<u64>,
    pub monthly_income: Option<u64>,
    pub goal: GoalAnswer,
    pub saved_fraction: Fraction,
    pub risk_preference: Fraction,
}

impl Parameters {
    pub fn new(saved_fraction: Fraction, risk_preference: Fraction) -> Self {
        Parameters {
            current_savings: None,
            monthly_income: None,
            goal: GoalAnswer::Unknown,
            saved_fraction,
            risk_preference,
        }
    }

    /// Monthly amount put aside, rounded to whole currency units.
    pub fn monthly_savings(&self) -> Option<u64> {
        self.monthly_income
            .map(|income| (income as f64 * self.saved_fraction.value()).round() as u64)
    }

    /// Returns `None` until both monetary inputs are set.
    pub fn simulation_request(&self) -> Option<SimulationRequest> {
        let initial_investment = self.current_savings?;
        let monthly_addition = self.monthly_savings()?;
        Some(SimulationRequest {
            initial_investment,
            monthly_addition,
            bond_fraction: self.risk_preference.complement().value(),
            goal: self.goal.goal_mode(),
        })
    }
}

/// Coerces raw text from a money input into whole non-negative currency
/// units. Leading digits are kept (`"12.7"` is 12); text that does not
/// start with a digit is unset.
pub fn parse_money(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    let digits = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .map_or(trimmed, |end| &trimmed[..end]);
    if digits.is_empty() {
        return None;
    }
    // Saturate rather than drop absurdly long inputs.
    Some(digits.parse::<u64>().unwrap_or(u64::MAX))
}

/// The single source of truth for the session parameters. Setters only
/// coerce; subscribers are notified of every effective change.
#[derive(Debug)]
pub struct ParameterStore {
    tx: watch::Sender<Parameters>,
}

impl ParameterStore {
    pub fn new(initial: Parameters) -> Self {
        let (tx, _rx) = watch::channel(initial);
        ParameterStore { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<Parameters> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> Parameters {
        *self.tx.borrow()
    }

    pub fn current_savings(&self) -> Option<u64> {
        self.tx.borrow().current_savings
    }

    pub fn monthly_income(&self) -> Option<u64> {
        self.tx.borrow().monthly_income
    }

    pub fn goal(&self) -> GoalAnswer {
        self.tx.borrow().goal
    }

    pub fn saved_fraction(&self) -> Fraction {
        self.tx.borrow().saved_fraction
    }

    pub fn risk_preference(&self) -> Fraction {
        self.tx.borrow().risk_preference
    }

    pub fn set_current_savings(&self, raw: &str) -> bool {
        let value = parse_money(raw);
        self.update(|params| replace(&mut params.current_savings, value))
    }

    pub fn set_monthly_income(&self, raw: &str) -> bool {
        let value = parse_money(raw);
        self.update(|params| replace(&mut params.monthly_income, value))
    }

    /// Switching the answer away from "known" clears the goal price.
    pub fn set_goal_known(&self, known: bool) -> bool {
        self.update(|params| {
            let next = match (known, params.goal) {
                (true, GoalAnswer::Known { price }) => GoalAnswer::Known { price },
                (true, _) => GoalAnswer::Known { price: None },
                (false, _) => GoalAnswer::NotKnown,
            };
            replace(&mut params.goal, next)
        })
    }

    /// Ignored unless the goal is known; the price input only exists then.
    pub fn set_goal_price(&self, raw: &str) -> bool {
        let value = parse_money(raw);
        self.update(|params| match params.goal {
            GoalAnswer::Known { .. } => replace(&mut params.goal, GoalAnswer::Known { price: value }),
            GoalAnswer::Unknown | GoalAnswer::NotKnown => {
                tracing::debug!("goal price entered without a known goal, ignoring");
                false
            }
        })
    }

    pub fn set_saved_fraction(&self, raw: f64) -> bool {
        let value = Fraction::clamped(raw);
        self.update(|params| replace(&mut params.saved_fraction, value))
    }

    pub fn set_risk_preference(&self, raw: f64) -> bool {
        let value = Fraction::clamped(raw);
        self.update(|params| replace(&mut params.risk_preference, value))
    }

    fn update(&self, modify: impl FnOnce(&mut Parameters) -> bool) -> bool {
        self.tx.send_if_modified(modify)
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}
