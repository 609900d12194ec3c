use serde::Serialize;

use super::params::{Fraction, Parameters};

pub const DEFAULT_CURRENCY_SUFFIX: &str = " zł";

/// How the monthly income is split between saving and spending.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySplit {
    pub saved: u64,
    pub spent: u64,
}

impl MonthlySplit {
    pub fn new(monthly_income: u64, saved_fraction: Fraction) -> Self {
        let saved = (monthly_income as f64 * saved_fraction.value()).round() as u64;
        MonthlySplit {
            saved,
            spent: monthly_income.saturating_sub(saved),
        }
    }
}

/// Stock/bond split of the chosen plan, for the results step.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub stocks_percent: u8,
    pub bonds_percent: u8,
    pub initial_stocks: f64,
    pub initial_bonds: f64,
    pub monthly_stocks: f64,
    pub monthly_bonds: f64,
}

impl Allocation {
    pub fn new(
        current_savings: u64,
        monthly_income: u64,
        saved_fraction: Fraction,
        risk_preference: Fraction,
    ) -> Self {
        let risk = risk_preference.value();
        let stocks_percent = (risk * 100.0).round() as u8;
        let savings = current_savings as f64;
        let monthly = monthly_income as f64 * saved_fraction.value();
        let initial_stocks = savings * risk;
        let monthly_stocks = monthly * risk;
        Allocation {
            stocks_percent,
            bonds_percent: 100 - stocks_percent,
            initial_stocks,
            initial_bonds: savings - initial_stocks,
            monthly_stocks,
            monthly_bonds: monthly - monthly_stocks,
        }
    }

    pub fn holds_stocks(&self) -> bool {
        self.stocks_percent > 0
    }

    pub fn holds_bonds(&self) -> bool {
        self.bonds_percent > 0
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    pub monthly: MonthlySplit,
    pub allocation: Allocation,
}

impl PlanSummary {
    /// `None` until both monetary inputs are set.
    pub fn from_parameters(params: &Parameters) -> Option<Self> {
        let savings = params.current_savings?;
        let income = params.monthly_income?;
        Some(PlanSummary {
            monthly: MonthlySplit::new(income, params.saved_fraction),
            allocation: Allocation::new(
                savings,
                income,
                params.saved_fraction,
                params.risk_preference,
            ),
        })
    }
}

/// One asset line of the results step.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingText {
    pub percent: u8,
    pub initial: String,
    pub monthly: String,
}

/// The plan summary as displayed. An asset with a zero share has no line.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryText {
    pub saved: String,
    pub spent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stocks: Option<HoldingText>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bonds: Option<HoldingText>,
}

impl PlanSummary {
    pub fn text(&self, currency_suffix: &str) -> SummaryText {
        let money = |amount: f64| format_money(amount, currency_suffix);
        let allocation = &self.allocation;
        SummaryText {
            saved: money(self.monthly.saved as f64),
            spent: money(self.monthly.spent as f64),
            stocks: allocation.holds_stocks().then(|| HoldingText {
                percent: allocation.stocks_percent,
                initial: money(allocation.initial_stocks),
                monthly: money(allocation.monthly_stocks),
            }),
            bonds: allocation.holds_bonds().then(|| HoldingText {
                percent: allocation.bonds_percent,
                initial: money(allocation.initial_bonds),
                monthly: money(allocation.monthly_bonds),
            }),
        }
    }
}

/// Formats a currency amount with no decimals and space-grouped thousands,
/// e.g. `12 345 zł`.
pub fn format_money(amount: f64, suffix: &str) -> String {
    let whole = amount.max(0.0).round() as u64;
    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + suffix.len());
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }
    grouped.push_str(suffix);
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn monthly_split_rounds_saved_amount() {
        let split = MonthlySplit::new(5_000, Fraction::clamped(0.5));
        assert_eq!(split, MonthlySplit { saved: 2_500, spent: 2_500 });

        let split = MonthlySplit::new(1_001, Fraction::clamped(0.5));
        assert_eq!(split.saved, 501);
        assert_eq!(split.spent, 500);
    }

    #[test]
    fn allocation_splits_savings_and_contributions() {
        let allocation = Allocation::new(
            10_000,
            5_000,
            Fraction::clamped(0.5),
            Fraction::clamped(0.3),
        );
        assert_eq!(allocation.stocks_percent, 30);
        assert_eq!(allocation.bonds_percent, 70);
        assert_approx(allocation.initial_stocks, 3_000.0);
        assert_approx(allocation.initial_bonds, 7_000.0);
        assert_approx(allocation.monthly_stocks, 750.0);
        assert_approx(allocation.monthly_bonds, 1_750.0);
    }

    #[test]
    fn all_bond_allocation_holds_no_stocks() {
        let allocation = Allocation::new(1_000, 1_000, Fraction::ONE, Fraction::ZERO);
        assert!(!allocation.holds_stocks());
        assert!(allocation.holds_bonds());
        assert_approx(allocation.monthly_bonds, 1_000.0);
    }

    #[test]
    fn summary_requires_money_inputs() {
        let mut params = Parameters::new(Fraction::clamped(0.5), Fraction::clamped(0.5));
        assert!(PlanSummary::from_parameters(&params).is_none());
        params.current_savings = Some(0);
        params.monthly_income = Some(0);
        let summary = PlanSummary::from_parameters(&params).expect("inputs set");
        assert_eq!(summary.monthly, MonthlySplit { saved: 0, spent: 0 });
    }

    #[test]
    fn summary_text_formats_amounts_and_hides_empty_holdings() {
        let mut params = Parameters::new(Fraction::clamped(0.5), Fraction::clamped(0.3));
        params.current_savings = Some(10_000);
        params.monthly_income = Some(5_000);
        let text = PlanSummary::from_parameters(&params)
            .expect("inputs set")
            .text(DEFAULT_CURRENCY_SUFFIX);
        assert_eq!(text.saved, "2 500 zł");
        assert_eq!(text.spent, "2 500 zł");
        assert_eq!(
            text.stocks,
            Some(HoldingText {
                percent: 30,
                initial: "3 000 zł".to_string(),
                monthly: "750 zł".to_string(),
            })
        );
        assert_eq!(
            text.bonds.as_ref().map(|bonds| bonds.initial.as_str()),
            Some("7 000 zł")
        );

        params.risk_preference = Fraction::ZERO;
        let text = PlanSummary::from_parameters(&params)
            .expect("inputs set")
            .text(DEFAULT_CURRENCY_SUFFIX);
        assert!(text.stocks.is_none());
        let json = serde_json::to_string(&text).expect("summary should serialize");
        assert!(!json.contains("stocks"));
    }

    #[test]
    fn format_money_groups_thousands() {
        assert_eq!(format_money(0.0, DEFAULT_CURRENCY_SUFFIX), "0 zł");
        assert_eq!(format_money(999.0, DEFAULT_CURRENCY_SUFFIX), "999 zł");
        assert_eq!(format_money(1_000.0, DEFAULT_CURRENCY_SUFFIX), "1 000 zł");
        assert_eq!(format_money(1_234_567.4, ""), "1 234 567");
        assert_eq!(format_money(2_499.5, " PLN"), "2 500 PLN");
    }
}
