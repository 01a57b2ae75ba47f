use serde::Serialize;

const SAMPLE_EVERY_MONTHS: u32 = 6;
/// Longest horizon the calculator simulates (100 years).
pub const MAX_MONTHS: u32 = 1_200;
const DEFAULT_RATE_PERCENT: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionInput {
    pub monthly_contribution: f64,
    pub years: f64,
    pub annual_rate_percent: f64,
}

impl ProjectionInput {
    /// Builds an input from raw form text. Unparsable numbers become NaN, which
    /// `project` treats as "no result"; an empty rate falls back to 3%.
    pub fn parse(monthly: &str, years: &str, rate: &str) -> Self {
        let num = |s: &str| s.trim().parse::<f64>().unwrap_or(f64::NAN);
        let annual_rate_percent = if rate.trim().is_empty() {
            DEFAULT_RATE_PERCENT
        } else {
            num(rate)
        };

        Self {
            monthly_contribution: num(monthly),
            years: num(years),
            annual_rate_percent,
        }
    }

    fn is_computable(&self) -> bool {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        positive(self.monthly_contribution)
            && positive(self.years)
            && self.years * 12.0 < f64::from(MAX_MONTHS + 1)
            && self.annual_rate_percent.is_finite()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectionPoint {
    pub month_index: u32,
    pub year_label: String,
    pub balance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProjectionSummary {
    pub total_contributed: f64,
    pub interest_earned: f64,
    pub final_balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Projection {
    pub total_months: u32,
    pub series: Vec<ProjectionPoint>,
    pub summary: ProjectionSummary,
}

/// Compounds a fixed monthly contribution and samples the balance every six
/// months. Returns `None` when the contribution or duration is not a positive
/// number, the duration exceeds [`MAX_MONTHS`], or the rate is not finite.
pub fn project(input: ProjectionInput) -> Option<Projection> {
    if !input.is_computable() {
        return None;
    }

    let monthly_rate = input.annual_rate_percent / 100.0 / 12.0;
    // Fractional months are dropped: 2.5 years is 30 months, 1.05 years is 12.
    let total_months = (input.years * 12.0).floor() as u32;

    let mut series = Vec::with_capacity((total_months / SAMPLE_EVERY_MONTHS) as usize + 1);
    let mut balance = 0.0_f64;

    for month in 0..=total_months {
        if month > 0 {
            balance = balance * (1.0 + monthly_rate) + input.monthly_contribution;
        }
        if month % SAMPLE_EVERY_MONTHS == 0 {
            series.push(ProjectionPoint {
                month_index: month,
                year_label: format!("{:.1}", f64::from(month) / 12.0),
                balance: balance.round(),
            });
        }
    }

    let final_balance = balance.round();
    // Not derived from the series; must use the same month count as the loop.
    let total_contributed = input.monthly_contribution * f64::from(total_months);

    Some(Projection {
        total_months,
        series,
        summary: ProjectionSummary {
            total_contributed,
            interest_earned: final_balance - total_contributed,
            final_balance,
        },
    })
}
