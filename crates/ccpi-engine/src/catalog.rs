//! Built-in indicator catalog
//!
//! 23 indicators across the six pillars. Thresholds map raw values to risk
//! sub-scores (0 calm, 100 extreme); every chain ends with the AI estimate
//! tier, and every indicator carries a historical baseline for display.

use std::time::Duration;

use crate::error::RegistryError;
use crate::registry::{Indicator, IndicatorRegistry, PlausibleRange, SourceBinding};
use crate::thresholds::Thresholds;
use crate::types::{CanaryTrigger, Pillar, Severity};

pub const FRED: &str = "fred";
pub const FMP: &str = "fmp";
pub const ALPHA_VANTAGE: &str = "alpha_vantage";
pub const AI_ESTIMATE: &str = "ai_estimate";

pub const PILLAR_WEIGHTS: [(Pillar, f64); 6] = [
    (Pillar::Valuation, 0.25),
    (Pillar::Technical, 0.20),
    (Pillar::Macro, 0.20),
    (Pillar::Sentiment, 0.15),
    (Pillar::Flows, 0.10),
    (Pillar::Structural, 0.10),
];

const DAY: u64 = 86_400;

/// Validated registry of the built-in catalog
pub fn default_registry() -> Result<IndicatorRegistry, RegistryError> {
    IndicatorRegistry::new(indicators(), &PILLAR_WEIGHTS)
}

fn fred(series: &str) -> SourceBinding {
    SourceBinding::new(FRED, series)
}

fn fmp_at(path: &str, pointer: &str) -> SourceBinding {
    SourceBinding::new(FMP, path).with_pointer(pointer)
}

fn alpha(query: &str) -> SourceBinding {
    SourceBinding::new(ALPHA_VANTAGE, query)
}

fn ai(description: &str) -> SourceBinding {
    SourceBinding::new(AI_ESTIMATE, description)
}

struct Def {
    id: &'static str,
    name: &'static str,
    unit: &'static str,
    pillar: Pillar,
    weight: f64,
    range: (f64, f64),
    points: &'static [(f64, f64)],
    canary: CanaryTrigger,
    baseline: f64,
    /// Daily series skip weekends and holidays, so five days at least
    window_days: u64,
    chain: Vec<SourceBinding>,
}

impl From<Def> for Indicator {
    fn from(def: Def) -> Self {
        Indicator {
            id: def.id.to_string(),
            name: def.name.to_string(),
            unit: def.unit.to_string(),
            pillar: def.pillar,
            weight_in_pillar: def.weight,
            thresholds: Thresholds::new(def.points),
            plausible_range: PlausibleRange::new(def.range.0, def.range.1),
            adapter_chain: def.chain,
            baseline: Some(def.baseline),
            refresh_window: Duration::from_secs(def.window_days * DAY),
            canary: def.canary,
        }
    }
}

/// Catalog indicators in registry order
pub fn indicators() -> Vec<Indicator> {
    use Pillar::*;
    use Severity::*;

    let defs = vec![
        // Valuation
        Def {
            id: "buffett_indicator",
            name: "Buffett Indicator (market cap to GDP)",
            unit: "%",
            pillar: Valuation,
            weight: 0.30,
            range: (0.0, 400.0),
            points: &[(80.0, 0.0), (100.0, 20.0), (130.0, 50.0), (160.0, 75.0), (200.0, 100.0)],
            canary: CanaryTrigger::above(180.0, High),
            baseline: 150.0,
            window_days: 120,
            chain: vec![ai("total US stock market capitalization as a percentage of US GDP")],
        },
        Def {
            id: "shiller_cape",
            name: "Shiller CAPE ratio",
            unit: "x",
            pillar: Valuation,
            weight: 0.30,
            range: (0.0, 100.0),
            points: &[(15.0, 0.0), (20.0, 25.0), (25.0, 50.0), (32.0, 80.0), (40.0, 100.0)],
            canary: CanaryTrigger::above(35.0, High),
            baseline: 30.0,
            window_days: 45,
            chain: vec![ai("S&P 500 cyclically adjusted price-to-earnings ratio")],
        },
        Def {
            id: "forward_pe",
            name: "S&P 500 forward P/E",
            unit: "x",
            pillar: Valuation,
            weight: 0.25,
            range: (0.0, 80.0),
            points: &[(14.0, 0.0), (17.0, 30.0), (20.0, 55.0), (23.0, 80.0), (26.0, 100.0)],
            canary: CanaryTrigger::above(22.0, Medium),
            baseline: 19.5,
            window_days: 7,
            chain: vec![
                fmp_at("ratios-ttm/SPY", "/0/peRatioTTM"),
                ai("S&P 500 12-month forward price-to-earnings ratio"),
            ],
        },
        Def {
            id: "price_to_sales",
            name: "S&P 500 price to sales",
            unit: "x",
            pillar: Valuation,
            weight: 0.15,
            range: (0.0, 10.0),
            points: &[(1.5, 0.0), (2.0, 30.0), (2.5, 60.0), (3.0, 85.0), (3.5, 100.0)],
            canary: CanaryTrigger::above(3.0, Medium),
            baseline: 2.6,
            window_days: 120,
            chain: vec![
                fmp_at("ratios-ttm/SPY", "/0/priceToSalesRatioTTM"),
                ai("S&P 500 trailing price-to-sales ratio"),
            ],
        },
        // Technical
        Def {
            id: "vix",
            name: "CBOE Volatility Index",
            unit: "pts",
            pillar: Technical,
            weight: 0.30,
            range: (5.0, 150.0),
            points: &[(12.0, 0.0), (16.0, 20.0), (20.0, 45.0), (30.0, 75.0), (40.0, 100.0)],
            canary: CanaryTrigger::above(25.0, High),
            baseline: 19.0,
            window_days: 5,
            chain: vec![
                fmp_at("quote/^VIX", "/0/price"),
                fred("VIXCLS"),
                ai("latest close of the CBOE VIX index"),
            ],
        },
        Def {
            id: "pct_above_200dma",
            name: "S&P 500 members above 200-day MA",
            unit: "%",
            pillar: Technical,
            weight: 0.25,
            range: (0.0, 100.0),
            points: &[(20.0, 100.0), (40.0, 70.0), (60.0, 35.0), (75.0, 10.0), (85.0, 0.0)],
            canary: CanaryTrigger::below(40.0, Medium),
            baseline: 60.0,
            window_days: 5,
            chain: vec![ai("percentage of S&P 500 stocks trading above their 200-day moving average")],
        },
        Def {
            id: "spx_rsi_14",
            name: "S&P 500 14-day RSI",
            unit: "pts",
            pillar: Technical,
            weight: 0.20,
            range: (0.0, 100.0),
            points: &[(30.0, 20.0), (50.0, 30.0), (60.0, 45.0), (70.0, 75.0), (80.0, 100.0)],
            canary: CanaryTrigger::above(70.0, Low),
            baseline: 55.0,
            window_days: 5,
            chain: vec![
                fmp_at("technical_indicator/1day/SPY?type=rsi&period=14", "/0/rsi"),
                ai("14-day relative strength index of the S&P 500"),
            ],
        },
        Def {
            id: "spx_vs_200dma",
            name: "S&P 500 distance from 200-day MA",
            unit: "%",
            pillar: Technical,
            weight: 0.25,
            range: (-60.0, 60.0),
            points: &[(-5.0, 10.0), (0.0, 20.0), (5.0, 40.0), (10.0, 70.0), (15.0, 100.0)],
            canary: CanaryTrigger::above(12.0, Medium),
            baseline: 5.0,
            window_days: 5,
            chain: vec![ai("percentage distance of the S&P 500 from its 200-day moving average")],
        },
        // Macro
        Def {
            id: "yield_curve_10y2y",
            name: "10Y-2Y Treasury spread",
            unit: "pp",
            pillar: Macro,
            weight: 0.30,
            range: (-5.0, 5.0),
            points: &[(-1.0, 100.0), (-0.5, 80.0), (0.0, 60.0), (0.5, 35.0), (1.5, 0.0)],
            canary: CanaryTrigger::below(0.0, High),
            baseline: 0.5,
            window_days: 5,
            chain: vec![fred("T10Y2Y"), ai("10-year minus 2-year US Treasury yield spread")],
        },
        Def {
            id: "hy_credit_spread",
            name: "High-yield credit spread",
            unit: "pp",
            pillar: Macro,
            weight: 0.30,
            range: (0.0, 30.0),
            points: &[(3.0, 0.0), (4.0, 30.0), (5.0, 55.0), (6.5, 80.0), (8.0, 100.0)],
            canary: CanaryTrigger::above(5.0, High),
            baseline: 4.0,
            window_days: 5,
            chain: vec![
                fred("BAMLH0A0HYM2"),
                ai("ICE BofA US high yield option-adjusted spread"),
            ],
        },
        Def {
            id: "fed_funds_rate",
            name: "Effective federal funds rate",
            unit: "%",
            pillar: Macro,
            weight: 0.15,
            range: (0.0, 25.0),
            points: &[(1.0, 10.0), (2.5, 30.0), (4.0, 55.0), (5.5, 80.0), (7.0, 100.0)],
            canary: CanaryTrigger::above(5.0, Low),
            baseline: 4.3,
            window_days: 45,
            chain: vec![
                fred("DFF"),
                alpha("function=FEDERAL_FUNDS_RATE&interval=daily"),
                ai("effective federal funds rate"),
            ],
        },
        Def {
            id: "unemployment_rate",
            name: "US unemployment rate",
            unit: "%",
            pillar: Macro,
            weight: 0.25,
            range: (0.0, 30.0),
            points: &[(3.5, 10.0), (4.0, 25.0), (4.5, 50.0), (5.5, 80.0), (7.0, 100.0)],
            canary: CanaryTrigger::above(4.5, Medium),
            baseline: 4.1,
            window_days: 45,
            chain: vec![
                fred("UNRATE"),
                alpha("function=UNEMPLOYMENT"),
                ai("US civilian unemployment rate"),
            ],
        },
        // Sentiment
        Def {
            id: "aaii_bull_bear_spread",
            name: "AAII bull-bear spread",
            unit: "pp",
            pillar: Sentiment,
            weight: 0.25,
            range: (-100.0, 100.0),
            points: &[(-20.0, 10.0), (0.0, 25.0), (15.0, 50.0), (30.0, 80.0), (40.0, 100.0)],
            canary: CanaryTrigger::above(30.0, Medium),
            baseline: 5.0,
            window_days: 10,
            chain: vec![ai("AAII sentiment survey bullish minus bearish percentage")],
        },
        Def {
            id: "put_call_ratio",
            name: "Equity put/call ratio",
            unit: "x",
            pillar: Sentiment,
            weight: 0.25,
            range: (0.0, 5.0),
            points: &[(0.5, 100.0), (0.6, 75.0), (0.7, 45.0), (0.9, 15.0), (1.1, 0.0)],
            canary: CanaryTrigger::below(0.55, Medium),
            baseline: 0.7,
            window_days: 5,
            chain: vec![ai("CBOE equity put/call ratio")],
        },
        Def {
            id: "fear_greed_index",
            name: "Fear & Greed index",
            unit: "pts",
            pillar: Sentiment,
            weight: 0.30,
            range: (0.0, 100.0),
            points: &[(25.0, 10.0), (45.0, 30.0), (55.0, 45.0), (75.0, 80.0), (90.0, 100.0)],
            canary: CanaryTrigger::above(80.0, Low),
            baseline: 50.0,
            window_days: 5,
            chain: vec![ai("CNN Fear & Greed index reading")],
        },
        Def {
            id: "skew_index",
            name: "CBOE SKEW index",
            unit: "pts",
            pillar: Sentiment,
            weight: 0.20,
            range: (90.0, 200.0),
            points: &[(115.0, 0.0), (125.0, 25.0), (135.0, 55.0), (145.0, 85.0), (155.0, 100.0)],
            canary: CanaryTrigger::above(145.0, Low),
            baseline: 130.0,
            window_days: 5,
            chain: vec![fmp_at("quote/^SKEW", "/0/price"), ai("CBOE SKEW index")],
        },
        // Flows
        Def {
            id: "margin_debt_yoy",
            name: "FINRA margin debt, year over year",
            unit: "%",
            pillar: Flows,
            weight: 0.40,
            range: (-80.0, 300.0),
            points: &[(-10.0, 0.0), (0.0, 20.0), (15.0, 50.0), (30.0, 80.0), (45.0, 100.0)],
            canary: CanaryTrigger::above(30.0, High),
            baseline: 10.0,
            window_days: 45,
            chain: vec![ai("year-over-year change in FINRA margin debt")],
        },
        Def {
            id: "equity_fund_flows",
            name: "US equity fund flows (4-week)",
            unit: "$bn",
            pillar: Flows,
            weight: 0.30,
            range: (-500.0, 500.0),
            points: &[(-60.0, 100.0), (-30.0, 75.0), (0.0, 45.0), (30.0, 20.0), (60.0, 0.0)],
            canary: CanaryTrigger::below(-40.0, Medium),
            baseline: 0.0,
            window_days: 10,
            chain: vec![ai("4-week net flows into US equity funds in billions of dollars")],
        },
        Def {
            id: "short_interest_ratio",
            name: "S&P 500 short interest",
            unit: "%",
            pillar: Flows,
            weight: 0.30,
            range: (0.0, 20.0),
            points: &[(1.5, 100.0), (2.0, 70.0), (3.0, 40.0), (4.0, 15.0), (5.0, 0.0)],
            canary: CanaryTrigger::below(1.8, Low),
            baseline: 3.0,
            window_days: 20,
            chain: vec![ai("S&P 500 aggregate short interest as a percentage of float")],
        },
        // Structural
        Def {
            id: "top10_concentration",
            name: "Top-10 weight in S&P 500",
            unit: "%",
            pillar: Structural,
            weight: 0.30,
            range: (0.0, 100.0),
            points: &[(20.0, 0.0), (25.0, 25.0), (30.0, 55.0), (35.0, 85.0), (40.0, 100.0)],
            canary: CanaryTrigger::above(33.0, High),
            baseline: 30.0,
            window_days: 35,
            chain: vec![ai("combined index weight of the ten largest S&P 500 constituents")],
        },
        Def {
            id: "advance_decline_ratio",
            name: "NYSE advance/decline ratio",
            unit: "x",
            pillar: Structural,
            weight: 0.25,
            range: (0.0, 10.0),
            points: &[(0.6, 100.0), (0.8, 70.0), (1.0, 45.0), (1.3, 15.0), (1.6, 0.0)],
            canary: CanaryTrigger::below(0.75, Medium),
            baseline: 1.0,
            window_days: 5,
            chain: vec![ai("NYSE advancing to declining issues ratio, 10-day average")],
        },
        Def {
            id: "sp500_avg_correlation",
            name: "S&P 500 average stock correlation",
            unit: "pts",
            pillar: Structural,
            weight: 0.20,
            range: (0.0, 100.0),
            points: &[(15.0, 0.0), (25.0, 25.0), (40.0, 55.0), (55.0, 85.0), (70.0, 100.0)],
            canary: CanaryTrigger::above(55.0, Medium),
            baseline: 30.0,
            window_days: 5,
            chain: vec![ai("CBOE S&P 500 implied correlation index")],
        },
        Def {
            id: "tech_sector_weight",
            name: "Technology sector weight in S&P 500",
            unit: "%",
            pillar: Structural,
            weight: 0.25,
            range: (0.0, 100.0),
            points: &[(20.0, 0.0), (25.0, 20.0), (30.0, 50.0), (35.0, 80.0), (40.0, 100.0)],
            canary: CanaryTrigger::above(35.0, Medium),
            baseline: 32.0,
            window_days: 35,
            chain: vec![ai("information technology sector weight in the S&P 500")],
        },
    ];

    defs.into_iter().map(Indicator::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::WEIGHT_EPSILON;

    #[test]
    fn test_catalog_is_valid() {
        let registry = default_registry().unwrap();
        assert_eq!(registry.len(), 23);
    }

    #[test]
    fn test_daily_series_survive_long_weekend() {
        // Friday's observation is dated Friday 00:00; read late on the
        // Tuesday after a Monday holiday it is almost five days old
        let age = Duration::from_secs(4 * DAY + 23 * 3_600);
        for indicator in indicators() {
            assert!(
                indicator.refresh_window >= age,
                "{} would go stale over a long weekend",
                indicator.id
            );
        }
    }

    #[test]
    fn test_catalog_weight_sums() {
        let registry = default_registry().unwrap();
        let pillar_total: f64 = Pillar::ALL.iter().map(|p| registry.pillar_weight(*p)).sum();
        assert!((pillar_total - 1.0).abs() < WEIGHT_EPSILON);

        for pillar in Pillar::ALL {
            let sum: f64 = registry.in_pillar(pillar).map(|i| i.weight_in_pillar).sum();
            assert!((sum - 1.0).abs() < WEIGHT_EPSILON, "{pillar} sums to {sum}");
        }
    }

    #[test]
    fn test_every_chain_ends_with_ai() {
        for indicator in indicators() {
            let last = indicator.adapter_chain.last().unwrap();
            assert_eq!(last.source, AI_ESTIMATE, "{}", indicator.id);
            assert!(indicator.adapter_chain[..indicator.adapter_chain.len() - 1]
                .iter()
                .all(|b| b.source != AI_ESTIMATE));
        }
    }

    #[test]
    fn test_baselines_sit_inside_calm_to_extreme() {
        for indicator in indicators() {
            let baseline = indicator.baseline.unwrap();
            let score = indicator.thresholds.score(baseline);
            assert!((0.0..=100.0).contains(&score));
            assert!(indicator.plausible_range.contains(baseline));
        }
    }
}
