//! Payload validation.
//!
//! Runs on every normalized payload before it is cached:
//! - Non-negative prices, market caps and volumes
//! - OHLC invariants (high >= low; open/close between low and high)
//! - Series timestamps never go backwards
//! - Sanity range for prices

use log::warn;
use rust_decimal::Decimal;

use crate::errors::MarketDataError;
use crate::models::{Candle, CoinQuote, MarketPayload, PricePoint};

/// Validation severity levels.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationSeverity {
    /// Reject the payload; counts against the provider.
    Hard,
    /// Accept the payload but log a warning.
    Soft,
}

#[derive(Clone, Debug)]
pub struct ValidationIssue {
    pub severity: ValidationSeverity,
    pub message: String,
}

/// Validator configuration.
#[derive(Clone, Debug)]
pub struct ValidatorConfig {
    pub reject_negative_values: bool,
    pub reject_invalid_ohlc: bool,
    pub reject_backwards_timestamps: bool,
    /// Prices above this are logged as suspicious.
    pub max_price: Option<Decimal>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            reject_negative_values: true,
            reject_invalid_ohlc: true,
            reject_backwards_timestamps: true,
            max_price: Some(Decimal::from(10_000_000i64)),
        }
    }
}

/// Semantic checks on top of the adapters' shape checks.
pub struct PayloadValidator {
    config: ValidatorConfig,
}

impl PayloadValidator {
    pub fn new() -> Self {
        Self {
            config: ValidatorConfig::default(),
        }
    }

    pub fn with_config(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Validate a payload produced by `provider`.
    ///
    /// Hard issues are joined into a single `ValidationFailure`; soft issues
    /// are logged and the payload is accepted.
    pub fn validate(&self, provider: &str, payload: &MarketPayload) -> Result<(), MarketDataError> {
        let mut issues = Vec::new();

        match payload {
            MarketPayload::Series(series) => {
                self.check_points("prices", &series.prices, &mut issues);
                self.check_points("market_caps", &series.market_caps, &mut issues);
                self.check_points("total_volumes", &series.total_volumes, &mut issues);
            }
            MarketPayload::Candles(candles) => self.check_candles(candles, &mut issues),
            MarketPayload::Detail(detail) => {
                self.check_price(&detail.symbol, detail.price, &mut issues);
                self.check_non_negative("market_cap", detail.market_cap, &mut issues);
                self.check_non_negative("volume_24h", detail.volume_24h, &mut issues);
            }
            MarketPayload::Quotes(quotes) => {
                for quote in quotes.values() {
                    self.check_quote(quote, &mut issues);
                }
            }
            MarketPayload::Markets(rows) => {
                for quote in rows {
                    self.check_quote(quote, &mut issues);
                }
            }
            MarketPayload::Global(global) => {
                self.check_non_negative(
                    "total_market_cap_usd",
                    Some(global.total_market_cap_usd),
                    &mut issues,
                );
                self.check_non_negative("total_volume_usd", Some(global.total_volume_usd), &mut issues);
                if global.btc_dominance < Decimal::ZERO || global.btc_dominance > Decimal::ONE_HUNDRED {
                    issues.push(ValidationIssue {
                        severity: ValidationSeverity::Soft,
                        message: format!("BTC dominance out of range: {}", global.btc_dominance),
                    });
                }
            }
            MarketPayload::Sentiment(reading) => {
                if reading.value > 100 {
                    issues.push(ValidationIssue {
                        severity: ValidationSeverity::Hard,
                        message: format!("Sentiment index out of range: {}", reading.value),
                    });
                }
            }
            MarketPayload::Trending(_) => {}
        }

        let errors: Vec<&str> = issues
            .iter()
            .filter(|i| i.severity == ValidationSeverity::Hard)
            .map(|i| i.message.as_str())
            .collect();

        if !errors.is_empty() {
            return Err(MarketDataError::invalid(provider, errors.join("; ")));
        }

        for issue in issues.iter().filter(|i| i.severity == ValidationSeverity::Soft) {
            warn!(
                "Payload validation warning for {} ({}): {}",
                provider,
                payload.describe(),
                issue.message
            );
        }

        Ok(())
    }

    fn hard_or_soft(&self, enabled: bool) -> ValidationSeverity {
        if enabled {
            ValidationSeverity::Hard
        } else {
            ValidationSeverity::Soft
        }
    }

    fn check_points(&self, name: &str, points: &[PricePoint], issues: &mut Vec<ValidationIssue>) {
        if let Some((i, point)) = points
            .iter()
            .enumerate()
            .find(|(_, p)| p.value < Decimal::ZERO)
        {
            issues.push(ValidationIssue {
                severity: self.hard_or_soft(self.config.reject_negative_values),
                message: format!("Negative value in {}[{}]: {}", name, i, point.value),
            });
        }

        if let Some(i) = first_backwards(points.iter().map(|p| p.timestamp)) {
            issues.push(ValidationIssue {
                severity: self.hard_or_soft(self.config.reject_backwards_timestamps),
                message: format!("Timestamps go backwards at {}[{}]", name, i),
            });
        }
    }

    fn check_candles(&self, candles: &[Candle], issues: &mut Vec<ValidationIssue>) {
        for (i, candle) in candles.iter().enumerate() {
            if candle.high < candle.low {
                issues.push(ValidationIssue {
                    severity: self.hard_or_soft(self.config.reject_invalid_ohlc),
                    message: format!(
                        "High ({}) is less than low ({}) at candle {}",
                        candle.high, candle.low, i
                    ),
                });
                continue;
            }

            if candle.low < Decimal::ZERO {
                issues.push(ValidationIssue {
                    severity: self.hard_or_soft(self.config.reject_negative_values),
                    message: format!("Negative low at candle {}: {}", i, candle.low),
                });
            }

            let in_range = |v: Decimal| v >= candle.low && v <= candle.high;
            if !in_range(candle.open) || !in_range(candle.close) {
                issues.push(ValidationIssue {
                    severity: ValidationSeverity::Soft,
                    message: format!("Open/close outside [low, high] at candle {}", i),
                });
            }
        }

        if let Some(i) = first_backwards(candles.iter().map(|c| c.timestamp)) {
            issues.push(ValidationIssue {
                severity: self.hard_or_soft(self.config.reject_backwards_timestamps),
                message: format!("Timestamps go backwards at candle {}", i),
            });
        }
    }

    fn check_quote(&self, quote: &CoinQuote, issues: &mut Vec<ValidationIssue>) {
        self.check_price(&quote.symbol, quote.price, issues);
        self.check_non_negative("market_cap", quote.market_cap, issues);
        self.check_non_negative("volume_24h", quote.volume_24h, issues);
    }

    fn check_price(&self, symbol: &str, price: Decimal, issues: &mut Vec<ValidationIssue>) {
        if price < Decimal::ZERO {
            issues.push(ValidationIssue {
                severity: self.hard_or_soft(self.config.reject_negative_values),
                message: format!("Negative price for {}: {}", symbol, price),
            });
        }

        if let Some(max) = self.config.max_price {
            if price > max {
                issues.push(ValidationIssue {
                    severity: ValidationSeverity::Soft,
                    message: format!("Price for {} exceeds sanity limit: {}", symbol, price),
                });
            }
        }
    }

    fn check_non_negative(&self, name: &str, value: Option<Decimal>, issues: &mut Vec<ValidationIssue>) {
        if let Some(v) = value.filter(|v| *v < Decimal::ZERO) {
            issues.push(ValidationIssue {
                severity: self.hard_or_soft(self.config.reject_negative_values),
                message: format!("Negative {}: {}", name, v),
            });
        }
    }
}

impl Default for PayloadValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Index of the first element earlier than its predecessor.
fn first_backwards<T: PartialOrd>(items: impl Iterator<Item = T>) -> Option<usize> {
    let mut previous: Option<T> = None;
    for (i, item) in items.enumerate() {
        if let Some(prev) = &previous {
            if item < *prev {
                return Some(i);
            }
        }
        previous = Some(item);
    }
    None
}
