//! Signal detector - cheap local rules deciding whether a cycle is worth
//! a downstream analysis
//!
//! Every comparison against a threshold is strict: a metric sitting exactly
//! on its threshold does not fire.

use factor_feeds::{metric_keys, FactorSource};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::DetectionConfig;
use crate::error::Result;
use crate::history::PreviousView;
use crate::observation::JoinedObservation;

/// Rule that produced a signal, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    FundingRate,
    PriceVolatility,
    VolumeAnomaly,
    MarketPressure,
    NewsSentiment,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::FundingRate => "funding_rate",
            SignalKind::PriceVolatility => "price_volatility",
            SignalKind::VolumeAnomaly => "volume_anomaly",
            SignalKind::MarketPressure => "market_pressure",
            SignalKind::NewsSentiment => "news_sentiment",
        }
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signal strength
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStrength {
    Weak,
    Medium,
    Strong,
}

impl SignalStrength {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalStrength::Weak => "weak",
            SignalStrength::Medium => "medium",
            SignalStrength::Strong => "strong",
        }
    }
}

/// One rule that fired this cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggeredSignal {
    pub kind: SignalKind,
    pub strength: SignalStrength,
    /// The metric value that crossed the threshold
    pub value: f64,
    pub description: String,
}

/// Why the gate did or did not open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateOutcome {
    Proceed,
    BelowThreshold,
    NoEvaluableSignals,
    DetectionDisabled,
}

impl GateOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateOutcome::Proceed => "proceed",
            GateOutcome::BelowThreshold => "below_threshold",
            GateOutcome::NoEvaluableSignals => "no_evaluable_signals",
            GateOutcome::DetectionDisabled => "detection_disabled",
        }
    }
}

/// Detector verdict for one observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateDecision {
    pub triggered_signals: Vec<TriggeredSignal>,
    /// Number of distinct signal kinds that fired
    pub signal_count: usize,
    pub proceed: bool,
    pub outcome: GateOutcome,
    pub reason: String,
    /// Rules that had enough input to be evaluated
    pub evaluated_rules: usize,
}

impl GateDecision {
    pub fn kinds(&self) -> Vec<SignalKind> {
        self.triggered_signals.iter().map(|s| s.kind).collect()
    }

    pub fn has(&self, kind: SignalKind) -> bool {
        self.triggered_signals.iter().any(|s| s.kind == kind)
    }
}

/// Outcome of a single rule
enum RuleResult {
    /// Required input missing or unavailable
    NotEvaluable,
    Quiet,
    Fired(TriggeredSignal),
}

/// Deterministic rule engine over a joined observation
#[derive(Debug, Clone)]
pub struct SignalDetector {
    config: Arc<DetectionConfig>,
}

impl SignalDetector {
    pub fn new(config: DetectionConfig) -> Result<Self> {
        Self::with_shared(Arc::new(config))
    }

    /// Use a config snapshot shared with other readers
    pub fn with_shared(config: Arc<DetectionConfig>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn evaluate(
        &self,
        observation: &JoinedObservation,
        previous: &PreviousView,
    ) -> GateDecision {
        let results = [
            self.funding_rate_rule(observation, previous),
            self.price_rule(observation),
            self.volume_rule(observation, previous),
            self.market_pressure_rule(observation),
            self.news_rule(observation),
        ];

        let evaluated_rules = results
            .iter()
            .filter(|r| !matches!(r, RuleResult::NotEvaluable))
            .count();

        let mut triggered_signals: Vec<TriggeredSignal> = Vec::new();
        for result in results {
            if let RuleResult::Fired(signal) = result {
                if !triggered_signals.iter().any(|s| s.kind == signal.kind) {
                    triggered_signals.push(signal);
                }
            }
        }
        let signal_count = triggered_signals.len();
        let min = self.config.min_signal_count;

        let (outcome, proceed, reason) = if observation.is_total_outage()
            || (self.config.enabled && evaluated_rules == 0)
        {
            (
                GateOutcome::NoEvaluableSignals,
                false,
                format!(
                    "no evaluable signals: {}/{} sources unavailable",
                    observation.unavailable_count(),
                    observation.snapshots.len()
                ),
            )
        } else if !self.config.enabled {
            (GateOutcome::DetectionDisabled, true, "detection disabled".to_string())
        } else if signal_count >= min {
            (
                GateOutcome::Proceed,
                true,
                format!("{} signals triggered: {}", signal_count, join_kinds(&triggered_signals)),
            )
        } else {
            (
                GateOutcome::BelowThreshold,
                false,
                format!(
                    "below threshold: {}/{} signals ({})",
                    signal_count,
                    min,
                    join_kinds(&triggered_signals)
                ),
            )
        };

        GateDecision {
            triggered_signals,
            signal_count,
            proceed,
            outcome,
            reason,
            evaluated_rules,
        }
    }

    fn funding_rate_rule(&self, obs: &JoinedObservation, previous: &PreviousView) -> RuleResult {
        let rate = match number(obs, FactorSource::FundingRate, metric_keys::CURRENT_RATE) {
            Some(rate) => rate,
            None => return RuleResult::NotEvaluable,
        };

        let extreme = self.config.funding_rate_extreme_threshold;
        if rate.abs() > extreme {
            let strength = if rate.abs() >= 2.0 * extreme {
                SignalStrength::Strong
            } else {
                SignalStrength::Medium
            };
            return RuleResult::Fired(TriggeredSignal {
                kind: SignalKind::FundingRate,
                strength,
                value: rate,
                description: format!(
                    "funding rate {:+.4}% beyond extreme {:.4}%",
                    rate * 100.0,
                    extreme * 100.0
                ),
            });
        }

        let prior = previous
            .number(FactorSource::FundingRate, metric_keys::CURRENT_RATE)
            .filter(|v| v.is_finite());
        if let Some(prior) = prior {
            let delta = rate - prior;
            let change = self.config.funding_rate_change_threshold;
            if delta.abs() > change {
                let strength = if delta.abs() >= 2.0 * change {
                    SignalStrength::Strong
                } else {
                    SignalStrength::Medium
                };
                return RuleResult::Fired(TriggeredSignal {
                    kind: SignalKind::FundingRate,
                    strength,
                    value: delta,
                    description: format!(
                        "funding rate moved {:+.4}% since last cycle ({:.4}% -> {:.4}%)",
                        delta * 100.0,
                        prior * 100.0,
                        rate * 100.0
                    ),
                });
            }
        }

        RuleResult::Quiet
    }

    fn price_rule(&self, obs: &JoinedObservation) -> RuleResult {
        let pct = match number(obs, FactorSource::PriceVolume, metric_keys::PRICE_CHANGE_PCT) {
            Some(pct) => pct,
            None => return RuleResult::NotEvaluable,
        };

        let threshold = self.config.price_change_threshold;
        if pct.abs() <= threshold {
            return RuleResult::Quiet;
        }

        let overshoot = if threshold > 0.0 {
            pct.abs() / threshold
        } else {
            f64::INFINITY
        };
        let strength = if overshoot >= 1.4 {
            SignalStrength::Strong
        } else if overshoot >= 1.2 {
            SignalStrength::Medium
        } else {
            SignalStrength::Weak
        };

        RuleResult::Fired(TriggeredSignal {
            kind: SignalKind::PriceVolatility,
            strength,
            value: pct,
            description: format!("24h price change {:+.2}% beyond {:.2}%", pct, threshold),
        })
    }

    fn volume_rule(&self, obs: &JoinedObservation, previous: &PreviousView) -> RuleResult {
        let current = match number(obs, FactorSource::PriceVolume, metric_keys::CURRENT_VOLUME) {
            Some(v) => v,
            None => return RuleResult::NotEvaluable,
        };

        let trailing = number(obs, FactorSource::PriceVolume, metric_keys::AVG_VOLUME)
            .filter(|v| *v > 0.0)
            .map(|v| (v, "trailing average"));
        let reference = trailing.or_else(|| {
            previous
                .number(FactorSource::PriceVolume, metric_keys::CURRENT_VOLUME)
                .filter(|v| v.is_finite() && *v > 0.0)
                .map(|v| (v, "previous cycle"))
        });

        let (reference, basis) = match reference {
            Some(r) => r,
            None => return RuleResult::NotEvaluable,
        };

        let ratio = current / reference;
        let surge = self.config.volume_surge_ratio;
        if ratio <= surge {
            return RuleResult::Quiet;
        }

        let strength = if ratio >= 2.0 * surge {
            SignalStrength::Strong
        } else {
            SignalStrength::Medium
        };

        RuleResult::Fired(TriggeredSignal {
            kind: SignalKind::VolumeAnomaly,
            strength,
            value: ratio,
            description: format!("volume {:.2}x {} (surge above {:.2}x)", ratio, basis, surge),
        })
    }

    fn market_pressure_rule(&self, obs: &JoinedObservation) -> RuleResult {
        let long_short = number(obs, FactorSource::MarketPressure, metric_keys::LONG_SHORT_RATIO);
        let taker = number(obs, FactorSource::MarketPressure, metric_keys::TAKER_BUY_SELL_RATIO);
        if long_short.is_none() && taker.is_none() {
            return RuleResult::NotEvaluable;
        }

        let bounds = &self.config.market_pressure_bounds;
        let mut breaches: Vec<(f64, String)> = Vec::new();

        if let Some(ratio) = long_short {
            if let Some(side) =
                outside(ratio, bounds.long_short_ratio_low, bounds.long_short_ratio_high)
            {
                breaches.push((
                    ratio,
                    format!(
                        "long/short ratio {:.2} {} ({:.2}-{:.2})",
                        ratio, side, bounds.long_short_ratio_low, bounds.long_short_ratio_high
                    ),
                ));
            }
        }
        if let Some(ratio) = taker {
            if let Some(side) = outside(
                ratio,
                bounds.taker_buy_sell_ratio_low,
                bounds.taker_buy_sell_ratio_high,
            ) {
                breaches.push((
                    ratio,
                    format!(
                        "taker buy/sell ratio {:.2} {} ({:.2}-{:.2})",
                        ratio,
                        side,
                        bounds.taker_buy_sell_ratio_low,
                        bounds.taker_buy_sell_ratio_high
                    ),
                ));
            }
        }

        let value = match breaches.first() {
            Some((value, _)) => *value,
            None => return RuleResult::Quiet,
        };
        let strength = if breaches.len() >= 2 {
            SignalStrength::Strong
        } else {
            SignalStrength::Medium
        };
        let description = breaches
            .into_iter()
            .map(|(_, d)| d)
            .collect::<Vec<_>>()
            .join("; ");

        RuleResult::Fired(TriggeredSignal {
            kind: SignalKind::MarketPressure,
            strength,
            value,
            description,
        })
    }

    fn news_rule(&self, obs: &JoinedObservation) -> RuleResult {
        let score = match number(obs, FactorSource::NewsSentiment, metric_keys::SENTIMENT_SCORE) {
            Some(score) => score,
            None => return RuleResult::NotEvaluable,
        };

        let threshold = self.config.news_sentiment_threshold;
        if score.abs() <= threshold {
            return RuleResult::Quiet;
        }

        let strength = if score.abs() >= (2.0 * threshold).min(1.0) {
            SignalStrength::Strong
        } else {
            SignalStrength::Medium
        };
        let tone = if score > 0.0 { "positive" } else { "negative" };

        RuleResult::Fired(TriggeredSignal {
            kind: SignalKind::NewsSentiment,
            strength,
            value: score,
            description: format!("{} news sentiment {:+.2} beyond {:.2}", tone, score, threshold),
        })
    }
}

/// Finite metric from an available snapshot
fn number(obs: &JoinedObservation, source: FactorSource, key: &str) -> Option<f64> {
    obs.available(source)
        .and_then(|s| s.number(key))
        .filter(|v| v.is_finite())
}

fn outside(value: f64, low: f64, high: f64) -> Option<&'static str> {
    if value > high {
        Some("above range")
    } else if value < low {
        Some("below range")
    } else {
        None
    }
}

fn join_kinds(signals: &[TriggeredSignal]) -> String {
    if signals.is_empty() {
        return "none".to_string();
    }
    signals
        .iter()
        .map(|s| s.kind.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::ObservationBuilder;
    use factor_feeds::{CollectorError, CollectorErrorKind, FactorSnapshot, Metrics};

    fn snap(source: FactorSource, pairs: &[(&str, f64)]) -> FactorSnapshot {
        let metrics: Metrics = pairs.iter().map(|(k, v)| (k.to_string(), (*v).into())).collect();
        FactorSnapshot::available(source, "BTCUSDT", metrics)
    }

    fn down(source: FactorSource) -> FactorSnapshot {
        FactorSnapshot::failed(
            source,
            "BTCUSDT",
            CollectorError::new(CollectorErrorKind::Network, "connection refused"),
        )
    }

    fn observe(snapshots: Vec<FactorSnapshot>) -> JoinedObservation {
        let mut builder = ObservationBuilder::new("BTCUSDT", FactorSource::ALL);
        for s in snapshots {
            builder.insert(s);
        }
        builder.freeze()
    }

    fn quiet_market() -> Vec<FactorSnapshot> {
        vec![
            snap(FactorSource::FundingRate, &[(metric_keys::CURRENT_RATE, 0.0001)]),
            snap(
                FactorSource::PriceVolume,
                &[
                    (metric_keys::PRICE_CHANGE_PCT, 1.0),
                    (metric_keys::CURRENT_VOLUME, 100.0),
                    (metric_keys::AVG_VOLUME, 100.0),
                ],
            ),
            snap(
                FactorSource::MarketPressure,
                &[
                    (metric_keys::LONG_SHORT_RATIO, 1.1),
                    (metric_keys::TAKER_BUY_SELL_RATIO, 1.0),
                ],
            ),
            snap(FactorSource::NewsSentiment, &[(metric_keys::SENTIMENT_SCORE, 0.1)]),
        ]
    }

    fn detector() -> SignalDetector {
        SignalDetector::new(DetectionConfig::default()).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = DetectionConfig {
            min_signal_count: 0,
            ..Default::default()
        };
        assert!(SignalDetector::new(config).is_err());
    }

    #[test]
    fn test_quiet_market_stays_closed() {
        let decision = detector().evaluate(&observe(quiet_market()), &PreviousView::empty());
        assert!(!decision.proceed);
        assert_eq!(decision.outcome, GateOutcome::BelowThreshold);
        assert_eq!(decision.signal_count, 0);
        assert_eq!(decision.evaluated_rules, 5);
        assert_eq!(decision.reason, "below threshold: 0/2 signals (none)");
    }

    #[test]
    fn test_total_outage_has_no_evaluable_signals() {
        let obs = observe(FactorSource::ALL.iter().map(|s| down(*s)).collect());
        let decision = detector().evaluate(&obs, &PreviousView::empty());
        assert!(!decision.proceed);
        assert!(decision.triggered_signals.is_empty());
        assert_eq!(decision.outcome, GateOutcome::NoEvaluableSignals);
        assert_eq!(decision.reason, "no evaluable signals: 4/4 sources unavailable");
    }

    #[test]
    fn test_funding_extreme_strength() {
        let obs = observe(vec![snap(
            FactorSource::FundingRate,
            &[(metric_keys::CURRENT_RATE, -0.0025)],
        )]);
        let decision = detector().evaluate(&obs, &PreviousView::empty());
        let signal = &decision.triggered_signals[0];
        assert_eq!(signal.kind, SignalKind::FundingRate);
        assert_eq!(signal.strength, SignalStrength::Strong);
        assert_eq!(signal.value, -0.0025);

        let obs = observe(vec![snap(
            FactorSource::FundingRate,
            &[(metric_keys::CURRENT_RATE, 0.0015)],
        )]);
        let decision = detector().evaluate(&obs, &PreviousView::empty());
        assert_eq!(decision.triggered_signals[0].strength, SignalStrength::Medium);
    }

    #[test]
    fn test_funding_change_uses_previous_cycle() {
        let obs = observe(vec![snap(
            FactorSource::FundingRate,
            &[(metric_keys::CURRENT_RATE, 0.0008)],
        )]);

        let no_history = detector().evaluate(&obs, &PreviousView::empty());
        assert!(!no_history.has(SignalKind::FundingRate));

        let previous = PreviousView::empty().with_number(
            FactorSource::FundingRate,
            metric_keys::CURRENT_RATE,
            0.0001,
        );
        let decision = detector().evaluate(&obs, &previous);
        let signal = &decision.triggered_signals[0];
        assert_eq!(signal.kind, SignalKind::FundingRate);
        assert_eq!(signal.strength, SignalStrength::Medium);
        assert!((signal.value - 0.0007).abs() < 1e-12);
    }

    #[test]
    fn test_thresholds_are_strict() {
        let config = DetectionConfig::default();
        let obs = observe(vec![
            snap(
                FactorSource::FundingRate,
                &[(metric_keys::CURRENT_RATE, config.funding_rate_extreme_threshold)],
            ),
            snap(
                FactorSource::PriceVolume,
                &[
                    (metric_keys::PRICE_CHANGE_PCT, config.price_change_threshold),
                    (metric_keys::CURRENT_VOLUME, 200.0),
                    (metric_keys::AVG_VOLUME, 100.0),
                ],
            ),
            snap(
                FactorSource::MarketPressure,
                &[
                    (metric_keys::LONG_SHORT_RATIO, 2.5),
                    (metric_keys::TAKER_BUY_SELL_RATIO, 0.8),
                ],
            ),
            snap(FactorSource::NewsSentiment, &[(metric_keys::SENTIMENT_SCORE, -0.5)]),
        ]);

        let decision = detector().evaluate(&obs, &PreviousView::empty());
        assert_eq!(decision.signal_count, 0, "fired: {:?}", decision.kinds());
        assert_eq!(decision.evaluated_rules, 5);
    }

    #[test]
    fn test_threshold_plus_epsilon_fires() {
        const EPS: f64 = 1e-9;
        let fired = |snapshot: FactorSnapshot, previous: &PreviousView| {
            detector().evaluate(&observe(vec![snapshot]), previous).kinds()
        };
        let empty = PreviousView::empty();

        let rate = |r: f64| snap(FactorSource::FundingRate, &[(metric_keys::CURRENT_RATE, r)]);
        assert_eq!(fired(rate(0.001 + EPS), &empty), vec![SignalKind::FundingRate]);
        assert_eq!(fired(rate(-0.001 - EPS), &empty), vec![SignalKind::FundingRate]);

        // change against the previous cycle: on the line stays quiet, just past it fires
        let settled = PreviousView::empty().with_number(
            FactorSource::FundingRate,
            metric_keys::CURRENT_RATE,
            0.0,
        );
        assert!(fired(rate(0.0005), &settled).is_empty());
        assert_eq!(fired(rate(0.0005 + EPS), &settled), vec![SignalKind::FundingRate]);
        assert_eq!(fired(rate(-0.0005 - EPS), &settled), vec![SignalKind::FundingRate]);

        let price =
            |pct: f64| snap(FactorSource::PriceVolume, &[(metric_keys::PRICE_CHANGE_PCT, pct)]);
        assert_eq!(fired(price(5.0 + EPS), &empty), vec![SignalKind::PriceVolatility]);
        assert_eq!(fired(price(-5.0 - EPS), &empty), vec![SignalKind::PriceVolatility]);

        let volume = snap(
            FactorSource::PriceVolume,
            &[(metric_keys::CURRENT_VOLUME, 200.0 + 1e-6), (metric_keys::AVG_VOLUME, 100.0)],
        );
        assert_eq!(fired(volume, &empty), vec![SignalKind::VolumeAnomaly]);

        let pressure = |long_short: f64, taker: f64| {
            snap(
                FactorSource::MarketPressure,
                &[
                    (metric_keys::LONG_SHORT_RATIO, long_short),
                    (metric_keys::TAKER_BUY_SELL_RATIO, taker),
                ],
            )
        };
        assert_eq!(fired(pressure(2.5 + EPS, 1.0), &empty), vec![SignalKind::MarketPressure]);
        assert_eq!(fired(pressure(0.5 - EPS, 1.0), &empty), vec![SignalKind::MarketPressure]);
        assert_eq!(fired(pressure(1.0, 1.2 + EPS), &empty), vec![SignalKind::MarketPressure]);
        assert_eq!(fired(pressure(1.0, 0.8 - EPS), &empty), vec![SignalKind::MarketPressure]);

        let news = |score: f64| {
            snap(FactorSource::NewsSentiment, &[(metric_keys::SENTIMENT_SCORE, score)])
        };
        assert_eq!(fired(news(0.5 + EPS), &empty), vec![SignalKind::NewsSentiment]);
        assert_eq!(fired(news(-0.5 - EPS), &empty), vec![SignalKind::NewsSentiment]);
    }

    #[test]
    fn test_price_strength_scales_with_overshoot() {
        let strength = |pct: f64| {
            let obs = observe(vec![snap(
                FactorSource::PriceVolume,
                &[(metric_keys::PRICE_CHANGE_PCT, pct)],
            )]);
            detector().evaluate(&obs, &PreviousView::empty()).triggered_signals[0].strength
        };
        assert_eq!(strength(5.5), SignalStrength::Weak);
        assert_eq!(strength(-6.5), SignalStrength::Medium);
        assert_eq!(strength(7.0), SignalStrength::Strong);
    }

    #[test]
    fn test_volume_falls_back_to_previous_cycle() {
        let obs = observe(vec![snap(
            FactorSource::PriceVolume,
            &[(metric_keys::PRICE_CHANGE_PCT, 0.5), (metric_keys::CURRENT_VOLUME, 450.0)],
        )]);

        let without = detector().evaluate(&obs, &PreviousView::empty());
        assert_eq!(without.evaluated_rules, 1);
        assert!(!without.has(SignalKind::VolumeAnomaly));

        let previous = PreviousView::empty().with_number(
            FactorSource::PriceVolume,
            metric_keys::CURRENT_VOLUME,
            100.0,
        );
        let decision = detector().evaluate(&obs, &previous);
        let signal = &decision.triggered_signals[0];
        assert_eq!(signal.kind, SignalKind::VolumeAnomaly);
        assert_eq!(signal.strength, SignalStrength::Strong);
        assert_eq!(signal.value, 4.5);
    }

    #[test]
    fn test_market_pressure_both_breaches_is_strong() {
        let obs = observe(vec![snap(
            FactorSource::MarketPressure,
            &[
                (metric_keys::LONG_SHORT_RATIO, 0.4),
                (metric_keys::TAKER_BUY_SELL_RATIO, 1.3),
            ],
        )]);
        let decision = detector().evaluate(&obs, &PreviousView::empty());
        let signal = &decision.triggered_signals[0];
        assert_eq!(signal.strength, SignalStrength::Strong);
        assert_eq!(signal.value, 0.4);
        assert!(signal.description.contains("below range"));
        assert!(signal.description.contains("above range"));
    }

    #[test]
    fn test_news_skipped_when_unavailable() {
        let mut snapshots = quiet_market();
        snapshots.pop();
        snapshots.push(FactorSnapshot::unavailable(
            FactorSource::NewsSentiment,
            "BTCUSDT",
            "no api key",
        ));
        let decision = detector().evaluate(&observe(snapshots), &PreviousView::empty());
        assert_eq!(decision.evaluated_rules, 4);
        assert!(!decision.has(SignalKind::NewsSentiment));
    }

    #[test]
    fn test_news_strength_caps_at_one() {
        let config = DetectionConfig {
            news_sentiment_threshold: 0.6,
            ..Default::default()
        };
        let obs = observe(vec![snap(
            FactorSource::NewsSentiment,
            &[(metric_keys::SENTIMENT_SCORE, -1.0)],
        )]);
        let decision = SignalDetector::new(config)
            .unwrap()
            .evaluate(&obs, &PreviousView::empty());
        assert_eq!(decision.triggered_signals[0].strength, SignalStrength::Strong);
    }

    #[test]
    fn test_disabled_detection_always_proceeds() {
        let config = DetectionConfig {
            enabled: false,
            ..Default::default()
        };
        let detector = SignalDetector::new(config).unwrap();

        let decision = detector.evaluate(&observe(quiet_market()), &PreviousView::empty());
        assert!(decision.proceed);
        assert_eq!(decision.outcome, GateOutcome::DetectionDisabled);
        assert_eq!(decision.reason, "detection disabled");

        let outage = observe(FactorSource::ALL.iter().map(|s| down(*s)).collect());
        let decision = detector.evaluate(&outage, &PreviousView::empty());
        assert!(!decision.proceed);
        assert_eq!(decision.outcome, GateOutcome::NoEvaluableSignals);
    }

    #[test]
    fn test_min_signal_count_is_monotonic() {
        let obs = observe(vec![
            snap(FactorSource::FundingRate, &[(metric_keys::CURRENT_RATE, 0.002)]),
            snap(FactorSource::PriceVolume, &[(metric_keys::PRICE_CHANGE_PCT, 8.0)]),
            snap(FactorSource::NewsSentiment, &[(metric_keys::SENTIMENT_SCORE, 0.9)]),
        ]);

        let mut last = true;
        for min in 1..=5 {
            let config = DetectionConfig {
                min_signal_count: min,
                ..Default::default()
            };
            let decision = SignalDetector::new(config)
                .unwrap()
                .evaluate(&obs, &PreviousView::empty());
            assert_eq!(decision.signal_count, 3);
            // raising the minimum never turns a skip into a proceed
            assert!(!decision.proceed || last);
            assert_eq!(decision.proceed, min <= 3);
            last = decision.proceed;
        }
    }
}
