//! Indicator-driven signal analysis
//!
//! Computes moving averages, RSI, Bollinger Bands and MACD with `ta`, turns
//! indicator crossings into [`Signal`]s and derives an overall recommendation
//! from the signals that fired within the most recent bars.

use async_trait::async_trait;
use finproof_core::{
    AnalysisCategory, AnalysisParameters, AnalysisResult, Analyzer, AnalyzerDescriptor, Bar,
    ParamSpec, ProgressReporter, Signal, SignalType, recommendation_from_signals,
};
use serde_json::json;
use ta::{
    Next,
    indicators::{
        BollingerBands, MovingAverageConvergenceDivergence, RelativeStrengthIndex,
        SimpleMovingAverage,
    },
};

/// Registry key
pub const NAME: &str = "technical";

const RSI_OVERSOLD: f64 = 30.0;
const RSI_OVERBOUGHT: f64 = 70.0;

/// Indicator series aligned with the input bars
struct Indicators {
    sma_short: Vec<f64>,
    sma_long: Vec<f64>,
    rsi: Vec<f64>,
    bb_upper: Vec<f64>,
    bb_middle: Vec<f64>,
    bb_lower: Vec<f64>,
    macd: Vec<f64>,
    macd_signal: Vec<f64>,
    macd_histogram: Vec<f64>,
}

/// Settings read from the resolved parameters
struct Settings {
    sma_short: usize,
    sma_long: usize,
    rsi_period: usize,
    bb_period: usize,
    bb_std: f64,
    lookback_bars: usize,
}

/// Technical indicator analyzer
pub struct TechnicalAnalyzer {
    descriptor: AnalyzerDescriptor,
}

impl Default for TechnicalAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl TechnicalAnalyzer {
    pub fn new() -> Self {
        let descriptor = AnalyzerDescriptor::new(NAME, "Technical Signals", AnalysisCategory::Technical)
            .with_description("Moving average, RSI, Bollinger Band and MACD crossover signals")
            .with_min_data_points(50)
            .with_estimated_duration(5)
            .with_parameter(
                ParamSpec::integer("sma_short", 20)
                    .range(5.0, 100.0)
                    .describe("Fast moving average period"),
            )
            .with_parameter(
                ParamSpec::integer("sma_long", 50)
                    .range(10.0, 250.0)
                    .describe("Slow moving average period"),
            )
            .with_parameter(
                ParamSpec::integer("rsi_period", 14)
                    .range(2.0, 50.0)
                    .describe("RSI lookback"),
            )
            .with_parameter(
                ParamSpec::integer("bb_period", 20)
                    .range(5.0, 100.0)
                    .describe("Bollinger Band window"),
            )
            .with_parameter(
                ParamSpec::number("bb_std", 2.0)
                    .range(1.0, 4.0)
                    .describe("Bollinger Band width in standard deviations"),
            )
            .with_parameter(
                ParamSpec::integer("lookback_bars", 5)
                    .range(1.0, 30.0)
                    .describe("Bars counted as recent when summarizing signals"),
            );
        Self { descriptor }
    }

    fn compute(closes: &[f64], s: &Settings) -> Result<Indicators, String> {
        let err = |e: ta::errors::TaError| e.to_string();
        let mut sma_short = SimpleMovingAverage::new(s.sma_short).map_err(err)?;
        let mut sma_long = SimpleMovingAverage::new(s.sma_long).map_err(err)?;
        let mut rsi = RelativeStrengthIndex::new(s.rsi_period).map_err(err)?;
        let mut bb = BollingerBands::new(s.bb_period, s.bb_std).map_err(err)?;
        let mut macd = MovingAverageConvergenceDivergence::new(12, 26, 9).map_err(err)?;

        let n = closes.len();
        let mut out = Indicators {
            sma_short: Vec::with_capacity(n),
            sma_long: Vec::with_capacity(n),
            rsi: Vec::with_capacity(n),
            bb_upper: Vec::with_capacity(n),
            bb_middle: Vec::with_capacity(n),
            bb_lower: Vec::with_capacity(n),
            macd: Vec::with_capacity(n),
            macd_signal: Vec::with_capacity(n),
            macd_histogram: Vec::with_capacity(n),
        };

        for &close in closes {
            out.sma_short.push(sma_short.next(close));
            out.sma_long.push(sma_long.next(close));
            out.rsi.push(rsi.next(close));
            let bands = bb.next(close);
            out.bb_upper.push(bands.upper);
            out.bb_middle.push(bands.average);
            out.bb_lower.push(bands.lower);
            let m = macd.next(close);
            out.macd.push(m.macd);
            out.macd_signal.push(m.signal);
            out.macd_histogram.push(m.histogram);
        }
        Ok(out)
    }

    /// Crossing signals for bar `i` against bar `i - 1`
    fn signals_at(i: usize, bars: &[Bar], ind: &Indicators, s: &Settings) -> Vec<Signal> {
        let mut signals = Vec::new();
        let p = i - 1;
        let date = bars[i].timestamp.format("%Y-%m-%d");
        let close = bars[i].close;

        // MA crossover
        if i > s.sma_long {
            let (fast, slow) = (&ind.sma_short, &ind.sma_long);
            if fast[i] > slow[i] && fast[p] <= slow[p] {
                signals.push(Signal::new(
                    SignalType::Buy,
                    "MA Crossover",
                    format!("Golden cross: SMA{} crossed above SMA{} on {date}", s.sma_short, s.sma_long),
                    0.75,
                ));
            } else if fast[i] < slow[i] && fast[p] >= slow[p] {
                signals.push(Signal::new(
                    SignalType::Sell,
                    "MA Crossover",
                    format!("Death cross: SMA{} crossed below SMA{} on {date}", s.sma_short, s.sma_long),
                    0.75,
                ));
            }
        }

        // RSI leaving the extreme zones
        if i > s.rsi_period {
            let (now, prev) = (ind.rsi[i], ind.rsi[p]);
            if now > RSI_OVERSOLD && prev <= RSI_OVERSOLD {
                let strong = prev < 25.0;
                signals.push(Signal::new(
                    SignalType::Buy,
                    "RSI",
                    format!("RSI left oversold zone on {date} (was {prev:.1})"),
                    if strong { 0.7 } else { 0.55 },
                ));
            } else if now < RSI_OVERBOUGHT && prev >= RSI_OVERBOUGHT {
                let strong = prev > 75.0;
                signals.push(Signal::new(
                    SignalType::Sell,
                    "RSI",
                    format!("RSI left overbought zone on {date} (was {prev:.1})"),
                    if strong { 0.7 } else { 0.55 },
                ));
            }
        }

        // Bollinger band re-entry
        if i > s.bb_period {
            let prev_close = bars[p].close;
            if prev_close < ind.bb_lower[p] && close > ind.bb_lower[i] {
                signals.push(Signal::new(
                    SignalType::Buy,
                    "Bollinger Bands",
                    format!("Price recovered from the lower band on {date}"),
                    0.6,
                ));
            } else if prev_close > ind.bb_upper[p] && close < ind.bb_upper[i] {
                signals.push(Signal::new(
                    SignalType::Sell,
                    "Bollinger Bands",
                    format!("Price fell back from the upper band on {date}"),
                    0.6,
                ));
            }
        }

        // MACD / signal line crossover, stronger when it happens on the far side of zero
        if i > 26 + 9 {
            let (m, sig) = (&ind.macd, &ind.macd_signal);
            if m[i] > sig[i] && m[p] <= sig[p] {
                signals.push(Signal::new(
                    SignalType::Buy,
                    "MACD",
                    format!("MACD crossed above its signal line on {date}"),
                    if m[i] < 0.0 { 0.65 } else { 0.55 },
                ));
            } else if m[i] < sig[i] && m[p] >= sig[p] {
                signals.push(Signal::new(
                    SignalType::Sell,
                    "MACD",
                    format!("MACD crossed below its signal line on {date}"),
                    if m[i] > 0.0 { 0.65 } else { 0.55 },
                ));
            }
        }

        // Engulfing candles
        let (prev, cur) = (&bars[p], &bars[i]);
        if prev.close < prev.open
            && cur.close > cur.open
            && cur.open <= prev.close
            && cur.close >= prev.open
        {
            signals.push(Signal::new(
                SignalType::Buy,
                "Candlestick",
                format!("Bullish engulfing pattern on {date}"),
                0.55,
            ));
        } else if prev.close > prev.open
            && cur.close < cur.open
            && cur.open >= prev.close
            && cur.close <= prev.open
        {
            signals.push(Signal::new(
                SignalType::Sell,
                "Candlestick",
                format!("Bearish engulfing pattern on {date}"),
                0.55,
            ));
        }

        signals
    }
}

#[async_trait]
impl Analyzer for TechnicalAnalyzer {
    fn descriptor(&self) -> &AnalyzerDescriptor {
        &self.descriptor
    }

    async fn analyze(
        &self,
        params: &AnalysisParameters,
        progress: &dyn ProgressReporter,
    ) -> AnalysisResult {
        let symbol = &params.symbol;
        let errors = self.validate(&params.dataset);
        if let Some(first) = errors.into_iter().next() {
            return AnalysisResult::degraded(NAME, symbol, first);
        }

        let custom = &params.custom;
        let settings = Settings {
            sma_short: custom.usize_or("sma_short", 20),
            sma_long: custom.usize_or("sma_long", 50),
            rsi_period: custom.usize_or("rsi_period", 14),
            bb_period: custom.usize_or("bb_period", 20),
            bb_std: custom.f64_or("bb_std", 2.0),
            lookback_bars: custom.usize_or("lookback_bars", 5),
        };
        if settings.sma_short >= settings.sma_long {
            return AnalysisResult::degraded(
                NAME,
                symbol,
                format!(
                    "sma_short ({}) must be smaller than sma_long ({})",
                    settings.sma_short, settings.sma_long
                ),
            );
        }

        let bars = params.dataset.bars();
        if bars.len() <= settings.sma_long {
            return AnalysisResult::degraded(
                NAME,
                symbol,
                format!(
                    "not enough data points for SMA{}: {} available",
                    settings.sma_long,
                    bars.len()
                ),
            );
        }
        progress.report(10);

        let closes = params.dataset.closes();
        let ind = match Self::compute(&closes, &settings) {
            Ok(ind) => ind,
            Err(e) => return AnalysisResult::degraded(NAME, symbol, format!("indicator error: {e}")),
        };
        progress.report(50);

        let n = bars.len();
        let recent_from = n.saturating_sub(settings.lookback_bars).max(1);
        let mut signals: Vec<Signal> = Vec::new();
        for i in recent_from..n {
            signals.extend(Self::signals_at(i, bars, &ind, &settings));
        }
        // newest first
        signals.reverse();
        progress.report(80);

        let recommendation = recommendation_from_signals(&signals);
        let confidence = if signals.is_empty() {
            0.5
        } else {
            signals.iter().map(|s| s.confidence).sum::<f64>() / signals.len() as f64
        };

        let last = n - 1;
        let price = closes[last];
        let (buys, sells) = signals.iter().fold((0, 0), |(b, s), sig| match sig.signal_type {
            SignalType::Buy => (b + 1, s),
            SignalType::Sell => (b, s + 1),
            SignalType::Hold => (b, s),
        });
        let position = if price > ind.sma_long[last] { "above" } else { "below" };

        let summary = format!(
            "{} bias from {} recent signal(s) ({buys} buy, {sells} sell). RSI {:.1}, price {position} SMA{}.",
            recommendation.as_str().to_uppercase(),
            signals.len(),
            ind.rsi[last],
            settings.sma_long,
        );

        let mut result = AnalysisResult::new(NAME, symbol, summary)
            .with_confidence(confidence)
            .with_recommendation(recommendation)
            .with_data("current_price", json!(price))
            .with_data(format!("sma_{}", settings.sma_short), json!(ind.sma_short[last]))
            .with_data(format!("sma_{}", settings.sma_long), json!(ind.sma_long[last]))
            .with_data("rsi", json!(ind.rsi[last]))
            .with_data("bb_upper", json!(ind.bb_upper[last]))
            .with_data("bb_middle", json!(ind.bb_middle[last]))
            .with_data("bb_lower", json!(ind.bb_lower[last]))
            .with_data("macd", json!(ind.macd[last]))
            .with_data("macd_signal", json!(ind.macd_signal[last]))
            .with_data("macd_histogram", json!(ind.macd_histogram[last]))
            .with_data("buy_count", json!(buys))
            .with_data("sell_count", json!(sells))
            .with_data("price_vs_sma_long", json!(position))
            .with_data("parameters", custom.to_value())
            .with_signals(signals);

        if ind.rsi[last] > RSI_OVERBOUGHT {
            result.add_warning(format!("RSI is overbought ({:.1})", ind.rsi[last]));
        } else if ind.rsi[last] < RSI_OVERSOLD {
            result.add_warning(format!("RSI is oversold ({:.1})", ind.rsi[last]));
        }

        progress.report(100);
        result
    }
}
