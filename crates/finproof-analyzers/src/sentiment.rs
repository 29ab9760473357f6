//! Headline sentiment analysis
//!
//! Scores recent headlines against a finance-specific word lexicon (English
//! and German) and aggregates them into a market-mood reading. Each headline
//! scores `(positive - negative) / matched` in -1.0..=1.0.

use async_trait::async_trait;
use finproof_core::dataset::mean;
use finproof_core::{
    AnalysisCategory, AnalysisParameters, AnalysisResult, Analyzer, AnalyzerDescriptor, ParamSpec,
    ProgressReporter, Signal, SignalType, Timeframe,
};
use finproof_market::{Headline, HeadlineSource};
use regex::Regex;
use serde_json::json;
use std::sync::{Arc, LazyLock};
use tracing::debug;

/// Registry key
pub const NAME: &str = "sentiment";

/// Score beyond which a headline or the aggregate counts as directional
const LABEL_THRESHOLD: f64 = 0.3;

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+").expect("word pattern is valid"));

const POSITIVE_WORDS: &[&str] = &[
    "buy", "bullish", "upgrade", "growth", "profit", "gain", "surge", "rally", "breakthrough",
    "beat", "exceed", "record", "strong", "positive", "optimistic", "outperform", "winner",
    "success", "momentum", "breakout", "opportunity", "kaufen", "stark", "wachstum", "gewinn",
    "durchbruch", "erfolg", "positiv", "chancen",
];

const NEGATIVE_WORDS: &[&str] = &[
    "sell", "bearish", "downgrade", "loss", "decline", "drop", "crash", "fall", "miss", "weak",
    "negative", "warning", "risk", "concern", "underperform", "loser", "failure", "bankruptcy",
    "fraud", "lawsuit", "verkaufen", "schwach", "verlust", "risiko", "warnung", "absturz",
    "krise", "pleite", "negativ",
];

/// Lexicon score of a piece of text, 0.0 when no lexicon word occurs
pub fn score_text(text: &str) -> f64 {
    let lower = text.to_lowercase();
    let (positive, negative) = WORD_RE
        .find_iter(&lower)
        .fold((0usize, 0usize), |(p, n), word| {
            let word = word.as_str();
            if POSITIVE_WORDS.contains(&word) {
                (p + 1, n)
            } else if NEGATIVE_WORDS.contains(&word) {
                (p, n + 1)
            } else {
                (p, n)
            }
        });
    let total = positive + negative;
    if total == 0 {
        return 0.0;
    }
    (positive as f64 - negative as f64) / total as f64
}

/// "positive", "negative" or "neutral"
pub fn score_label(score: f64) -> &'static str {
    if score > LABEL_THRESHOLD {
        "positive"
    } else if score < -LABEL_THRESHOLD {
        "negative"
    } else {
        "neutral"
    }
}

struct ScoredHeadline {
    headline: Headline,
    score: f64,
}

/// Lexicon-based headline sentiment analyzer
pub struct SentimentAnalyzer {
    descriptor: AnalyzerDescriptor,
    headlines: Arc<dyn HeadlineSource>,
}

impl SentimentAnalyzer {
    pub fn new(headlines: Arc<dyn HeadlineSource>) -> Self {
        let descriptor =
            AnalyzerDescriptor::new(NAME, "Sentiment & News", AnalysisCategory::Nlp)
                .with_description("Scores recent news headlines for market mood")
                .with_min_data_points(1)
                .with_timeframes(vec![Timeframe::Short])
                .with_estimated_duration(15)
                .with_parameter(
                    ParamSpec::boolean("include_news", true).describe("Fetch and score news"),
                )
                .with_parameter(
                    ParamSpec::integer("max_articles", 20)
                        .range(5.0, 50.0)
                        .describe("Maximum number of headlines scored"),
                );
        Self {
            descriptor,
            headlines,
        }
    }
}

#[async_trait]
impl Analyzer for SentimentAnalyzer {
    fn descriptor(&self) -> &AnalyzerDescriptor {
        &self.descriptor
    }

    async fn analyze(
        &self,
        params: &AnalysisParameters,
        progress: &dyn ProgressReporter,
    ) -> AnalysisResult {
        let symbol = &params.symbol;
        progress.report(10);

        let include_news = params.custom.bool_or("include_news", true);
        let max_articles = params.custom.usize_or("max_articles", 20);

        let headlines = if include_news {
            self.headlines.headlines(symbol, max_articles).await
        } else {
            Vec::new()
        };
        debug!(symbol = %symbol, count = headlines.len(), "Headlines loaded for sentiment");
        progress.report(40);

        if headlines.is_empty() {
            progress.report(100);
            return AnalysisResult::new(NAME, symbol, "No headlines found for sentiment analysis.")
                .with_confidence(0.3)
                .with_data("articles_analyzed", json!(0))
                .with_warning("no news available");
        }

        let scored: Vec<ScoredHeadline> = headlines
            .into_iter()
            .take(max_articles)
            .map(|headline| ScoredHeadline {
                score: score_text(&headline.title),
                headline,
            })
            .collect();
        progress.report(60);

        let scores: Vec<f64> = scored.iter().map(|s| s.score).collect();
        let total = scores.len();
        let average = mean(&scores);
        let median = median(&scores);
        // Population standard deviation
        let std = (scores.iter().map(|s| (s - average).powi(2)).sum::<f64>() / total as f64).sqrt();
        let positive = scores.iter().filter(|s| **s > LABEL_THRESHOLD).count();
        let negative = scores.iter().filter(|s| **s < -LABEL_THRESHOLD).count();
        let neutral = total - positive - negative;
        let pct = |count: usize| count as f64 / total as f64 * 100.0;
        progress.report(80);

        let (overall, recommendation) = if average > LABEL_THRESHOLD {
            ("bullish", SignalType::Buy)
        } else if average < -LABEL_THRESHOLD {
            ("bearish", SignalType::Sell)
        } else {
            ("neutral", SignalType::Hold)
        };

        // Consistent headlines earn more confidence
        let confidence = if std < 0.3 {
            0.7 + average.abs() * 0.2
        } else {
            0.5 + average.abs() * 0.1
        }
        .min(0.85);

        let mut by_strength: Vec<&ScoredHeadline> = scored.iter().collect();
        by_strength.sort_by(|a, b| b.score.abs().total_cmp(&a.score.abs()));
        let top = |keep: fn(f64) -> bool| {
            by_strength
                .iter()
                .filter(|s| keep(s.score))
                .take(3)
                .map(|s| json!({"title": s.headline.title, "score": s.score}))
                .collect::<Vec<_>>()
        };
        let top_positive = top(|s| s > 0.0);
        let top_negative = top(|s| s < 0.0);

        let articles: Vec<_> = scored
            .iter()
            .map(|s| {
                json!({
                    "title": s.headline.title,
                    "source": s.headline.source,
                    "published_at": s.headline.published_at,
                    "sentiment": score_label(s.score),
                    "score": s.score,
                })
            })
            .collect();

        let summary = format!(
            "Market mood: {} (score {average:.2}). Analyzed {total} headlines, {:.0}% positive, {:.0}% negative.",
            overall.to_uppercase(),
            pct(positive),
            pct(negative),
        );

        let mut result = AnalysisResult::new(NAME, symbol, summary)
            .with_confidence(confidence)
            .with_recommendation(recommendation)
            .with_data("overall_sentiment", json!(overall))
            .with_data("average_score", json!(average))
            .with_data("median_score", json!(median))
            .with_data("std_deviation", json!(std))
            .with_data("positive_count", json!(positive))
            .with_data("negative_count", json!(negative))
            .with_data("neutral_count", json!(neutral))
            .with_data("positive_percent", json!(pct(positive)))
            .with_data("negative_percent", json!(pct(negative)))
            .with_data("articles_analyzed", json!(total))
            .with_data("top_positive_headlines", json!(top_positive))
            .with_data("top_negative_headlines", json!(top_negative))
            .with_data("articles", json!(articles))
            .with_signals(vec![Signal::new(
                recommendation,
                "Sentiment",
                format!("Market mood: {overall} ({average:.2})"),
                confidence,
            )]);

        if std > 0.5 {
            result.add_warning("high sentiment variance; headlines send mixed signals");
        }
        if total < 5 {
            result.add_warning("few headlines analyzed; result is uncertain");
        }

        progress.report(100);
        result
    }
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    crate::stats::quantile(&sorted, 0.5)
}
