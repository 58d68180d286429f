// Normalization helpers shared by the collectors
use crate::types::*;

/// Quote currencies stripped to find the base asset of a pair
const QUOTE_SUFFIXES: [&str; 5] = ["USDT", "BUSD", "USDC", "FDUSD", "USD"];

/// Words counted as bullish in a headline
const POSITIVE_WORDS: [&str; 12] = [
    "surge", "rally", "bullish", "gain", "gains", "rise", "rises", "high",
    "breakthrough", "adoption", "partnership", "launch",
];

/// Words counted as bearish in a headline
const NEGATIVE_WORDS: [&str; 13] = [
    "crash", "drop", "fall", "falls", "bearish", "decline", "low", "hack",
    "scam", "ban", "regulation", "lawsuit", "concern",
];

/// Base asset of a trading pair ("BTCUSDT" -> "BTC")
pub fn base_asset(symbol: &str) -> String {
    let sym = symbol.to_uppercase();
    for quote in QUOTE_SUFFIXES {
        if let Some(base) = sym.strip_suffix(quote) {
            if !base.is_empty() {
                return base.to_string();
            }
        }
    }
    sym
}

/// Parse a numeric string field from an exchange payload
pub fn parse_number(raw: &str, field: &str) -> Result<f64> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| FeedError::InvalidResponse(format!("{} is not a number: {:?}", field, raw)))?;

    if !value.is_finite() {
        return Err(FeedError::InvalidResponse(format!(
            "{} is not finite: {}",
            field, raw
        )));
    }
    Ok(value)
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Compare the average of the newest `window` values against the oldest `window`
pub fn trend_label(values: &[f64], window: usize) -> &'static str {
    if values.len() < 2 || window == 0 {
        return "insufficient_data";
    }
    let window = window.min(values.len());
    let older = mean(&values[..window]).unwrap_or(0.0);
    let recent = mean(&values[values.len() - window..]).unwrap_or(0.0);

    if recent > older {
        "rising"
    } else if recent < older {
        "falling"
    } else {
        "flat"
    }
}

/// Keyword tone of a single headline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadlineTone {
    Positive,
    Negative,
    Neutral,
}

/// Classify a headline by whole-word keyword hits
pub fn classify_headline(title: &str) -> HeadlineTone {
    let lower = title.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let positive = words.iter().filter(|w| POSITIVE_WORDS.contains(w)).count();
    let negative = words.iter().filter(|w| NEGATIVE_WORDS.contains(w)).count();

    if positive > negative {
        HeadlineTone::Positive
    } else if negative > positive {
        HeadlineTone::Negative
    } else {
        HeadlineTone::Neutral
    }
}

/// Net tone in [-1, 1]
pub fn sentiment_score(positive: usize, negative: usize, neutral: usize) -> f64 {
    let total = positive + negative + neutral;
    if total == 0 {
        return 0.0;
    }
    (positive as f64 - negative as f64) / total as f64
}

/// Coarse label for a sentiment score
pub fn sentiment_label(score: f64) -> &'static str {
    if score > 0.3 {
        "positive"
    } else if score < -0.3 {
        "negative"
    } else {
        "neutral"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_asset() {
        assert_eq!(base_asset("BTCUSDT"), "BTC");
        assert_eq!(base_asset("ethusdc"), "ETH");
        assert_eq!(base_asset("SOLUSD"), "SOL");
        assert_eq!(base_asset("USDT"), "USDT");
        assert_eq!(base_asset("XAU"), "XAU");
    }

    #[test]
    fn test_parse_number_rejects_garbage() {
        assert_eq!(parse_number("0.00010000", "fundingRate").unwrap(), 0.0001);
        assert!(parse_number("abc", "fundingRate").is_err());
        assert!(parse_number("NaN", "fundingRate").is_err());
        assert!(parse_number("inf", "fundingRate").is_err());
    }

    #[test]
    fn test_trend_label() {
        assert_eq!(trend_label(&[1.0, 1.0, 2.0, 3.0], 2), "rising");
        assert_eq!(trend_label(&[3.0, 2.0, 1.0, 1.0], 2), "falling");
        assert_eq!(trend_label(&[1.0, 1.0], 6), "flat");
        assert_eq!(trend_label(&[1.0], 6), "insufficient_data");
    }

    #[test]
    fn test_classify_headline_uses_whole_words() {
        assert_eq!(
            classify_headline("Bitcoin rally extends as ETF adoption grows"),
            HeadlineTone::Positive
        );
        assert_eq!(
            classify_headline("Exchange hack triggers price crash"),
            HeadlineTone::Negative
        );
        // "update" and "lowdown" must not match "up"/"low"
        assert_eq!(
            classify_headline("Protocol update: the lowdown"),
            HeadlineTone::Neutral
        );
    }

    #[test]
    fn test_sentiment_score() {
        assert_eq!(sentiment_score(0, 0, 0), 0.0);
        assert_eq!(sentiment_score(3, 1, 1), 0.4);
        assert_eq!(sentiment_score(0, 5, 0), -1.0);
        assert_eq!(sentiment_label(0.4), "positive");
        assert_eq!(sentiment_label(-0.31), "negative");
        assert_eq!(sentiment_label(0.3), "neutral");
    }
}
