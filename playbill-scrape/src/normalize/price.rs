//! Price resolution

use once_cell::sync::Lazy;
use regex::Regex;

/// Ticket price range in whole currency units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PriceRange {
    pub min: Option<i64>,
    pub max: Option<i64>,
}

impl PriceRange {
    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    /// `[min, max]` of a pool of amounts
    pub fn from_amounts(amounts: &[f64]) -> Self {
        let finite = amounts.iter().copied().filter(|a| a.is_finite());
        let min = finite.clone().fold(None, |acc: Option<f64>, a| Some(acc.map_or(a, |m| m.min(a))));
        let max = finite.fold(None, |acc: Option<f64>, a| Some(acc.map_or(a, |m| m.max(a))));
        Self {
            min: min.map(round_amount),
            max: max.map(round_amount),
        }
    }
}

static RANGE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+(?:\.\d{2})?)\s*(?:-|–|—|to)\s*(\d+(?:\.\d{2})?)")
        .expect("price range regex must be valid")
});
static SINGLE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(?:\.\d{2})?").expect("price regex must be valid"));

/// Strip currency symbols and thousands separators
pub fn strip_currency(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '$' | '£' | '€' | '¥' | ','))
        .collect()
}

/// Parse "$20 - $50", "20 to 50" or "$35" into a range
pub fn resolve_price(text: &str) -> PriceRange {
    let clean = strip_currency(text);

    if let Some(caps) = RANGE_PATTERN.captures(&clean) {
        let min = caps[1].parse::<f64>().ok().map(round_amount);
        let max = caps[2].parse::<f64>().ok().map(round_amount);
        return PriceRange { min, max };
    }

    match SINGLE_PATTERN.find(&clean).and_then(|m| m.as_str().parse::<f64>().ok()) {
        Some(amount) => {
            let rounded = round_amount(amount);
            PriceRange {
                min: Some(rounded),
                max: Some(rounded),
            }
        }
        None => PriceRange::default(),
    }
}

fn round_amount(amount: f64) -> i64 {
    amount.round() as i64
}
