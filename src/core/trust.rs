//! Trust heuristics: buy-request detection, accessory noise, price scoring.

use crate::domain::model::{Category, NormalizedProduct, PriceScore};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Phrases that mark a listing as a buy request rather than an offer.
static WANTED_INTENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:busco|se busca|buscando|compro|quiero comprar|necesito comprar|looking for|want to buy|wtb)\b|\bwanted:",
    )
    .expect("wanted intent pattern")
});

static ELECTRONICS_ACCESSORY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:fundas?|carcasas?|protector(?:es)?|cristal templado|vidrio templado|cables?|cargador(?:es)?|adaptador(?:es)?|soportes?|correas?|pegatinas?|case|cover|screen protector|tempered glass|charger|adapter|strap|stand|holder|skin)\b",
    )
    .expect("electronics accessory pattern")
});

static MOTOR_TRINKET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:llaveros?|pegatinas?|alfombrillas?|maquetas?|miniaturas?|escala 1:\d+|keychains?|stickers?|decals?|scale model|diecast)\b",
    )
    .expect("motor trinket pattern")
});

/// A category-specific false positive: cheap items whose title names an
/// accessory or trinket rather than the primary good.
#[derive(Debug, Clone)]
pub struct NoiseRule {
    pub category: Category,
    pub max_price: Decimal,
    pub pattern: &'static Lazy<Regex>,
}

#[derive(Debug, Clone)]
pub struct TrustSettings {
    /// Relative deviation from the median that still counts as fair.
    pub price_band: Decimal,
    pub noise_price_threshold: Decimal,
    pub category_medians: HashMap<Category, Decimal>,
}

impl Default for TrustSettings {
    fn default() -> Self {
        Self {
            price_band: Decimal::new(15, 2),
            noise_price_threshold: Decimal::new(20, 0),
            category_medians: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Trusted,
    Wanted,
    Noise,
}

pub fn has_wanted_intent(product: &NormalizedProduct) -> bool {
    WANTED_INTENT.is_match(&product.title) || WANTED_INTENT.is_match(&product.description)
}

/// Scores `price` against a category median.
///
/// `None` when no usable median exists. Deviations of exactly `±band` are fair.
pub fn price_score(price: Decimal, median: Option<Decimal>, band: Decimal) -> Option<PriceScore> {
    let median = median.filter(|m| *m > Decimal::ZERO)?;
    let deviation = (price - median) / median;

    if deviation < -band {
        Some(PriceScore::Bargain)
    } else if deviation > band {
        Some(PriceScore::Expensive)
    } else {
        Some(PriceScore::Fair)
    }
}

#[derive(Debug, Clone)]
pub struct TrustEngine {
    settings: TrustSettings,
    noise_rules: Vec<NoiseRule>,
}

impl TrustEngine {
    pub fn new(settings: TrustSettings) -> Self {
        let threshold = settings.noise_price_threshold;
        Self {
            noise_rules: vec![
                NoiseRule {
                    category: Category::TechElectronics,
                    max_price: threshold,
                    pattern: &ELECTRONICS_ACCESSORY,
                },
                NoiseRule {
                    category: Category::CarsMotorcycles,
                    max_price: threshold,
                    pattern: &MOTOR_TRINKET,
                },
            ],
            settings,
        }
    }

    pub fn settings(&self) -> &TrustSettings {
        &self.settings
    }

    pub fn is_noise(&self, product: &NormalizedProduct) -> bool {
        self.noise_rules.iter().any(|rule| {
            rule.category == product.category
                && product.price < rule.max_price
                && rule.pattern.is_match(&product.title)
        })
    }

    pub fn verdict(&self, product: &NormalizedProduct) -> Verdict {
        if has_wanted_intent(product) {
            Verdict::Wanted
        } else if self.is_noise(product) {
            Verdict::Noise
        } else {
            Verdict::Trusted
        }
    }

    pub fn median_for(&self, category: Category) -> Option<Decimal> {
        self.settings.category_medians.get(&category).copied()
    }

    pub fn score(&self, product: &NormalizedProduct) -> Option<PriceScore> {
        price_score(
            product.price,
            self.median_for(product.category),
            self.settings.price_band,
        )
    }
}

impl Default for TrustEngine {
    fn default() -> Self {
        Self::new(TrustSettings::default())
    }
}
