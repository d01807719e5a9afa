use crate::core::classifier;
use crate::domain::model::{Category, NormalizedProduct, RawRecord};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

// 欄位別名：前者為夥伴 feed 欄位，後者為批次 API 欄位
pub const SOURCE_URL_FIELDS: &[&str] = &["aw_deep_link", "merchant_deep_link", "source_url", "url", "deep_link"];
pub const TITLE_FIELDS: &[&str] = &["product_name", "title", "name"];
pub const DESCRIPTION_FIELDS: &[&str] = &["description", "product_short_description", "short_description"];
pub const PRICE_FIELDS: &[&str] = &["search_price", "display_price", "store_price", "price"];
pub const CURRENCY_FIELDS: &[&str] = &["currency"];
pub const IMAGE_FIELDS: &[&str] = &["merchant_image_url", "aw_image_url", "large_image", "image_url", "image"];
pub const CATEGORY_FIELDS: &[&str] = &["merchant_category", "category_name", "category"];
pub const CONDITION_FIELDS: &[&str] = &["condition", "product_condition"];
pub const PLATFORM_FIELDS: &[&str] = &["platform"];

const DEFAULT_CURRENCY: &str = "EUR";
const DEFAULT_CONDITION: &str = "new";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("unparseable price: {0}")]
    InvalidPrice(String),

    #[error("category could not be classified")]
    Unclassified,
}

pub fn source_url(record: &RawRecord) -> Option<&str> {
    record.first_of(SOURCE_URL_FIELDS)
}

/// Parses a non-negative decimal price, tolerating currency symbols and
/// either `.` or `,` as the decimal separator.
pub fn parse_price(raw: &str) -> Result<Decimal, NormalizeError> {
    let invalid = || NormalizeError::InvalidPrice(raw.to_string());

    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let normalized = match (cleaned.rfind('.'), cleaned.rfind(',')) {
        // 兩者都有時，後出現者為小數點
        (Some(dot), Some(comma)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (None, Some(_)) => cleaned.replace(',', "."),
        _ => cleaned,
    };

    let price = Decimal::from_str(&normalized).map_err(|_| invalid())?;
    if price.is_sign_negative() && !price.is_zero() {
        return Err(invalid());
    }
    Ok(price.normalize())
}

/// Category from the record: a canonical slug is taken as is, anything else
/// goes through the classifier.
pub fn resolve_category(record: &RawRecord) -> Result<Category, NormalizeError> {
    let category_text = record.first_of(CATEGORY_FIELDS).unwrap_or("");
    if let Ok(category) = Category::from_str(category_text) {
        return Ok(category);
    }
    let title = record.first_of(TITLE_FIELDS).unwrap_or("");
    classifier::classify(category_text, title).ok_or(NormalizeError::Unclassified)
}

/// Builds the canonical product. Steps run in a fixed order: source URL,
/// title, category, price.
pub fn normalize(
    record: &RawRecord,
    default_platform: &str,
    now: DateTime<Utc>,
) -> Result<NormalizedProduct, NormalizeError> {
    let source_url = source_url(record).ok_or(NormalizeError::MissingField("source_url"))?;
    let title = record
        .first_of(TITLE_FIELDS)
        .ok_or(NormalizeError::MissingField("title"))?;
    let category = resolve_category(record)?;
    let price = parse_price(
        record
            .first_of(PRICE_FIELDS)
            .ok_or(NormalizeError::MissingField("price"))?,
    )?;

    Ok(NormalizedProduct {
        title: title.to_string(),
        description: record.first_of(DESCRIPTION_FIELDS).unwrap_or("").to_string(),
        price,
        currency: record
            .first_of(CURRENCY_FIELDS)
            .unwrap_or(DEFAULT_CURRENCY)
            .to_ascii_uppercase(),
        image_url: record.first_of(IMAGE_FIELDS).map(str::to_string),
        source_url: source_url.to_string(),
        platform: record
            .first_of(PLATFORM_FIELDS)
            .unwrap_or(default_platform)
            .to_string(),
        category,
        condition: record
            .first_of(CONDITION_FIELDS)
            .unwrap_or(DEFAULT_CONDITION)
            .to_lowercase(),
        price_score: None,
        created_at: now,
        updated_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_price_formats() {
        assert_eq!(parse_price("12.50").unwrap(), dec("12.5"));
        assert_eq!(parse_price("12,50").unwrap(), dec("12.5"));
        assert_eq!(parse_price("€ 9.99").unwrap(), dec("9.99"));
        assert_eq!(parse_price("1.234,56 €").unwrap(), dec("1234.56"));
        assert_eq!(parse_price("1,234.56").unwrap(), dec("1234.56"));
        assert_eq!(parse_price("0").unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_parse_price_rejects_garbage() {
        assert!(parse_price("").is_err());
        assert!(parse_price("gratis").is_err());
        assert!(parse_price("-5.00").is_err());
        assert!(parse_price("1.2.3").is_err());
    }

    #[test]
    fn test_normalize_feed_row() {
        let record = RawRecord::from_pairs([
            ("aw_deep_link", "https://track.example/p/1"),
            ("product_name", "Kindle Paperwhite"),
            ("description", "E-reader 6.8\""),
            ("search_price", "149.99"),
            ("currency", "eur"),
            ("merchant_image_url", "https://img.example/1.jpg"),
            ("merchant_category", "Electrónica > Lectores"),
        ]);
        let now = Utc::now();
        let product = normalize(&record, "awin-Fnac", now).unwrap();

        assert_eq!(product.source_url, "https://track.example/p/1");
        assert_eq!(product.title, "Kindle Paperwhite");
        assert_eq!(product.price, dec("149.99"));
        assert_eq!(product.currency, "EUR");
        assert_eq!(product.platform, "awin-Fnac");
        assert_eq!(product.category, Category::TechElectronics);
        assert_eq!(product.condition, "new");
        assert_eq!(product.image_url.as_deref(), Some("https://img.example/1.jpg"));
        assert_eq!(product.created_at, now);
        assert!(product.price_score.is_none());
    }

    #[test]
    fn test_normalize_api_record_with_slug_category() {
        let record = RawRecord::from_json(&serde_json::json!({
            "title": "Bicicleta urbana",
            "source_url": "https://market.example/item/9",
            "price": 180,
            "category": "sports-leisure",
            "platform": "wallapop",
            "condition": "Used"
        }))
        .unwrap();
        let product = normalize(&record, "api", Utc::now()).unwrap();
        assert_eq!(product.category, Category::SportsLeisure);
        assert_eq!(product.platform, "wallapop");
        assert_eq!(product.condition, "used");
        assert_eq!(product.price, dec("180"));
    }

    #[test]
    fn test_normalize_failures() {
        let now = Utc::now();
        let no_url = RawRecord::from_pairs([("product_name", "x"), ("search_price", "1")]);
        assert_eq!(
            normalize(&no_url, "p", now),
            Err(NormalizeError::MissingField("source_url"))
        );

        let unclassified = RawRecord::from_pairs([
            ("aw_deep_link", "https://t/1"),
            ("product_name", "Artículo sorpresa"),
            ("search_price", "1"),
        ]);
        assert_eq!(
            normalize(&unclassified, "p", now),
            Err(NormalizeError::Unclassified)
        );

        let bad_price = RawRecord::from_pairs([
            ("aw_deep_link", "https://t/1"),
            ("product_name", "Dune"),
            ("merchant_category", "Libros"),
            ("search_price", "consultar"),
        ]);
        assert!(matches!(
            normalize(&bad_price, "p", now),
            Err(NormalizeError::InvalidPrice(_))
        ));
    }
}
