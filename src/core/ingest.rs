use crate::core::normalizer;
use crate::core::trust::{TrustEngine, Verdict};
use crate::core::upsert::{UpsertController, MAX_LOGGED_ERRORS};
use crate::domain::model::{IngestStats, RawRecord, UpsertOutcome};
use crate::domain::ports::CatalogStore;
use crate::utils::error::{EtlError, Result};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

/// Accepts `{"products": [...]}` or `{"product": {...}}`. An empty or
/// missing list is a validation error.
pub fn parse_submission(body: &[u8]) -> Result<Vec<Value>> {
    let mut payload: Value = serde_json::from_slice(body)?;

    let items = match payload.get_mut("products").map(Value::take) {
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(EtlError::ValidationError {
                message: "'products' must be an array".to_string(),
            })
        }
        None => match payload.get_mut("product").map(Value::take) {
            Some(Value::Null) | None => Vec::new(),
            Some(single) => vec![single],
        },
    };

    if items.is_empty() {
        return Err(EtlError::ValidationError {
            message: "no products provided".to_string(),
        });
    }
    Ok(items)
}

/// Batch submission path: every item goes through normalization and the
/// trust checks before a lookup-then-write against the catalog.
pub struct IngestService {
    upserter: UpsertController,
    trust: Arc<TrustEngine>,
    default_platform: String,
}

impl IngestService {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        trust: Arc<TrustEngine>,
        default_platform: impl Into<String>,
    ) -> Self {
        Self {
            upserter: UpsertController::new(catalog, trust.clone()),
            trust,
            default_platform: default_platform.into(),
        }
    }

    pub async fn ingest(&self, items: Vec<Value>) -> IngestStats {
        let mut stats = IngestStats {
            received: items.len() as u64,
            ..Default::default()
        };
        let now = Utc::now();

        for item in &items {
            let product = match RawRecord::from_json(item)
                .ok_or_else(|| "item is not a JSON object".to_string())
                .and_then(|raw| {
                    normalizer::normalize(&raw, &self.default_platform, now)
                        .map_err(|e| e.to_string())
                }) {
                Ok(product) => product,
                Err(reason) => {
                    tracing::debug!("Submitted item rejected: {}", reason);
                    stats.skipped_invalid += 1;
                    continue;
                }
            };

            match self.trust.verdict(&product) {
                Verdict::Wanted => {
                    stats.skipped_wanted += 1;
                    continue;
                }
                Verdict::Noise => {
                    stats.skipped_noise += 1;
                    continue;
                }
                Verdict::Trusted => {}
            }

            let source_url = product.source_url.clone();
            match self.upserter.insert_or_refresh(product).await {
                Ok(UpsertOutcome::Inserted) => stats.inserted += 1,
                Ok(UpsertOutcome::Updated) => stats.updated += 1,
                Err(e) => {
                    stats.failed += 1;
                    if stats.errors.len() < MAX_LOGGED_ERRORS {
                        tracing::error!("❌ Ingest write failed for {}: {}", source_url, e);
                        stats.errors.push(format!("{}: {}", source_url, e));
                    }
                }
            }
        }

        tracing::info!(
            "📥 Ingested {} items: {} inserted, {} updated, {} invalid, {} wanted, {} noise, {} failed",
            stats.received,
            stats.inserted,
            stats.updated,
            stats.skipped_invalid,
            stats.skipped_wanted,
            stats.skipped_noise,
            stats.failed
        );
        stats
    }
}
