use crate::core::trust::TrustEngine;
use crate::domain::model::{NormalizedProduct, UpsertOutcome};
use crate::domain::ports::CatalogStore;
use crate::utils::error::{EtlError, Result};
use std::collections::HashSet;
use std::sync::Arc;

/// Distinct error messages logged in detail per run; later ones are only counted.
pub const MAX_LOGGED_ERRORS: usize = 5;

/// Source URLs seen during one archive run. The first occurrence wins.
#[derive(Debug, Default)]
pub struct RunDedup {
    seen: HashSet<String>,
}

impl RunDedup {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` the first time `source_url` shows up in this run.
    pub fn first_seen(&mut self, source_url: &str) -> bool {
        if self.seen.contains(source_url) {
            return false;
        }
        self.seen.insert(source_url.to_string())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Keeps the first few distinct error messages and logs only those.
#[derive(Debug)]
pub struct ErrorSampler {
    scope: String,
    limit: usize,
    samples: Vec<String>,
    suppressed: u64,
}

impl ErrorSampler {
    pub fn new(scope: impl Into<String>, limit: usize) -> Self {
        Self {
            scope: scope.into(),
            limit,
            samples: Vec::new(),
            suppressed: 0,
        }
    }

    pub fn record(&mut self, err: &EtlError) {
        let message = err.to_string();
        if self.samples.contains(&message) {
            self.suppressed += 1;
            return;
        }
        if self.samples.len() < self.limit {
            tracing::error!("❌ [{}] store write failed: {}", self.scope, message);
            self.samples.push(message);
        } else {
            self.suppressed += 1;
        }
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }
}

pub struct UpsertController {
    catalog: Arc<dyn CatalogStore>,
    trust: Arc<TrustEngine>,
}

impl UpsertController {
    pub fn new(catalog: Arc<dyn CatalogStore>, trust: Arc<TrustEngine>) -> Self {
        Self { catalog, trust }
    }

    /// Conflict-safe write keyed on `source_url`. The price score only lands
    /// on insert; an existing row keeps its curated fields.
    pub async fn upsert(&self, mut product: NormalizedProduct) -> Result<UpsertOutcome> {
        product.price_score = self.trust.score(&product);
        self.catalog.upsert(&product).await
    }

    /// Lookup-then-write used by batch submissions: insert with score when
    /// the URL is new, otherwise refresh the price only.
    pub async fn insert_or_refresh(&self, mut product: NormalizedProduct) -> Result<UpsertOutcome> {
        match self.catalog.find_by_source_url(&product.source_url).await? {
            Some(_) => {
                self.catalog
                    .update_price(&product.source_url, product.price, product.updated_at)
                    .await?;
                Ok(UpsertOutcome::Updated)
            }
            None => {
                product.price_score = self.trust.score(&product);
                self.catalog.insert(&product).await?;
                Ok(UpsertOutcome::Inserted)
            }
        }
    }
}
