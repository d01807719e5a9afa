use crate::core::archive::redact_url;
use crate::domain::model::Partner;
use crate::domain::ports::PartnerApi;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub struct PartnerApiSettings {
    pub programmes_url: String,
    pub feed_catalog_url: String,
    pub feed_archive_url: String,
    pub api_token: String,
    pub feed_api_key: String,
    pub columns: Vec<String>,
    pub timeout: Duration,
}

/// Affiliate network client: programme list (bearer auth), feed listing and
/// archive URLs (api key in the query string).
pub struct HttpPartnerApi {
    client: Client,
    settings: PartnerApiSettings,
}

impl HttpPartnerApi {
    pub fn new(settings: PartnerApiSettings) -> Result<Self> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { client, settings })
    }

    fn transport(&self, operation: &str) -> impl Fn(reqwest::Error) -> EtlError + '_ {
        let operation = operation.to_string();
        move |e| EtlError::from_transport(e, &operation, self.settings.timeout.as_secs())
    }

    fn ensure_success(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(EtlError::HttpStatus {
                status: status.as_u16(),
                url: redact_url(response.url().as_str()),
            })
        }
    }
}

fn partner_from_json(value: &serde_json::Value) -> Option<Partner> {
    let id = match value.get("id")? {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
        _ => return None,
    };
    let name = value.get("name")?.as_str()?.trim().to_string();
    if name.is_empty() {
        return None;
    }
    Some(Partner {
        feed_api_identifier: id.clone(),
        id,
        name,
    })
}

#[async_trait]
impl PartnerApi for HttpPartnerApi {
    async fn joined_partners(&self) -> Result<Vec<Partner>> {
        tracing::debug!("Fetching joined programmes");
        let response = self
            .client
            .get(&self.settings.programmes_url)
            .query(&[("relationship", "joined")])
            .bearer_auth(&self.settings.api_token)
            .send()
            .await
            .map_err(self.transport("programme list fetch"))?;
        let response = Self::ensure_success(response)?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(self.transport("programme list fetch"))?;
        let items = body.as_array().ok_or_else(|| EtlError::ProcessingError {
            message: "programme list is not a JSON array".to_string(),
        })?;

        let partners: Vec<Partner> = items.iter().filter_map(partner_from_json).collect();
        if partners.len() < items.len() {
            tracing::warn!(
                "⚠️ {} programme entries without id/name were ignored",
                items.len() - partners.len()
            );
        }
        Ok(partners)
    }

    async fn feed_catalog(&self) -> Result<String> {
        let response = self
            .client
            .get(&self.settings.feed_catalog_url)
            .query(&[("apikey", self.settings.feed_api_key.as_str())])
            .send()
            .await
            .map_err(self.transport("feed catalog fetch"))?;
        let response = Self::ensure_success(response)?;
        response
            .text()
            .await
            .map_err(self.transport("feed catalog fetch"))
    }

    fn feed_archive_url(&self, feed_id: &str) -> Result<String> {
        let columns = self.settings.columns.join(",");
        let url = Url::parse_with_params(
            &self.settings.feed_archive_url,
            &[
                ("apikey", self.settings.feed_api_key.as_str()),
                ("fid", feed_id),
                ("columns", columns.as_str()),
                ("format", "csv"),
                ("compression", "zip"),
            ],
        )
        .map_err(|e| EtlError::InvalidConfigValueError {
            field: "partner_api.feed_archive_url".to_string(),
            value: self.settings.feed_archive_url.clone(),
            reason: e.to_string(),
        })?;
        Ok(url.to_string())
    }
}
