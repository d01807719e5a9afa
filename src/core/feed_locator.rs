use crate::domain::model::{Feed, FeedStatus};
use crate::domain::ports::PartnerApi;
use crate::utils::error::{EtlError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

static GENERAL_FEED_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:general|universal|default|all products|todos los productos|completo|full)\b")
        .expect("general feed pattern")
});

const PARTNER_COLUMNS: &[&str] = &["advertiserid", "partnerid", "programmeid", "merchantid"];
const STATUS_COLUMNS: &[&str] = &["membershipstatus", "status", "feedstatus"];
const FEED_ID_COLUMNS: &[&str] = &["feedid", "fid", "id"];
const FEED_NAME_COLUMNS: &[&str] = &["feedname", "name"];
const ITEM_COUNT_COLUMNS: &[&str] = &["noofproducts", "itemcount", "products", "productcount"];

fn header_key(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn sniff_delimiter(text: &str) -> u8 {
    let first_line = text.lines().next().unwrap_or("");
    [b',', b'\t', b';', b'|']
        .into_iter()
        .max_by_key(|d| first_line.bytes().filter(|b| b == d).count())
        .unwrap_or(b',')
}

fn field(row: &csv::StringRecord, idx: Option<usize>) -> &str {
    idx.and_then(|i| row.get(i)).unwrap_or("")
}

/// Parses the partner's feed listing. Rows missing a partner id or feed id
/// are ignored.
pub fn parse_feed_catalog(text: &str) -> Result<Vec<Feed>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(text))
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(header_key).collect();
    let column = |candidates: &[&str]| {
        candidates
            .iter()
            .find_map(|c| headers.iter().position(|h| h == c))
    };

    let (Some(partner_col), Some(feed_id_col)) = (column(PARTNER_COLUMNS), column(FEED_ID_COLUMNS))
    else {
        return Err(EtlError::decode(
            "feed catalog has no partner id / feed id columns",
        ));
    };
    let status_col = column(STATUS_COLUMNS);
    let name_col = column(FEED_NAME_COLUMNS);
    let count_col = column(ITEM_COUNT_COLUMNS);

    let mut feeds = Vec::new();
    for row in reader.records() {
        let row = row?;
        let partner_id = field(&row, Some(partner_col));
        let feed_id = field(&row, Some(feed_id_col));
        if partner_id.is_empty() || feed_id.is_empty() {
            continue;
        }

        let status = match field(&row, status_col).to_ascii_lowercase().as_str() {
            "active" | "joined" | "approved" => FeedStatus::Active,
            _ => FeedStatus::Inactive,
        };
        let item_count = field(&row, count_col)
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect::<String>()
            .parse()
            .unwrap_or(0);

        feeds.push(Feed {
            id: feed_id.to_string(),
            partner_id: partner_id.to_string(),
            name: field(&row, name_col).to_string(),
            status,
            item_count,
        });
    }
    Ok(feeds)
}

/// Picks the feed to sync for `partner_id`: an active feed with a
/// general/default name first, otherwise the active feed with the most items.
pub fn select_feed<'a>(feeds: &'a [Feed], partner_id: &str) -> Option<&'a Feed> {
    let active: Vec<&Feed> = feeds
        .iter()
        .filter(|f| f.partner_id == partner_id && f.status == FeedStatus::Active)
        .collect();

    let largest = |candidates: Vec<&'a Feed>| {
        // max_by_key 在相同數量時取最後一筆，這裡要保留清單中的第一筆
        candidates
            .into_iter()
            .rev()
            .max_by_key(|f| f.item_count)
    };

    let general: Vec<&Feed> = active
        .iter()
        .copied()
        .filter(|f| GENERAL_FEED_NAME.is_match(&f.name))
        .collect();

    if general.is_empty() {
        largest(active)
    } else {
        largest(general)
    }
}

pub struct FeedLocator {
    api: Arc<dyn PartnerApi>,
}

impl FeedLocator {
    pub fn new(api: Arc<dyn PartnerApi>) -> Self {
        Self { api }
    }

    /// `None` covers both "no active feed" and a failed catalog fetch; the
    /// caller skips the partner either way.
    pub async fn locate(&self, partner_id: &str) -> Option<Feed> {
        let catalog = match self.api.feed_catalog().await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("⚠️ Feed catalog fetch failed for partner {}: {}", partner_id, e);
                return None;
            }
        };

        let feeds = match parse_feed_catalog(&catalog) {
            Ok(feeds) => feeds,
            Err(e) => {
                tracing::warn!("⚠️ Feed catalog could not be parsed: {}", e);
                return None;
            }
        };

        let selected = select_feed(&feeds, partner_id).cloned();
        match &selected {
            Some(feed) => tracing::debug!(
                "Selected feed {} ('{}', {} items) for partner {}",
                feed.id,
                feed.name,
                feed.item_count,
                partner_id
            ),
            None => tracing::warn!("⚠️ No active feed for partner {}", partner_id),
        }
        selected
    }
}
