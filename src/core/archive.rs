//! Feed archive retrieval and streaming decode.
//!
//! The archive is copied chunk by chunk into a temp file, then a blocking
//! worker walks the zip entries and decodes tabular rows one at a time into a
//! bounded channel. The async side consumes rows in archive order, so at most
//! `ROW_CHANNEL_CAPACITY` decoded rows exist at any moment regardless of feed
//! size. The temp file is a `NamedTempFile` owned by the call and is removed
//! when it drops, on every exit path.

use crate::core::normalizer;
use crate::core::trust::{TrustEngine, Verdict};
use crate::core::upsert::{ErrorSampler, RunDedup, UpsertController, MAX_LOGGED_ERRORS};
use crate::domain::model::{ProcessStats, RawRecord};
use crate::domain::ports::{CatalogStore, SyncLogStore};
use crate::utils::error::{EtlError, Result};
use crate::utils::monitor::SystemMonitor;
use chrono::Utc;
use reqwest::Client;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use uuid::Uuid;

pub const ROW_CHANNEL_CAPACITY: usize = 64;

const TABULAR_EXTENSIONS: &[&str] = &["csv", "tsv", "txt"];

#[derive(Debug, Clone)]
pub struct ArchiveSettings {
    pub download_timeout: Duration,
    pub max_archive_bytes: u64,
    pub checkpoint_every: u64,
    pub temp_dir: Option<PathBuf>,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            download_timeout: Duration::from_secs(300),
            max_archive_bytes: 512 * 1024 * 1024,
            checkpoint_every: 100,
            temp_dir: None,
        }
    }
}

/// One partner's feed to process.
#[derive(Debug, Clone)]
pub struct FeedJob {
    pub feed_url: String,
    pub partner_id: String,
    pub partner_name: String,
    pub platform: String,
    pub log_id: Uuid,
}

#[derive(Debug)]
pub enum DecodedRow {
    Row(RawRecord),
    Malformed(String),
}

/// Strips the query string (it carries the feed API key) for logging.
pub fn redact_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut url) => {
            url.set_query(None);
            url.to_string()
        }
        Err(_) => "<invalid url>".to_string(),
    }
}

fn tabular_delimiter(entry_name: &str) -> Option<u8> {
    let ext = Path::new(entry_name)
        .extension()
        .and_then(|e| e.to_str())?
        .to_ascii_lowercase();
    if !TABULAR_EXTENSIONS.contains(&ext.as_str()) {
        return None;
    }
    Some(if ext == "tsv" { b'\t' } else { b',' })
}

fn decode_entry<R: Read>(
    entry: R,
    delimiter: u8,
    tx: &mpsc::Sender<DecodedRow>,
) -> Result<(u64, bool)> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .double_quote(true)
        .from_reader(entry);

    let headers: Vec<String> = reader
        .byte_headers()?
        .iter()
        .map(|h| {
            String::from_utf8_lossy(h)
                .trim_start_matches('\u{feff}')
                .trim()
                .to_string()
        })
        .collect();

    let mut rows = 0;
    let mut record = csv::ByteRecord::new();
    loop {
        let item = match reader.read_byte_record(&mut record) {
            Ok(false) => break,
            Ok(true) => {
                let raw = RawRecord::from_pairs(
                    headers
                        .iter()
                        .zip(record.iter())
                        .map(|(h, v)| (h.as_str(), String::from_utf8_lossy(v).into_owned())),
                );
                if raw.is_empty() {
                    continue;
                }
                rows += 1;
                DecodedRow::Row(raw)
            }
            // 解壓縮失敗屬於整個檔案的錯誤
            Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => return Err(e.into()),
            Err(e) => DecodedRow::Malformed(e.to_string()),
        };
        if tx.blocking_send(item).is_err() {
            // consumer went away
            return Ok((rows, false));
        }
    }
    Ok((rows, true))
}

/// Walks every tabular entry of the zip and sends its rows down `tx`.
/// Returns the number of decoded rows. Runs on a blocking thread.
pub fn decode_archive<R: Read + Seek>(source: R, tx: mpsc::Sender<DecodedRow>) -> Result<u64> {
    let mut archive = zip::ZipArchive::new(source)?;
    let mut tabular_entries = 0;
    let mut total_rows = 0;

    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        let Some(delimiter) = tabular_delimiter(entry.name()) else {
            tracing::debug!("Skipping non-tabular archive entry {}", entry.name());
            continue;
        };
        tabular_entries += 1;
        tracing::debug!("Decoding archive entry {}", entry.name());

        let (rows, keep_going) = decode_entry(entry, delimiter, &tx)?;
        total_rows += rows;
        if !keep_going {
            break;
        }
    }

    if tabular_entries == 0 {
        return Err(EtlError::decode("archive contains no tabular entries"));
    }
    Ok(total_rows)
}

pub struct ArchiveStreamProcessor {
    client: Client,
    settings: ArchiveSettings,
    logs: Arc<dyn SyncLogStore>,
    trust: Arc<TrustEngine>,
    upserter: UpsertController,
    monitor: Arc<SystemMonitor>,
}

impl ArchiveStreamProcessor {
    pub fn new(
        settings: ArchiveSettings,
        catalog: Arc<dyn CatalogStore>,
        logs: Arc<dyn SyncLogStore>,
        trust: Arc<TrustEngine>,
    ) -> Self {
        Self {
            client: Client::new(),
            upserter: UpsertController::new(catalog, trust.clone()),
            settings,
            logs,
            trust,
            monitor: Arc::new(SystemMonitor::default()),
        }
    }

    pub fn with_monitor(mut self, monitor: Arc<SystemMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    /// Downloads and processes one feed archive. Archive-level failures
    /// (transport, decode) are returned; row-level failures only bump counters.
    pub async fn process_feed(&self, job: &FeedJob) -> Result<ProcessStats> {
        tracing::info!(
            "📥 Downloading feed for {} from {}",
            job.partner_name,
            redact_url(&job.feed_url)
        );
        let archive = self.download(&job.feed_url).await?;
        let stats = self.consume(&archive, job).await;
        drop(archive);
        stats
    }

    /// Streams the response body into a fresh temp file, enforcing the
    /// download timeout and the size cap.
    pub async fn download(&self, url: &str) -> Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("feed-").suffix(".zip");
        let temp = match &self.settings.temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };

        let seconds = self.settings.download_timeout.as_secs();
        let transport = |e: reqwest::Error| EtlError::from_transport(e, "archive download", seconds);

        let mut response = self
            .client
            .get(url)
            .timeout(self.settings.download_timeout)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(EtlError::HttpStatus {
                status: status.as_u16(),
                url: redact_url(url),
            });
        }

        let cap = self.settings.max_archive_bytes;
        let too_large = |size: u64| EtlError::ProcessingError {
            message: format!("archive larger than {} bytes (got at least {})", cap, size),
        };
        if let Some(length) = response.content_length() {
            if length > cap {
                return Err(too_large(length));
            }
        }

        let mut file = tokio::fs::File::from_std(temp.reopen()?);
        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await.map_err(transport)? {
            written += chunk.len() as u64;
            if written > cap {
                return Err(too_large(written));
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        tracing::debug!("Archive downloaded ({} bytes) to {:?}", written, temp.path());
        Ok(temp)
    }

    async fn consume(&self, archive: &NamedTempFile, job: &FeedJob) -> Result<ProcessStats> {
        let source = BufReader::new(archive.reopen()?);
        let (tx, mut rx) = mpsc::channel(ROW_CHANNEL_CAPACITY);
        let decoder = tokio::task::spawn_blocking(move || decode_archive(source, tx));

        let mut stats = ProcessStats::default();
        let mut dedup = RunDedup::new();
        let mut sampler = ErrorSampler::new(job.platform.clone(), MAX_LOGGED_ERRORS);
        let checkpoint_every = self.settings.checkpoint_every.max(1);

        while let Some(row) = rx.recv().await {
            stats.processed += 1;
            match row {
                DecodedRow::Row(raw) => {
                    self.handle_row(raw, job, &mut dedup, &mut stats, &mut sampler)
                        .await
                }
                DecodedRow::Malformed(message) => {
                    tracing::debug!("Malformed row in {} feed: {}", job.platform, message);
                    stats.skipped += 1;
                }
            }

            if stats.processed % checkpoint_every == 0 {
                self.checkpoint(job.log_id, &stats).await;
            }
        }

        let decoded_rows = decoder.await.map_err(|e| EtlError::ProcessingError {
            message: format!("archive decoder task failed: {}", e),
        })??;

        if sampler.suppressed() > 0 {
            tracing::warn!(
                "⚠️ {}: {} further store errors not logged",
                job.platform,
                sampler.suppressed()
            );
        }
        tracing::info!(
            "📊 {}: decoded {} rows, processed {}, added {}, skipped {}, errors {}",
            job.platform,
            decoded_rows,
            stats.processed,
            stats.added,
            stats.skipped,
            stats.errors
        );
        Ok(stats)
    }

    async fn handle_row(
        &self,
        raw: RawRecord,
        job: &FeedJob,
        dedup: &mut RunDedup,
        stats: &mut ProcessStats,
        sampler: &mut ErrorSampler,
    ) {
        let Some(source_url) = normalizer::source_url(&raw) else {
            stats.skipped += 1;
            return;
        };
        if !dedup.first_seen(source_url) {
            stats.skipped += 1;
            return;
        }

        let product = match normalizer::normalize(&raw, &job.platform, Utc::now()) {
            Ok(product) => product,
            Err(e) => {
                tracing::trace!("Row dropped ({}): {}", job.platform, e);
                stats.skipped += 1;
                return;
            }
        };

        match self.trust.verdict(&product) {
            Verdict::Trusted => {}
            verdict => {
                tracing::debug!("Row rejected as {:?}: {}", verdict, product.title);
                stats.skipped += 1;
                return;
            }
        }

        match self.upserter.upsert(product).await {
            Ok(_) => stats.added += 1,
            Err(e) => {
                stats.errors += 1;
                sampler.record(&e);
            }
        }
    }

    /// Awaited in row order so the log counters never move backwards.
    async fn checkpoint(&self, log_id: Uuid, stats: &ProcessStats) {
        let (found, added) = (stats.processed, stats.added);
        if let Err(e) = self.logs.record_progress(log_id, found, added).await {
            tracing::warn!("⚠️ Checkpoint for sync log {} failed: {}", log_id, e);
        }
        self.monitor.log_stats(&format!("checkpoint {} rows", found));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::{SimpleFileOptions, ZipWriter};

    fn zip_of(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    fn decode_all(data: Vec<u8>) -> (Result<u64>, Vec<DecodedRow>) {
        let (tx, mut rx) = mpsc::channel(ROW_CHANNEL_CAPACITY);
        let handle = std::thread::spawn(move || decode_archive(Cursor::new(data), tx));
        let mut rows = Vec::new();
        while let Some(row) = rx.blocking_recv() {
            rows.push(row);
        }
        (handle.join().unwrap(), rows)
    }

    #[test]
    fn test_redact_url_drops_api_key() {
        assert_eq!(
            redact_url("https://feeds.example/download?apikey=secret&fid=1"),
            "https://feeds.example/download"
        );
    }

    #[test]
    fn test_decode_skips_non_tabular_and_blank_rows() {
        let data = zip_of(&[
            ("readme.md", "# not a feed"),
            (
                "feed.csv",
                "product_name,search_price,aw_deep_link\n\"Dune, Part One\",9.99,https://t/1\n\n,,\nKindle,  99 ,https://t/2\n",
            ),
        ]);
        let (result, rows) = decode_all(data);
        assert_eq!(result.unwrap(), 2);
        assert_eq!(rows.len(), 2);
        match &rows[0] {
            DecodedRow::Row(raw) => {
                assert_eq!(raw.first_of(&["product_name"]), Some("Dune, Part One"));
            }
            other => panic!("unexpected {:?}", other),
        }
        match &rows[1] {
            DecodedRow::Row(raw) => assert_eq!(raw.first_of(&["search_price"]), Some("99")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_tsv_entry() {
        let data = zip_of(&[("feed.tsv", "Product_Name\tSearch_Price\nLámpara\t20\n")]);
        let (result, rows) = decode_all(data);
        assert_eq!(result.unwrap(), 1);
        match &rows[0] {
            DecodedRow::Row(raw) => assert_eq!(raw.first_of(&["product_name"]), Some("Lámpara")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_archive_without_tabular_entry_is_decode_error() {
        let data = zip_of(&[("notes.json", "{}")]);
        let (result, rows) = decode_all(data);
        assert!(matches!(result, Err(EtlError::DecodeError { .. })));
        assert!(rows.is_empty());
    }

    #[test]
    fn test_garbage_is_not_an_archive() {
        let (result, _) = decode_all(b"definitely not a zip".to_vec());
        assert!(matches!(result, Err(EtlError::ZipError(_))));
    }
}
