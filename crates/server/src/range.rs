//! Byte-range delivery of cached archives.
//!
//! Serves a file as a download with stable validators (`ETag`,
//! `Last-Modified`), honoring single `bytes=` ranges guarded by `If-Range`.
//! The body streams straight from disk through the throttle; nothing is
//! buffered beyond one chunk.

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::throttle::throttle;
use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::Response;
use bytes::Bytes;
use folio_core::ARCHIVE_CONTENT_TYPE;
use folio_storage::StorageError;
use futures::{Stream, StreamExt};
use std::io::SeekFrom;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

/// Byte-range request outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RangeOutcome {
    /// Serve the whole file (no range, ignored range, or failed If-Range).
    Full,
    /// Serve `start..=end`.
    Partial { start: u64, end: u64 },
    /// The range cannot be served from this file.
    Unsatisfiable,
}

impl RangeOutcome {
    fn label(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Partial { .. } => "partial",
            Self::Unsatisfiable => "unsatisfiable",
        }
    }
}

/// Delivery parameters for one response.
#[derive(Clone, Copy, Debug)]
pub struct DeliveryOptions<'a> {
    /// File name offered to the client.
    pub download_name: &'a str,
    /// Read size per chunk.
    pub chunk_size: usize,
    /// Bandwidth ceiling in bytes per second (0 = unlimited).
    pub max_rate_bps: u64,
    /// Send headers only.
    pub head_only: bool,
}

/// Weak validator `W/"<size>-<mtime ms>"`.
pub fn weak_etag(size: u64, modified: SystemTime) -> String {
    let mtime_ms = modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    format!("W/\"{size}-{mtime_ms}\"")
}

/// Whether an `If-Range` validator (if any) still matches the file.
///
/// Matches the exact ETag, or an HTTP date at or after the modification
/// time. HTTP dates have second precision, so the mtime is truncated.
pub fn if_range_matches(if_range: Option<&HeaderValue>, etag: &str, modified: SystemTime) -> bool {
    let Some(value) = if_range else {
        return true;
    };
    let Ok(value) = value.to_str() else {
        return false;
    };
    let value = value.trim();

    if value == etag {
        return true;
    }

    match httpdate::parse_http_date(value) {
        Ok(date) => date >= truncate_to_secs(modified),
        Err(_) => false,
    }
}

fn truncate_to_secs(time: SystemTime) -> SystemTime {
    time.duration_since(UNIX_EPOCH)
        .map(|d| UNIX_EPOCH + Duration::from_secs(d.as_secs()))
        .unwrap_or(UNIX_EPOCH)
}

/// Interpret a `Range` header against a file of `size` bytes.
///
/// Only `bytes=<start>-<end>` is understood. Either bound may be omitted,
/// defaulting to `0` and `size - 1`; `bytes=-N` is therefore `0..=N`.
/// Other units are ignored.
pub fn parse_range(value: &str, size: u64) -> RangeOutcome {
    let Some(byte_range) = value.trim().strip_prefix("bytes=") else {
        return RangeOutcome::Full;
    };
    let byte_range = byte_range.trim();

    if byte_range.contains(',') || size == 0 {
        return RangeOutcome::Unsatisfiable;
    }

    let Some((start, end)) = byte_range.split_once('-') else {
        return RangeOutcome::Unsatisfiable;
    };

    let start = match parse_bound(start) {
        Ok(Some(start)) => start,
        Ok(None) => 0,
        Err(()) => return RangeOutcome::Unsatisfiable,
    };
    let end = match parse_bound(end) {
        Ok(Some(end)) => end,
        Ok(None) => size - 1,
        Err(()) => return RangeOutcome::Unsatisfiable,
    };

    if start > end || end >= size {
        return RangeOutcome::Unsatisfiable;
    }

    RangeOutcome::Partial { start, end }
}

fn parse_bound(raw: &str) -> Result<Option<u64>, ()> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(());
    }
    raw.parse().map(Some).map_err(|_| ())
}

/// Serve `path` honoring `Range` / `If-Range` from `headers`.
///
/// Validators and length come from the opened handle, so a concurrent
/// republish of the same path cannot mix two files in one response.
pub async fn serve_file(
    headers: &HeaderMap,
    path: &Path,
    options: DeliveryOptions<'_>,
) -> ApiResult<Response> {
    let mut file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        // Swept between lookup and open
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StorageError::NotFound(path.display().to_string()).into());
        }
        Err(e) => {
            return Err(ApiError::Internal(format!(
                "failed to open archive {}: {e}",
                path.display()
            )));
        }
    };
    let metadata = file
        .metadata()
        .await
        .map_err(|e| ApiError::Internal(format!("failed to stat archive: {e}")))?;
    let size = metadata.len();
    let modified = metadata
        .modified()
        .map_err(|e| ApiError::Internal(format!("archive has no mtime: {e}")))?;
    let etag = weak_etag(size, modified);

    let outcome = match headers.get(header::RANGE) {
        Some(range) if if_range_matches(headers.get(header::IF_RANGE), &etag, modified) => {
            match range.to_str() {
                Ok(range) => parse_range(range, size),
                Err(_) => RangeOutcome::Unsatisfiable,
            }
        }
        _ => RangeOutcome::Full,
    };
    metrics::record_range_outcome(outcome.label());

    let builder = Response::builder()
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CACHE_CONTROL, "no-store, no-transform")
        .header(header::LAST_MODIFIED, httpdate::fmt_http_date(modified))
        .header(header::ETAG, etag.as_str())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", options.download_name),
        );

    let (status, start, len) = match outcome {
        RangeOutcome::Full => (StatusCode::OK, 0, size),
        RangeOutcome::Partial { start, end } => (StatusCode::PARTIAL_CONTENT, start, end - start + 1),
        RangeOutcome::Unsatisfiable => {
            tracing::debug!(size = size, "Unsatisfiable range");
            return builder
                .status(StatusCode::RANGE_NOT_SATISFIABLE)
                .header(header::CONTENT_RANGE, format!("bytes */{size}"))
                .header(header::CONTENT_LENGTH, 0)
                .body(Body::empty())
                .map_err(|e| ApiError::Internal(format!("failed to build response: {e}")));
        }
    };

    let mut builder = builder
        .status(status)
        .header(header::CONTENT_TYPE, ARCHIVE_CONTENT_TYPE)
        .header(header::CONTENT_LENGTH, len);
    if let RangeOutcome::Partial { start, end } = outcome {
        builder = builder.header(header::CONTENT_RANGE, format!("bytes {start}-{end}/{size}"));
    }

    if options.head_only {
        return builder
            .body(Body::empty())
            .map_err(|e| ApiError::Internal(format!("failed to build response: {e}")));
    }

    if start > 0 {
        file.seek(SeekFrom::Start(start))
            .await
            .map_err(|e| ApiError::Internal(format!("failed to seek archive: {e}")))?;
    }

    tracing::debug!(
        status = status.as_u16(),
        start = start,
        bytes = len,
        "Streaming archive"
    );

    let reader = ReaderStream::with_capacity(file.take(len), options.chunk_size);
    let body = tracked(
        throttle(reader, options.max_rate_bps),
        len,
        options.download_name.to_string(),
    );

    builder
        .body(Body::from_stream(body))
        .map_err(|e| ApiError::Internal(format!("failed to build response: {e}")))
}

/// Counts delivered bytes and reports transfers dropped before the end.
struct Transfer {
    download_name: String,
    expected: u64,
    sent: u64,
}

impl Transfer {
    fn start(download_name: String, expected: u64) -> Self {
        metrics::ACTIVE_DOWNLOADS.inc();
        Self {
            download_name,
            expected,
            sent: 0,
        }
    }
}

impl Drop for Transfer {
    fn drop(&mut self) {
        metrics::ACTIVE_DOWNLOADS.dec();
        if self.sent < self.expected {
            metrics::DOWNLOADS_ABORTED.inc();
            tracing::warn!(
                download = %self.download_name,
                sent = self.sent,
                expected = self.expected,
                "Transfer aborted before completion"
            );
        } else {
            tracing::debug!(download = %self.download_name, bytes = self.sent, "Transfer complete");
        }
    }
}

/// Wrap a body stream with transfer accounting. Dropping the returned
/// stream (client disconnect) drops the file handle with it.
fn tracked<S>(
    stream: S,
    expected: u64,
    download_name: String,
) -> impl Stream<Item = std::io::Result<Bytes>> + Send + 'static
where
    S: Stream<Item = std::io::Result<Bytes>> + Send + 'static,
{
    async_stream::stream! {
        let mut transfer = Transfer::start(download_name, expected);
        let mut stream = std::pin::pin!(stream);

        while let Some(item) = stream.next().await {
            match &item {
                Ok(chunk) => {
                    transfer.sent += chunk.len() as u64;
                    metrics::BYTES_SERVED.inc_by(chunk.len() as u64);
                }
                Err(e) => {
                    tracing::warn!(download = %transfer.download_name, error = %e, "Archive read failed mid-transfer");
                }
            }
            yield item;
        }
    }
}
