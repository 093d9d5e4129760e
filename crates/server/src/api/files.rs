//! Media streaming with byte-range support.

use std::io::SeekFrom;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::debug;

use super::error::ApiError;
use crate::metrics::{STREAM_BYTES, STREAM_RESPONSES};
use crate::state::AppState;

/// How a `Range` header applies to a file of known size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// No usable range: send the whole file.
    Full,
    /// Inclusive byte span.
    Partial { start: u64, end: u64 },
    /// Syntactically valid but outside the file.
    Unsatisfiable,
}

/// Resolve a `Range` header against `size`.
///
/// Supports `bytes=a-b`, `bytes=a-` and `bytes=-n`. Malformed headers, other
/// units and multi-range requests are ignored.
pub fn resolve_range(header: Option<&str>, size: u64) -> ByteRange {
    let Some(value) = header else {
        return ByteRange::Full;
    };
    let Some((unit, spec)) = value.trim().split_once('=') else {
        return ByteRange::Full;
    };
    if !unit.trim().eq_ignore_ascii_case("bytes") || spec.contains(',') {
        return ByteRange::Full;
    }
    let Some((start_str, end_str)) = spec.trim().split_once('-') else {
        return ByteRange::Full;
    };
    let (start_str, end_str) = (start_str.trim(), end_str.trim());

    if start_str.is_empty() {
        // Suffix range: last N bytes.
        let Ok(suffix) = end_str.parse::<u64>() else {
            return ByteRange::Full;
        };
        if suffix == 0 || size == 0 {
            return ByteRange::Unsatisfiable;
        }
        return ByteRange::Partial {
            start: size.saturating_sub(suffix),
            end: size - 1,
        };
    }

    let Ok(start) = start_str.parse::<u64>() else {
        return ByteRange::Full;
    };
    let end = if end_str.is_empty() {
        None
    } else {
        match end_str.parse::<u64>() {
            Ok(end) if end >= start => Some(end),
            _ => return ByteRange::Full,
        }
    };

    if start >= size {
        return ByteRange::Unsatisfiable;
    }
    let last = size - 1;
    ByteRange::Partial {
        start,
        end: end.map_or(last, |e| e.min(last)),
    }
}

/// GET /media/{filename}
pub async fn stream_media(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let path = state.store().media_path(&filename)?;
    let mut file = match File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::not_found(format!("{} not found", filename)));
        }
        Err(e) => return Err(ApiError::internal(e.to_string())),
    };
    let size = file
        .metadata()
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .len();

    let chunk_size = state.config().server.stream_chunk_size;
    let content_type = mime_guess::from_path(&path).first_or_octet_stream();
    let range_header = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok());

    let mut response = match resolve_range(range_header, size) {
        ByteRange::Full => {
            STREAM_RESPONSES.with_label_values(&["full"]).inc();
            STREAM_BYTES.inc_by(size);
            let body = Body::from_stream(ReaderStream::with_capacity(file, chunk_size));
            let mut response = body.into_response();
            response
                .headers_mut()
                .insert(header::CONTENT_LENGTH, HeaderValue::from(size));
            response
        }
        ByteRange::Partial { start, end } => {
            let length = end - start + 1;
            file.seek(SeekFrom::Start(start))
                .await
                .map_err(|e| ApiError::internal(e.to_string()))?;
            debug!("Streaming {} bytes {}-{}/{}", filename, start, end, size);
            STREAM_RESPONSES.with_label_values(&["partial"]).inc();
            STREAM_BYTES.inc_by(length);

            let stream = ReaderStream::with_capacity(file.take(length), chunk_size);
            let mut response = Body::from_stream(stream).into_response();
            *response.status_mut() = StatusCode::PARTIAL_CONTENT;
            let headers = response.headers_mut();
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
            if let Ok(value) = HeaderValue::from_str(&format!("bytes {}-{}/{}", start, end, size))
            {
                headers.insert(header::CONTENT_RANGE, value);
            }
            response
        }
        ByteRange::Unsatisfiable => {
            STREAM_RESPONSES.with_label_values(&["unsatisfiable"]).inc();
            let mut response = StatusCode::RANGE_NOT_SATISFIABLE.into_response();
            if let Ok(value) = HeaderValue::from_str(&format!("bytes */{}", size)) {
                response.headers_mut().insert(header::CONTENT_RANGE, value);
            }
            response
        }
    };

    let headers = response.headers_mut();
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    if let Ok(value) = HeaderValue::from_str(content_type.as_ref()) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    Ok(response)
}
