//! Status probe
//!
//! A probe is a zero-length PUT with `Content-Range: bytes */<total>`. The
//! server answers `308 Resume Incomplete` with `Range: bytes=0-<n>` while bytes
//! are outstanding, or 200/201 once the upload has been finalized.

use super::UploadError;
use crate::session::Session;
use crate::transport::{Transport, TransportRequest};
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, RANGE};
use reqwest::{Method, StatusCode};
use std::time::Duration;
use tracing::debug;

/// Server-reported state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStatus {
    /// Bytes `0..=n` are confirmed; the next byte to send is `n + 1`
    Confirmed(u64),
    /// The upload has been finalized
    Complete,
}

impl ProbeStatus {
    /// Number of bytes confirmed by the server
    pub fn bytes_confirmed(&self, total_size: u64) -> u64 {
        match self {
            ProbeStatus::Confirmed(last) => last + 1,
            ProbeStatus::Complete => total_size,
        }
    }
}

/// Ask the server how much of the session it holds
pub async fn probe(
    transport: &dyn Transport,
    session: &Session,
    timeout: Option<Duration>,
) -> Result<ProbeStatus, UploadError> {
    let total = session.total_size();
    let request = TransportRequest::new(Method::PUT, session.endpoint())
        .header(CONTENT_RANGE, format!("bytes */{total}"))
        .header(CONTENT_LENGTH, "0")
        .timeout(timeout);

    let response = transport.execute(request).await?;

    match response.status {
        StatusCode::PERMANENT_REDIRECT => {
            let header = response.header(&RANGE).ok_or_else(|| {
                UploadError::MalformedRange("missing on resume-incomplete response".to_string())
            })?;
            let last = parse_range_header(header, total)?;
            debug!(endpoint = session.endpoint(), last_byte = last, total, "Probe: incomplete");
            Ok(ProbeStatus::Confirmed(last))
        }
        StatusCode::OK | StatusCode::CREATED => {
            debug!(endpoint = session.endpoint(), total, "Probe: complete");
            Ok(ProbeStatus::Complete)
        }
        status => Err(UploadError::Protocol {
            operation: "status probe",
            status: status.as_u16(),
            body: response.text(),
        }),
    }
}

/// Parse `bytes=0-<n>` into the last confirmed byte index `n`
///
/// The range must start at 0 and end before `total_size`.
pub fn parse_range_header(value: &str, total_size: u64) -> Result<u64, UploadError> {
    let malformed = || UploadError::MalformedRange(value.to_string());

    let range = value.trim().strip_prefix("bytes=").ok_or_else(malformed)?;
    let (start, end) = range.split_once('-').ok_or_else(malformed)?;

    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !digits(start) || !digits(end) {
        return Err(malformed());
    }

    let start: u64 = start.parse().map_err(|_| malformed())?;
    let end: u64 = end.parse().map_err(|_| malformed())?;

    if start != 0 || end >= total_size {
        return Err(malformed());
    }
    Ok(end)
}
