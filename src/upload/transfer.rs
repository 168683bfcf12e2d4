//! Transfer executor
//!
//! One attempt streams the source from `start_offset` to the end in a single
//! PUT. There is no chunking inside an attempt; an interrupted attempt is
//! recovered by the coordinator with a fresh probe.

use super::{TransferOutcome, UploadError};
use crate::session::{source_size, Session};
use crate::transport::{RequestBody, Transport, TransportRequest};
use crate::RemoteResource;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use std::io::SeekFrom;
use std::path::Path;
use tokio::io::AsyncSeekExt;
use tracing::{debug, info};

/// Run one transfer attempt from `start_offset` (0 for a fresh upload)
pub async fn transfer(
    transport: &dyn Transport,
    session: &Session,
    source: &Path,
    start_offset: u64,
    content_type: &str,
) -> TransferOutcome {
    let request = match build_request(session, source, start_offset, content_type).await {
        Ok(request) => request,
        Err(e) => return TransferOutcome::FatalFailure(e),
    };

    info!(
        endpoint = session.endpoint(),
        start_offset,
        remaining = session.total_size() - start_offset,
        "Starting transfer"
    );

    let response = match transport.execute(request).await {
        Ok(response) => response,
        Err(e) => {
            debug!(error = %e, "Transfer interrupted");
            return TransferOutcome::TransientFailure(e);
        }
    };

    match response.status {
        StatusCode::OK | StatusCode::CREATED => {
            match serde_json::from_slice::<RemoteResource>(&response.body) {
                Ok(resource) => TransferOutcome::Success(resource),
                Err(e) => TransferOutcome::FatalFailure(UploadError::MalformedResponse(format!(
                    "{e}: {}",
                    response.text()
                ))),
            }
        }
        status => TransferOutcome::FatalFailure(UploadError::Protocol {
            operation: "transfer",
            status: status.as_u16(),
            body: response.text(),
        }),
    }
}

async fn build_request(
    session: &Session,
    source: &Path,
    start_offset: u64,
    content_type: &str,
) -> Result<TransportRequest, UploadError> {
    let total = session.total_size();

    let actual = source_size(source)?;
    if actual != total {
        return Err(UploadError::SourceChanged {
            expected: total,
            actual,
        });
    }
    if start_offset > total {
        return Err(UploadError::Configuration(format!(
            "start offset {start_offset} is beyond the end of a {total}-byte file"
        )));
    }

    let mut request = TransportRequest::new(Method::PUT, session.endpoint())
        .header(CONTENT_TYPE, content_type)
        .header(CONTENT_LENGTH, (total - start_offset).to_string());

    if start_offset == total {
        // Every byte is confirmed but the upload was never finalized; an
        // empty PUT asks the server to finish it.
        return Ok(request.header(CONTENT_RANGE, format!("bytes */{total}")));
    }

    if start_offset > 0 {
        request = request.header(
            CONTENT_RANGE,
            format!("bytes {}-{}/{}", start_offset, total - 1, total),
        );
    }

    let mut file = tokio::fs::File::open(source)
        .await
        .map_err(|e| UploadError::Source(format!("{}: {e}", source.display())))?;
    file.seek(SeekFrom::Start(start_offset))
        .await
        .map_err(|e| UploadError::Source(format!("seek to {start_offset} failed: {e}")))?;

    Ok(request.body(RequestBody::File {
        file,
        length: total - start_offset,
    }))
}
