//! Session side-car store
//!
//! Side-cars are written atomically: the JSON is written to a temp file in the
//! same directory, synced, renamed over the target, and the directory is synced
//! so the rename itself survives a crash.

use super::{Session, SessionError, SessionOrigin, UploadLock};
use crate::transport::{RequestBody, Transport, TransportRequest};
use crate::upload::{UploadConfig, UploadError};
use reqwest::header::{HeaderName, CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use reqwest::Method;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Suffix appended to the source path to form the side-car path
pub const SESSION_EXTENSION: &str = "session";

/// Maximum side-car size (1 MiB); anything larger is treated as malformed
pub const MAX_SESSION_FILE_SIZE: u64 = 1024 * 1024;

const X_UPLOAD_CONTENT_LENGTH: HeaderName = HeaderName::from_static("x-upload-content-length");
const X_UPLOAD_CONTENT_TYPE: HeaderName = HeaderName::from_static("x-upload-content-type");

/// Persists the session for one source file
#[derive(Debug, Clone)]
pub struct SessionStore {
    source: PathBuf,
    session_path: PathBuf,
}

impl SessionStore {
    /// Store for the given source file; the side-car lives at `<source>.session`
    pub fn for_source(source: impl Into<PathBuf>) -> Self {
        let source = source.into();
        let session_path = Self::session_path(&source);
        Self {
            source,
            session_path,
        }
    }

    /// Side-car path for a source file
    pub fn session_path(source: &Path) -> PathBuf {
        let mut os = source.as_os_str().to_os_string();
        os.push(".");
        os.push(SESSION_EXTENSION);
        PathBuf::from(os)
    }

    /// Source file this store belongs to
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Side-car path
    pub fn path(&self) -> &Path {
        &self.session_path
    }

    /// Take the per-source upload lock
    pub fn lock(&self) -> Result<UploadLock, SessionError> {
        UploadLock::try_acquire(&self.session_path)
    }

    /// Load the persisted session
    ///
    /// An absent side-car is `Ok(None)`. A malformed one (unparseable, too
    /// large, or violating the session invariants) is also `Ok(None)` after a
    /// warning, so the caller falls back to creating a new session. Only
    /// unexpected I/O failures are errors.
    pub fn open(&self) -> Result<Option<Session>, SessionError> {
        let path = &self.session_path;
        debug!(path = %path.display(), "Opening session side-car");

        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SessionError::Io(e.to_string())),
        };

        if metadata.len() > MAX_SESSION_FILE_SIZE {
            warn!(
                path = %path.display(),
                size = metadata.len(),
                max = MAX_SESSION_FILE_SIZE,
                "Ignoring oversized session side-car"
            );
            return Ok(None);
        }

        let contents = std::fs::read_to_string(path).map_err(|e| SessionError::Io(e.to_string()))?;

        let session: Session = match serde_json::from_str(&contents) {
            Ok(s) => s,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring malformed session side-car");
                return Ok(None);
            }
        };

        if let Err(e) = session.validate() {
            warn!(path = %path.display(), error = %e, "Ignoring invalid session side-car");
            return Ok(None);
        }

        info!(
            path = %path.display(),
            endpoint = session.endpoint(),
            total_size = session.total_size(),
            "Loaded session"
        );
        Ok(Some(session))
    }

    /// Durably write the session, replacing any prior side-car
    pub fn save(&self, session: &Session) -> Result<(), SessionError> {
        session.validate()?;

        let path = &self.session_path;
        let json = serde_json::to_string_pretty(session)
            .map_err(|e| SessionError::Serialization(e.to_string()))?;

        let parent_dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let mut temp_file = tempfile::NamedTempFile::new_in(parent_dir)
            .map_err(|e| SessionError::Io(format!("Failed to create temp file: {e}")))?;
        temp_file
            .write_all(json.as_bytes())
            .map_err(|e| SessionError::Io(format!("Failed to write to temp file: {e}")))?;
        temp_file
            .flush()
            .map_err(|e| SessionError::Io(format!("Failed to flush temp file: {e}")))?;
        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| SessionError::Io(format!("Failed to sync temp file: {e}")))?;
        temp_file
            .persist(path)
            .map_err(|e| SessionError::Io(format!("Failed to persist session file: {e}")))?;

        if let Ok(dir) = std::fs::File::open(parent_dir) {
            let _ = dir.sync_all();
        }

        info!(path = %path.display(), endpoint = session.endpoint(), "Session saved");
        Ok(())
    }

    /// Remove the side-car; an already-absent side-car is not an error
    pub fn discard(&self) -> Result<(), SessionError> {
        match std::fs::remove_file(&self.session_path) {
            Ok(()) => {
                info!(path = %self.session_path.display(), "Session discarded");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::Io(e.to_string())),
        }
    }

    /// Open a new upload session on the server
    ///
    /// POSTs `metadata` as JSON to the configured upload URL, declaring the
    /// total size and media type. The session endpoint is taken from the
    /// `Location` header of a 2xx reply. Nothing is persisted here.
    pub async fn create<M>(
        transport: &dyn Transport,
        config: &UploadConfig,
        metadata: &M,
        size: u64,
    ) -> Result<Session, UploadError>
    where
        M: Serialize + ?Sized,
    {
        config.validate()?;
        if size == 0 {
            return Err(UploadError::Source("source file is empty".to_string()));
        }

        let body = serde_json::to_vec(metadata)
            .map_err(|e| UploadError::Configuration(format!("Failed to serialize metadata: {e}")))?;

        let request = TransportRequest::new(Method::POST, config.upload_url.clone())
            .header(CONTENT_TYPE, "application/json; charset=utf-8")
            .header(CONTENT_LENGTH, body.len().to_string())
            .header(X_UPLOAD_CONTENT_LENGTH, size.to_string())
            .header(X_UPLOAD_CONTENT_TYPE, config.content_type.clone())
            .body(RequestBody::Json(body))
            .timeout(Some(config.request_timeout));

        debug!(url = %config.upload_url, size, "Opening upload session");
        let response = transport.execute(request).await?;

        if !response.status.is_success() {
            return Err(UploadError::Protocol {
                operation: "create session",
                status: response.status.as_u16(),
                body: response.text(),
            });
        }

        let endpoint = response
            .header(&LOCATION)
            .filter(|v| !v.trim().is_empty())
            .ok_or(UploadError::MissingLocation)?;

        let session = Session::new(endpoint, size)?;
        info!(endpoint = session.endpoint(), size, "Upload session created");
        Ok(session)
    }

    /// Resume the persisted session, or create and persist a new one
    ///
    /// The source must exist and be non-empty. A persisted session whose size
    /// differs from the source's current size is rejected, since resuming it
    /// would splice two different files.
    pub async fn open_or_create<M>(
        &self,
        transport: &dyn Transport,
        config: &UploadConfig,
        metadata: &M,
    ) -> Result<(Session, SessionOrigin), UploadError>
    where
        M: Serialize + ?Sized,
    {
        let size = source_size(&self.source)?;

        if let Some(session) = self.open()? {
            if session.total_size() != size {
                return Err(UploadError::SourceChanged {
                    expected: session.total_size(),
                    actual: size,
                });
            }
            return Ok((session, SessionOrigin::Resumed));
        }

        let session = Self::create(transport, config, metadata, size).await?;
        self.save(&session)?;
        Ok((session, SessionOrigin::Created))
    }
}

/// Current size of a source file; missing, unreadable, or empty sources are errors
pub fn source_size(source: &Path) -> Result<u64, UploadError> {
    let metadata = std::fs::metadata(source)
        .map_err(|e| UploadError::Source(format!("{}: {e}", source.display())))?;

    if !metadata.is_file() {
        return Err(UploadError::Source(format!(
            "{} is not a regular file",
            source.display()
        )));
    }
    if metadata.len() == 0 {
        return Err(UploadError::Source(format!("{} is empty", source.display())));
    }
    Ok(metadata.len())
}
