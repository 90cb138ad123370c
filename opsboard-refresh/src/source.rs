//! Where source collections come from.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use opsboard_core::{FetchError, SourceKind, SourcePayload};

/// Fetch boundary: the only place in the pipeline allowed to fail.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch(&self, kind: SourceKind) -> Result<SourcePayload, FetchError>;
}

#[async_trait]
impl<S> RecordSource for std::sync::Arc<S>
where
    S: RecordSource + ?Sized,
{
    async fn fetch(&self, kind: SourceKind) -> Result<SourcePayload, FetchError> {
        (**self).fetch(kind).await
    }
}

/// Reads one JSON file per source from a directory (exported REST responses).
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn file_name(kind: SourceKind) -> &'static str {
        match kind {
            SourceKind::Wards => "wards.json",
            SourceKind::ActiveAdmissions => "admissions_active.json",
            SourceKind::AllAdmissions => "admissions.json",
            SourceKind::Appointments => "appointments.json",
            SourceKind::Doctors => "doctors.json",
            SourceKind::Patients => "patients.json",
        }
    }
}

#[async_trait]
impl RecordSource for DirectorySource {
    async fn fetch(&self, kind: SourceKind) -> Result<SourcePayload, FetchError> {
        let path = self.root.join(Self::file_name(kind));
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|err| match err.kind() {
                ErrorKind::PermissionDenied => FetchError::Forbidden,
                _ => FetchError::Network(format!("{}: {err}", path.display())),
            })?;

        opsboard_json::parse_source_str(kind, &text)
            .map_err(|err| FetchError::Malformed(format!("{}: {err}", path.display())))
    }
}
