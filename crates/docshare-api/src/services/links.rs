//! Download-link issuance
//!
//! Every URL handed to a client comes from the configured [`UrlSigner`].
//! Batches resolve each path on its own so one bad path never sinks the rest.

use docshare_core::{can_access, AppError, ErrorMetadata, FileRecord, Operation, Principal};
use docshare_db::MetadataStore;
use docshare_storage::UrlSigner;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;

/// Result of resolving one path in a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    Link(String),
    Error {
        status: u16,
        code: &'static str,
        message: String,
    },
}

impl From<AppError> for LinkOutcome {
    fn from(err: AppError) -> Self {
        if err.log_level() == docshare_core::LogLevel::Error {
            tracing::error!(error = %err.detailed_message(), "Download link failed");
        }
        LinkOutcome::Error {
            status: err.http_status_code(),
            code: err.error_code(),
            message: err.client_message(),
        }
    }
}

#[derive(Clone)]
pub struct LinkIssuer {
    metadata: Arc<dyn MetadataStore>,
    signer: Arc<dyn UrlSigner>,
}

impl LinkIssuer {
    pub fn new(metadata: Arc<dyn MetadataStore>, signer: Arc<dyn UrlSigner>) -> Self {
        Self { metadata, signer }
    }

    /// Sign a link for a record the caller is already known to be allowed to read.
    pub async fn issue_link(&self, record: &FileRecord, ttl: Duration) -> Result<String, AppError> {
        let url = self.signer.sign(&record.storage_path, ttl).await?;
        Ok(url)
    }

    async fn resolve_one(
        &self,
        principal: &Principal,
        path: &str,
        ttl: Duration,
    ) -> Result<String, AppError> {
        let record = self.metadata.get(path).await?;
        can_access(principal, &record, Operation::Read)
            .require(|| format!("Access denied: {}", path))?;
        self.issue_link(&record, ttl).await
    }

    /// One outcome per requested path, in request order.
    pub async fn issue_batch(
        &self,
        principal: &Principal,
        paths: &[String],
        ttl: Duration,
    ) -> Vec<(String, LinkOutcome)> {
        let outcomes = join_all(paths.iter().map(|path| async move {
            match self.resolve_one(principal, path, ttl).await {
                Ok(url) => LinkOutcome::Link(url),
                Err(err) => LinkOutcome::from(err),
            }
        }))
        .await;

        paths.iter().cloned().zip(outcomes).collect()
    }
}
