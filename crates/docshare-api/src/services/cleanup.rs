//! Background release of blobs kept for deleted files.

use super::files::FileService;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

#[derive(Clone)]
pub struct RetainedBlobSweeper {
    files: FileService,
    period: Duration,
}

impl RetainedBlobSweeper {
    pub fn new(files: FileService, period: Duration) -> Self {
        Self { files, period }
    }

    /// Sweep every `period` until the runtime shuts down.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut sweep_interval = interval(self.period);

            loop {
                sweep_interval.tick().await;

                match self.files.sweep_retained_blobs().await {
                    Ok(0) => tracing::debug!("No retained blobs to release"),
                    Ok(released) => {
                        tracing::info!(released, "Released retained blobs");
                    }
                    Err(e) => tracing::error!(error = %e, "Retained blob sweep failed"),
                }
            }
        })
    }
}
