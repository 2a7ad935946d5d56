//! Export and upload of a finished collection

use super::Harvester;
use crate::error::{Result, UploadError};
use crate::export::{self, Payload, UploadReceipt, UploadRequest, Uploader};
use crate::types::{Event, HarvestReport};
use tokio_util::sync::CancellationToken;

/// Result of a full harvest: the collection, its payload, and the delivery outcome
///
/// A failed delivery does not invalidate `report` or `payload`; pass the
/// payload to [`Harvester::deliver`] to retry without fetching again.
#[derive(Debug)]
pub struct HarvestOutcome {
    /// Collected items, truncated to the requested count
    pub report: HarvestReport,
    /// Export payload built from `report`
    pub payload: Payload,
    /// Upload receipt, or why the upload failed
    pub delivery: std::result::Result<UploadReceipt, UploadError>,
}

impl HarvestOutcome {
    /// True when the payload reached storage
    pub fn is_delivered(&self) -> bool {
        self.delivery.is_ok()
    }
}

impl Harvester {
    /// Resolve the session's subject, collect `target` items, export and upload them
    ///
    /// # Errors
    /// Returns [`crate::Error::CredentialMissing`] or
    /// [`crate::Error::SubjectMissing`] before any page is requested. Upload
    /// failures are reported in [`HarvestOutcome::delivery`].
    pub async fn harvest(
        &self,
        target: usize,
        uploader: &dyn Uploader,
        upload_credential: &str,
    ) -> Result<HarvestOutcome> {
        self.harvest_with_cancel(target, uploader, upload_credential, CancellationToken::new())
            .await
    }

    /// Like [`harvest`](Self::harvest), stopping collection early when `cancel` fires
    ///
    /// A cancelled run still exports and uploads what it collected.
    pub async fn harvest_with_cancel(
        &self,
        target: usize,
        uploader: &dyn Uploader,
        upload_credential: &str,
        cancel: CancellationToken,
    ) -> Result<HarvestOutcome> {
        let credentials = self.credentials().await?;
        let subject = self.current_subject(&credentials, &cancel).await?;

        let report = self
            .run(&subject.subject_id, target, &credentials, &cancel)
            .await
            .truncated(target);
        let payload = export::export(&report.items, &subject, chrono::Utc::now());
        let delivery = self.deliver(&payload, uploader, upload_credential).await;

        Ok(HarvestOutcome {
            report,
            payload,
            delivery,
        })
    }

    /// Upload an already built payload
    pub async fn deliver(
        &self,
        payload: &Payload,
        uploader: &dyn Uploader,
        credential: &str,
    ) -> std::result::Result<UploadReceipt, UploadError> {
        let content = payload
            .to_json()
            .map_err(|e| UploadError::Payload(e.to_string()))?;
        let filename = payload.filename();
        let request = UploadRequest {
            content: &content,
            content_type: &self.config.upload.content_type,
            filename: &filename,
        };

        match uploader.upload(request, credential).await {
            Ok(receipt) => {
                tracing::info!(url = %receipt.url, filename = %receipt.filename, items = payload.metadata.total_count, "export delivered");
                self.emit(Event::Uploaded {
                    url: receipt.url.clone(),
                    filename: receipt.filename.clone(),
                });
                Ok(receipt)
            }
            Err(e) => {
                tracing::error!(error = %e, filename = %filename, "export delivery failed");
                self.emit(Event::UploadFailed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }
}
