//! Subject resolution

use super::Harvester;
use crate::error::{Error, Result};
use crate::export::SubjectMeta;
use crate::parser;
use crate::types::{Credentials, SubjectId};
use tokio_util::sync::CancellationToken;

/// Page number reported for handle lookup requests; timeline pages start at 1
pub const LOOKUP_PAGE: u32 = 0;

impl Harvester {
    /// Resolve a handle (screen name) to its subject id
    ///
    /// # Errors
    /// Returns [`Error::CredentialMissing`] without a session, the request or
    /// parse error if the lookup fails, and [`Error::SubjectMissing`] if the
    /// handle names no account.
    pub async fn resolve_subject(&self, handle: &str) -> Result<SubjectId> {
        let credentials = self.credentials().await?;
        self.lookup_handle(handle, &credentials, &CancellationToken::new())
            .await
    }

    pub(crate) async fn lookup_handle(
        &self,
        handle: &str,
        credentials: &Credentials,
        cancel: &CancellationToken,
    ) -> Result<SubjectId> {
        let request = self.requests.build_user_lookup(handle);
        let response = self.send_with_retry(LOOKUP_PAGE, &request, credentials, cancel).await?;
        let subject = parser::parse_user_lookup(&response.body)?.ok_or(Error::SubjectMissing)?;

        tracing::debug!(handle, subject = %subject, "resolved handle");
        Ok(subject)
    }

    /// Subject of the current host session, falling back to a handle lookup
    pub(crate) async fn current_subject(
        &self,
        credentials: &Credentials,
        cancel: &CancellationToken,
    ) -> Result<SubjectMeta> {
        let handle = self.session.current_handle().await;

        if let Some(subject) = self.session.current_subject_id().await {
            let meta = SubjectMeta::new(subject);
            return Ok(match handle {
                Some(handle) => meta.with_username(handle),
                None => meta,
            });
        }

        let Some(handle) = handle else {
            return Err(Error::SubjectMissing);
        };
        match self.lookup_handle(&handle, credentials, cancel).await {
            Ok(subject) => Ok(SubjectMeta::new(subject).with_username(handle)),
            Err(e) => {
                tracing::warn!(handle = %handle, error = %e, "handle lookup failed");
                Err(Error::SubjectMissing)
            }
        }
    }
}
