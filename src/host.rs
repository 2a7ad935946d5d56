//! Host integration: where the subject and the session credentials come from

use crate::types::{Credentials, SubjectId};
use async_trait::async_trait;

/// Supplies the subject and the session of the environment the harvester runs in
///
/// Consulted once per run. Any method may return `None`; the harvester turns a
/// missing credential or subject into a fatal start-up error.
#[async_trait]
pub trait HostSession: Send + Sync {
    /// Subject whose stream should be collected
    async fn current_subject_id(&self) -> Option<SubjectId>;

    /// Handle of the subject, used for lookup when no id is known
    async fn current_handle(&self) -> Option<String> {
        None
    }

    /// Session credentials for the remote API
    async fn session_credentials(&self) -> Option<Credentials>;
}

/// [`HostSession`] over fixed values, for CLIs and tests
#[derive(Clone, Debug, Default)]
pub struct StaticSession {
    subject: Option<SubjectId>,
    handle: Option<String>,
    credentials: Option<Credentials>,
}

impl StaticSession {
    /// Session with credentials and nothing else
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials: Some(credentials),
            ..Self::default()
        }
    }

    /// Session with no credentials at all
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Set the subject id
    pub fn with_subject(mut self, subject: SubjectId) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Set the handle
    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }
}

#[async_trait]
impl HostSession for StaticSession {
    async fn current_subject_id(&self) -> Option<SubjectId> {
        self.subject.clone()
    }

    async fn current_handle(&self) -> Option<String> {
        self.handle.clone()
    }

    async fn session_credentials(&self) -> Option<Credentials> {
        self.credentials.clone()
    }
}
