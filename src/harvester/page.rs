//! Single page fetch with backoff

use super::{Harvester, sleep_or_cancel};
use crate::error::{Error, Result, TransportError};
use crate::parser;
use crate::request::RequestSpec;
use crate::retry::FailureClass;
use crate::transport::RawResponse;
use crate::types::{Credentials, Cursor, Event, PageResult, SubjectId};
use tokio_util::sync::CancellationToken;

/// Longest response body kept in a status error
const MAX_ERROR_BODY: usize = 512;

impl Harvester {
    /// Fetch and parse one page, retrying rate limits and network failures
    ///
    /// The same request (same cursor) is reissued on every retry. Exhausting
    /// the rate-limit ceiling yields [`Error::RateLimited`]; other non-2xx
    /// statuses fail immediately with [`Error::Transport`].
    pub async fn fetch_page(
        &self,
        subject: &SubjectId,
        cursor: Option<&Cursor>,
        credentials: &Credentials,
    ) -> Result<PageResult> {
        let request = self
            .requests
            .build(subject, cursor, self.config.pagination.page_size);
        let response = self
            .send_with_retry(1, &request, credentials, &CancellationToken::new())
            .await?;
        Ok(parser::parse(&response.body)?)
    }

    /// Issue `request` until it succeeds, fails hard, or the backoff gives up
    pub(crate) async fn send_with_retry(
        &self,
        page: u32,
        request: &RequestSpec,
        credentials: &Credentials,
        cancel: &CancellationToken,
    ) -> Result<RawResponse> {
        let mut attempt = 0u32;

        loop {
            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                sent = self.transport.send(request, credentials) => sent,
            };

            let failure = match sent {
                Ok(response) if response.is_success() => {
                    if attempt > 0 {
                        tracing::info!(page, attempts = attempt + 1, "page succeeded after retry");
                    }
                    return Ok(response);
                }
                Ok(response) => TransportError::Status {
                    status: response.status,
                    body: truncate_body(response.body),
                },
                Err(e) => e,
            };

            let Some(class) = failure.failure_class() else {
                tracing::error!(page, error = %failure, "page request failed without retry");
                return Err(failure.into());
            };

            let decision = self.backoff.decide(class, attempt);
            if !decision.should_retry {
                tracing::error!(
                    page,
                    error = %failure,
                    attempts = attempt + 1,
                    "page request failed after all retry attempts exhausted"
                );
                return Err(match class {
                    FailureClass::RateLimited => Error::RateLimited,
                    FailureClass::NetworkError => failure.into(),
                });
            }

            tracing::warn!(
                page,
                error = %failure,
                class = %class,
                attempt,
                max_attempts = self.backoff.ceiling(class),
                delay_ms = decision.delay_millis(),
                "page request failed, retrying"
            );
            self.emit(Event::RetryScheduled {
                page,
                class,
                attempt,
                delay_ms: decision.delay_millis(),
            });

            if !sleep_or_cancel(decision.delay, cancel).await {
                return Err(Error::Cancelled);
            }
            attempt += 1;
        }
    }
}

fn truncate_body(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }
    body
}
