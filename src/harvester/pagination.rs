//! Sequential, cursor-driven fetch loop
//!
//! Pages are requested strictly one after another. Each iteration ends in one
//! of three states: the page parsed, the page body had an unexpected shape, or
//! the page failed after backoff. All three feed the stop conditions; none of
//! them aborts the run.

use super::{Harvester, sleep_or_cancel};
use crate::dedup;
use crate::error::{Error, Result};
use crate::parser;
use crate::types::{Credentials, Cursor, Event, HarvestReport, ItemRecord, StopReason, SubjectId};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Mutable state of one run; owned by exactly one loop invocation
#[derive(Debug, Default)]
struct FetchState {
    items: Vec<ItemRecord>,
    cursor: Option<Cursor>,
    pages: u32,
    consecutive_errors: u32,
    consecutive_empty: u32,
}

impl Harvester {
    /// Collect at least `target` items of `subject`'s stream
    ///
    /// The result is deduplicated and sorted ascending by creation time. It may
    /// hold up to one page more than `target`; use [`HarvestReport::truncated`]
    /// for an exact count. A `target` of zero returns immediately without any
    /// request.
    ///
    /// # Errors
    /// Only [`Error::CredentialMissing`] escapes; every failure below the loop
    /// level ends the run with a partial report instead.
    pub async fn fetch_all(&self, subject: &SubjectId, target: usize) -> Result<HarvestReport> {
        self.fetch_all_with_cancel(subject, target, CancellationToken::new())
            .await
    }

    /// Like [`fetch_all`](Self::fetch_all), stopping early when `cancel` fires
    ///
    /// Cancellation returns the items accumulated so far with
    /// [`StopReason::Cancelled`].
    pub async fn fetch_all_with_cancel(
        &self,
        subject: &SubjectId,
        target: usize,
        cancel: CancellationToken,
    ) -> Result<HarvestReport> {
        if target == 0 {
            return Ok(HarvestReport::empty(subject.clone(), StopReason::TargetReached));
        }
        let credentials = self.credentials().await?;
        Ok(self.run(subject, target, &credentials, &cancel).await)
    }

    /// Like [`fetch_all`](Self::fetch_all) under a wall-clock bound
    ///
    /// When `timeout` elapses the run stops with [`StopReason::Cancelled`] and
    /// whatever it collected.
    pub async fn fetch_all_within(
        &self,
        subject: &SubjectId,
        target: usize,
        timeout: Duration,
    ) -> Result<HarvestReport> {
        let cancel = CancellationToken::new();
        let timer = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                cancel.cancel();
            })
        };

        let result = self.fetch_all_with_cancel(subject, target, cancel).await;
        timer.abort();
        result
    }

    pub(crate) async fn run(
        &self,
        subject: &SubjectId,
        target: usize,
        credentials: &Credentials,
        cancel: &CancellationToken,
    ) -> HarvestReport {
        if target == 0 {
            return HarvestReport::empty(subject.clone(), StopReason::TargetReached);
        }

        let p = &self.config.pagination;
        tracing::info!(subject = %subject, target, page_size = p.page_size, "starting collection");
        self.emit(Event::RunStarted {
            subject: subject.clone(),
            target,
        });

        let mut state = FetchState::default();
        let stop_reason = loop {
            state.pages += 1;
            let page = state.pages;
            let request = self.requests.build(subject, state.cursor.as_ref(), p.page_size);

            let outcome = match self
                .send_with_retry(page, &request, credentials, cancel)
                .await
            {
                Ok(response) => parser::parse(&response.body).map_err(Error::from),
                Err(e) => Err(e),
            };

            let mut pause = p.inter_page_delay;
            match outcome {
                Ok(result) => {
                    let found = result.items.len();
                    state.items.extend(result.items);
                    state.cursor = result.cursor;
                    state.consecutive_errors = 0;
                    if found == 0 {
                        state.consecutive_empty += 1;
                    } else {
                        state.consecutive_empty = 0;
                    }

                    tracing::debug!(
                        page,
                        items = found,
                        total = state.items.len(),
                        cursor = ?state.cursor.as_ref().map(Cursor::preview),
                        "page collected"
                    );
                    self.emit(Event::PageFetched {
                        page,
                        items: found,
                        total: state.items.len(),
                    });

                    if state.items.len() >= target {
                        break StopReason::TargetReached;
                    }
                    if state.cursor.is_none() {
                        break StopReason::EndOfStream;
                    }
                    if state.consecutive_empty >= p.max_consecutive_empty_pages {
                        break StopReason::EmptyPageCeiling;
                    }
                }
                Err(Error::Cancelled) => break StopReason::Cancelled,
                Err(Error::Parse(e)) => {
                    // Schema drift: counted as an empty page, cursor kept
                    tracing::warn!(
                        page,
                        error = %e,
                        top_level_keys = ?e.top_level_keys(),
                        "unexpected response shape, treating as empty page"
                    );
                    self.emit(Event::PageFailed {
                        page,
                        error: e.to_string(),
                    });
                    state.consecutive_empty += 1;
                    if state.consecutive_empty >= p.max_consecutive_empty_pages {
                        break StopReason::EmptyPageCeiling;
                    }
                }
                Err(e) => {
                    state.consecutive_errors += 1;
                    tracing::warn!(
                        page,
                        error = %e,
                        consecutive_errors = state.consecutive_errors,
                        max_consecutive_errors = p.max_consecutive_errors,
                        "page failed"
                    );
                    self.emit(Event::PageFailed {
                        page,
                        error: e.to_string(),
                    });
                    if state.consecutive_errors >= p.max_consecutive_errors {
                        break StopReason::ErrorCeiling;
                    }
                    pause = p.error_page_delay;
                }
            }

            if state.pages >= p.max_pages {
                break StopReason::PageCeiling;
            }

            let pause = pause.saturating_add(self.jitter.jitter(p.inter_page_jitter));
            if !sleep_or_cancel(pause, cancel).await {
                break StopReason::Cancelled;
            }
        };

        let raw_count = state.items.len();
        let items = dedup::process(state.items);

        if stop_reason.is_partial() {
            tracing::warn!(
                subject = %subject,
                reason = %stop_reason,
                pages = state.pages,
                collected = items.len(),
                target,
                "collection stopped early"
            );
        } else {
            tracing::info!(
                subject = %subject,
                reason = %stop_reason,
                pages = state.pages,
                collected = items.len(),
                "collection finished"
            );
        }
        self.emit(Event::Stopped {
            reason: stop_reason,
            total: raw_count,
        });

        HarvestReport {
            subject: subject.clone(),
            items,
            pages: state.pages,
            raw_count,
            stop_reason,
        }
    }
}
