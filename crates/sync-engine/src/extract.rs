//! Paginated, bounded extraction of changed rows.

use chrono_tz::Tz;
use sync_core::{UniversalRow, WatermarkValue};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::retry::RetryPolicy;
use crate::source::{PageAfter, PageRequest, SourceReader};

/// How consecutive pages are chained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    /// Continue after the last row's `(incremental, keys...)` tuple.
    Keyset,
    /// Continue after the number of rows already read. Only correct because
    /// the range is frozen for the whole run.
    Offset,
}

/// A lazy, finite sequence of pages over one frozen range.
///
/// Nothing is fetched until [`next_page`](Self::next_page) is called, and
/// only one page is held at a time. [`position`](Self::position) can be fed
/// back into [`resume_from`](Self::resume_from) to restart at a page
/// boundary.
pub struct Extractor<'a, S: SourceReader + ?Sized> {
    source: &'a S,
    request: PageRequest,
    pagination: Pagination,
    retry: &'a RetryPolicy,
    cancel: &'a CancellationToken,
    source_tz: Tz,
    next_watermark: Option<WatermarkValue>,
    rows_extracted: u64,
    pages: u64,
    exhausted: bool,
}

impl<'a, S: SourceReader + ?Sized> Extractor<'a, S> {
    pub fn new(
        source: &'a S,
        request: PageRequest,
        pagination: Pagination,
        retry: &'a RetryPolicy,
        cancel: &'a CancellationToken,
        source_tz: Tz,
    ) -> Self {
        Self {
            source,
            request,
            pagination,
            retry,
            cancel,
            source_tz,
            next_watermark: None,
            rows_extracted: 0,
            pages: 0,
            exhausted: false,
        }
    }

    /// Restart from a position previously returned by [`position`](Self::position).
    pub fn resume_from(mut self, after: PageAfter) -> Self {
        self.request.after = after;
        self
    }

    /// Where the next page starts.
    pub fn position(&self) -> &PageAfter {
        &self.request.after
    }

    /// The greatest incremental value seen so far, None if no rows.
    pub fn next_watermark(&self) -> Option<WatermarkValue> {
        self.next_watermark
    }

    pub fn rows_extracted(&self) -> u64 {
        self.rows_extracted
    }

    pub fn pages(&self) -> u64 {
        self.pages
    }

    /// Fetch the next page, or None once the range is exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Vec<UniversalRow>>> {
        if self.exhausted {
            return Ok(None);
        }

        let source = self.source;
        let request = &self.request;
        let rows = self
            .retry
            .run(&format!("fetch page from {}", request.table), self.cancel, || {
                source.fetch_page(request)
            })
            .await?;

        if rows.len() < self.request.limit {
            self.exhausted = true;
        }
        if rows.is_empty() {
            return Ok(None);
        }

        for row in &rows {
            self.observe(row)?;
        }
        self.pages += 1;
        self.rows_extracted += rows.len() as u64;
        self.advance(&rows)?;

        debug!(
            "Fetched page {} ({} rows) from {}",
            self.pages,
            rows.len(),
            self.request.table
        );
        Ok(Some(rows))
    }

    fn observe(&mut self, row: &UniversalRow) -> Result<()> {
        let column = &self.request.incremental_column;
        let value = row.get(column).ok_or_else(|| {
            SyncError::failed(format!("source row is missing incremental column '{column}'"))
        })?;
        let observed = WatermarkValue::from_value(value, self.source_tz)
            .map_err(|e| SyncError::configuration(format!("incremental column '{column}': {e}")))?;
        if let Some(observed) = observed {
            self.next_watermark = Some(match self.next_watermark {
                Some(current) => current.max(observed),
                None => observed,
            });
        }
        Ok(())
    }

    fn advance(&mut self, page: &[UniversalRow]) -> Result<()> {
        self.request.after = match self.pagination {
            Pagination::Offset => {
                let done = match self.request.after {
                    PageAfter::Offset(n) => n,
                    _ => 0,
                };
                PageAfter::Offset(done + page.len() as u64)
            }
            Pagination::Keyset => {
                // Non-empty: checked by the caller.
                let last = &page[page.len() - 1];
                let key = self
                    .request
                    .keyset_columns()
                    .into_iter()
                    .map(|c| {
                        last.get(c).cloned().ok_or_else(|| {
                            SyncError::failed(format!("source row is missing key column '{c}'"))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                PageAfter::Key(key)
            }
        };
        Ok(())
    }
}
