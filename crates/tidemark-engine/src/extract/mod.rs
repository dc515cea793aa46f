//! Paginated extraction of records newer than the watermark.
//!
//! [`PageSource`] is the seam between the pagination loop and the wire;
//! [`SocrataClient`] is the production implementation.

pub mod http;

use async_trait::async_trait;
use tidemark_types::{RawRecord, Watermark};

use crate::config::SourceConfig;
use crate::errors::ExtractError;

pub use http::SocrataClient;

/// One page request against the dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: u64,
    pub offset: u64,
    /// Server-side filter expression, e.g. `col > '2024-01-01T00:00:00.000'`.
    pub filter: Option<String>,
}

/// Something that can serve one page of records.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch the records for `request`, in server order.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError`] on any transport, status, or decoding failure.
    async fn fetch_page(&self, request: &PageRequest) -> Result<Vec<RawRecord>, ExtractError>;
}

/// All records fetched in one extraction pass.
#[derive(Debug, Clone, Default)]
pub struct ExtractOutcome {
    pub records: Vec<RawRecord>,
    /// Requests issued, including a final empty page.
    pub pages_fetched: u32,
    /// The page cap stopped a run of full pages; more data may exist.
    pub truncated: bool,
}

impl ExtractOutcome {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Build the server-side filter for an incremental fetch.
///
/// Returns `Ok(None)` when there is no watermark (full load).
///
/// # Errors
///
/// Returns [`ExtractError::InvalidWatermark`] when the watermark does not
/// parse as a timestamp. A corrupt watermark must never degrade into a full
/// load.
pub fn watermark_filter(
    incremental_column: &str,
    watermark: Option<&Watermark>,
) -> Result<Option<String>, ExtractError> {
    let Some(wm) = watermark else {
        return Ok(None);
    };
    wm.parse()?;
    Ok(Some(format!("{incremental_column} > '{}'", wm.as_str())))
}

/// Fetch every record newer than `watermark`, bounded by the page cap.
///
/// # Errors
///
/// Returns [`ExtractError`] if the watermark is invalid or any page fails.
/// Records fetched before the failure are discarded.
pub async fn fetch_since<S>(
    source: &S,
    config: &SourceConfig,
    watermark: Option<&Watermark>,
) -> Result<ExtractOutcome, ExtractError>
where
    S: PageSource + ?Sized,
{
    let filter = watermark_filter(&config.incremental_column, watermark)?;
    match &filter {
        Some(f) => tracing::info!(filter = %f, "Fetching incrementally"),
        None => tracing::info!("No watermark; performing full fetch"),
    }
    paginate(source, config.batch_size, config.max_pages, filter).await
}

/// Offset pagination loop.
///
/// Stops on an empty page, a page shorter than `limit`, or after
/// `max_pages` pages, whichever comes first.
///
/// # Errors
///
/// Propagates the first page failure.
pub async fn paginate<S>(
    source: &S,
    limit: u64,
    max_pages: u32,
    filter: Option<String>,
) -> Result<ExtractOutcome, ExtractError>
where
    S: PageSource + ?Sized,
{
    let mut outcome = ExtractOutcome::default();
    let mut offset = 0u64;

    loop {
        let request = PageRequest {
            limit,
            offset,
            filter: filter.clone(),
        };
        tracing::info!(
            page = outcome.pages_fetched + 1,
            max_pages,
            offset,
            limit,
            "Fetching page"
        );

        let page = source.fetch_page(&request).await?;
        outcome.pages_fetched += 1;

        if page.is_empty() {
            tracing::info!("Empty page; no more data");
            break;
        }

        let fetched = page.len() as u64;
        outcome.records.extend(page);
        tracing::info!(
            fetched,
            total = outcome.records.len(),
            "Page fetched"
        );

        if fetched < limit {
            tracing::debug!("Short page; last page reached");
            break;
        }

        if outcome.pages_fetched >= max_pages {
            tracing::warn!(
                max_pages,
                total = outcome.records.len(),
                "Reached page cap; stopping with a partial batch"
            );
            outcome.truncated = true;
            break;
        }

        offset += limit;
    }

    Ok(outcome)
}
