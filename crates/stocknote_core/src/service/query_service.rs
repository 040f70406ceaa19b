//! Read-side listing and aggregate service.
//!
//! # Responsibility
//! - Turn page/page-size requests into repository limit/offset queries.
//! - Wrap results in a pagination envelope.
//! - Expose note detail reads and status aggregates.
//!
//! # Invariants
//! - Page indexes are 1-based; zero is treated as the first page.
//! - Page size is clamped by `CoreConfig::normalize_page_size`.
//! - `total_pages` is `ceil(total_count / page_size)` and is zero when nothing
//!   matches.

use crate::config::CoreConfig;
use crate::model::note::{Note, NoteId, NoteStatus, NoteWithLines};
use crate::repo::catalog_repo::RepoResult;
use crate::repo::note_repo::{NoteFilter, NoteListQuery, NoteRepository, NoteSort};
use serde::Serialize;

/// One page of results plus navigation metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based index of this page.
    pub page_index: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub total_pages: u32,
}

pub type NotePage = Page<Note>;

impl<T> Page<T> {
    pub(crate) fn new(items: Vec<T>, page_index: u32, page_size: u32, total_count: u64) -> Self {
        let size = u64::from(page_size.max(1));
        let total_pages = total_count.div_ceil(size);
        Self {
            items,
            page_index,
            page_size,
            total_count,
            total_pages: u32::try_from(total_pages).unwrap_or(u32::MAX),
        }
    }

    pub fn has_previous(&self) -> bool {
        self.page_index > 1
    }

    pub fn has_next(&self) -> bool {
        self.page_index < self.total_pages
    }
}

/// Requested page window before normalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page index; `0` means first page.
    pub page: u32,
    /// `None` or `0` selects the configured default.
    pub page_size: Option<u32>,
}

impl PageRequest {
    pub fn new(page: u32, page_size: Option<u32>) -> Self {
        Self { page, page_size }
    }

    /// Resolves `(page_index, page_size, offset)` under `config`.
    pub(crate) fn resolve(self, config: &CoreConfig) -> (u32, u32, u32) {
        let page_index = self.page.max(1);
        let page_size = config.normalize_page_size(self.page_size);
        let offset = (page_index - 1).saturating_mul(page_size);
        (page_index, page_size, offset)
    }
}

/// Note read facade over repository implementations.
pub struct QueryService<R: NoteRepository> {
    repo: R,
    config: CoreConfig,
}

impl<R: NoteRepository> QueryService<R> {
    pub fn new(repo: R, config: CoreConfig) -> Self {
        Self { repo, config }
    }

    /// Lists notes matching `filter` in `sort` order, one page at a time.
    pub fn list_notes(
        &self,
        filter: NoteFilter,
        sort: NoteSort,
        request: PageRequest,
    ) -> RepoResult<NotePage> {
        let (page_index, page_size, offset) = request.resolve(&self.config);
        let total_count = self.repo.count_notes(&filter)?;
        let items = self.repo.list_notes(&NoteListQuery {
            filter,
            sort,
            limit: Some(page_size),
            offset,
        })?;
        Ok(Page::new(items, page_index, page_size, total_count))
    }

    /// Lists every note matching `filter`, used by exports.
    pub fn all_notes(&self, filter: NoteFilter, sort: NoteSort) -> RepoResult<Vec<Note>> {
        self.repo.list_notes(&NoteListQuery {
            filter,
            sort,
            limit: None,
            offset: 0,
        })
    }

    pub fn get_note_with_lines(&self, id: NoteId) -> RepoResult<Option<NoteWithLines>> {
        self.repo.get_note_with_lines(id)
    }

    pub fn count_by_status(&self, status: NoteStatus) -> RepoResult<u64> {
        self.repo.count_by_status(status)
    }

    pub fn any_status_in(&self, statuses: &[NoteStatus]) -> RepoResult<bool> {
        self.repo.any_status_in(statuses)
    }

    /// Note count for every status, in status-code order.
    pub fn status_counts(&self) -> RepoResult<Vec<(NoteStatus, u64)>> {
        NoteStatus::ALL
            .into_iter()
            .map(|status| {
                self.repo
                    .count_by_status(status)
                    .map(|count| (status, count))
            })
            .collect()
    }
}
