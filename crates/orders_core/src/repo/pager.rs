//! Cursor paging over an index set.
//!
//! # Responsibility
//! - Translate `PageRequest { offset, size }` into one incremental scan step.
//! - Keep the store's native scan API out of the repository contract.
//!
//! # Invariants
//! - Offset `0` starts a walk; a returned cursor of `0` ends it.
//! - An empty page with a nonzero cursor is a valid intermediate step, so
//!   callers loop on `next_cursor != 0`, never on "page was empty".
//! - Page order is whatever the store scan yields; no ordering holds across
//!   pages.

use crate::store::{KvStore, ScanPage, StoreResult};

pub const DEFAULT_PAGE_SIZE: u64 = 50;
pub const MAX_PAGE_SIZE: u64 = 500;

/// Scan position plus how many index members to visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: u64,
    pub size: u64,
}

impl PageRequest {
    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    /// Starts a walk with `size` members per step.
    pub fn first(size: u64) -> Self {
        Self::new(0, size)
    }

    /// Size `0` becomes [`DEFAULT_PAGE_SIZE`]; larger sizes clamp to
    /// [`MAX_PAGE_SIZE`].
    pub fn normalized(self) -> Self {
        let size = match self.size {
            0 => DEFAULT_PAGE_SIZE,
            size => size.min(MAX_PAGE_SIZE),
        };
        Self { size, ..self }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first(DEFAULT_PAGE_SIZE)
    }
}

/// Records resolved from one scan step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<E> {
    pub items: Vec<E>,
    pub next_cursor: u64,
}

impl<E> Page<E> {
    pub fn empty(next_cursor: u64) -> Self {
        Self {
            items: Vec::new(),
            next_cursor,
        }
    }

    /// Whether the walk is complete after this page.
    pub fn is_last(&self) -> bool {
        self.next_cursor == 0
    }

    /// Request for the following page, or `None` after the last one.
    pub fn next_request(&self, size: u64) -> Option<PageRequest> {
        (!self.is_last()).then(|| PageRequest::new(self.next_cursor, size))
    }
}

/// Performs one scan step of `set` for `request`.
pub(crate) fn scan_step(
    store: &dyn KvStore,
    set: &str,
    request: PageRequest,
) -> StoreResult<ScanPage> {
    let request = request.normalized();
    store.scan_members(set, request.offset, request.size)
}

/// Follows cursors from offset `0` until the walk completes and returns every
/// item seen.
pub fn walk_pages<E, Err>(
    size: u64,
    mut fetch: impl FnMut(PageRequest) -> Result<Page<E>, Err>,
) -> Result<Vec<E>, Err> {
    let mut items = Vec::new();
    let mut request = PageRequest::first(size);
    loop {
        let page = fetch(request)?;
        let next = page.next_request(size);
        items.extend(page.items);
        match next {
            Some(next) => request = next,
            None => return Ok(items),
        }
    }
}
