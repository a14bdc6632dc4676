use orders_core::{
    open_sqlite_store_in_memory, walk_pages, Batch, BatchOutcome, Category, IndexedRepository,
    KvStore, Page, PageRequest, Repository, ScanPage, SqliteStore, StoreResult,
};
use std::collections::HashSet;
use std::sync::Arc;

fn repo() -> IndexedRepository<Category> {
    IndexedRepository::new(Arc::new(open_sqlite_store_in_memory().unwrap()))
}

fn insert_named(repo: &IndexedRepository<Category>, id: u64, name: &str) {
    repo.insert(&Category {
        category_id: id,
        category_name: name.to_string(),
    })
    .unwrap();
}

#[test]
fn empty_index_returns_empty_page_and_cursor_zero() {
    let page = repo().find_all(PageRequest::first(10)).unwrap();

    assert!(page.items.is_empty());
    assert_eq!(page.next_cursor, 0);
    assert!(page.is_last());
}

#[test]
fn single_member_pages_walk_both_records() {
    let repo = repo();
    insert_named(&repo, 1, "A");
    insert_named(&repo, 2, "B");

    let first = repo.find_all(PageRequest::new(0, 1)).unwrap();
    assert_eq!(first.items.len(), 1);

    let mut names = first
        .items
        .iter()
        .map(|category| category.category_name.clone())
        .collect::<Vec<_>>();
    let mut request = first.next_request(1);
    while let Some(next) = request {
        let page = repo.find_all(next).unwrap();
        names.extend(page.items.iter().map(|category| category.category_name.clone()));
        request = page.next_request(1);
    }

    names.sort();
    assert_eq!(names, vec!["A".to_string(), "B".to_string()]);
}

#[test]
fn walk_yields_every_record_exactly_once() {
    let repo = repo();
    for id in 1..=37u64 {
        insert_named(&repo, id * 1_000_003, &format!("c{id}"));
    }

    for size in [1u64, 4, 10, 37, 100] {
        let all = walk_pages(size, |page| repo.find_all(page)).unwrap();
        let ids = all
            .iter()
            .map(|category| category.category_id)
            .collect::<HashSet<_>>();
        assert_eq!(all.len(), 37, "page size {size}");
        assert_eq!(ids.len(), 37, "duplicates with page size {size}");
    }
}

#[test]
fn full_final_page_may_be_followed_by_an_empty_page() {
    let repo = repo();
    insert_named(&repo, 1, "A");
    insert_named(&repo, 2, "B");

    // Whether the cursor hits zero on the page that returns the last item is
    // backend-defined, so only the walk as a whole is asserted.
    let mut pages: Vec<Page<Category>> = Vec::new();
    let mut request = Some(PageRequest::new(0, 2));
    while let Some(next) = request {
        let page = repo.find_all(next).unwrap();
        request = page.next_request(2);
        pages.push(page);
    }

    let total = pages.iter().map(|page| page.items.len()).sum::<usize>();
    assert_eq!(total, 2);
    assert!(pages.last().unwrap().is_last());
}

#[test]
fn deleted_records_drop_out_of_the_walk() {
    let repo = repo();
    for id in 1..=6u64 {
        insert_named(&repo, id, "x");
    }
    repo.delete_by_id(2).unwrap();
    repo.delete_by_id(5).unwrap();

    let mut ids = walk_pages(2, |page| repo.find_all(page))
        .unwrap()
        .into_iter()
        .map(|category| category.category_id)
        .collect::<Vec<_>>();
    ids.sort_unstable();

    assert_eq!(ids, vec![1, 3, 4, 6]);
}

#[test]
fn index_member_without_primary_entry_is_skipped() {
    let store = Arc::new(open_sqlite_store_in_memory().unwrap());
    let repo = IndexedRepository::<Category>::new(store.clone());
    insert_named(&repo, 1, "A");
    store
        .execute(&Batch::new().set_add("categories", "category:2"))
        .unwrap();

    let all = walk_pages(10, |page| repo.find_all(page)).unwrap();

    assert_eq!(all.len(), 1);
    assert_eq!(all[0].category_id, 1);
}

/// Cursor a sparse remote set hands out before any member is visited.
const SPARSE_CURSOR: u64 = 1 << 40;

/// SQLite store whose scans first yield an empty step with a nonzero cursor,
/// the way an incremental scan over a sparse hash table does.
struct SparseScanStore {
    inner: SqliteStore,
}

impl KvStore for SparseScanStore {
    fn backend(&self) -> &'static str {
        "sparse"
    }

    fn ping(&self) -> StoreResult<()> {
        self.inner.ping()
    }

    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.inner.get(key)
    }

    fn multi_get(&self, keys: &[String]) -> StoreResult<Vec<Option<Vec<u8>>>> {
        self.inner.multi_get(keys)
    }

    fn set_if_present(&self, key: &str, value: &[u8]) -> StoreResult<bool> {
        self.inner.set_if_present(key, value)
    }

    fn scan_members(&self, set: &str, cursor: u64, count: u64) -> StoreResult<ScanPage> {
        match cursor {
            0 => Ok(ScanPage {
                cursor: SPARSE_CURSOR,
                members: Vec::new(),
            }),
            SPARSE_CURSOR => self.inner.scan_members(set, 0, count),
            cursor => self.inner.scan_members(set, cursor, count),
        }
    }

    fn execute(&self, batch: &Batch) -> StoreResult<BatchOutcome> {
        self.inner.execute(batch)
    }
}

fn sparse_repo() -> IndexedRepository<Category> {
    IndexedRepository::new(Arc::new(SparseScanStore {
        inner: open_sqlite_store_in_memory().unwrap(),
    }))
}

#[test]
fn empty_intermediate_step_passes_store_cursor_through() {
    let repo = sparse_repo();
    insert_named(&repo, 1, "A");
    insert_named(&repo, 2, "B");

    let first = repo.find_all(PageRequest::first(10)).unwrap();

    assert!(first.items.is_empty());
    assert_eq!(first.next_cursor, SPARSE_CURSOR);
    assert!(!first.is_last());

    let second = repo
        .find_all(first.next_request(10).unwrap())
        .unwrap();
    let mut ids = second
        .items
        .iter()
        .map(|category| category.category_id)
        .collect::<Vec<_>>();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2]);
    assert!(second.is_last());
}

#[test]
fn walk_continues_past_empty_intermediate_step() {
    let repo = sparse_repo();
    for id in 1..=5 {
        insert_named(&repo, id, &format!("c{id}"));
    }

    let mut ids = walk_pages(2, |page| repo.find_all(page))
        .unwrap()
        .into_iter()
        .map(|category| category.category_id)
        .collect::<Vec<_>>();
    ids.sort_unstable();

    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
}
