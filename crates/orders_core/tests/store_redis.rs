//! Repository properties against a live Redis server.
//!
//! Ignored by default. Run with a scratch database, which every test
//! flushes:
//! `REDIS_URL=redis://127.0.0.1:6379/15 cargo test -p orders_core --test store_redis -- --ignored`

use orders_core::{
    open_redis_store, walk_pages, Batch, BatchOutcome, Category, IndexedRepository, KvStore,
    RedisStore, RepoError, Repository,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

static REDIS_LOCK: Mutex<()> = Mutex::new(());

fn redis_url() -> String {
    std::env::var("REDIS_URL").expect("REDIS_URL must point at a scratch redis database")
}

/// Serializes tests on the shared database and starts each from empty.
fn fresh_store() -> (MutexGuard<'static, ()>, Arc<RedisStore>) {
    let guard = REDIS_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let url = redis_url();

    let client = redis::Client::open(url.as_str()).unwrap();
    let mut conn = client.get_connection().unwrap();
    redis::cmd("FLUSHDB").query::<()>(&mut conn).unwrap();

    let store = open_redis_store(&url, 4, Duration::from_secs(2)).unwrap();
    (guard, Arc::new(store))
}

fn category(id: u64, name: &str) -> Category {
    Category {
        category_id: id,
        category_name: name.to_string(),
    }
}

#[test]
#[ignore = "needs REDIS_URL"]
fn duplicate_insert_is_rejected_and_index_unchanged() {
    let (_guard, store) = fresh_store();
    let repo = IndexedRepository::<Category>::new(store.clone());

    repo.insert(&category(1, "first")).unwrap();
    let err = repo.insert(&category(1, "second")).unwrap_err();

    assert!(matches!(err, RepoError::AlreadyExists { id: 1, .. }));
    assert_eq!(repo.find_by_id(1).unwrap().category_name, "first");
    let scan = store.scan_members("categories", 0, 100).unwrap();
    assert_eq!(scan.members, vec!["category:1".to_string()]);
}

#[test]
#[ignore = "needs REDIS_URL"]
fn guarded_batch_on_existing_key_is_rejected() {
    let (_guard, store) = fresh_store();
    store
        .execute(&Batch::new().put("category:9", b"{}".to_vec()))
        .unwrap();

    let outcome = store
        .execute(
            &Batch::new()
                .require_absent("category:9")
                .put("category:9", b"overwritten".to_vec())
                .set_add("categories", "category:9"),
        )
        .unwrap();

    assert_eq!(outcome, BatchOutcome::Rejected);
    assert_eq!(store.get("category:9").unwrap(), Some(b"{}".to_vec()));
    assert!(store.scan_members("categories", 0, 10).unwrap().members.is_empty());
}

#[test]
#[ignore = "needs REDIS_URL"]
fn update_of_missing_record_creates_nothing() {
    let (_guard, store) = fresh_store();
    let repo = IndexedRepository::<Category>::new(store.clone());

    let err = repo.update(&category(4, "ghost")).unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(store.get("category:4").unwrap(), None);
}

#[test]
#[ignore = "needs REDIS_URL"]
fn delete_removes_entry_and_index_member() {
    let (_guard, store) = fresh_store();
    let repo = IndexedRepository::<Category>::new(store.clone());
    repo.insert(&category(5, "gone soon")).unwrap();
    store
        .execute(&Batch::new().set_add("categories", "category:6"))
        .unwrap();

    repo.delete_by_id(5).unwrap();
    assert!(repo.delete_by_id(6).unwrap_err().is_not_found());

    assert!(repo.find_by_id(5).unwrap_err().is_not_found());
    assert!(store.scan_members("categories", 0, 10).unwrap().members.is_empty());
}

#[test]
#[ignore = "needs REDIS_URL"]
fn full_walk_yields_every_record_once() {
    let (_guard, store) = fresh_store();
    let repo = IndexedRepository::<Category>::new(store);
    for id in 1..=37 {
        repo.insert(&category(id, &format!("c{id}"))).unwrap();
    }

    let records = walk_pages(5, |page| repo.find_all(page)).unwrap();
    let ids = records
        .iter()
        .map(|record| record.category_id)
        .collect::<HashSet<_>>();

    assert_eq!(ids.len(), 37);
    assert_eq!(ids, (1..=37).collect::<HashSet<_>>());
}
