use orders_core::{
    open_sqlite_store_in_memory, Batch, Category, Customer, IndexedRepository,
    LineItem, Order, PageRequest, Product, RepoError, Repository, SharedStore,
};
use std::sync::Arc;

fn shared_store() -> SharedStore {
    Arc::new(open_sqlite_store_in_memory().unwrap())
}

fn category(id: u64, name: &str) -> Category {
    Category {
        category_id: id,
        category_name: name.to_string(),
    }
}

#[test]
fn insert_then_find_by_id_roundtrip() {
    let repo = IndexedRepository::<Product>::new(shared_store());
    let product = Product {
        product_id: 11,
        product_name: "Desk lamp".to_string(),
        price: 2_499,
        category: category(3, "Lighting"),
    };

    repo.insert(&product).unwrap();

    assert_eq!(repo.find_by_id(11).unwrap(), product);
}

#[test]
fn insert_stores_json_under_label_key_and_indexes_it() {
    let store = shared_store();
    let repo = IndexedRepository::<Customer>::new(store.clone());
    let customer = Customer {
        customer_id: 7,
        name: "Grace".to_string(),
        surname: "Hopper".to_string(),
        email: "grace@example.com".to_string(),
        is_deleted: false,
    };

    repo.insert(&customer).unwrap();

    let raw = store.get("customer:7").unwrap().expect("primary entry");
    let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
    assert_eq!(json["customer_id"], 7);
    assert_eq!(json["email"], "grace@example.com");

    let scan = store.scan_members("customers", 0, 10).unwrap();
    assert_eq!(scan.members, vec!["customer:7".to_string()]);
}

#[test]
fn insert_with_taken_id_fails_and_keeps_original() {
    let store = shared_store();
    let repo = IndexedRepository::<Category>::new(store.clone());
    repo.insert(&category(1, "Books")).unwrap();

    let err = repo.insert(&category(1, "Games")).unwrap_err();

    assert!(matches!(
        err,
        RepoError::AlreadyExists {
            label: "category",
            id: 1
        }
    ));
    assert_eq!(repo.find_by_id(1).unwrap().category_name, "Books");
    let scan = store.scan_members("categories", 0, 10).unwrap();
    assert_eq!(scan.members.len(), 1);
}

#[test]
fn insert_with_invalid_field_is_an_encode_error() {
    let repo = IndexedRepository::<Customer>::new(shared_store());
    let customer = Customer {
        customer_id: 2,
        email: "grace at example.com".to_string(),
        ..Customer::default()
    };

    let err = repo.insert(&customer).unwrap_err();

    assert!(matches!(err, RepoError::Encode { id: 2, .. }));
    assert!(repo.find_by_id(2).unwrap_err().is_not_found());
}

#[test]
fn find_by_id_never_inserted_is_not_found() {
    let repo = IndexedRepository::<Order>::new(shared_store());

    let err = repo.find_by_id(404).unwrap_err();

    assert!(matches!(err, RepoError::NotFound { label: "order", id: 404 }));
}

#[test]
fn update_replaces_existing_record() {
    let repo = IndexedRepository::<Order>::new(shared_store());
    let mut order = Order {
        order_id: 5,
        customer_id: 9,
        line_items: vec![LineItem {
            product_id: 11,
            quantity: 1,
            price: 2_499,
        }],
        created_at: Some(1_700_000_000_000),
        ..Order::default()
    };
    repo.insert(&order).unwrap();

    order.shipped_at = Some(1_700_000_360_000);
    order.line_items[0].quantity = 3;
    repo.update(&order).unwrap();

    let loaded = repo.find_by_id(5).unwrap();
    assert_eq!(loaded.shipped_at, Some(1_700_000_360_000));
    assert_eq!(loaded.line_items[0].quantity, 3);
}

#[test]
fn update_missing_record_is_not_found_and_creates_nothing() {
    let store = shared_store();
    let repo = IndexedRepository::<Category>::new(store.clone());

    let err = repo.update(&category(8, "Ghost")).unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(store.get("category:8").unwrap(), None);
    assert!(repo.find_all(PageRequest::first(10)).unwrap().items.is_empty());
}

#[test]
fn delete_removes_primary_entry_and_index_member() {
    let store = shared_store();
    let repo = IndexedRepository::<Category>::new(store.clone());
    repo.insert(&category(1, "Books")).unwrap();
    repo.insert(&category(2, "Games")).unwrap();

    repo.delete_by_id(1).unwrap();

    assert!(repo.find_by_id(1).unwrap_err().is_not_found());
    let scan = store.scan_members("categories", 0, 10).unwrap();
    assert_eq!(scan.members, vec!["category:2".to_string()]);
}

#[test]
fn delete_missing_record_is_not_found() {
    let repo = IndexedRepository::<Product>::new(shared_store());

    let err = repo.delete_by_id(77).unwrap_err();

    assert!(matches!(err, RepoError::NotFound { label: "product", id: 77 }));
}

#[test]
fn delete_cleans_dangling_index_member() {
    let store = shared_store();
    let repo = IndexedRepository::<Category>::new(store.clone());
    store
        .execute(&Batch::new().set_add("categories", "category:3"))
        .unwrap();

    assert!(repo.delete_by_id(3).unwrap_err().is_not_found());

    let scan = store.scan_members("categories", 0, 10).unwrap();
    assert!(scan.members.is_empty());
}

#[test]
fn corrupt_stored_value_is_a_decode_error_not_not_found() {
    let store = shared_store();
    let repo = IndexedRepository::<Product>::new(store.clone());
    store
        .execute(
            &Batch::new()
                .put("product:4", b"{\"product_id\": \"four\"}".to_vec())
                .set_add("products", "product:4"),
        )
        .unwrap();

    let by_id = repo.find_by_id(4).unwrap_err();
    assert!(matches!(by_id, RepoError::Decode { ref key, .. } if key == "product:4"));

    let listing = repo.find_all(PageRequest::first(10)).unwrap_err();
    assert!(matches!(listing, RepoError::Decode { .. }));
}

#[test]
fn repositories_share_one_store_without_interference() {
    let store = shared_store();
    let categories = IndexedRepository::<Category>::new(store.clone());
    let products = IndexedRepository::<Product>::new(store.clone());
    categories.insert(&category(1, "Books")).unwrap();
    products
        .insert(&Product {
            product_id: 1,
            product_name: "Atlas".to_string(),
            price: 3_000,
            category: category(1, "Books"),
        })
        .unwrap();

    products.delete_by_id(1).unwrap();

    assert_eq!(categories.find_by_id(1).unwrap().category_name, "Books");
    assert_eq!(
        categories.find_all(PageRequest::first(10)).unwrap().items.len(),
        1
    );
}

#[test]
fn concurrent_inserts_from_threads_are_all_indexed() {
    let repo = IndexedRepository::<Category>::new(shared_store());
    let handles = (0..4u64)
        .map(|worker| {
            let repo = repo.clone();
            std::thread::spawn(move || {
                for n in 0..25u64 {
                    let id = worker * 100 + n + 1;
                    repo.insert(&category(id, "Bulk")).unwrap();
                }
            })
        })
        .collect::<Vec<_>>();
    for handle in handles {
        handle.join().unwrap();
    }

    let all = orders_core::walk_pages(30, |page| repo.find_all(page)).unwrap();
    assert_eq!(all.len(), 100);
}
