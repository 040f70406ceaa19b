use rust_decimal::Decimal;
use stocknote_core::db::open_db_in_memory;
use stocknote_core::{
    CatalogRepository, CatalogService, CoreConfig, DraftLine, LedgerService, NoteDraft,
    NoteHeader, PageRequest, Product, ProductFilter, ProductListQuery, ProductValidationError,
    RepoError, SqliteCatalogRepository, SqliteNoteRepository, Warehouse,
};
use uuid::Uuid;

fn seeded_warehouse(repo: &SqliteCatalogRepository<'_>) -> Warehouse {
    let warehouse = Warehouse::new("North Depot", "1 Quay Street");
    repo.create_warehouse(&warehouse).unwrap();
    warehouse
}

#[test]
fn warehouse_crud_roundtrip() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();

    let mut warehouse = seeded_warehouse(&repo);
    let loaded = repo.get_warehouse(warehouse.id).unwrap().unwrap();
    assert_eq!(loaded, warehouse);

    warehouse.address = "2 Quay Street".to_string();
    repo.update_warehouse(&warehouse).unwrap();
    assert_eq!(
        repo.get_warehouse(warehouse.id).unwrap().unwrap().address,
        "2 Quay Street"
    );

    let south = Warehouse::new("a-South", "");
    repo.create_warehouse(&south).unwrap();
    let names: Vec<_> = repo
        .list_warehouses()
        .unwrap()
        .into_iter()
        .map(|w| w.name)
        .collect();
    assert_eq!(names, vec!["a-South".to_string(), "North Depot".to_string()]);

    repo.delete_warehouse(south.id).unwrap();
    assert!(repo.get_warehouse(south.id).unwrap().is_none());
    assert!(matches!(
        repo.delete_warehouse(south.id),
        Err(RepoError::WarehouseNotFound(id)) if id == south.id
    ));
}

#[test]
fn warehouse_with_products_cannot_be_deleted() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    let warehouse = seeded_warehouse(&repo);
    repo.create_product(&Product::new(warehouse.id, "Cable", "C-01", Decimal::ONE, 5))
        .unwrap();

    assert!(matches!(
        repo.delete_warehouse(warehouse.id),
        Err(RepoError::WarehouseInUse(id)) if id == warehouse.id
    ));
}

#[test]
fn product_create_get_update_roundtrip() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    let warehouse = seeded_warehouse(&repo);

    let mut product = Product::new(warehouse.id, "Cable", "C-01", Decimal::new(1999, 2), 40);
    let id = repo.create_product(&product).unwrap();
    assert_eq!(id, product.id);
    assert!(repo.product_exists(id).unwrap());
    assert!(!repo.product_exists(Uuid::new_v4()).unwrap());

    let loaded = repo.get_product(id).unwrap().unwrap();
    assert_eq!(loaded, product);
    assert_eq!(loaded.price.to_string(), "19.99");

    product.price = Decimal::new(2500, 2);
    product.quantity = 12;
    repo.update_product(&product).unwrap();
    let loaded = repo.get_product(id).unwrap().unwrap();
    assert_eq!(loaded.price, Decimal::new(25, 0));
    assert_eq!(loaded.quantity, 12);
}

#[test]
fn product_writes_validate_and_enforce_unique_code() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    let warehouse = seeded_warehouse(&repo);

    let negative = Product::new(warehouse.id, "Cable", "C-01", Decimal::ONE, -1);
    assert!(matches!(
        repo.create_product(&negative),
        Err(RepoError::Validation(ProductValidationError::NegativeQuantity(-1)))
    ));

    let orphan = Product::new(Uuid::new_v4(), "Cable", "C-01", Decimal::ONE, 1);
    assert!(matches!(
        repo.create_product(&orphan),
        Err(RepoError::WarehouseNotFound(_))
    ));

    let first = Product::new(warehouse.id, "Cable", "C-01", Decimal::ONE, 1);
    repo.create_product(&first).unwrap();
    let clash = Product::new(warehouse.id, "Other", "C-01", Decimal::ONE, 1);
    assert!(matches!(
        repo.create_product(&clash),
        Err(RepoError::DuplicateProductCode(code)) if code == "C-01"
    ));

    // Re-saving a product with its own code is not a clash.
    repo.update_product(&first).unwrap();

    let missing = Product::new(warehouse.id, "Ghost", "G-01", Decimal::ONE, 1);
    assert!(matches!(
        repo.update_product(&missing),
        Err(RepoError::ProductNotFound(id)) if id == missing.id
    ));
}

#[test]
fn decrement_quantity_rejects_instead_of_clamping() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    let warehouse = seeded_warehouse(&repo);
    let product = Product::new(warehouse.id, "Cable", "C-01", Decimal::ONE, 10);
    repo.create_product(&product).unwrap();

    repo.decrement_quantity(product.id, 4).unwrap();
    assert_eq!(repo.get_product(product.id).unwrap().unwrap().quantity, 6);

    match repo.decrement_quantity(product.id, 7) {
        Err(RepoError::NegativeStock {
            product_id,
            requested,
            on_hand,
        }) => {
            assert_eq!(product_id, product.id);
            assert_eq!(requested, 7);
            assert_eq!(on_hand, 6);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(repo.get_product(product.id).unwrap().unwrap().quantity, 6);

    repo.decrement_quantity(product.id, 6).unwrap();
    assert_eq!(repo.get_product(product.id).unwrap().unwrap().quantity, 0);

    assert!(matches!(
        repo.decrement_quantity(product.id, 0),
        Err(RepoError::InvalidAmount(0))
    ));
    assert!(matches!(
        repo.decrement_quantity(Uuid::new_v4(), 1),
        Err(RepoError::ProductNotFound(_))
    ));
}

#[test]
fn product_referenced_by_note_cannot_be_deleted() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    let warehouse = seeded_warehouse(&repo);
    let used = Product::new(warehouse.id, "Cable", "C-01", Decimal::ONE, 10);
    let unused = Product::new(warehouse.id, "Plug", "P-01", Decimal::ONE, 10);
    repo.create_product(&used).unwrap();
    repo.create_product(&unused).unwrap();

    let ledger = LedgerService::new(SqliteNoteRepository::try_new(&conn).unwrap());
    ledger
        .create_note(&NoteDraft {
            header: NoteHeader {
                code: "PX-1".to_string(),
                creator_name: "Lan".to_string(),
                customer_name: "Acme".to_string(),
                customer_address: "12 Dock Road".to_string(),
                reason: "order".to_string(),
            },
            lines: vec![DraftLine::new(used.id, 2)],
        })
        .unwrap();

    assert!(matches!(
        repo.delete_product(used.id),
        Err(RepoError::ProductInUse(id)) if id == used.id
    ));
    repo.delete_product(unused.id).unwrap();
    assert!(!repo.product_exists(unused.id).unwrap());
}

#[test]
fn product_listing_filters_by_name_and_low_stock() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    let warehouse = seeded_warehouse(&repo);
    for (name, code, quantity) in [
        ("USB Cable", "C-01", 3),
        ("HDMI cable", "C-02", 25),
        ("Power Plug", "P-01", 9),
        ("Switch", "S-01", 10),
    ] {
        repo.create_product(&Product::new(warehouse.id, name, code, Decimal::ONE, quantity))
            .unwrap();
    }

    let cables = repo
        .list_products(&ProductListQuery {
            name_contains: Some("CABLE".to_string()),
            ..ProductListQuery::default()
        })
        .unwrap();
    let names: Vec<_> = cables.iter().map(|p| p.product.name.as_str()).collect();
    assert_eq!(names, vec!["HDMI cable", "USB Cable"]);
    assert!(cables.iter().all(|p| p.warehouse_name == "North Depot"));

    let service = CatalogService::new(
        SqliteCatalogRepository::try_new(&conn).unwrap(),
        CoreConfig::default(),
    );
    assert_eq!(service.count_low_stock().unwrap(), 2);

    let low = service
        .list_products(
            &ProductFilter {
                name_contains: None,
                low_stock_only: true,
            },
            PageRequest::default(),
        )
        .unwrap();
    let names: Vec<_> = low.items.iter().map(|p| p.product.name.as_str()).collect();
    assert_eq!(names, vec!["Power Plug", "USB Cable"]);
    assert_eq!(low.total_count, 2);
}

#[test]
fn product_listing_paginates_within_scan_cap() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    let warehouse = seeded_warehouse(&repo);
    for index in 0..7 {
        repo.create_product(&Product::new(
            warehouse.id,
            format!("Item {index}"),
            format!("I-{index}"),
            Decimal::ONE,
            50,
        ))
        .unwrap();
    }

    let config = CoreConfig {
        product_list_cap: 5,
        ..CoreConfig::default()
    };
    let service = CatalogService::new(SqliteCatalogRepository::try_new(&conn).unwrap(), config);

    let page = service
        .list_products(&ProductFilter::default(), PageRequest::new(2, Some(3)))
        .unwrap();
    assert_eq!(page.total_count, 5);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.page_index, 2);
    assert!(page.has_previous());
    assert!(!page.has_next());
    let names: Vec<_> = page.items.iter().map(|p| p.product.name.as_str()).collect();
    assert_eq!(names, vec!["Item 3", "Item 4"]);

    assert_eq!(service.all_products().unwrap().len(), 7);
}
