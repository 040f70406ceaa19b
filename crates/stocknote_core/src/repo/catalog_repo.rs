//! Catalog repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD APIs over `warehouses` and `products`.
//! - Own the quantity-on-hand decrement used by note commits.
//!
//! # Invariants
//! - Write paths call `Product::validate()` / `Warehouse::validate()` first.
//! - Quantity decrements are rejected, never clamped, when stock would go
//!   negative.
//! - Products referenced by note lines and warehouses holding products cannot
//!   be deleted.

use crate::db::{is_lock_contention, DbError};
use crate::model::note::{NoteId, NoteValidationError};
use crate::model::product::{
    Product, ProductId, ProductValidationError, ProductWithWarehouse, Warehouse, WarehouseId,
};
use crate::repo::{ensure_schema, now_epoch_ms, parse_decimal, parse_uuid};
use rusqlite::types::Value;
use rusqlite::{ffi, params, params_from_iter, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const PRODUCT_SELECT_SQL: &str = "SELECT
    p.id AS id,
    p.warehouse_id AS warehouse_id,
    p.name AS name,
    p.code AS code,
    p.price AS price,
    p.quantity AS quantity
FROM products p";

const CATALOG_TABLES: &[(&str, &[&str])] = &[
    ("warehouses", &["id", "name", "address"]),
    (
        "products",
        &["id", "warehouse_id", "name", "code", "price", "quantity"],
    ),
];

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by catalog and note persistence.
#[derive(Debug)]
pub enum RepoError {
    /// Catalog record failed model validation.
    Validation(ProductValidationError),
    /// Note draft or status change failed model validation.
    NoteValidation(NoteValidationError),
    Db(DbError),
    /// Another connection held the write lock past the busy timeout.
    ConcurrencyConflict,
    ProductNotFound(ProductId),
    WarehouseNotFound(WarehouseId),
    NoteNotFound(NoteId),
    /// A note line references a product that does not exist.
    UnknownProduct(ProductId),
    /// A note line asks for more units than are on hand.
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        on_hand: i64,
    },
    /// A direct decrement would drive quantity-on-hand below zero.
    NegativeStock {
        product_id: ProductId,
        requested: i64,
        on_hand: i64,
    },
    /// Decrement amount is zero or negative.
    InvalidAmount(i64),
    DuplicateProductCode(String),
    ProductInUse(ProductId),
    WarehouseInUse(WarehouseId),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NoteValidation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::ConcurrencyConflict => {
                write!(f, "write conflicted with a concurrent transaction")
            }
            Self::ProductNotFound(id) => write!(f, "product not found: {id}"),
            Self::WarehouseNotFound(id) => write!(f, "warehouse not found: {id}"),
            Self::NoteNotFound(id) => write!(f, "note not found: {id}"),
            Self::UnknownProduct(id) => write!(f, "note references unknown product: {id}"),
            Self::InsufficientStock {
                product_id,
                requested,
                on_hand,
            } => write!(
                f,
                "insufficient stock for product {product_id}: requested {requested}, on hand {on_hand}"
            ),
            Self::NegativeStock {
                product_id,
                requested,
                on_hand,
            } => write!(
                f,
                "decrement of {requested} would make product {product_id} negative (on hand {on_hand})"
            ),
            Self::InvalidAmount(amount) => {
                write!(f, "decrement amount must be positive, got {amount}")
            }
            Self::DuplicateProductCode(code) => write!(f, "product code already exists: {code}"),
            Self::ProductInUse(id) => write!(f, "product is referenced by notes: {id}"),
            Self::WarehouseInUse(id) => write!(f, "warehouse still holds products: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::NoteValidation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ProductValidationError> for RepoError {
    fn from(value: ProductValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<NoteValidationError> for RepoError {
    fn from(value: NoteValidationError) -> Self {
        Self::NoteValidation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        if value.is_lock_contention() {
            return Self::ConcurrencyConflict;
        }
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        if is_lock_contention(&value) {
            return Self::ConcurrencyConflict;
        }
        Self::Db(DbError::Sqlite(value))
    }
}

/// Query options for product listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductListQuery {
    /// Case-insensitive substring match on product name.
    pub name_contains: Option<String>,
    /// Keep only products with `quantity < below_quantity`.
    pub below_quantity: Option<i64>,
    /// Maximum rows considered before pagination.
    pub scan_cap: Option<u32>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for catalog operations.
pub trait CatalogRepository {
    fn create_warehouse(&self, warehouse: &Warehouse) -> RepoResult<WarehouseId>;
    fn update_warehouse(&self, warehouse: &Warehouse) -> RepoResult<()>;
    fn get_warehouse(&self, id: WarehouseId) -> RepoResult<Option<Warehouse>>;
    fn list_warehouses(&self) -> RepoResult<Vec<Warehouse>>;
    fn delete_warehouse(&self, id: WarehouseId) -> RepoResult<()>;

    fn create_product(&self, product: &Product) -> RepoResult<ProductId>;
    /// Replaces every editable product field, including quantity-on-hand.
    fn update_product(&self, product: &Product) -> RepoResult<()>;
    fn get_product(&self, id: ProductId) -> RepoResult<Option<Product>>;
    fn product_exists(&self, id: ProductId) -> RepoResult<bool>;
    fn list_products(&self, query: &ProductListQuery) -> RepoResult<Vec<ProductWithWarehouse>>;
    /// Counts rows matched by `query`, honoring `scan_cap` but not pagination.
    fn count_products(&self, query: &ProductListQuery) -> RepoResult<u64>;
    fn delete_product(&self, id: ProductId) -> RepoResult<()>;
    /// Decrements quantity-on-hand, rejecting results below zero.
    fn decrement_quantity(&self, id: ProductId, amount: i64) -> RepoResult<()>;
}

/// SQLite-backed catalog repository.
pub struct SqliteCatalogRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCatalogRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema(conn, CATALOG_TABLES)?;
        Ok(Self { conn })
    }
}

impl CatalogRepository for SqliteCatalogRepository<'_> {
    fn create_warehouse(&self, warehouse: &Warehouse) -> RepoResult<WarehouseId> {
        warehouse.validate()?;
        let now = now_epoch_ms();
        self.conn.execute(
            "INSERT INTO warehouses (id, name, address, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4);",
            params![
                warehouse.id.to_string(),
                warehouse.name.trim(),
                warehouse.address.trim(),
                now,
            ],
        )?;
        Ok(warehouse.id)
    }

    fn update_warehouse(&self, warehouse: &Warehouse) -> RepoResult<()> {
        warehouse.validate()?;
        let changed = self.conn.execute(
            "UPDATE warehouses
             SET name = ?2,
                 address = ?3,
                 updated_at = ?4
             WHERE id = ?1;",
            params![
                warehouse.id.to_string(),
                warehouse.name.trim(),
                warehouse.address.trim(),
                now_epoch_ms(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::WarehouseNotFound(warehouse.id));
        }
        Ok(())
    }

    fn get_warehouse(&self, id: WarehouseId) -> RepoResult<Option<Warehouse>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, address FROM warehouses WHERE id = ?1;",
                [id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(id_text, name, address)| {
            Ok(Warehouse {
                id: parse_uuid(&id_text, "warehouses.id")?,
                name,
                address,
            })
        })
        .transpose()
    }

    fn list_warehouses(&self) -> RepoResult<Vec<Warehouse>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, address
             FROM warehouses
             ORDER BY name COLLATE NOCASE ASC, id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut warehouses = Vec::new();
        while let Some(row) = rows.next()? {
            let id_text: String = row.get("id")?;
            warehouses.push(Warehouse {
                id: parse_uuid(&id_text, "warehouses.id")?,
                name: row.get("name")?,
                address: row.get("address")?,
            });
        }
        Ok(warehouses)
    }

    fn delete_warehouse(&self, id: WarehouseId) -> RepoResult<()> {
        let id_text = id.to_string();
        let holds_products: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM products WHERE warehouse_id = ?1);",
            [id_text.as_str()],
            |row| row.get(0),
        )?;
        if holds_products == 1 {
            return Err(RepoError::WarehouseInUse(id));
        }

        let changed = self
            .conn
            .execute("DELETE FROM warehouses WHERE id = ?1;", [id_text.as_str()])?;
        if changed == 0 {
            return Err(RepoError::WarehouseNotFound(id));
        }
        Ok(())
    }

    fn create_product(&self, product: &Product) -> RepoResult<ProductId> {
        product.validate()?;
        ensure_warehouse_exists(self.conn, product.warehouse_id)?;
        ensure_code_available(self.conn, product.code.trim(), None)?;
        insert_product_row(self.conn, product)?;
        Ok(product.id)
    }

    fn update_product(&self, product: &Product) -> RepoResult<()> {
        product.validate()?;
        ensure_warehouse_exists(self.conn, product.warehouse_id)?;
        ensure_code_available(self.conn, product.code.trim(), Some(product.id))?;

        let changed = self.conn.execute(
            "UPDATE products
             SET warehouse_id = ?2,
                 name = ?3,
                 code = ?4,
                 price = ?5,
                 quantity = ?6,
                 updated_at = ?7
             WHERE id = ?1;",
            params![
                product.id.to_string(),
                product.warehouse_id.to_string(),
                product.name.trim(),
                product.code.trim(),
                product.price.to_string(),
                product.quantity,
                now_epoch_ms(),
            ],
        )
        .map_err(|err| code_conflict(err, product.code.trim()))?;
        if changed == 0 {
            return Err(RepoError::ProductNotFound(product.id));
        }
        Ok(())
    }

    fn get_product(&self, id: ProductId) -> RepoResult<Option<Product>> {
        load_product(self.conn, id)
    }

    fn product_exists(&self, id: ProductId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM products WHERE id = ?1);",
            [id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn list_products(&self, query: &ProductListQuery) -> RepoResult<Vec<ProductWithWarehouse>> {
        let (filtered_sql, mut bind_values) = filtered_products_sql(query);
        let mut sql = format!(
            "SELECT
                p.id AS id,
                p.warehouse_id AS warehouse_id,
                p.name AS name,
                p.code AS code,
                p.price AS price,
                p.quantity AS quantity,
                w.name AS warehouse_name
             FROM ({filtered_sql}) p
             INNER JOIN warehouses w ON w.id = p.warehouse_id
             ORDER BY p.name COLLATE NOCASE ASC, p.id ASC"
        );

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut products = Vec::new();
        while let Some(row) = rows.next()? {
            products.push(ProductWithWarehouse {
                product: parse_product_row(row)?,
                warehouse_name: row.get("warehouse_name")?,
            });
        }
        Ok(products)
    }

    fn count_products(&self, query: &ProductListQuery) -> RepoResult<u64> {
        let (filtered_sql, bind_values) = filtered_products_sql(query);
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM ({filtered_sql});"),
            params_from_iter(bind_values),
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    fn delete_product(&self, id: ProductId) -> RepoResult<()> {
        let id_text = id.to_string();
        let referenced: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM note_lines WHERE product_id = ?1);",
            [id_text.as_str()],
            |row| row.get(0),
        )?;
        if referenced == 1 {
            return Err(RepoError::ProductInUse(id));
        }

        let changed = self
            .conn
            .execute("DELETE FROM products WHERE id = ?1;", [id_text.as_str()])?;
        if changed == 0 {
            return Err(RepoError::ProductNotFound(id));
        }
        Ok(())
    }

    fn decrement_quantity(&self, id: ProductId, amount: i64) -> RepoResult<()> {
        decrement_quantity_on(self.conn, id, amount)
    }
}

/// Loads one product through any connection or open transaction.
pub(crate) fn load_product(conn: &Connection, id: ProductId) -> RepoResult<Option<Product>> {
    let mut stmt = conn.prepare(&format!("{PRODUCT_SELECT_SQL} WHERE p.id = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_product_row(row)?));
    }
    Ok(None)
}

/// Decrements quantity-on-hand inside the caller's transaction scope.
///
/// The guarded `UPDATE` only matches when enough stock remains, so the
/// check and the write are one statement.
pub(crate) fn decrement_quantity_on(
    conn: &Connection,
    id: ProductId,
    amount: i64,
) -> RepoResult<()> {
    if amount <= 0 {
        return Err(RepoError::InvalidAmount(amount));
    }

    let changed = conn.execute(
        "UPDATE products
         SET quantity = quantity - ?2,
             updated_at = ?3
         WHERE id = ?1
           AND quantity >= ?2;",
        params![id.to_string(), amount, now_epoch_ms()],
    )?;
    if changed == 1 {
        return Ok(());
    }

    match load_product(conn, id)? {
        None => Err(RepoError::ProductNotFound(id)),
        Some(product) => Err(RepoError::NegativeStock {
            product_id: id,
            requested: amount,
            on_hand: product.quantity,
        }),
    }
}

fn filtered_products_sql(query: &ProductListQuery) -> (String, Vec<Value>) {
    let mut sql = String::from("SELECT * FROM products WHERE 1 = 1");
    let mut bind_values = Vec::new();

    if let Some(needle) = query
        .name_contains
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        sql.push_str(" AND instr(lower(name), lower(?)) > 0");
        bind_values.push(Value::Text(needle.to_string()));
    }

    if let Some(threshold) = query.below_quantity {
        sql.push_str(" AND quantity < ?");
        bind_values.push(Value::Integer(threshold));
    }

    if let Some(cap) = query.scan_cap {
        sql.push_str(" ORDER BY name COLLATE NOCASE ASC, id ASC LIMIT ?");
        bind_values.push(Value::Integer(i64::from(cap)));
    }

    (sql, bind_values)
}

fn ensure_warehouse_exists(conn: &Connection, id: WarehouseId) -> RepoResult<()> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM warehouses WHERE id = ?1);",
        [id.to_string()],
        |row| row.get(0),
    )?;
    if exists == 1 {
        Ok(())
    } else {
        Err(RepoError::WarehouseNotFound(id))
    }
}

fn ensure_code_available(
    conn: &Connection,
    code: &str,
    exclude: Option<ProductId>,
) -> RepoResult<()> {
    let taken: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM products
            WHERE code = ?1
              AND (?2 IS NULL OR id <> ?2)
        );",
        params![code, exclude.map(|id| id.to_string())],
        |row| row.get(0),
    )?;
    if taken == 1 {
        return Err(RepoError::DuplicateProductCode(code.to_string()));
    }
    Ok(())
}

/// Inserts a validated product. A unique-code collision that slips past
/// `ensure_code_available` still surfaces as `DuplicateProductCode`.
fn insert_product_row(conn: &Connection, product: &Product) -> RepoResult<()> {
    let now = now_epoch_ms();
    conn.execute(
        "INSERT INTO products (
            id,
            warehouse_id,
            name,
            code,
            price,
            quantity,
            created_at,
            updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7);",
        params![
            product.id.to_string(),
            product.warehouse_id.to_string(),
            product.name.trim(),
            product.code.trim(),
            product.price.to_string(),
            product.quantity,
            now,
        ],
    )
    .map_err(|err| code_conflict(err, product.code.trim()))?;
    Ok(())
}

fn code_conflict(err: rusqlite::Error, code: &str) -> RepoError {
    let on_code = match &err {
        rusqlite::Error::SqliteFailure(failure, Some(message)) => {
            failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                && message.contains("products.code")
        }
        _ => false,
    };
    if on_code {
        return RepoError::DuplicateProductCode(code.to_string());
    }
    err.into()
}

fn parse_product_row(row: &Row<'_>) -> RepoResult<Product> {
    let id_text: String = row.get("id")?;
    let warehouse_text: String = row.get("warehouse_id")?;
    let price_text: String = row.get("price")?;

    let product = Product {
        id: parse_uuid(&id_text, "products.id")?,
        warehouse_id: parse_uuid(&warehouse_text, "products.warehouse_id")?,
        name: row.get("name")?,
        code: row.get("code")?,
        price: parse_decimal(&price_text, "products.price")?,
        quantity: row.get("quantity")?,
    };
    product
        .validate()
        .map_err(|err| RepoError::InvalidData(format!("product {id_text}: {err}")))?;
    Ok(product)
}
