//! Catalog use-case service.
//!
//! # Responsibility
//! - Expose warehouse and product management over a `CatalogRepository`.
//! - Apply configured listing policy (low-stock threshold, scan cap, paging).

use crate::config::CoreConfig;
use crate::model::product::{Product, ProductId, ProductWithWarehouse, Warehouse, WarehouseId};
use crate::repo::catalog_repo::{CatalogRepository, ProductListQuery, RepoResult};
use crate::service::query_service::{Page, PageRequest};
use log::info;

pub type ProductPage = Page<ProductWithWarehouse>;

/// Product listing filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    /// Case-insensitive substring match on product name.
    pub name_contains: Option<String>,
    /// Keep only products below the configured low-stock threshold.
    pub low_stock_only: bool,
}

/// Catalog facade over repository implementations.
pub struct CatalogService<R: CatalogRepository> {
    repo: R,
    config: CoreConfig,
}

impl<R: CatalogRepository> CatalogService<R> {
    pub fn new(repo: R, config: CoreConfig) -> Self {
        Self { repo, config }
    }

    pub fn create_warehouse(
        &self,
        name: impl Into<String>,
        address: impl Into<String>,
    ) -> RepoResult<Warehouse> {
        let warehouse = Warehouse::new(name, address);
        self.repo.create_warehouse(&warehouse)?;
        info!(
            "event=warehouse_create module=catalog status=ok warehouse_id={}",
            warehouse.id
        );
        Ok(warehouse)
    }

    pub fn update_warehouse(&self, warehouse: &Warehouse) -> RepoResult<()> {
        self.repo.update_warehouse(warehouse)
    }

    pub fn get_warehouse(&self, id: WarehouseId) -> RepoResult<Option<Warehouse>> {
        self.repo.get_warehouse(id)
    }

    pub fn list_warehouses(&self) -> RepoResult<Vec<Warehouse>> {
        self.repo.list_warehouses()
    }

    pub fn delete_warehouse(&self, id: WarehouseId) -> RepoResult<()> {
        self.repo.delete_warehouse(id)?;
        info!("event=warehouse_delete module=catalog status=ok warehouse_id={id}");
        Ok(())
    }

    pub fn create_product(&self, product: &Product) -> RepoResult<ProductId> {
        let id = self.repo.create_product(product)?;
        info!("event=product_create module=catalog status=ok product_id={id}");
        Ok(id)
    }

    pub fn update_product(&self, product: &Product) -> RepoResult<()> {
        self.repo.update_product(product)?;
        info!(
            "event=product_update module=catalog status=ok product_id={}",
            product.id
        );
        Ok(())
    }

    pub fn get_product(&self, id: ProductId) -> RepoResult<Option<Product>> {
        self.repo.get_product(id)
    }

    pub fn product_exists(&self, id: ProductId) -> RepoResult<bool> {
        self.repo.product_exists(id)
    }

    pub fn delete_product(&self, id: ProductId) -> RepoResult<()> {
        self.repo.delete_product(id)?;
        info!("event=product_delete module=catalog status=ok product_id={id}");
        Ok(())
    }

    /// Lists one page of products within the configured scan cap.
    pub fn list_products(
        &self,
        filter: &ProductFilter,
        request: PageRequest,
    ) -> RepoResult<ProductPage> {
        let (page_index, page_size, offset) = request.resolve(&self.config);
        let mut query = self.base_query(filter);
        let total_count = self.repo.count_products(&query)?;

        query.limit = Some(page_size);
        query.offset = offset;
        let items = self.repo.list_products(&query)?;
        Ok(Page::new(items, page_index, page_size, total_count))
    }

    /// Lists every product with its warehouse name, used by exports.
    pub fn all_products(&self) -> RepoResult<Vec<ProductWithWarehouse>> {
        self.repo.list_products(&ProductListQuery::default())
    }

    /// Number of products below the configured low-stock threshold.
    pub fn count_low_stock(&self) -> RepoResult<u64> {
        self.repo.count_products(&ProductListQuery {
            below_quantity: Some(self.config.low_stock_threshold),
            ..ProductListQuery::default()
        })
    }

    fn base_query(&self, filter: &ProductFilter) -> ProductListQuery {
        ProductListQuery {
            name_contains: filter.name_contains.clone(),
            below_quantity: filter
                .low_stock_only
                .then_some(self.config.low_stock_threshold),
            scan_cap: Some(self.config.product_list_cap),
            limit: None,
            offset: 0,
        }
    }
}
