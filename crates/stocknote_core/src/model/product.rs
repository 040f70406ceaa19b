//! Catalog domain model: warehouses and products.
//!
//! # Responsibility
//! - Define product master data including quantity-on-hand.
//! - Validate catalog records before they reach persistence.
//!
//! # Invariants
//! - `quantity` is never negative.
//! - `price` is never negative.
//! - `code` and `name` are non-blank.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of a catalog product.
pub type ProductId = Uuid;

/// Stable identifier of a warehouse.
pub type WarehouseId = Uuid;

/// Validation failures for catalog records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductValidationError {
    NilId,
    BlankField(&'static str),
    NegativePrice(Decimal),
    NegativeQuantity(i64),
}

impl Display for ProductValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId => write!(f, "catalog id must not be nil"),
            Self::BlankField(field) => write!(f, "{field} must not be blank"),
            Self::NegativePrice(price) => write!(f, "price must not be negative, got {price}"),
            Self::NegativeQuantity(quantity) => {
                write!(f, "quantity must not be negative, got {quantity}")
            }
        }
    }
}

impl Error for ProductValidationError {}

/// Physical location that holds products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub name: String,
    pub address: String,
}

impl Warehouse {
    /// Creates a warehouse with a generated id.
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            address: address.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ProductValidationError> {
        if self.id.is_nil() {
            return Err(ProductValidationError::NilId);
        }
        if self.name.trim().is_empty() {
            return Err(ProductValidationError::BlankField("warehouse name"));
        }
        Ok(())
    }
}

/// Product master record with its current quantity-on-hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    /// Owning warehouse; a product belongs to exactly one.
    pub warehouse_id: WarehouseId,
    pub name: String,
    /// Catalog-unique product code.
    pub code: String,
    /// Current unit price. Notes snapshot this value at commit.
    pub price: Decimal,
    /// Units on hand. Only note commits and catalog edits change it.
    pub quantity: i64,
}

impl Product {
    /// Creates a product with a generated id.
    pub fn new(
        warehouse_id: WarehouseId,
        name: impl Into<String>,
        code: impl Into<String>,
        price: Decimal,
        quantity: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            warehouse_id,
            name: name.into(),
            code: code.into(),
            price,
            quantity,
        }
    }

    /// Checks catalog invariants before persistence.
    pub fn validate(&self) -> Result<(), ProductValidationError> {
        if self.id.is_nil() || self.warehouse_id.is_nil() {
            return Err(ProductValidationError::NilId);
        }
        if self.name.trim().is_empty() {
            return Err(ProductValidationError::BlankField("product name"));
        }
        if self.code.trim().is_empty() {
            return Err(ProductValidationError::BlankField("product code"));
        }
        if self.price < Decimal::ZERO {
            return Err(ProductValidationError::NegativePrice(self.price));
        }
        if self.quantity < 0 {
            return Err(ProductValidationError::NegativeQuantity(self.quantity));
        }
        Ok(())
    }
}

/// Product joined with the name of its warehouse, for listings and exports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductWithWarehouse {
    pub product: Product,
    pub warehouse_name: String,
}
