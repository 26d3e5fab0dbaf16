//! In-memory product catalog and per-user order ledger.
//!
//! The catalog is a fixed fixture loaded once at startup and shared
//! read-only. Orders live in an [`OrderLedger`], which hands every user an
//! independent copy of the demo order template the first time their history
//! is requested.

mod fixtures;
mod ledger;

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::Serialize;

use shop_concierge_core::{OrderId, OrderStatus, Price, ProductId};

pub use fixtures::{DEMO_TODAY, demo_order_template, demo_products};
pub use ledger::{LedgerSettings, OrderLedger};

/// How a product's picture is obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Synthesize a card on this RGB background.
    Swatch([u8; 3]),
    /// Load a pre-made JPEG, relative to the configured assets directory.
    Asset {
        /// File path relative to the assets directory.
        path: PathBuf,
        /// Background used if the asset cannot be loaded.
        fallback: [u8; 3],
    },
}

impl ImageSource {
    /// Background color for synthesized cards.
    #[must_use]
    pub const fn background(&self) -> [u8; 3] {
        match self {
            Self::Swatch(rgb) | Self::Asset { fallback: rgb, .. } => *rgb,
        }
    }
}

/// A catalog product.
#[derive(Debug, Clone)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub color: String,
    pub category: String,
    pub price: Price,
    pub stock: u32,
    pub description: String,
    pub image: ImageSource,
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub order_id: OrderId,
    pub date: NaiveDate,
    pub product_id: ProductId,
    pub quantity: u32,
    pub total: Price,
    pub status: OrderStatus,
    pub shipping_addr: String,
}

/// Fixed product catalog.
///
/// Iteration order is the fixture order, which search relies on to break
/// score ties.
#[derive(Debug, Clone)]
pub struct Catalog {
    products: Vec<Product>,
}

impl Catalog {
    /// Build a catalog from a product list.
    #[must_use]
    pub const fn new(products: Vec<Product>) -> Self {
        Self { products }
    }

    /// The demo catalog shipped with the assistant.
    #[must_use]
    pub fn demo() -> Self {
        Self::new(demo_products())
    }

    /// Look up a product by ID.
    #[must_use]
    pub fn get_product(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id.as_str() == id)
    }

    /// Whether a product with this ID exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.get_product(id).is_some()
    }

    /// All products in catalog order.
    pub fn products(&self) -> impl Iterator<Item = &Product> {
        self.products.iter()
    }

    /// Number of products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}
