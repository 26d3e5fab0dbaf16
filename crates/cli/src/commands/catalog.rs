//! Catalog inspection commands.
//!
//! # Usage
//!
//! ```bash
//! sc-cli catalog
//! sc-cli render P004 p004.jpg
//! ```
//!
//! # Environment Variables
//!
//! - `PRODUCT_ASSETS_DIR` - Directory holding pre-made product JPEGs (optional)

use std::path::Path;

use shop_concierge_assistant::catalog::Catalog;
use shop_concierge_assistant::imaging::ImageError;
use thiserror::Error;

/// Errors that can occur during catalog commands.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// No product has the requested ID.
    #[error("Unknown product: {0}")]
    UnknownProduct(String),

    /// The picture could not be produced.
    #[error("Image error: {0}")]
    Image(#[from] ImageError),

    /// The picture could not be written.
    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

/// Log every catalog product.
pub fn list() -> Result<(), CatalogError> {
    let catalog = Catalog::demo();

    tracing::info!("{} products", catalog.len());
    for product in catalog.products() {
        tracing::info!(
            "{} | {} | {} | {} | {} | stock {}",
            product.id,
            product.name,
            product.color,
            product.category,
            product.price,
            product.stock
        );
    }

    Ok(())
}

/// Produce the picture for `product_id` and write it to `out`.
pub fn render(product_id: &str, out: &Path) -> Result<(), CatalogError> {
    let catalog = Catalog::demo();
    let product = catalog
        .get_product(product_id)
        .ok_or_else(|| CatalogError::UnknownProduct(product_id.to_owned()))?;

    let bytes = super::product_images().produce(product)?;
    std::fs::write(out, &bytes).map_err(|source| CatalogError::Write {
        path: out.display().to_string(),
        source,
    })?;

    tracing::info!(
        "Wrote {} ({} bytes) for {}",
        out.display(),
        bytes.len(),
        product.name
    );

    Ok(())
}
