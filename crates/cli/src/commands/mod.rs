//! CLI command implementations.

pub mod catalog;
pub mod chat;
pub mod tool;

use std::path::PathBuf;
use std::sync::Arc;

use shop_concierge_assistant::catalog::{Catalog, DEMO_TODAY, LedgerSettings, OrderLedger};
use shop_concierge_assistant::imaging::ProductImages;
use shop_concierge_assistant::tools::ToolExecutor;

/// Product images honoring `PRODUCT_ASSETS_DIR` when set.
fn product_images() -> ProductImages {
    dotenvy::dotenv().ok();
    let assets_dir = std::env::var("PRODUCT_ASSETS_DIR")
        .ok()
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from);
    ProductImages::new(assets_dir)
}

/// Executor over the demo catalog and a fresh demo ledger.
fn demo_executor() -> ToolExecutor {
    ToolExecutor::new(
        Arc::new(Catalog::demo()),
        OrderLedger::demo(LedgerSettings::default()),
        product_images(),
        DEMO_TODAY,
    )
}
