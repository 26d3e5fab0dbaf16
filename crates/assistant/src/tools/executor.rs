//! Tool dispatch.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use shop_concierge_core::UserId;

use crate::catalog::{Catalog, OrderLedger};
use crate::imaging::ProductImages;

use super::functions::{
    OrderHistoryArgs, ProductDetailsArgs, SearchArgs, get_order_history, get_product_details,
    search_products,
};
use super::{GET_ORDER_HISTORY, GET_PRODUCT_DETAILS, SEARCH_PRODUCTS, ToolPayload, ToolResult};

/// Largest accepted serialized argument object, in bytes.
pub const MAX_ARGS_BYTES: usize = 4096;

/// A tool result plus the product picture that goes with it.
#[derive(Debug, Clone)]
pub struct ToolExecution {
    pub result: ToolResult,
    /// JPEG bytes for the result's primary product, if any.
    pub image: Option<Vec<u8>>,
}

/// Executes tool calls against the catalog and order ledger.
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    catalog: Arc<Catalog>,
    ledger: OrderLedger,
    images: ProductImages,
    today: NaiveDate,
}

impl ToolExecutor {
    /// Create a new tool executor.
    ///
    /// `today` anchors the order history time windows.
    #[must_use]
    pub const fn new(
        catalog: Arc<Catalog>,
        ledger: OrderLedger,
        images: ProductImages,
        today: NaiveDate,
    ) -> Self {
        Self {
            catalog,
            ledger,
            images,
            today,
        }
    }

    /// The catalog tools run against.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Execute a tool by name.
    ///
    /// Never fails: unknown tools and bad arguments become error results the
    /// model can read. `user_id` is supplied by the caller and is the only
    /// identity `get_order_history` ever sees.
    #[instrument(skip(self, args), fields(tool_name = %name, user_id = %user_id))]
    pub fn execute(
        &self,
        name: &str,
        args: &serde_json::Map<String, serde_json::Value>,
        user_id: &UserId,
    ) -> ToolExecution {
        let result = self.dispatch(name, args, user_id);
        if let ToolResult::Error { message } = &result {
            debug!(%message, "Tool returned an error result");
        }

        let image = result
            .primary_product()
            .and_then(|id| self.catalog.get_product(id.as_str()))
            .and_then(|product| match self.images.produce(product) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!(product_id = %product.id, error = %e, "Failed to produce product image");
                    None
                }
            });

        ToolExecution { result, image }
    }

    fn dispatch(
        &self,
        name: &str,
        args: &serde_json::Map<String, serde_json::Value>,
        user_id: &UserId,
    ) -> ToolResult {
        match name {
            SEARCH_PRODUCTS => match decode::<SearchArgs>(args) {
                Ok(args) => ToolResult::Success(ToolPayload::Search(search_products(
                    &self.catalog,
                    &args.description,
                    args.color.as_deref(),
                ))),
                Err(error) => error,
            },
            GET_ORDER_HISTORY => match decode::<OrderHistoryArgs>(args) {
                Ok(args) => ToolResult::Success(ToolPayload::Orders(get_order_history(
                    &self.catalog,
                    &self.ledger,
                    user_id,
                    args.time_range(),
                    self.today,
                ))),
                Err(error) => error,
            },
            GET_PRODUCT_DETAILS => match decode::<ProductDetailsArgs>(args) {
                Ok(args) => get_product_details(&self.catalog, &args.product_id),
                Err(error) => error,
            },
            _ => ToolResult::error(format!("未知工具：{name}")),
        }
    }
}

/// Decode tool arguments, enforcing the size cap.
fn decode<T: DeserializeOwned>(
    args: &serde_json::Map<String, serde_json::Value>,
) -> Result<T, ToolResult> {
    let value = serde_json::Value::Object(args.clone());

    let size = value.to_string().len();
    if size > MAX_ARGS_BYTES {
        return Err(ToolResult::error(format!(
            "參數過大（{size} 位元組，上限 {MAX_ARGS_BYTES}）"
        )));
    }

    serde_json::from_value(value).map_err(|e| ToolResult::error(format!("參數格式錯誤：{e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DEMO_TODAY, LedgerSettings};
    use crate::imaging::is_jpeg;
    use serde_json::json;

    fn executor() -> ToolExecutor {
        ToolExecutor::new(
            Arc::new(Catalog::demo()),
            OrderLedger::demo(LedgerSettings::default()),
            ProductImages::default(),
            DEMO_TODAY,
        )
    }

    fn args(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn test_search_attaches_primary_product_image() {
        let execution = executor().execute(
            SEARCH_PRODUCTS,
            &args(json!({"description": "上衣", "color": "淺藍色"})),
            &UserId::new("U1"),
        );
        assert!(!execution.result.is_error());
        let image = execution.image.expect("image for P005");
        assert!(is_jpeg(&image));
    }

    #[test]
    fn test_search_without_matches_has_no_image() {
        let execution = executor().execute(
            SEARCH_PRODUCTS,
            &args(json!({"description": "火箭筒"})),
            &UserId::new("U1"),
        );
        assert!(!execution.result.is_error());
        assert!(execution.image.is_none());
    }

    #[test]
    fn test_order_history_uses_injected_user() {
        let exec = executor();
        let execution = exec.execute(
            GET_ORDER_HISTORY,
            &args(json!({"time_range": "all", "user_id": "someone-else"})),
            &UserId::new("U-real"),
        );
        let value = execution.result.to_json();
        assert_eq!(value["order_count"], 2);
        assert!(execution.image.is_some());
    }

    #[test]
    fn test_order_history_empty_window_has_no_image() {
        let execution = executor().execute(
            GET_ORDER_HISTORY,
            &args(json!({"time_range": "last_month"})),
            &UserId::new("U1"),
        );
        assert_eq!(execution.result.to_json()["order_count"], 0);
        assert!(execution.image.is_none());
    }

    #[test]
    fn test_product_details_missing_has_no_image() {
        let execution = executor().execute(
            GET_PRODUCT_DETAILS,
            &args(json!({"product_id": "P999"})),
            &UserId::new("U1"),
        );
        assert!(execution.result.is_error());
        assert!(execution.image.is_none());
    }

    #[test]
    fn test_product_details_attaches_image() {
        let execution = executor().execute(
            GET_PRODUCT_DETAILS,
            &args(json!({"product_id": "P004"})),
            &UserId::new("U1"),
        );
        assert!(!execution.result.is_error());
        assert!(execution.image.is_some());
    }

    #[test]
    fn test_unknown_tool() {
        let execution = executor().execute("cancel_order", &args(json!({})), &UserId::new("U1"));
        let value = execution.result.to_json();
        assert_eq!(value["status"], "error");
        assert_eq!(value["message"], "未知工具：cancel_order");
        assert!(execution.image.is_none());
    }

    #[test]
    fn test_undecodable_arguments() {
        let execution = executor().execute(
            GET_PRODUCT_DETAILS,
            &args(json!({"product_id": 17})),
            &UserId::new("U1"),
        );
        assert!(execution.result.is_error());

        let execution =
            executor().execute(SEARCH_PRODUCTS, &args(json!({})), &UserId::new("U1"));
        assert!(execution.result.is_error());
    }

    #[test]
    fn test_oversized_arguments() {
        let huge = "襯".repeat(MAX_ARGS_BYTES);
        let execution = executor().execute(
            SEARCH_PRODUCTS,
            &args(json!({"description": huge})),
            &UserId::new("U1"),
        );
        assert!(execution.result.is_error());
        assert!(execution.image.is_none());
    }
}
