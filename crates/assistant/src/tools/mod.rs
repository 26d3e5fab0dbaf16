//! Tools the chat model can call.
//!
//! Three read-only tools over the catalog and order ledger:
//!
//! - `search_products`: keyword/color scoring, top three matches
//! - `get_order_history`: the calling user's orders, optionally windowed
//! - `get_product_details`: one product's full record
//!
//! Every result is a [`ToolResult`]. Successful results that point at a
//! catalog product get a product picture attached by the [`ToolExecutor`].

mod executor;
mod functions;

use serde::Serialize;
use serde_json::json;

use shop_concierge_core::{Price, ProductId};

use crate::catalog::{Order, Product};
use crate::llm::ToolDeclaration;

pub use executor::{MAX_ARGS_BYTES, ToolExecution, ToolExecutor};
pub use functions::{
    OrderHistoryArgs, ProductDetailsArgs, SearchArgs, get_order_history, get_product_details,
    search_products,
};

/// Name of the product search tool.
pub const SEARCH_PRODUCTS: &str = "search_products";
/// Name of the order history tool.
pub const GET_ORDER_HISTORY: &str = "get_order_history";
/// Name of the product details tool.
pub const GET_PRODUCT_DETAILS: &str = "get_product_details";

/// Declarations for every tool, in the order they are offered to the model.
#[must_use]
pub fn assistant_tools() -> Vec<ToolDeclaration> {
    vec![
        ToolDeclaration {
            name: SEARCH_PRODUCTS.to_string(),
            description: "根據描述和顏色搜尋商品，例如：藍色襯衫、棕色外套。最多回傳 3 件商品。".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "description": {
                        "type": "string",
                        "description": "商品描述，例如：淺藍色的上衣"
                    },
                    "color": {
                        "type": "string",
                        "description": "商品顏色（可選），例如：深藍色"
                    }
                },
                "required": ["description"]
            }),
        },
        ToolDeclaration {
            name: GET_ORDER_HISTORY.to_string(),
            description: "查詢目前用戶的訂單歷史記錄。用戶身分由系統自動帶入，不需要提供。".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "time_range": {
                        "type": "string",
                        "description": "時間範圍：all（全部）、last_month（近一個月）、last_3_months（近三個月）",
                        "enum": ["all", "last_month", "last_3_months"]
                    }
                }
            }),
        },
        ToolDeclaration {
            name: GET_PRODUCT_DETAILS.to_string(),
            description: "取得特定商品的詳細資訊，需提供商品 ID（如 P001）。".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "product_id": {
                        "type": "string",
                        "description": "商品 ID，例如：P001"
                    }
                },
                "required": ["product_id"]
            }),
        },
    ]
}

/// Outcome of a tool call, serialized with a `status` discriminator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResult {
    /// The tool ran and produced a payload.
    Success(ToolPayload),
    /// The tool could not produce a payload.
    Error {
        /// Human-readable reason, forwarded to the model.
        message: String,
    },
}

impl ToolResult {
    /// Build an error result.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Whether this is an error result.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// The product this result is mainly about, if any.
    #[must_use]
    pub fn primary_product(&self) -> Option<&ProductId> {
        match self {
            Self::Success(ToolPayload::Search(results)) => results.primary_product_id.as_ref(),
            Self::Success(ToolPayload::Orders(history)) => history.primary_product_id.as_ref(),
            Self::Success(ToolPayload::Product(details)) => Some(&details.product.id),
            Self::Error { .. } => None,
        }
    }

    /// The result as a JSON object.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            json!({
                "status": "error",
                "message": format!("failed to serialize tool result: {e}"),
            })
        })
    }
}

/// Successful tool payloads.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolPayload {
    /// Result of `search_products`.
    Search(SearchResults),
    /// Result of `get_order_history`.
    Orders(OrderHistory),
    /// Result of `get_product_details`.
    Product(ProductDetails),
}

/// Ranked search matches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResults {
    pub count: usize,
    pub products: Vec<ProductSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_product_id: Option<ProductId>,
}

/// Short product listing used in search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductSummary {
    pub product_id: ProductId,
    pub name: String,
    pub color: String,
    pub category: String,
    pub price: Price,
    pub stock: u32,
}

impl From<&Product> for ProductSummary {
    fn from(product: &Product) -> Self {
        Self {
            product_id: product.id.clone(),
            name: product.name.clone(),
            color: product.color.clone(),
            category: product.category.clone(),
            price: product.price,
            stock: product.stock,
        }
    }
}

/// A user's orders within a time window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderHistory {
    pub order_count: usize,
    pub orders: Vec<OrderSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_product_id: Option<ProductId>,
}

/// An order enriched with its product's name and color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderSummary {
    #[serde(flatten)]
    pub order: Order,
    pub product_name: String,
    pub product_color: String,
}

/// Full product record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductDetails {
    pub product: ProductRecord,
}

/// Product fields exposed to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductRecord {
    pub id: ProductId,
    pub name: String,
    pub color: String,
    pub category: String,
    pub price: Price,
    pub stock: u32,
    pub description: String,
}

impl From<&Product> for ProductRecord {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.clone(),
            name: product.name.clone(),
            color: product.color.clone(),
            category: product.category.clone(),
            price: product.price,
            stock: product.stock,
            description: product.description.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_declarations() {
        let tools = assistant_tools();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec![SEARCH_PRODUCTS, GET_ORDER_HISTORY, GET_PRODUCT_DETAILS]
        );

        for tool in &tools {
            assert_eq!(tool.parameters["type"], "object", "{}", tool.name);
            assert!(!tool.description.is_empty());
        }
        assert_eq!(tools[0].parameters["required"][0], "description");
        assert_eq!(
            tools[1].parameters["properties"]["time_range"]["enum"]
                .as_array()
                .map(Vec::len),
            Some(3)
        );
    }

    #[test]
    fn test_order_history_does_not_expose_user_id() {
        let tools = assistant_tools();
        let properties = tools[1].parameters["properties"]
            .as_object()
            .expect("properties");
        assert!(properties.keys().all(|k| !k.contains("user")));
    }

    #[test]
    fn test_error_result_serialization() {
        let value = ToolResult::error("找不到商品 P999").to_json();
        assert_eq!(value["status"], "error");
        assert_eq!(value["message"], "找不到商品 P999");
        assert!(value.get("product").is_none());
    }

    #[test]
    fn test_success_result_is_flattened_under_status() {
        let result = ToolResult::Success(ToolPayload::Search(SearchResults {
            count: 0,
            products: Vec::new(),
            primary_product_id: None,
        }));
        let value = result.to_json();
        assert_eq!(value["status"], "success");
        assert_eq!(value["count"], 0);
        assert!(value.get("primary_product_id").is_none());
        assert!(result.primary_product().is_none());
        assert!(!result.is_error());
    }

    #[test]
    fn test_error_has_no_primary_product() {
        assert!(ToolResult::error("x").primary_product().is_none());
        assert!(ToolResult::error("x").is_error());
    }
}
