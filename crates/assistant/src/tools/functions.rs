//! Tool implementations.
//!
//! These are plain functions over the catalog and ledger; the executor
//! decodes arguments and attaches images.

use chrono::NaiveDate;
use serde::Deserialize;

use shop_concierge_core::{TimeRange, UserId};

use crate::catalog::{Catalog, OrderLedger, Product};

use super::{
    OrderHistory, OrderSummary, ProductDetails, ProductRecord, ProductSummary, SearchResults,
    ToolPayload, ToolResult,
};

/// Keywords matched against both the query and product names.
const NAME_KEYWORDS: [&str; 9] = [
    "襯衫", "T恤", "牛仔褲", "洋裝", "短靴", "上衣", "下著", "鞋", "外套",
];

const MAX_SEARCH_RESULTS: usize = 3;

/// Placeholder name for orders whose product is no longer in the catalog.
pub const UNKNOWN_PRODUCT_NAME: &str = "未知商品";

/// Arguments for `search_products`.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchArgs {
    pub description: String,
    #[serde(default)]
    pub color: Option<String>,
}

/// Arguments for `get_order_history`.
///
/// `time_range` stays a string so unknown values can fall back to `all`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderHistoryArgs {
    #[serde(default)]
    pub time_range: Option<String>,
}

impl OrderHistoryArgs {
    /// The requested window; missing or unrecognized values mean everything.
    #[must_use]
    pub fn time_range(&self) -> TimeRange {
        self.time_range
            .as_deref()
            .map_or(TimeRange::All, TimeRange::parse_lenient)
    }
}

/// Arguments for `get_product_details`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductDetailsArgs {
    pub product_id: String,
}

/// Score every product against the query and return the top three.
///
/// Scoring:
/// - +3 when `color` is a substring of the product color
/// - +2 when the product color appears in `description`
/// - +1 per keyword present in both `description` and the product name
/// - +1 when the product category appears in `description`
///
/// Products scoring zero are dropped. Ties keep catalog order.
#[must_use]
pub fn search_products(catalog: &Catalog, description: &str, color: Option<&str>) -> SearchResults {
    let color = color.filter(|c| !c.is_empty());

    let mut scored: Vec<(u32, &Product)> = catalog
        .products()
        .filter_map(|product| {
            let mut score = 0;
            if color.is_some_and(|c| product.color.contains(c)) {
                score += 3;
            }
            if description.contains(product.color.as_str()) {
                score += 2;
            }
            score += NAME_KEYWORDS
                .iter()
                .filter(|kw| description.contains(*kw) && product.name.contains(*kw))
                .map(|_| 1)
                .sum::<u32>();
            if description.contains(product.category.as_str()) {
                score += 1;
            }
            (score > 0).then_some((score, product))
        })
        .collect();

    // Stable sort preserves catalog order among equal scores.
    scored.sort_by(|a, b| b.0.cmp(&a.0));

    let products: Vec<ProductSummary> = scored
        .into_iter()
        .take(MAX_SEARCH_RESULTS)
        .map(|(_, product)| ProductSummary::from(product))
        .collect();

    SearchResults {
        count: products.len(),
        primary_product_id: products.first().map(|p| p.product_id.clone()),
        products,
    }
}

/// The user's orders within `time_range`, relative to `today`.
#[must_use]
pub fn get_order_history(
    catalog: &Catalog,
    ledger: &OrderLedger,
    user_id: &UserId,
    time_range: TimeRange,
    today: NaiveDate,
) -> OrderHistory {
    let orders: Vec<OrderSummary> = ledger
        .orders(user_id)
        .iter()
        .filter(|order| time_range.contains(order.date, today))
        .map(|order| {
            let product = catalog.get_product(order.product_id.as_str());
            OrderSummary {
                order: order.clone(),
                product_name: product.map_or_else(
                    || UNKNOWN_PRODUCT_NAME.to_string(),
                    |p| p.name.clone(),
                ),
                product_color: product.map(|p| p.color.clone()).unwrap_or_default(),
            }
        })
        .collect();

    OrderHistory {
        order_count: orders.len(),
        primary_product_id: orders.first().map(|o| o.order.product_id.clone()),
        orders,
    }
}

/// Full record for `product_id`, or an error result if it does not exist.
#[must_use]
pub fn get_product_details(catalog: &Catalog, product_id: &str) -> ToolResult {
    catalog.get_product(product_id).map_or_else(
        || ToolResult::error(format!("找不到商品 {product_id}")),
        |product| {
            ToolResult::Success(ToolPayload::Product(ProductDetails {
                product: ProductRecord::from(product),
            }))
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DEMO_TODAY, LedgerSettings, Order};
    use shop_concierge_core::{OrderId, OrderStatus, Price, ProductId};

    fn ids(results: &SearchResults) -> Vec<&str> {
        results
            .products
            .iter()
            .map(|p| p.product_id.as_str())
            .collect()
    }

    #[test]
    fn test_search_by_description_and_color() {
        let catalog = Catalog::demo();
        let results = search_products(&catalog, "上衣", Some("淺藍色"));
        assert!(results.count <= 3);
        assert_eq!(ids(&results).first(), Some(&"P005"));
        assert_eq!(
            results.primary_product_id.as_ref().map(ProductId::as_str),
            Some("P005")
        );
    }

    #[test]
    fn test_search_by_full_name() {
        let catalog = Catalog::demo();
        let results = search_products(&catalog, "棕色飛行員外套", None);
        assert!(ids(&results).contains(&"P001"));
        assert!(results.count >= 1);
    }

    #[test]
    fn test_search_never_returns_more_than_three() {
        let catalog = Catalog::demo();
        let results = search_products(&catalog, "上衣 下著 洋裝 外套", None);
        assert_eq!(results.count, 3);
        assert_eq!(results.products.len(), 3);
    }

    #[test]
    fn test_search_no_matches() {
        let catalog = Catalog::demo();
        let results = search_products(&catalog, "火箭筒", None);
        assert_eq!(results.count, 0);
        assert!(results.products.is_empty());
        assert!(results.primary_product_id.is_none());

        let value = ToolResult::Success(ToolPayload::Search(results)).to_json();
        assert!(value.get("primary_product_id").is_none());
    }

    #[test]
    fn test_search_ties_keep_catalog_order() {
        let catalog = Catalog::demo();
        // P002 and P005 are both 上衣 and score 1.
        let results = search_products(&catalog, "上衣", None);
        assert_eq!(ids(&results), vec!["P002", "P005"]);
    }

    #[test]
    fn test_search_empty_color_is_ignored() {
        let catalog = Catalog::demo();
        let results = search_products(&catalog, "火箭筒", Some(""));
        assert_eq!(results.count, 0);
    }

    #[test]
    fn test_order_history_windows() {
        let catalog = Catalog::demo();
        let ledger = OrderLedger::demo(LedgerSettings::default());
        let user = UserId::new("U-history");

        let all = get_order_history(&catalog, &ledger, &user, TimeRange::All, DEMO_TODAY);
        assert_eq!(all.order_count, 2);
        assert!(all.orders.iter().all(|o| !o.product_name.is_empty()));
        assert_eq!(
            all.primary_product_id.as_ref().map(ProductId::as_str),
            Some("P001")
        );

        let month = get_order_history(&catalog, &ledger, &user, TimeRange::LastMonth, DEMO_TODAY);
        assert_eq!(month.order_count, 0);
        assert!(month.primary_product_id.is_none());

        let quarter =
            get_order_history(&catalog, &ledger, &user, TimeRange::LastThreeMonths, DEMO_TODAY);
        assert_eq!(quarter.order_count, 2);
    }

    #[test]
    fn test_order_history_enriches_products() {
        let catalog = Catalog::demo();
        let ledger = OrderLedger::demo(LedgerSettings::default());
        let history =
            get_order_history(&catalog, &ledger, &UserId::new("U1"), TimeRange::All, DEMO_TODAY);

        let first = history.orders.first().expect("first order");
        assert_eq!(first.product_name, "棕色飛行員外套");
        assert_eq!(first.product_color, "棕色");

        let value = ToolResult::Success(ToolPayload::Orders(history)).to_json();
        assert_eq!(value["order_count"], 2);
        assert_eq!(value["orders"][0]["order_id"], "ORD-2026-0115");
        assert_eq!(value["orders"][0]["date"], "2026-01-15");
        assert_eq!(value["orders"][0]["status"], "已送達");
        assert_eq!(value["orders"][0]["product_name"], "棕色飛行員外套");
    }

    #[test]
    fn test_order_history_unknown_product_placeholder() {
        let catalog = Catalog::demo();
        let ledger = OrderLedger::new(
            vec![Order {
                order_id: OrderId::new("ORD-X"),
                date: DEMO_TODAY,
                product_id: ProductId::new("P404"),
                quantity: 1,
                total: Price::new(100),
                status: OrderStatus::Processing,
                shipping_addr: String::new(),
            }],
            LedgerSettings::default(),
        );

        let history =
            get_order_history(&catalog, &ledger, &UserId::new("U1"), TimeRange::All, DEMO_TODAY);
        let order = history.orders.first().expect("order");
        assert_eq!(order.product_name, UNKNOWN_PRODUCT_NAME);
        assert_eq!(order.product_color, "");
    }

    #[test]
    fn test_order_history_args_time_range() {
        let args: OrderHistoryArgs =
            serde_json::from_value(serde_json::json!({"time_range": "last_month"})).expect("args");
        assert_eq!(args.time_range(), TimeRange::LastMonth);

        let args: OrderHistoryArgs =
            serde_json::from_value(serde_json::json!({"time_range": "yesterday"})).expect("args");
        assert_eq!(args.time_range(), TimeRange::All);

        assert_eq!(OrderHistoryArgs::default().time_range(), TimeRange::All);
    }

    #[test]
    fn test_product_details_found() {
        let catalog = Catalog::demo();
        let result = get_product_details(&catalog, "P001");
        let ToolResult::Success(ToolPayload::Product(details)) = &result else {
            panic!("expected product details, got {result:?}");
        };
        assert_eq!(details.product.name, "棕色飛行員外套");
        assert_eq!(details.product.price, Price::new(1890));
        assert_eq!(result.to_json()["product"]["price"], 1890);
        assert_eq!(
            result.primary_product().map(ProductId::as_str),
            Some("P001")
        );
    }

    #[test]
    fn test_product_details_missing() {
        let catalog = Catalog::demo();
        let result = get_product_details(&catalog, "P999");
        let value = result.to_json();
        assert_eq!(value["status"], "error");
        assert_eq!(value["message"], "找不到商品 P999");
        assert!(value.get("product").is_none());
    }
}
