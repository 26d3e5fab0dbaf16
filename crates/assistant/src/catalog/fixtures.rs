//! Demo catalog and order template.

use chrono::NaiveDate;

use shop_concierge_core::{OrderId, OrderStatus, Price, ProductId};

use super::{ImageSource, Order, Product};

/// Evaluate a calendar date at compile time.
const fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    match NaiveDate::from_ymd_opt(year, month, day) {
        Some(date) => date,
        None => panic!("invalid fixture date"),
    }
}

/// Reference "today" for order history windows in the demo store.
pub const DEMO_TODAY: NaiveDate = ymd(2026, 2, 22);

const DEMO_SHIPPING_ADDR: &str = "台北市信義區信義路五段7號";

/// Products in the demo store, in display order.
#[must_use]
pub fn demo_products() -> Vec<Product> {
    vec![
        product(
            "P001",
            "棕色飛行員外套",
            "棕色",
            "外套",
            1890,
            12,
            "仿麂皮面料，羅紋袖口與下擺，經典飛行員版型",
            [120, 72, 40],
        ),
        product(
            "P002",
            "白色寬鬆連帽T恤",
            "白色",
            "上衣",
            690,
            20,
            "棉質混紡，寬鬆版型，帽子可拆卸",
            [200, 200, 200],
        ),
        product(
            "P003",
            "深藍色直筒牛仔褲",
            "深藍色",
            "下著",
            1290,
            8,
            "彈性牛仔布料，直筒版型，適合各種場合",
            [26, 51, 102],
        ),
        product(
            "P004",
            "粉紅色格紋洋裝",
            "粉紅色",
            "洋裝",
            1590,
            5,
            "浪漫格紋設計，A 字裙擺，優雅氣質",
            [220, 150, 170],
        ),
        product(
            "P005",
            "淺藍色牛津襯衫",
            "淺藍色",
            "上衣",
            990,
            10,
            "牛津布料，挺而不硬，正式休閒兩相宜",
            [150, 190, 225],
        ),
    ]
}

/// Orders every user starts with.
#[must_use]
pub fn demo_order_template() -> Vec<Order> {
    vec![
        Order {
            order_id: OrderId::new("ORD-2026-0115"),
            date: ymd(2026, 1, 15),
            product_id: ProductId::new("P001"),
            quantity: 1,
            total: Price::new(1890),
            status: OrderStatus::Delivered,
            shipping_addr: DEMO_SHIPPING_ADDR.to_string(),
        },
        Order {
            order_id: OrderId::new("ORD-2026-0108"),
            date: ymd(2026, 1, 8),
            product_id: ProductId::new("P003"),
            quantity: 1,
            total: Price::new(1290),
            status: OrderStatus::Delivered,
            shipping_addr: DEMO_SHIPPING_ADDR.to_string(),
        },
    ]
}

#[allow(clippy::too_many_arguments)]
fn product(
    id: &str,
    name: &str,
    color: &str,
    category: &str,
    price: i64,
    stock: u32,
    description: &str,
    background: [u8; 3],
) -> Product {
    Product {
        id: ProductId::new(id),
        name: name.to_string(),
        color: color.to_string(),
        category: category.to_string(),
        price: Price::new(price),
        stock,
        description: description.to_string(),
        image: ImageSource::Swatch(background),
    }
}
