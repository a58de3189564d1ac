use serde::{Deserialize, Serialize};

/// Lifecycle states of a marketplace order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Completed,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Refunded => "REFUNDED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(OrderStatus::Pending),
            "COMPLETED" => Some(OrderStatus::Completed),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            "REFUNDED" => Some(OrderStatus::Refunded),
            _ => None,
        }
    }
}

/// Kind of product a line item refers to. Only digital products are
/// downloadable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductKind {
    Digital,
    Physical,
}

impl ProductKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductKind::Digital => "DIGITAL",
            ProductKind::Physical => "PHYSICAL",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "DIGITAL" => Some(ProductKind::Digital),
            "PHYSICAL" => Some(ProductKind::Physical),
            _ => None,
        }
    }
}

/// A product as listed by a merchant.
#[derive(Debug, Clone)]
pub struct Product {
    /// Unique identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Digital products are downloadable, physical ones are shipped
    pub kind: ProductKind,
    /// Where the artifact can be fetched from; opaque to this service
    pub resource_locator: Option<String>,
    /// Downloads permitted per purchase, None = unlimited
    pub download_limit: Option<u32>,
    /// Days a grant stays downloadable after issuance, None = no expiry
    pub access_window_days: Option<u32>,
}

/// A purchase order placed by a buyer.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: String,
    pub buyer_id: String,
    pub status: OrderStatus,
    /// When the order was placed (Unix timestamp)
    pub created_at: i64,
}

/// A single purchased item within an order.
#[derive(Debug, Clone)]
pub struct LineItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
}
