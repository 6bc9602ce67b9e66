//! Order aggregate as it travels on the wire, in the cache and in the store.
//!
//! The JSON form uses the snake_case field names below. Optional numeric fields stay
//! `Option` so that "absent" and "zero" remain distinguishable for validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Root aggregate of a purchase event.
///
/// `delivery` and `payment` decode as optional: a message without them is still an
/// `Order`, it just fails validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Order {
    pub order_uid: String,
    pub track_number: String,
    pub entry: String,
    pub locale: String,
    pub internal_signature: String,
    pub customer_id: String,
    pub delivery_service: String,
    pub shardkey: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sm_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_created: Option<DateTime<Utc>>,
    pub oof_shard: String,
    /// Assigned by the durable store; ignored on insert.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery: Option<Delivery>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<Payment>,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Delivery {
    pub name: String,
    pub phone: String,
    pub zip: String,
    pub city: String,
    pub address: String,
    pub region: String,
    pub email: String,
}

/// Monetary amounts are in minor units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Payment {
    pub transaction_id: String,
    pub request_id: String,
    pub currency: String,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    /// Epoch seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_dt: Option<i64>,
    pub bank: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_cost: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goods_total: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_fee: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Item {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chrt_id: Option<i64>,
    pub track_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,
    pub rid: String,
    pub name: String,
    /// Discount percentage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sale: Option<i32>,
    pub size: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_price: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nm_id: Option<i64>,
    pub brand: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<i32>,
}

impl Order {
    /// Decode an order from its JSON wire form.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Encode the order into its JSON wire form.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Sum of `total_price` over all items; absent totals count as zero.
    pub fn items_total(&self) -> i64 {
        self.items
            .iter()
            .filter_map(|item| item.total_price)
            .fold(0i64, i64::saturating_add)
    }
}
