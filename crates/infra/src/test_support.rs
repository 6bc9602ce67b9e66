//! Shared fixtures for unit tests.

use orderflow_core::{Delivery, Item, Order, Payment};

/// An order that passes validation: two items, amount = goods + delivery.
pub(crate) fn valid_order(order_uid: &str) -> Order {
    Order {
        order_uid: order_uid.to_string(),
        track_number: format!("TRACK-{order_uid}"),
        entry: "WEB".to_string(),
        locale: "en".to_string(),
        customer_id: "cust-1".to_string(),
        delivery_service: "meest".to_string(),
        shardkey: "1".to_string(),
        sm_id: Some(10),
        oof_shard: "1".to_string(),
        delivery: Some(Delivery {
            name: "Ivan Ivanov".to_string(),
            phone: "+7 (915) 123-45-67".to_string(),
            zip: "101000".to_string(),
            city: "Moscow".to_string(),
            address: "Tverskaya 7".to_string(),
            region: "Moscow".to_string(),
            email: "ivan@example.ru".to_string(),
        }),
        payment: Some(Payment {
            transaction_id: format!("tx-{order_uid}"),
            currency: "RUB".to_string(),
            provider: "wbpay".to_string(),
            amount: Some(2500),
            payment_dt: Some(1_637_907_727),
            bank: "alpha".to_string(),
            delivery_cost: Some(500),
            goods_total: Some(2000),
            custom_fee: Some(0),
            ..Payment::default()
        }),
        items: vec![
            Item {
                chrt_id: Some(111_111),
                rid: format!("rid-{order_uid}-a"),
                name: "Coffee machine".to_string(),
                price: Some(1200),
                total_price: Some(1200),
                sale: Some(0),
                status: Some(200),
                ..Item::default()
            },
            Item {
                chrt_id: Some(111_112),
                rid: format!("rid-{order_uid}-b"),
                name: "Coffee beans".to_string(),
                price: Some(1000),
                total_price: Some(800),
                sale: Some(20),
                status: Some(200),
                ..Item::default()
            },
        ],
        ..Order::default()
    }
}
