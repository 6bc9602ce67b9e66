use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use orderflow_core::{Delivery, Item, Order, Payment};

use super::r#trait::{DurableStore, StoreError};
use crate::health::{PingError, Pingable};

/// One order split the way the relational schema splits it.
#[derive(Debug, Clone)]
struct OrderRecord {
    header: Order,
    delivery: Option<Delivery>,
    payment: Option<Payment>,
    items: Vec<Item>,
    created_at: DateTime<Utc>,
    /// Insertion sequence; breaks `created_at` ties.
    seq: u64,
}

impl OrderRecord {
    fn to_order(&self) -> Order {
        Order {
            created_at: Some(self.created_at),
            delivery: self.delivery.clone(),
            payment: self.payment.clone(),
            items: self.items.clone(),
            ..self.header.clone()
        }
    }
}

#[derive(Debug, Default)]
struct State {
    orders: HashMap<String, OrderRecord>,
    next_seq: u64,
}

/// In-memory durable store.
///
/// Intended for tests/dev. Mirrors the insert-if-absent behaviour of the Postgres store
/// part by part, including per-`rid` item deduplication.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    state: RwLock<State>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.orders.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl DurableStore for InMemoryOrderStore {
    async fn upsert(&self, order: &Order) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;
        let seq = state.next_seq;

        let record = state
            .orders
            .entry(order.order_uid.clone())
            .or_insert_with(|| OrderRecord {
                header: Order {
                    delivery: None,
                    payment: None,
                    items: Vec::new(),
                    created_at: None,
                    ..order.clone()
                },
                delivery: None,
                payment: None,
                items: Vec::new(),
                created_at: Utc::now(),
                seq,
            });

        if record.delivery.is_none() {
            record.delivery = order.delivery.clone();
        }
        if record.payment.is_none() {
            record.payment = order.payment.clone();
        }
        for item in &order.items {
            if !record.items.iter().any(|existing| existing.rid == item.rid) {
                record.items.push(item.clone());
            }
        }

        if record.seq == seq {
            state.next_seq += 1;
        }
        Ok(())
    }

    async fn get_by_id(&self, order_uid: &str) -> Result<Option<Order>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.orders.get(order_uid).map(OrderRecord::to_order))
    }

    async fn get_recent(&self, limit: usize) -> Result<Vec<Order>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;

        let mut records: Vec<&OrderRecord> = state.orders.values().collect();
        records.sort_by(|a, b| (b.created_at, b.seq).cmp(&(a.created_at, a.seq)));

        Ok(records
            .into_iter()
            .take(limit)
            .map(OrderRecord::to_order)
            .collect())
    }
}

#[async_trait]
impl Pingable for InMemoryOrderStore {
    async fn ping(&self) -> Result<(), PingError> {
        self.state
            .read()
            .map(|_| ())
            .map_err(|_| PingError::new("store", "lock poisoned"))
    }
}
