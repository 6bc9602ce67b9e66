//! Postgres-backed durable order store.
//!
//! Orders are split across four tables (`orders`, `deliveries`, `payments`, `items`, see
//! `sql/schema.sql`). Every insert uses `ON CONFLICT DO NOTHING` against the table's unique
//! key, so re-delivering an order is a no-op.
//!
//! ## Error Mapping
//!
//! | SQLx Error | StoreError | Scenario |
//! |------------|------------|----------|
//! | Database | `Database` | Constraint or query failure reported by Postgres |
//! | PoolClosed | `Database` | Connection pool was closed during shutdown |
//! | ColumnDecode / ColumnNotFound | `Corrupt` | Row does not match the expected schema |
//! | Other | `Database` | Network errors, timeouts, TLS failures |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{Span, instrument};

use orderflow_core::{Delivery, Item, Order, Payment};

use super::r#trait::{DurableStore, StoreError};
use crate::health::{PingError, Pingable};

#[derive(Debug, Clone)]
pub struct PostgresOrderStore {
    pool: Arc<PgPool>,
}

impl PostgresOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    async fn load_parts(&self, header: &PgRow) -> Result<Order, StoreError> {
        let mut order = order_from_row(header).map_err(|e| map_sqlx_error("decode_order", e))?;

        let delivery = sqlx::query(
            r#"
            SELECT name, phone, zip, city, address, region, email
            FROM deliveries
            WHERE order_uid = $1
            "#,
        )
        .bind(&order.order_uid)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_delivery", e))?;
        order.delivery = delivery
            .as_ref()
            .map(delivery_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("decode_delivery", e))?;

        let payment = sqlx::query(
            r#"
            SELECT transaction_id, request_id, currency, provider, amount, payment_dt,
                   bank, delivery_cost, goods_total, custom_fee
            FROM payments
            WHERE order_uid = $1
            "#,
        )
        .bind(&order.order_uid)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_payment", e))?;
        order.payment = payment
            .as_ref()
            .map(payment_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("decode_payment", e))?;

        let items = sqlx::query(
            r#"
            SELECT chrt_id, track_number, price, rid, name, sale, size, total_price,
                   nm_id, brand, status
            FROM items
            WHERE order_uid = $1
            ORDER BY id ASC
            "#,
        )
        .bind(&order.order_uid)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_items", e))?;
        order.items = items
            .iter()
            .map(item_from_row)
            .collect::<Result<_, _>>()
            .map_err(|e| map_sqlx_error("decode_items", e))?;

        Ok(order)
    }
}

const SELECT_ORDER_HEADER: &str = r#"
    SELECT order_uid, track_number, entry, locale, internal_signature, customer_id,
           delivery_service, shardkey, sm_id, date_created, oof_shard, created_at
    FROM orders
"#;

#[async_trait]
impl DurableStore for PostgresOrderStore {
    /// Insert the order and its parts in one transaction.
    ///
    /// Dropping the future before commit rolls the transaction back.
    #[instrument(
        skip(self, order),
        fields(order_uid = %order.order_uid, item_count = order.items.len()),
        err
    )]
    async fn upsert(&self, order: &Order) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        insert_header(&mut tx, order).await?;
        if let Some(delivery) = &order.delivery {
            insert_delivery(&mut tx, &order.order_uid, delivery).await?;
        }
        if let Some(payment) = &order.payment {
            insert_payment(&mut tx, &order.order_uid, payment).await?;
        }
        for item in &order.items {
            insert_item(&mut tx, &order.order_uid, item).await?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(found = tracing::field::Empty), err)]
    async fn get_by_id(&self, order_uid: &str) -> Result<Option<Order>, StoreError> {
        let span = Span::current();

        let sql = format!("{SELECT_ORDER_HEADER} WHERE order_uid = $1");
        let row = sqlx::query(&sql)
            .bind(order_uid)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_by_id", e))?;

        match row {
            Some(row) => {
                span.record("found", true);
                Ok(Some(self.load_parts(&row).await?))
            }
            None => {
                span.record("found", false);
                Ok(None)
            }
        }
    }

    #[instrument(skip(self), err)]
    async fn get_recent(&self, limit: usize) -> Result<Vec<Order>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let sql = format!("{SELECT_ORDER_HEADER} ORDER BY created_at DESC LIMIT $1");
        let rows = sqlx::query(&sql)
            .bind(limit)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_recent", e))?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in &rows {
            orders.push(self.load_parts(row).await?);
        }
        Ok(orders)
    }
}

#[async_trait]
impl Pingable for PostgresOrderStore {
    async fn ping(&self) -> Result<(), PingError> {
        sqlx::query("SELECT 1")
            .execute(&*self.pool)
            .await
            .map(|_| ())
            .map_err(|e| PingError::new("postgres", e.to_string()))
    }
}

async fn insert_header(
    tx: &mut Transaction<'_, Postgres>,
    order: &Order,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO orders (
            order_uid, track_number, entry, locale, internal_signature, customer_id,
            delivery_service, shardkey, sm_id, date_created, oof_shard
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (order_uid) DO NOTHING
        "#,
    )
    .bind(&order.order_uid)
    .bind(&order.track_number)
    .bind(&order.entry)
    .bind(&order.locale)
    .bind(&order.internal_signature)
    .bind(&order.customer_id)
    .bind(&order.delivery_service)
    .bind(&order.shardkey)
    .bind(order.sm_id)
    .bind(order.date_created)
    .bind(&order.oof_shard)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_order", e))?;
    Ok(())
}

async fn insert_delivery(
    tx: &mut Transaction<'_, Postgres>,
    order_uid: &str,
    delivery: &Delivery,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO deliveries (order_uid, name, phone, zip, city, address, region, email)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (order_uid) DO NOTHING
        "#,
    )
    .bind(order_uid)
    .bind(&delivery.name)
    .bind(&delivery.phone)
    .bind(&delivery.zip)
    .bind(&delivery.city)
    .bind(&delivery.address)
    .bind(&delivery.region)
    .bind(&delivery.email)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_delivery", e))?;
    Ok(())
}

async fn insert_payment(
    tx: &mut Transaction<'_, Postgres>,
    order_uid: &str,
    payment: &Payment,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO payments (
            order_uid, transaction_id, request_id, currency, provider, amount,
            payment_dt, bank, delivery_cost, goods_total, custom_fee
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (order_uid) DO NOTHING
        "#,
    )
    .bind(order_uid)
    .bind(&payment.transaction_id)
    .bind(&payment.request_id)
    .bind(&payment.currency)
    .bind(&payment.provider)
    .bind(payment.amount)
    .bind(payment.payment_dt)
    .bind(&payment.bank)
    .bind(payment.delivery_cost)
    .bind(payment.goods_total)
    .bind(payment.custom_fee)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_payment", e))?;
    Ok(())
}

async fn insert_item(
    tx: &mut Transaction<'_, Postgres>,
    order_uid: &str,
    item: &Item,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO items (
            order_uid, chrt_id, track_number, price, rid, name, sale, size,
            total_price, nm_id, brand, status
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ON CONFLICT (order_uid, rid) DO NOTHING
        "#,
    )
    .bind(order_uid)
    .bind(item.chrt_id)
    .bind(&item.track_number)
    .bind(item.price)
    .bind(&item.rid)
    .bind(&item.name)
    .bind(item.sale)
    .bind(&item.size)
    .bind(item.total_price)
    .bind(item.nm_id)
    .bind(&item.brand)
    .bind(item.status)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_item", e))?;
    Ok(())
}

fn order_from_row(row: &PgRow) -> Result<Order, sqlx::Error> {
    Ok(Order {
        order_uid: row.try_get("order_uid")?,
        track_number: row.try_get("track_number")?,
        entry: row.try_get("entry")?,
        locale: row.try_get("locale")?,
        internal_signature: row.try_get("internal_signature")?,
        customer_id: row.try_get("customer_id")?,
        delivery_service: row.try_get("delivery_service")?,
        shardkey: row.try_get("shardkey")?,
        sm_id: row.try_get("sm_id")?,
        date_created: row.try_get::<Option<DateTime<Utc>>, _>("date_created")?,
        oof_shard: row.try_get("oof_shard")?,
        created_at: row.try_get::<Option<DateTime<Utc>>, _>("created_at")?,
        delivery: None,
        payment: None,
        items: Vec::new(),
    })
}

fn delivery_from_row(row: &PgRow) -> Result<Delivery, sqlx::Error> {
    Ok(Delivery {
        name: row.try_get("name")?,
        phone: row.try_get("phone")?,
        zip: row.try_get("zip")?,
        city: row.try_get("city")?,
        address: row.try_get("address")?,
        region: row.try_get("region")?,
        email: row.try_get("email")?,
    })
}

fn payment_from_row(row: &PgRow) -> Result<Payment, sqlx::Error> {
    Ok(Payment {
        transaction_id: row.try_get("transaction_id")?,
        request_id: row.try_get("request_id")?,
        currency: row.try_get("currency")?,
        provider: row.try_get("provider")?,
        amount: row.try_get("amount")?,
        payment_dt: row.try_get("payment_dt")?,
        bank: row.try_get("bank")?,
        delivery_cost: row.try_get("delivery_cost")?,
        goods_total: row.try_get("goods_total")?,
        custom_fee: row.try_get("custom_fee")?,
    })
}

fn item_from_row(row: &PgRow) -> Result<Item, sqlx::Error> {
    Ok(Item {
        chrt_id: row.try_get("chrt_id")?,
        track_number: row.try_get("track_number")?,
        price: row.try_get("price")?,
        rid: row.try_get("rid")?,
        name: row.try_get("name")?,
        sale: row.try_get("sale")?,
        size: row.try_get("size")?,
        total_price: row.try_get("total_price")?,
        nm_id: row.try_get("nm_id")?,
        brand: row.try_get("brand")?,
        status: row.try_get("status")?,
    })
}

fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => StoreError::Database {
            operation,
            message: match db_err.code() {
                Some(code) => format!("{} (sqlstate {code})", db_err.message()),
                None => db_err.message().to_string(),
            },
        },
        sqlx::Error::PoolClosed => StoreError::Database {
            operation,
            message: "connection pool closed".to_string(),
        },
        decode @ (sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_)) => {
            StoreError::Corrupt(format!("{operation}: {decode}"))
        }
        other => StoreError::Database {
            operation,
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_closed_maps_to_database_error() {
        let err = map_sqlx_error("get_by_id", sqlx::Error::PoolClosed);
        assert!(matches!(
            err,
            StoreError::Database { operation: "get_by_id", .. }
        ));
    }

    #[test]
    fn missing_column_maps_to_corrupt() {
        let err = map_sqlx_error(
            "decode_order",
            sqlx::Error::ColumnNotFound("track_number".to_string()),
        );
        assert!(matches!(err, StoreError::Corrupt(msg) if msg.contains("track_number")));
    }
}
