//! Order rows, the open-order deadline index and the joined order view

use super::{
    ASSETS_TABLE, CLIENTS_TABLE, OFFERS_TABLE, OPEN_ORDERS_TABLE, ORDERS_TABLE,
    PAYMENT_METHODS_TABLE, Storage, StorageResult, decode,
};
use chrono::{DateTime, Utc};
use redb::{ReadTransaction, ReadableDatabase, ReadableTable};
use shared::models::{Order, OrderStatus, StatusChange};
use shared::order::OrderView;
use shared::util::millis_of;

/// Result of a compare-and-set status update
#[derive(Debug, Clone, PartialEq)]
pub enum CasOutcome {
    /// The row had the expected status and now holds the new one
    Applied(Order),
    /// The row exists but its status differs from the expected one
    Mismatch(OrderStatus),
    /// No such order
    Missing,
}

/// WAIT_PAYMENT and PAID orders carry a live deadline
fn tracks_deadline(status: OrderStatus) -> bool {
    matches!(status, OrderStatus::WaitPayment | OrderStatus::Paid)
}

impl Storage {
    /// Insert a new order and index its deadline
    pub fn insert_order(&self, order: &Order) -> StorageResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut orders = txn.open_table(ORDERS_TABLE)?;
            let value = serde_json::to_vec(order)?;
            orders.insert(order.id.as_str(), value.as_slice())?;

            if tracks_deadline(order.status) {
                let mut open = txn.open_table(OPEN_ORDERS_TABLE)?;
                open.insert((millis_of(order.expires_at), order.id.as_str()), ())?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_order(&self, order_id: &str) -> StorageResult<Option<Order>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;
        match table.get(order_id)? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Set the order's status to `change.to` only if it currently is `expected`.
    ///
    /// The read and the write happen in one write transaction; nothing is
    /// written unless the outcome is [`CasOutcome::Applied`].
    pub fn transition_order(
        &self,
        order_id: &str,
        expected: OrderStatus,
        change: &StatusChange,
    ) -> StorageResult<CasOutcome> {
        let txn = self.db.begin_write()?;
        let outcome = {
            let mut orders = txn.open_table(ORDERS_TABLE)?;
            let current: Option<Order> = match orders.get(order_id)? {
                Some(guard) => Some(decode(guard.value())?),
                None => None,
            };

            match current {
                None => CasOutcome::Missing,
                Some(order) if order.status != expected => CasOutcome::Mismatch(order.status),
                Some(mut order) => {
                    order.apply(change);
                    let value = serde_json::to_vec(&order)?;
                    orders.insert(order_id, value.as_slice())?;

                    if !tracks_deadline(order.status) {
                        let mut open = txn.open_table(OPEN_ORDERS_TABLE)?;
                        open.remove((millis_of(order.expires_at), order_id))?;
                    }
                    CasOutcome::Applied(order)
                }
            }
        };

        match &outcome {
            CasOutcome::Applied(_) => txn.commit()?,
            _ => txn.abort()?,
        }
        Ok(outcome)
    }

    /// Up to `limit` WAIT_PAYMENT / PAID orders whose deadline is at or before `now`,
    /// earliest deadline first
    pub fn find_expired_orders(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> StorageResult<Vec<Order>> {
        let read_txn = self.db.begin_read()?;
        let open = read_txn.open_table(OPEN_ORDERS_TABLE)?;
        let orders = read_txn.open_table(ORDERS_TABLE)?;
        let cutoff = millis_of(now);

        let mut due = Vec::new();
        for entry in open.iter()? {
            if due.len() >= limit {
                break;
            }
            let (key, _) = entry?;
            let (expires_ms, order_id) = key.value();
            if expires_ms > cutoff {
                break;
            }
            if let Some(guard) = orders.get(order_id)? {
                let order: Order = decode(guard.value())?;
                if tracks_deadline(order.status) && order.expires_at <= now {
                    due.push(order);
                }
            }
        }
        Ok(due)
    }

    /// Orders where the client is author or offer owner, newest first
    pub fn orders_for_client(&self, client_id: &str) -> StorageResult<Vec<Order>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;

        let mut orders = Vec::new();
        for entry in table.iter()? {
            let (_key, value) = entry?;
            let order: Order = decode(value.value())?;
            if order.is_party(client_id) {
                orders.push(order);
            }
        }
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    /// Load the order together with offer, parties, assets and payment method
    pub fn load_order_view(&self, order_id: &str) -> StorageResult<Option<OrderView>> {
        let read_txn = self.db.begin_read()?;
        let orders = read_txn.open_table(ORDERS_TABLE)?;
        let order: Order = match orders.get(order_id)? {
            Some(guard) => decode(guard.value())?,
            None => return Ok(None),
        };
        Ok(Some(join_view(&read_txn, order)?))
    }

    /// Join an order row already in hand, e.g. the one a transition committed
    pub fn join_order_view(&self, order: Order) -> StorageResult<OrderView> {
        let read_txn = self.db.begin_read()?;
        join_view(&read_txn, order)
    }
}

/// Resolve every reference of `order`; unresolved ones stay `None`
fn join_view(read_txn: &ReadTransaction, order: Order) -> StorageResult<OrderView> {
    let offers = read_txn.open_table(OFFERS_TABLE)?;
    let clients = read_txn.open_table(CLIENTS_TABLE)?;
    let assets = read_txn.open_table(ASSETS_TABLE)?;
    let methods = read_txn.open_table(PAYMENT_METHODS_TABLE)?;

    let client_payment_method = match order.client_payment_method_id.as_deref() {
        Some(id) => lookup(&methods, "payment method", &order.id, id)?,
        None => None,
    };

    Ok(OrderView {
        offer: lookup(&offers, "offer", &order.id, &order.offer_id)?,
        buyer: lookup(&clients, "client", &order.id, &order.buyer_id)?,
        seller: lookup(&clients, "client", &order.id, &order.seller_id)?,
        author: lookup(&clients, "client", &order.id, &order.author_id)?,
        offer_owner: lookup(&clients, "client", &order.id, &order.offer_owner_id)?,
        from_asset: lookup(&assets, "asset", &order.id, &order.from_asset_id)?,
        to_asset: lookup(&assets, "asset", &order.id, &order.to_asset_id)?,
        client_payment_method,
        order,
    })
}

/// Fetch a row the order points at; a dangling reference is logged and skipped
fn lookup<T: serde::de::DeserializeOwned>(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
    kind: &'static str,
    order_id: &str,
    id: &str,
) -> StorageResult<Option<T>> {
    match table.get(id)? {
        Some(guard) => Ok(Some(decode(guard.value())?)),
        None => {
            tracing::warn!(order_id = %order_id, kind, id = %id, "Order references a missing row");
            Ok(None)
        }
    }
}
