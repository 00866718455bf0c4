//! OrderService - 订单生命周期
//!
//! # Transition Flow
//!
//! ```text
//! act(client, order, action)
//!     ├─ 1. Load order                 (NotFound)
//!     ├─ 2. Resolve role               (Outsider → Forbidden)
//!     ├─ 3. Check action table         (InvalidState / Forbidden)
//!     └─ 4. apply_transition(expected = loaded status)
//!             ├─ lock order stripe
//!             ├─ compare-and-set in one write txn   (Conflict on mismatch)
//!             ├─ persist + push notifications   (failures logged)
//!             ├─ publish status event           (join failure → bare order)
//!             ├─ unlock
//!             └─ escrow settlement hook (terminal states)
//! ```
//!
//! The sweeper enters at step 4 with its own expected status, so explicit
//! actions and expiry share one compare-and-set and one fan-out path.

use super::actions::{self, Role};
use crate::broadcast::{CreationBroadcaster, StatusBroadcaster, Subscription};
use crate::escrow::{self, EscrowLedger};
use crate::notify::NotificationDispatcher;
use crate::store::{CasOutcome, Storage};
use crate::utils::{Clock, TradeError, TradeResult};
use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, MutexGuard};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::models::{
    DisputeResolve, OfferKind, Order, OrderAction, OrderCreate, OrderStatus, StatusChange,
};
use shared::order::{OrderStreamEvent, OrderView};
use std::collections::HashSet;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Lock stripes for per-order event ordering
const LOCK_STRIPES: usize = 64;

const DEFAULT_LIST_LIMIT: usize = 50;
const MAX_LIST_LIMIT: usize = 100;

/// Striped per-order locks.
///
/// Held from the compare-and-set until the status event is queued, so
/// subscribers see events in the order the transitions committed.
struct OrderLocks {
    stripes: Vec<Mutex<()>>,
}

impl OrderLocks {
    fn new(count: usize) -> Self {
        Self {
            stripes: (0..count.max(1)).map(|_| Mutex::new(())).collect(),
        }
    }

    fn lock(&self, order_id: &str) -> MutexGuard<'_, ()> {
        let mut hasher = DefaultHasher::new();
        order_id.hash(&mut hasher);
        let idx = (hasher.finish() as usize) % self.stripes.len();
        self.stripes[idx].lock()
    }
}

/// Which side of the trade to list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PartyFilter {
    Author,
    OfferOwner,
    #[default]
    Any,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderListQuery {
    #[serde(default)]
    pub role: PartyFilter,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

pub struct OrderService {
    storage: Storage,
    clock: Arc<dyn Clock>,
    notifier: Arc<NotificationDispatcher>,
    status: StatusBroadcaster,
    created: CreationBroadcaster,
    ledger: Arc<dyn EscrowLedger>,
    arbiters: HashSet<String>,
    locks: OrderLocks,
}

impl std::fmt::Debug for OrderService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderService")
            .field("arbiters", &self.arbiters)
            .field("status_subscribers", &self.status.total_subscribers())
            .field("creation_subscribers", &self.created.total_subscribers())
            .finish()
    }
}

impl OrderService {
    pub fn new(
        storage: Storage,
        clock: Arc<dyn Clock>,
        notifier: Arc<NotificationDispatcher>,
        ledger: Arc<dyn EscrowLedger>,
        arbiters: HashSet<String>,
    ) -> Self {
        Self {
            storage,
            clock,
            notifier,
            status: StatusBroadcaster::new(),
            created: CreationBroadcaster::new(),
            ledger,
            arbiters,
            locks: OrderLocks::new(LOCK_STRIPES),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn role_of(&self, order: &Order, client_id: &str) -> Role {
        Role::of(order, client_id, &self.arbiters)
    }

    fn load(&self, order_id: &str) -> TradeResult<Order> {
        self.storage
            .get_order(order_id)?
            .ok_or_else(|| TradeError::order_not_found(order_id))
    }

    fn load_view(&self, order_id: &str) -> TradeResult<OrderView> {
        self.storage
            .load_order_view(order_id)?
            .ok_or_else(|| TradeError::order_not_found(order_id))
    }

    // ========== Creation ==========

    pub async fn create_order(
        &self,
        client_id: &str,
        request: OrderCreate,
    ) -> TradeResult<OrderView> {
        let now = self.clock.now();
        let offer = self
            .storage
            .get_offer(&request.offer_id)?
            .ok_or_else(|| TradeError::NotFound(format!("Offer {}", request.offer_id)))?;

        if !offer.is_listed(now) {
            return Err(TradeError::InvalidState("offer is not available".into()));
        }
        if offer.owner_id == client_id {
            return Err(TradeError::Forbidden(
                "cannot trade against your own offer".into(),
            ));
        }
        if request.amount <= Decimal::ZERO {
            return Err(TradeError::Validation("amount must be positive".into()));
        }
        if !offer.accepts_amount(request.amount) {
            return Err(TradeError::Validation(format!(
                "amount must be between {} and {}",
                offer.min_amount, offer.max_amount
            )));
        }
        if let Some(method_id) = request.client_payment_method_id.as_deref() {
            let method = self
                .storage
                .get_payment_method(method_id)?
                .ok_or_else(|| TradeError::Validation(format!("unknown payment method {method_id}")))?;
            if method.client_id != client_id && method.client_id != offer.owner_id {
                return Err(TradeError::Validation(
                    "payment method belongs to neither party".into(),
                ));
            }
        }

        let from_asset = self
            .storage
            .get_asset(&offer.from_asset_id)?
            .ok_or_else(|| TradeError::NotFound(format!("Asset {}", offer.from_asset_id)))?;
        let to_asset = self
            .storage
            .get_asset(&offer.to_asset_id)?
            .ok_or_else(|| TradeError::NotFound(format!("Asset {}", offer.to_asset_id)))?;

        let expires_at = Duration::try_minutes(offer.order_expiration_timeout)
            .and_then(|timeout| now.checked_add_signed(timeout))
            .ok_or_else(|| {
                TradeError::Validation(format!(
                    "offer order expiration timeout out of range: {} minutes",
                    offer.order_expiration_timeout
                ))
            })?;

        // sell offer: owner sells, author buys
        let (buyer_id, seller_id) = match offer.kind {
            OfferKind::Sell => (client_id.to_string(), offer.owner_id.clone()),
            OfferKind::Buy => (offer.owner_id.clone(), client_id.to_string()),
        };

        let order = Order {
            id: shared::util::new_id(),
            offer_id: offer.id.clone(),
            buyer_id,
            seller_id,
            author_id: client_id.to_string(),
            offer_owner_id: offer.owner_id.clone(),
            from_asset_id: offer.from_asset_id.clone(),
            to_asset_id: offer.to_asset_id.clone(),
            amount: request.amount,
            price: offer.price,
            client_payment_method_id: request.client_payment_method_id,
            status: OrderStatus::WaitPayment,
            is_escrow: from_asset.needs_escrow() || to_asset.needs_escrow(),
            expires_at,
            paid_at: None,
            released_at: None,
            dispute_opened_at: None,
            dispute_reason: None,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        };
        self.storage.insert_order(&order)?;
        tracing::info!(
            order_id = %order.id,
            offer_id = %order.offer_id,
            author = %order.author_id,
            owner = %order.offer_owner_id,
            escrow = order.is_escrow,
            expires_at = %order.expires_at,
            "Order created"
        );

        escrow::reserve(self.ledger.as_ref(), &order).await;

        if let Err(e) = self.notifier.order_created(&order) {
            tracing::error!(order_id = %order.id, error = %e, "Failed to persist creation notice");
        }
        let view = self.view_of(&order);
        let delivered = self.created.publish(&view);
        tracing::debug!(order_id = %order.id, delivered, "Creation event published");
        Ok(view)
    }

    // ========== Reads ==========

    /// Parties and arbiters only
    pub fn get_order(&self, client_id: &str, order_id: &str) -> TradeResult<OrderView> {
        let order = self.load(order_id)?;
        if self.role_of(&order, client_id) == Role::Outsider {
            return Err(TradeError::not_a_party());
        }
        self.load_view(order_id)
    }

    pub fn list_orders(&self, client_id: &str, query: &OrderListQuery) -> TradeResult<Vec<Order>> {
        let limit = query
            .limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT);
        let offset = query.offset.unwrap_or(0);

        Ok(self
            .storage
            .orders_for_client(client_id)?
            .into_iter()
            .filter(|o| match query.role {
                PartyFilter::Author => o.author_id == client_id,
                PartyFilter::OfferOwner => o.offer_owner_id == client_id,
                PartyFilter::Any => true,
            })
            .skip(offset)
            .take(limit)
            .collect())
    }

    /// What the caller may do next; side-effect free
    pub fn get_actions(&self, client_id: &str, order_id: &str) -> TradeResult<Vec<OrderAction>> {
        let order = self.load(order_id)?;
        match self.role_of(&order, client_id) {
            Role::Outsider => Err(TradeError::not_a_party()),
            role => Ok(actions::permitted_actions(order.status, role)),
        }
    }

    // ========== Streams ==========

    pub fn subscribe_status(
        &self,
        client_id: &str,
        order_id: &str,
    ) -> TradeResult<Subscription<Arc<OrderStreamEvent>>> {
        let order = self.load(order_id)?;
        let subscription = self.status.subscribe(&order, client_id)?;
        tracing::debug!(order_id = %order_id, client_id = %client_id, "Status subscriber joined");
        Ok(subscription)
    }

    pub fn subscribe_created(&self, client_id: &str) -> Subscription<Arc<OrderStreamEvent>> {
        self.created.subscribe(client_id)
    }

    pub fn status_subscribers(&self, order_id: &str) -> usize {
        self.status.subscriber_count(order_id)
    }

    pub fn total_stream_subscribers(&self) -> usize {
        self.status.total_subscribers() + self.created.total_subscribers()
    }

    // ========== Transitions ==========

    pub async fn mark_paid(
        &self,
        client_id: &str,
        order_id: &str,
        paid_at: Option<DateTime<Utc>>,
    ) -> TradeResult<OrderView> {
        let change = StatusChange::new(OrderStatus::Paid, self.clock.now()).with_paid_at(paid_at);
        self.act(client_id, order_id, OrderAction::MarkPaid, change)
            .await
    }

    pub async fn cancel(
        &self,
        client_id: &str,
        order_id: &str,
        reason: Option<String>,
    ) -> TradeResult<OrderView> {
        let change = StatusChange::new(OrderStatus::Cancelled, self.clock.now()).with_reason(reason);
        self.act(client_id, order_id, OrderAction::Cancel, change)
            .await
    }

    pub async fn open_dispute(
        &self,
        client_id: &str,
        order_id: &str,
        reason: Option<String>,
    ) -> TradeResult<OrderView> {
        let change = StatusChange::new(OrderStatus::Dispute, self.clock.now()).with_reason(reason);
        self.act(client_id, order_id, OrderAction::Dispute, change)
            .await
    }

    pub async fn release(&self, client_id: &str, order_id: &str) -> TradeResult<OrderView> {
        let change = StatusChange::new(OrderStatus::Released, self.clock.now());
        self.act(client_id, order_id, OrderAction::Release, change)
            .await
    }

    /// Arbiter decision; `result` must be RELEASED or CANCELLED
    pub async fn resolve_dispute(
        &self,
        client_id: &str,
        order_id: &str,
        resolution: DisputeResolve,
    ) -> TradeResult<OrderView> {
        if !actions::rule(OrderAction::Resolve)
            .to
            .contains(&resolution.result)
        {
            return Err(TradeError::Validation(format!(
                "dispute result must be RELEASED or CANCELLED, got {}",
                resolution.result
            )));
        }
        let mut change = StatusChange::new(resolution.result, self.clock.now());
        if resolution.result == OrderStatus::Cancelled {
            change = change.with_reason(resolution.comment);
        }
        self.act(client_id, order_id, OrderAction::Resolve, change)
            .await
    }

    async fn act(
        &self,
        client_id: &str,
        order_id: &str,
        action: OrderAction,
        change: StatusChange,
    ) -> TradeResult<OrderView> {
        let order = self.load(order_id)?;
        let role = self.role_of(&order, client_id);
        if let Err(e) = actions::authorize(action, order.status, role) {
            tracing::debug!(order_id = %order_id, client_id = %client_id, action = %action, error = %e, "Action refused");
            return Err(e);
        }
        self.apply_transition(order_id, order.status, change).await
    }

    /// Compare-and-set `order_id` from `expected` to `change.to`, then fan out.
    ///
    /// Exactly one caller wins for a given source status; every other caller
    /// gets [`TradeError::Conflict`] and triggers no notifications.
    pub async fn apply_transition(
        &self,
        order_id: &str,
        expected: OrderStatus,
        change: StatusChange,
    ) -> TradeResult<OrderView> {
        let (order, view) = {
            let _guard = self.locks.lock(order_id);
            let order = match self.storage.transition_order(order_id, expected, &change)? {
                CasOutcome::Applied(order) => order,
                CasOutcome::Mismatch(actual) => {
                    tracing::debug!(
                        order_id = %order_id,
                        expected = %expected,
                        actual = %actual,
                        "Transition lost the race"
                    );
                    return Err(TradeError::status_changed(order_id));
                }
                CasOutcome::Missing => return Err(TradeError::order_not_found(order_id)),
            };
            tracing::info!(
                order_id = %order_id,
                from = %expected,
                to = %order.status,
                reason = ?order.cancel_reason.as_deref().or(order.dispute_reason.as_deref()),
                "Order transitioned"
            );
            let view = self.fan_out(&order);
            (order, view)
        };

        escrow::settle(self.ledger.as_ref(), &order).await;
        Ok(view)
    }

    /// Notifications then status event; the transition is already committed,
    /// so nothing here can fail it.
    fn fan_out(&self, order: &Order) -> OrderView {
        if let Err(e) = self.notifier.order_status_changed(order) {
            tracing::error!(order_id = %order.id, error = %e, "Failed to persist status notices");
        }
        let view = self.view_of(order);
        self.status.publish(&view);
        view
    }

    /// Join a committed order for broadcast; a failed join degrades to the bare row
    fn view_of(&self, order: &Order) -> OrderView {
        match self.storage.join_order_view(order.clone()) {
            Ok(view) => view,
            Err(e) => {
                tracing::warn!(order_id = %order.id, error = %e, "Order view join failed, sending bare order");
                OrderView::bare(order.clone())
            }
        }
    }
}
