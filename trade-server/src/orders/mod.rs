//! Order lifecycle
//!
//! - **actions**: declarative (status, role) → action table
//! - **service**: creation, reads, streams and compare-and-set transitions
//!
//! ```text
//! client action ──┐
//!                 ├─► OrderService::apply_transition ──► Storage (CAS)
//! ExpirySweeper ──┘            │
//!                              ├─► NotificationDispatcher
//!                              ├─► StatusBroadcaster
//!                              └─► EscrowLedger (terminal)
//! ```

pub mod actions;
pub mod service;

pub use actions::{ACTIONS, Role, Rule, authorize, permitted_actions};
pub use service::{OrderListQuery, OrderService, PartyFilter};
