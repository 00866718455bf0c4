//! Order views and stream events
//!
//! - [`OrderView`]: the denormalized order snapshot pushed to subscribers
//! - [`OrderStreamEvent`]: wire-stable events on the status and creation streams

pub mod event;
pub mod view;

pub use event::{OrderStreamEvent, ORDER_CREATED, ORDER_STATUS_CHANGED};
pub use view::OrderView;
