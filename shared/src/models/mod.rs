//! Domain models
//!
//! Persistent entities of the trading platform plus the request payloads
//! that create or modify them.

pub mod chat;
pub mod notification;
pub mod offer;
pub mod order;
pub mod reference;

pub use chat::{ChatMessage, MessageCreate, MessageType, OrderChat};
pub use notification::Notification;
pub use offer::{Offer, OfferCreate, OfferEvent, OfferFilter, OfferKind, OwnOffersQuery};
pub use order::{DisputeResolve, Order, OrderAction, OrderCreate, OrderStatus, StatusChange};
pub use reference::{Asset, AssetKind, Client, ClientPaymentMethod, Country, PaymentMethod};
