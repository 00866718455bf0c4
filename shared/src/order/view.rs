//! Full order view

use crate::models::{Asset, Client, ClientPaymentMethod, Offer, Order};
use serde::{Deserialize, Serialize};

/// Order joined with everything a counterparty needs to render it.
///
/// Order fields are flattened to the top level; related records are nested.
/// A related record that no longer resolves is `null`: the order row is the
/// source of truth and a broken join never hides it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub offer: Option<Offer>,
    pub buyer: Option<Client>,
    pub seller: Option<Client>,
    pub author: Option<Client>,
    pub offer_owner: Option<Client>,
    pub from_asset: Option<Asset>,
    pub to_asset: Option<Asset>,
    pub client_payment_method: Option<ClientPaymentMethod>,
}

impl OrderView {
    /// View carrying only the order row
    pub fn bare(order: Order) -> Self {
        Self {
            order,
            offer: None,
            buyer: None,
            seller: None,
            author: None,
            offer_owner: None,
            from_asset: None,
            to_asset: None,
            client_payment_method: None,
        }
    }

    /// Every reference the order carries resolved
    pub fn is_complete(&self) -> bool {
        self.offer.is_some()
            && self.buyer.is_some()
            && self.seller.is_some()
            && self.author.is_some()
            && self.offer_owner.is_some()
            && self.from_asset.is_some()
            && self.to_asset.is_some()
            && (self.order.client_payment_method_id.is_none()
                || self.client_payment_method.is_some())
    }
}
