//! Reference data joined into order views
//!
//! CRUD for these lives outside the trade server; only the read shapes
//! are defined here.

use serde::{Deserialize, Serialize};

/// Trading client (user account)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Fiat,
    Crypto,
}

/// Tradable asset (currency or token)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    pub name: String,
    pub kind: AssetKind,
}

impl Asset {
    /// Non-fiat assets require escrow
    pub fn needs_escrow(&self) -> bool {
        self.kind != AssetKind::Fiat
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Country {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethod {
    pub id: String,
    pub name: String,
}

/// A client's saved payment method, denormalized with its country and method
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientPaymentMethod {
    pub id: String,
    pub client_id: String,
    pub name: String,
    pub details: Option<String>,
    pub country: Country,
    pub payment_method: PaymentMethod,
}
