//! Order action table
//!
//! One row per action: the status it starts from, who may take it and where
//! it can lead. Authorization of a transition and the affordances returned
//! by `GetActions` are both read from [`ACTIONS`], so they cannot drift.
//!
//! | Action | From | Roles | To |
//! |--------|------|-------|----|
//! | markPaid | WAIT_PAYMENT | author | PAID |
//! | cancel | WAIT_PAYMENT | author, offer owner | CANCELLED |
//! | dispute | PAID | author, offer owner | DISPUTE |
//! | release | PAID | offer owner | RELEASED |
//! | resolve | DISPUTE | arbiter | RELEASED, CANCELLED |

use crate::utils::{TradeError, TradeResult};
use serde::{Deserialize, Serialize};
use shared::models::{Order, OrderAction, OrderStatus};
use std::collections::HashSet;

/// The caller's relation to one order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Author,
    OfferOwner,
    Arbiter,
    Outsider,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Author, Role::OfferOwner, Role::Arbiter, Role::Outsider];

    /// Party roles win over arbiter membership: nobody judges their own trade.
    pub fn of(order: &Order, client_id: &str, arbiters: &HashSet<String>) -> Role {
        if order.author_id == client_id {
            Role::Author
        } else if order.offer_owner_id == client_id {
            Role::OfferOwner
        } else if arbiters.contains(client_id) {
            Role::Arbiter
        } else {
            Role::Outsider
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub action: OrderAction,
    pub from: OrderStatus,
    pub roles: &'static [Role],
    pub to: &'static [OrderStatus],
}

pub static ACTIONS: [Rule; 5] = [
    Rule {
        action: OrderAction::MarkPaid,
        from: OrderStatus::WaitPayment,
        roles: &[Role::Author],
        to: &[OrderStatus::Paid],
    },
    Rule {
        action: OrderAction::Cancel,
        from: OrderStatus::WaitPayment,
        roles: &[Role::Author, Role::OfferOwner],
        to: &[OrderStatus::Cancelled],
    },
    Rule {
        action: OrderAction::Dispute,
        from: OrderStatus::Paid,
        roles: &[Role::Author, Role::OfferOwner],
        to: &[OrderStatus::Dispute],
    },
    Rule {
        action: OrderAction::Release,
        from: OrderStatus::Paid,
        roles: &[Role::OfferOwner],
        to: &[OrderStatus::Released],
    },
    Rule {
        action: OrderAction::Resolve,
        from: OrderStatus::Dispute,
        roles: &[Role::Arbiter],
        to: &[OrderStatus::Released, OrderStatus::Cancelled],
    },
];

pub fn rule(action: OrderAction) -> &'static Rule {
    match action {
        OrderAction::MarkPaid => &ACTIONS[0],
        OrderAction::Cancel => &ACTIONS[1],
        OrderAction::Dispute => &ACTIONS[2],
        OrderAction::Release => &ACTIONS[3],
        OrderAction::Resolve => &ACTIONS[4],
    }
}

/// Actions `role` may take on an order in `status`, in table order
pub fn permitted_actions(status: OrderStatus, role: Role) -> Vec<OrderAction> {
    ACTIONS
        .iter()
        .filter(|r| r.from == status && r.roles.contains(&role))
        .map(|r| r.action)
        .collect()
}

/// Check an action against the table.
///
/// Outsiders are refused before the status is looked at, then the status
/// precondition is checked, then the role.
pub fn authorize(action: OrderAction, status: OrderStatus, role: Role) -> TradeResult<()> {
    if role == Role::Outsider {
        return Err(TradeError::not_a_party());
    }
    let rule = rule(action);
    if rule.from != status {
        return Err(TradeError::unexpected_status(status, rule.from));
    }
    if !rule.roles.contains(&role) {
        return Err(TradeError::Forbidden(format!(
            "{action} is not allowed for {}",
            role_name(role)
        )));
    }
    Ok(())
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::Author => "the order author",
        Role::OfferOwner => "the offer owner",
        Role::Arbiter => "an arbiter",
        Role::Outsider => "an outsider",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderAction::*;
    use OrderStatus::{Cancelled, Paid, WaitPayment};

    fn expected(status: OrderStatus, role: Role) -> Vec<OrderAction> {
        match (status, role) {
            (WaitPayment, Role::Author) => vec![MarkPaid, Cancel],
            (WaitPayment, Role::OfferOwner) => vec![Cancel],
            (Paid, Role::Author) => vec![Dispute],
            (Paid, Role::OfferOwner) => vec![Dispute, Release],
            (OrderStatus::Dispute, Role::Arbiter) => vec![Resolve],
            _ => vec![],
        }
    }

    #[test]
    fn test_every_status_role_pair() {
        for status in OrderStatus::ALL {
            for role in Role::ALL {
                assert_eq!(
                    permitted_actions(status, role),
                    expected(status, role),
                    "{status} / {role:?}"
                );
            }
        }
    }

    #[test]
    fn test_authorize_agrees_with_projection() {
        for status in OrderStatus::ALL {
            for role in Role::ALL {
                let allowed = permitted_actions(status, role);
                for r in &ACTIONS {
                    assert_eq!(
                        authorize(r.action, status, role).is_ok(),
                        allowed.contains(&r.action),
                        "{} at {status} by {role:?}",
                        r.action
                    );
                }
            }
        }
    }

    #[test]
    fn test_rule_targets_follow_status_graph() {
        for r in &ACTIONS {
            assert_eq!(rule(r.action).action, r.action);
            for to in r.to {
                assert!(r.from.can_transition_to(*to), "{} -> {to}", r.from);
            }
        }
    }

    #[test]
    fn test_error_precedence() {
        // outsider before status
        assert!(matches!(
            authorize(Release, Cancelled, Role::Outsider),
            Err(TradeError::Forbidden(_))
        ));
        // status before role
        assert!(matches!(
            authorize(Release, WaitPayment, Role::Author),
            Err(TradeError::InvalidState(_))
        ));
        assert!(matches!(
            authorize(Release, Paid, Role::Author),
            Err(TradeError::Forbidden(_))
        ));
        assert!(matches!(
            authorize(Resolve, OrderStatus::Dispute, Role::OfferOwner),
            Err(TradeError::Forbidden(_))
        ));
    }

    #[test]
    fn test_party_role_wins_over_arbiter() {
        let now = chrono::Utc::now();
        let order = crate::store::fixtures::order_fixture("o", now, now);
        let arbiters: HashSet<String> = ["alice".to_string(), "judge".to_string()].into();
        assert_eq!(Role::of(&order, "alice", &arbiters), Role::Author);
        assert_eq!(Role::of(&order, "bob", &arbiters), Role::OfferOwner);
        assert_eq!(Role::of(&order, "judge", &arbiters), Role::Arbiter);
        assert_eq!(Role::of(&order, "carol", &arbiters), Role::Outsider);
    }
}
