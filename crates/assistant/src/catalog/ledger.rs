//! Per-user order ledger.
//!
//! Each user gets an independent deep copy of the order template on first
//! access. Entries are bounded by capacity and idle time; an evicted user is
//! simply re-seeded with the same template next time.

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use tracing::debug;

use shop_concierge_core::UserId;

use super::Order;

/// Eviction limits for the ledger.
#[derive(Debug, Clone, Copy)]
pub struct LedgerSettings {
    /// Maximum number of users tracked at once.
    pub max_users: u64,
    /// Drop a user's ledger after this long without access.
    pub idle_timeout: Duration,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            max_users: 10_000,
            idle_timeout: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Mapping of user ID to that user's orders.
///
/// Cheap to clone; clones share the same underlying cache.
#[derive(Clone)]
pub struct OrderLedger {
    template: Arc<Vec<Order>>,
    orders: Cache<UserId, Arc<Vec<Order>>>,
}

impl std::fmt::Debug for OrderLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderLedger")
            .field("template_len", &self.template.len())
            .field("users", &self.orders.entry_count())
            .finish()
    }
}

impl OrderLedger {
    /// Create a ledger that seeds new users from `template`.
    #[must_use]
    pub fn new(template: Vec<Order>, settings: LedgerSettings) -> Self {
        let orders = Cache::builder()
            .max_capacity(settings.max_users)
            .time_to_idle(settings.idle_timeout)
            .build();

        Self {
            template: Arc::new(template),
            orders,
        }
    }

    /// Ledger seeded from the demo order template.
    #[must_use]
    pub fn demo(settings: LedgerSettings) -> Self {
        Self::new(super::demo_order_template(), settings)
    }

    /// Orders for `user_id`, seeding them from the template on first access.
    #[must_use]
    pub fn orders(&self, user_id: &UserId) -> Arc<Vec<Order>> {
        self.orders.get_with_by_ref(user_id, || {
            debug!(user_id = %user_id, "Seeding demo orders for user");
            Arc::new(self.template.as_ref().clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_access_seeds_template() {
        let ledger = OrderLedger::demo(LedgerSettings::default());
        let orders = ledger.orders(&UserId::new("U1"));
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].order_id.as_str(), "ORD-2026-0115");
        assert_eq!(orders[1].order_id.as_str(), "ORD-2026-0108");
    }

    #[test]
    fn test_repeat_access_returns_same_ledger() {
        let ledger = OrderLedger::demo(LedgerSettings::default());
        let user = UserId::new("U1");
        let first = ledger.orders(&user);
        let second = ledger.orders(&user);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_users_do_not_share_state() {
        let ledger = OrderLedger::demo(LedgerSettings::default());
        let a = ledger.orders(&UserId::new("U-a"));
        let b = ledger.orders(&UserId::new("U-b"));
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(a.as_ref(), b.as_ref());
    }
}
