//! Per-customer order request cooldown.
//!
//! A second order request from the same customer inside the cooldown
//! window is refused. The marker lives in the cache store under
//! `order_cooldown:{customer}` with the window as its TTL, so it is shared
//! across processes and cleans itself up.

use std::sync::Arc;
use std::time::Duration;

use bazaar_core::{CacheConfig, CustomerId};
use chrono::Utc;

use crate::cache::key::CacheKey;
use crate::cache::read_through;
use crate::cache::store::KeyValueStore;

pub struct OrderCooldown<S: ?Sized> {
    store: Arc<S>,
    window: Duration,
}

impl<S: KeyValueStore + ?Sized> OrderCooldown<S> {
    pub fn new(store: Arc<S>, config: &CacheConfig) -> Self {
        Self {
            store,
            window: config.order_cooldown,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Claim the cooldown slot. `false` means a request is already in flight
    /// or finished less than one window ago.
    ///
    /// Check-then-set: two requests landing in the same instant may both
    /// pass. A failing cache store lets every request through.
    pub fn try_begin(&self, customer: &CustomerId) -> bool {
        let key = CacheKey::order_cooldown(customer).encode();
        match self.store.exists(&key) {
            Ok(true) => {
                tracing::debug!(customer_id = %customer, "Order request refused during cooldown");
                return false;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(
                    customer_id = %customer,
                    error = %e,
                    "Cooldown check failed, allowing request"
                );
                return true;
            }
        }

        let stamp = Utc::now().timestamp_millis().to_string();
        if let Err(e) = self.store.set(&key, stamp.as_bytes(), self.window) {
            tracing::warn!(customer_id = %customer, error = %e, "Failed to record order cooldown");
        }
        true
    }

    /// Lift the cooldown early, e.g. after the order was rejected.
    pub fn release(&self, customer: &CustomerId) {
        read_through::delete(&*self.store, &CacheKey::order_cooldown(customer).encode());
    }
}
