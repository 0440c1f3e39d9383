//! Per-identity sequence numbers.
//!
//! Transactions from one signer must carry strictly consecutive nonces. Two
//! pipelines sharing a signer that both read the pending count and sign would
//! collide, so assignment, signing and broadcast for one address run inside a
//! single-flight section. Other stages of concurrent pipelines are unaffected.

use crate::domain::Address;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slot = Arc<AsyncMutex<Option<u64>>>;

/// Shared by every Environment derived from the same base.
#[derive(Debug, Default)]
pub struct NonceManager {
    slots: Mutex<HashMap<Address, Slot>>,
}

impl NonceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the critical section for `address`. Waits while another pipeline
    /// holds it.
    pub async fn lock(&self, address: Address) -> NonceGuard {
        let slot = {
            let mut slots = self.slots.lock();
            slots.entry(address).or_default().clone()
        };
        NonceGuard {
            inner: slot.lock_owned().await,
        }
    }
}

/// Exclusive right to use the next nonce of one address.
///
/// Holds the cached next nonce when the previous broadcast succeeded, `None`
/// when it must be re-read from the node.
#[derive(Debug)]
pub struct NonceGuard {
    inner: OwnedMutexGuard<Option<u64>>,
}

impl NonceGuard {
    pub fn cached(&self) -> Option<u64> {
        *self.inner
    }

    /// Record a successful broadcast with `nonce`.
    pub fn commit(&mut self, nonce: u64) {
        *self.inner = Some(nonce + 1);
    }

    /// Forget the cached value; the next holder re-reads the pending count.
    pub fn invalidate(&mut self) {
        *self.inner = None;
    }
}
