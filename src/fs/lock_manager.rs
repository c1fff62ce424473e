use super::key_codec::hash32;
use tokio::sync::{Mutex, MutexGuard};

/// Number of stripes. Must be a power of two.
pub const LOCK_STRIPES: usize = 8;

/// Fixed array of striped mutexes serializing multi-step metadata
/// transactions. A read-modify-write on one `(parent, name)` pair holds the
/// stripe its lookup key hashes to; `rmdir` holds every stripe, in
/// ascending order, so it observes all potential insertions atomically.
/// Single point reads are not locked here at all.
pub struct LockManager {
    stripes: Vec<Mutex<()>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            stripes: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    pub fn stripe_of(key: &[u8]) -> usize {
        hash32(key, 0) as usize & (LOCK_STRIPES - 1)
    }

    pub async fn lock_key(&self, key: &[u8]) -> MutexGuard<'_, ()> {
        self.stripes[Self::stripe_of(key)].lock().await
    }

    pub async fn lock_all(&self) -> Vec<MutexGuard<'_, ()>> {
        let mut guards = Vec::with_capacity(LOCK_STRIPES);
        for stripe in &self.stripes {
            guards.push(stripe.lock().await);
        }
        guards
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}
