use tokio::time::{Duration, Instant};

/// Entrada no store: valor + instante de expiração.
#[derive(Debug, Clone)]
pub(crate) struct Entry<V> {
    pub value: V,
    pub expires_at: Instant,
}

impl<V> Entry<V> {
    pub fn new(value: V, expires_at: Instant) -> Self {
        Self { value, expires_at }
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Tempo restante até a expiração (zero se já expirou).
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}
