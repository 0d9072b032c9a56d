use tokio::time::Duration;

use ttlcache_common::MAX_DURATION_MS;

/// Estratégia de remoção de chaves expiradas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpirationMode {
    /// Task em background remove cada chave no seu deadline.
    #[default]
    Eager,
    /// Sem task; entradas expiradas são ignoradas e varridas no acesso.
    Lazy,
}

/// Configuração do `TtlCache`.
///
/// ```
/// use ttlcache_storage::{CacheConfig, ExpirationMode};
/// use std::time::Duration;
///
/// let config = CacheConfig::default()
///     .with_expiration(ExpirationMode::Lazy)
///     .with_max_duration(Duration::from_secs(3600));
/// assert_eq!(config.expiration, ExpirationMode::Lazy);
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub expiration: ExpirationMode,
    /// Maior duração aceita por `set`.
    pub max_duration: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            expiration: ExpirationMode::Eager,
            max_duration: Duration::from_millis(MAX_DURATION_MS),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_expiration(mut self, mode: ExpirationMode) -> Self {
        self.expiration = mode;
        self
    }

    pub fn with_max_duration(mut self, max: Duration) -> Self {
        self.max_duration = max;
        self
    }
}
