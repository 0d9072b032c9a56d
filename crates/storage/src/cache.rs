use std::collections::BTreeSet;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use tokio::sync::{Notify, watch};
use tokio::time::{Duration, Instant};
use tracing::debug;

use ttlcache_common::StorageError;

use crate::config::{CacheConfig, ExpirationMode};
use crate::entry::Entry;

/// Item da fila de expiração: (deadline, chave).
/// Ordenado por deadline para purga eficiente.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd)]
struct ExpiryEntry<K>(Instant, K);

/// Estado compartilhado entre todos os handles do cache.
struct SharedState<K, V> {
    data: DashMap<K, Entry<V>>,
    /// Deadlines pendentes. `None` no modo lazy.
    expiry: Option<Mutex<BTreeSet<ExpiryEntry<K>>>>,
    notify_expiry: Arc<Notify>,
    max_duration: Duration,
    /// Quando o estado é dropado o sender fecha e a task de purga termina.
    _shutdown: watch::Sender<()>,
}

/// Cache chave-valor em memória com expiração por chave.
///
/// Cada `set` instala um deadline novo para a chave e cancela o anterior,
/// então um deadline antigo nunca remove um valor regravado depois dele.
/// Chaves expiradas ficam invisíveis para `get`, `ttl` e `count` mesmo antes
/// da task de purga passar por elas.
///
/// ```
/// use std::time::Duration;
/// use ttlcache_storage::TtlCache;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let cache: TtlCache<i64, i64> = TtlCache::new();
/// assert_eq!(cache.set(1, 42, Duration::from_millis(1000)), Ok(false));
/// assert_eq!(cache.get(&1), Some(42));
/// assert_eq!(cache.count(), 1);
/// # }
/// ```
pub struct TtlCache<K, V> {
    shared: Arc<SharedState<K, V>>,
}

impl<K, V> Clone for TtlCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq + Ord + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Cria um cache com expiração eager.
    ///
    /// # Panics
    ///
    /// Precisa de um runtime Tokio ativo para a task de purga.
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Cria um cache com a configuração dada. No modo eager precisa de um
    /// runtime Tokio ativo; no modo lazy nenhuma task é criada.
    pub fn with_config(config: CacheConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let eager = config.expiration == ExpirationMode::Eager;

        let shared = Arc::new(SharedState {
            data: DashMap::new(),
            expiry: eager.then(|| Mutex::new(BTreeSet::new())),
            notify_expiry: Arc::new(Notify::new()),
            max_duration: config.max_duration,
            _shutdown: shutdown_tx,
        });

        if eager {
            // A task só guarda uma referência fraca para não manter o cache vivo
            let state = Arc::downgrade(&shared);
            let notify = Arc::clone(&shared.notify_expiry);
            tokio::spawn(async move {
                purge_expired_keys(state, notify, shutdown_rx).await;
            });
        }

        TtlCache { shared }
    }

    /// Grava `value` em `key` por `duration`.
    ///
    /// Retorna `true` se já havia um valor não expirado para a chave. Valor e
    /// deadline anteriores são substituídos por inteiro.
    pub fn set(&self, key: K, value: V, duration: Duration) -> Result<bool, StorageError> {
        if duration.is_zero() {
            return Err(StorageError::InvalidDuration);
        }
        let too_long = || StorageError::DurationTooLong {
            requested_ms: duration.as_millis(),
            max_ms: self.shared.max_duration.as_millis(),
        };
        if duration > self.shared.max_duration {
            return Err(too_long());
        }

        let now = Instant::now();
        let expires_at = now.checked_add(duration).ok_or_else(too_long)?;

        // O lock do shard da chave fica preso enquanto o deadline antigo é
        // cancelado e o novo é armado.
        let existed = match self.shared.data.entry(key) {
            MapEntry::Occupied(mut occupied) => {
                let live = !occupied.get().is_expired_at(now);
                if let Some(expiry) = &self.shared.expiry {
                    let mut expiry = lock(expiry);
                    expiry.remove(&ExpiryEntry(
                        occupied.get().expires_at,
                        occupied.key().clone(),
                    ));
                    expiry.insert(ExpiryEntry(expires_at, occupied.key().clone()));
                }
                occupied.insert(Entry::new(value, expires_at));
                live
            }
            MapEntry::Vacant(vacant) => {
                if let Some(expiry) = &self.shared.expiry {
                    lock(expiry).insert(ExpiryEntry(expires_at, vacant.key().clone()));
                }
                vacant.insert(Entry::new(value, expires_at));
                false
            }
        };

        if self.shared.expiry.is_some() {
            self.shared.notify_expiry.notify_one();
        }

        Ok(existed)
    }

    /// Atalho de `set` com a duração em milissegundos.
    pub fn set_ms(&self, key: K, value: V, duration_ms: u64) -> Result<bool, StorageError> {
        self.set(key, value, Duration::from_millis(duration_ms))
    }

    /// Valor atual da chave, se ela não expirou. Não renova o deadline.
    pub fn get(&self, key: &K) -> Option<V> {
        let entry = self.shared.data.get(key)?;
        if entry.is_expired() {
            drop(entry);
            self.evict_if_expired(key);
            return None;
        }
        Some(entry.value.clone())
    }

    /// Como `get`, mas devolve `default` para chave ausente ou expirada.
    pub fn get_or(&self, key: &K, default: V) -> V {
        self.get(key).unwrap_or(default)
    }

    /// Número de chaves não expiradas. Varre as expiradas antes de contar.
    pub fn count(&self) -> usize {
        let now = Instant::now();
        let before = self.shared.data.len();
        self.shared.data.retain(|_, entry| !entry.is_expired_at(now));
        let live = self.shared.data.len();
        if live < before {
            debug!(swept = before - live, "entradas expiradas varridas");
        }
        live
    }

    /// Tempo restante de uma chave não expirada.
    pub fn ttl(&self, key: &K) -> Option<Duration> {
        let entry = self.shared.data.get(key)?;
        if entry.is_expired() {
            drop(entry);
            self.evict_if_expired(key);
            return None;
        }
        Some(entry.remaining())
    }

    /// Remove a chave e cancela a expiração pendente. Retorna o valor se a
    /// chave ainda estava viva.
    pub fn remove(&self, key: &K) -> Option<V> {
        match self.shared.data.entry(key.clone()) {
            MapEntry::Occupied(occupied) => {
                if let Some(expiry) = &self.shared.expiry {
                    lock(expiry).remove(&ExpiryEntry(
                        occupied.get().expires_at,
                        occupied.key().clone(),
                    ));
                }
                let (_, entry) = occupied.remove_entry();
                (!entry.is_expired()).then_some(entry.value)
            }
            MapEntry::Vacant(_) => None,
        }
    }

    /// Remove todas as chaves e seus deadlines.
    pub fn clear(&self) {
        let keys: Vec<K> = self
            .shared
            .data
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for key in &keys {
            self.remove(key);
        }
    }

    fn evict_if_expired(&self, key: &K) {
        self.shared
            .data
            .remove_if(key, |_, entry| entry.is_expired());
    }
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Hash + Eq + Ord + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Background task que purga chaves expiradas.
async fn purge_expired_keys<K, V>(
    state: Weak<SharedState<K, V>>,
    notify: Arc<Notify>,
    mut shutdown: watch::Receiver<()>,
) where
    K: Hash + Eq + Ord + Clone + Debug,
{
    loop {
        let next_expiry = {
            let Some(shared) = state.upgrade() else {
                return;
            };
            let Some(expiry) = &shared.expiry else {
                return;
            };
            let next = lock(expiry).first().map(|e| e.0);
            next
        };

        match next_expiry {
            Some(when) => {
                tokio::select! {
                    _ = tokio::time::sleep_until(when) => {}
                    _ = notify.notified() => { continue; }
                    _ = shutdown.changed() => { return; }
                }
            }
            None => {
                tokio::select! {
                    _ = notify.notified() => { continue; }
                    _ = shutdown.changed() => { return; }
                }
            }
        }

        let Some(shared) = state.upgrade() else {
            return;
        };
        purge_due(&shared);
    }
}

/// Tira da fila os deadlines vencidos e remove as chaves correspondentes.
fn purge_due<K, V>(shared: &SharedState<K, V>)
where
    K: Hash + Eq + Ord + Clone + Debug,
{
    let Some(expiry) = &shared.expiry else {
        return;
    };
    let now = Instant::now();

    let due = {
        let mut expiry = lock(expiry);
        let mut due = Vec::new();
        while expiry.first().is_some_and(|e| e.0 <= now) {
            if let Some(e) = expiry.pop_first() {
                due.push(e);
            }
        }
        due
    };

    for ExpiryEntry(_, key) in due {
        // Só remove se a entrada atual expirou (pode ter sido regravada)
        if shared
            .data
            .remove_if(&key, |_, entry| entry.is_expired_at(now))
            .is_some()
        {
            debug!(?key, "chave expirada removida");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;
    use ttlcache_common::ABSENT;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn lazy() -> TtlCache<i64, i64> {
        TtlCache::with_config(CacheConfig::default().with_expiration(ExpirationMode::Lazy))
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_key() {
        let cache = TtlCache::new();
        assert_eq!(cache.set(1, 42, ms(50)), Ok(false));
        assert_eq!(cache.get(&1), Some(42));
        assert_eq!(cache.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn key_expires_after_duration() {
        let cache = TtlCache::new();
        cache.set(1, 42, ms(50)).unwrap();

        sleep(ms(49)).await;
        assert_eq!(cache.get(&1), Some(42));

        sleep(ms(1)).await;
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn overwrite_supersedes_old_deadline() {
        let cache = TtlCache::new();
        assert_eq!(cache.set(1, 42, ms(50)), Ok(false));

        sleep(ms(25)).await;
        assert_eq!(cache.set(1, 99, ms(50)), Ok(true));

        // t=60: deadline antigo (50) já passou, o novo (75) não
        sleep(ms(35)).await;
        assert_eq!(cache.get(&1), Some(99));
        assert_eq!(cache.count(), 1);

        // t=110
        sleep(ms(50)).await;
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_deadline_does_not_evict_refreshed_key() {
        let cache = TtlCache::new();
        cache.set(7, 1, ms(10)).unwrap();

        sleep(ms(5)).await;
        assert_eq!(cache.set(7, 2, ms(10)), Ok(true));

        sleep(ms(7)).await;
        assert_eq!(cache.get(&7), Some(2));
        // a entrada continua no mapa, a purga do deadline antigo foi cancelada
        assert_eq!(cache.shared.data.len(), 1);

        sleep(ms(3)).await;
        assert_eq!(cache.get(&7), None);
    }

    #[tokio::test(start_paused = true)]
    async fn shorter_overwrite_expires_earlier() {
        let cache = TtlCache::new();
        cache.set(1, 1, ms(100)).unwrap();
        assert_eq!(cache.set(1, 2, ms(10)), Ok(true));

        sleep(ms(10)).await;
        assert_eq!(cache.get(&1), None);
    }

    #[tokio::test(start_paused = true)]
    async fn keys_expire_independently() {
        let cache = TtlCache::new();
        cache.set(1, 1, ms(1000)).unwrap();
        cache.set(2, 2, ms(10)).unwrap();

        sleep(ms(20)).await;
        assert_eq!(cache.count(), 1);
        assert_eq!(cache.get(&1), Some(1));
        assert_eq!(cache.get(&2), None);
    }

    #[tokio::test(start_paused = true)]
    async fn absent_key_is_idempotent() {
        let cache: TtlCache<i64, i64> = TtlCache::new();
        for _ in 0..3 {
            assert_eq!(cache.get(&5), None);
            assert_eq!(cache.get_or(&5, ABSENT), ABSENT);
            assert_eq!(cache.count(), 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn set_after_expiry_reports_absent() {
        let cache = TtlCache::new();
        cache.set(1, 1, ms(10)).unwrap();
        sleep(ms(10)).await;
        assert_eq!(cache.set(1, 2, ms(10)), Ok(false));
        assert_eq!(cache.get(&1), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn rejects_invalid_durations() {
        let cache = TtlCache::with_config(CacheConfig::default().with_max_duration(ms(100)));
        assert_eq!(
            cache.set(1, 1, Duration::ZERO),
            Err(StorageError::InvalidDuration)
        );
        assert_eq!(
            cache.set(1, 1, ms(101)),
            Err(StorageError::DurationTooLong {
                requested_ms: 101,
                max_ms: 100
            })
        );
        assert_eq!(cache.count(), 0);
        assert_eq!(cache.set_ms(1, 1, 100), Ok(false));
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_set_keeps_previous_entry() {
        let cache = TtlCache::new();
        cache.set(1, 10, ms(50)).unwrap();
        assert!(cache.set(1, 20, Duration::ZERO).is_err());
        assert_eq!(cache.get(&1), Some(10));
        assert_eq!(cache.ttl(&1), Some(ms(50)));
    }

    #[tokio::test(start_paused = true)]
    async fn purge_task_removes_expired_entries() {
        let cache = TtlCache::new();
        cache.set(1, 1, ms(10)).unwrap();
        cache.set(2, 2, ms(30)).unwrap();

        sleep(ms(20)).await;
        assert_eq!(cache.shared.data.len(), 1);

        sleep(ms(20)).await;
        assert!(cache.shared.data.is_empty());
        assert!(lock(cache.shared.expiry.as_ref().unwrap()).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn lazy_mode_hides_then_sweeps() {
        let cache = lazy();
        cache.set(1, 1, ms(10)).unwrap();
        cache.set(2, 2, ms(100)).unwrap();

        sleep(ms(50)).await;
        // sem task de purga a entrada ainda ocupa o mapa
        assert_eq!(cache.shared.data.len(), 2);
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.count(), 1);
        assert_eq!(cache.shared.data.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn lazy_mode_overwrite_contract() {
        let cache = lazy();
        assert_eq!(cache.set(1, 42, ms(50)), Ok(false));
        sleep(ms(25)).await;
        assert_eq!(cache.set(1, 99, ms(50)), Ok(true));
        sleep(ms(35)).await;
        assert_eq!(cache.get(&1), Some(99));
        sleep(ms(50)).await;
        assert_eq!(cache.get(&1), None);
    }

    #[tokio::test(start_paused = true)]
    async fn remove_cancels_pending_expiry() {
        let cache = TtlCache::new();
        cache.set(1, 1, ms(50)).unwrap();

        assert_eq!(cache.remove(&1), Some(1));
        assert_eq!(cache.remove(&1), None);
        assert_eq!(cache.get(&1), None);
        assert!(lock(cache.shared.expiry.as_ref().unwrap()).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn remove_expired_key_returns_none() {
        let cache = lazy();
        cache.set(1, 1, ms(10)).unwrap();
        sleep(ms(10)).await;
        assert_eq!(cache.remove(&1), None);
        assert!(cache.shared.data.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_reports_remaining_time() {
        let cache = TtlCache::new();
        cache.set(1, 1, ms(100)).unwrap();
        assert_eq!(cache.ttl(&1), Some(ms(100)));

        sleep(ms(40)).await;
        assert_eq!(cache.ttl(&1), Some(ms(60)));

        sleep(ms(60)).await;
        assert_eq!(cache.ttl(&1), None);
        assert_eq!(cache.ttl(&2), None);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_drops_everything() {
        let cache = TtlCache::new();
        for k in 0..10 {
            cache.set(k, k * 10, ms(100)).unwrap();
        }
        cache.clear();
        assert_eq!(cache.count(), 0);
        assert!(lock(cache.shared.expiry.as_ref().unwrap()).is_empty());
        assert_eq!(cache.set(3, 3, ms(10)), Ok(false));
    }

    #[tokio::test(start_paused = true)]
    async fn clones_share_state() {
        let cache = TtlCache::new();
        let other = cache.clone();
        cache.set(1, 5, ms(100)).unwrap();
        assert_eq!(other.get(&1), Some(5));
        assert_eq!(other.set(1, 6, ms(100)), Ok(true));
        assert_eq!(cache.get(&1), Some(6));
    }

    #[tokio::test(start_paused = true)]
    async fn purge_task_does_not_keep_cache_alive() {
        let cache: TtlCache<i64, i64> = TtlCache::new();
        cache.set(1, 1, ms(1000)).unwrap();
        tokio::task::yield_now().await;

        let weak = Arc::downgrade(&cache.shared);
        drop(cache);
        assert!(weak.upgrade().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn generic_keys_and_values() {
        let cache: TtlCache<String, Vec<u8>> = TtlCache::new();
        assert_eq!(cache.set("a".into(), vec![1, 2], ms(10)), Ok(false));
        assert_eq!(cache.get(&"a".to_string()), Some(vec![1, 2]));
        sleep(ms(10)).await;
        assert_eq!(cache.get(&"a".to_string()), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers() {
        let cache: TtlCache<i64, i64> = TtlCache::new();
        let mut handles = Vec::new();

        for t in 0..4 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..250 {
                    cache.set(t * 1000 + i, i, Duration::from_secs(60)).unwrap();
                    // todas as tasks também disputam a mesma chave
                    cache.set(-1, t, Duration::from_secs(60)).unwrap();
                }
            }));
        }

        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(cache.count(), 1001);
        assert_eq!(lock(cache.shared.expiry.as_ref().unwrap()).len(), 1001);
    }
}
