use std::path::Path;

use tokio::time::{Duration, Instant};
use tracing::{debug, warn};

use ttlcache_common::CacheResult;
use ttlcache_protocol::{Command, Reply, ScriptLine};
use ttlcache_storage::{CacheConfig, TtlCache};

/// Executa comandos e scripts contra um `TtlCache<i64, i64>`.
///
/// Offsets `@<ms>` são relativos ao instante em que o runner foi criado.
pub struct Runner {
    cache: TtlCache<i64, i64>,
    started: Instant,
}

impl Runner {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            cache: TtlCache::with_config(config),
            started: Instant::now(),
        }
    }

    pub fn cache(&self) -> &TtlCache<i64, i64> {
        &self.cache
    }

    /// Executa um comando e retorna a resposta.
    pub async fn execute(&self, cmd: Command) -> CacheResult<Reply> {
        debug!(command = cmd.name(), "executando {cmd:?}");

        let reply = match cmd {
            Command::Set {
                key,
                value,
                duration_ms,
            } => Reply::Bool(self.cache.set_ms(key, value, duration_ms)?),
            Command::Get(key) => self.cache.get(&key).into(),
            Command::Count => Reply::Integer(i64::try_from(self.cache.count()).unwrap_or(i64::MAX)),
            Command::Ttl(key) => self
                .cache
                .ttl(&key)
                .map(|left| i64::try_from(left.as_millis()).unwrap_or(i64::MAX))
                .into(),
            Command::Del(key) => self.cache.remove(&key).into(),
            Command::Clear => {
                self.cache.clear();
                Reply::Null
            }
            Command::Sleep(ms) => {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Reply::Null
            }
        };

        Ok(reply)
    }

    /// Faz o parse e executa uma linha de script, esperando o offset `@<ms>`
    /// se houver. Linhas vazias retornam `None`; erros viram `Reply::Error`.
    pub async fn run_line(&self, line: &str) -> Option<Reply> {
        let parsed = match ScriptLine::parse(line) {
            Ok(Some(parsed)) => parsed,
            Ok(None) => return None,
            Err(e) => return Some(Reply::Error(e.to_string())),
        };

        if let Some(at_ms) = parsed.at_ms {
            let when = self.started + Duration::from_millis(at_ms);
            let now = Instant::now();
            if when < now {
                warn!(
                    at_ms,
                    late_ms = (now - when).as_millis() as u64,
                    "comando agendado executado com atraso"
                );
            }
            tokio::time::sleep_until(when).await;
        }

        match self.execute(parsed.command).await {
            Ok(reply) => Some(reply),
            Err(e) => Some(Reply::Error(e.to_string())),
        }
    }

    /// Executa um script inteiro e retorna uma resposta por linha de comando.
    pub async fn run_script(&self, script: &str) -> Vec<Reply> {
        let mut replies = Vec::new();
        for line in script.lines() {
            if let Some(reply) = self.run_line(line).await {
                replies.push(reply);
            }
        }
        replies
    }
}

impl Default for Runner {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

/// Lê um arquivo de script.
pub async fn load_script(path: impl AsRef<Path>) -> CacheResult<String> {
    Ok(tokio::fs::read_to_string(path).await?)
}
