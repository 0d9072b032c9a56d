#![forbid(unsafe_code)]

mod error;

pub use error::*;

/// Valor devolvido por `GET` quando a chave não existe ou expirou.
pub const ABSENT: i64 = -1;

/// Duração máxima aceita por `SET` (~100 anos), evita overflow em `Instant`.
pub const MAX_DURATION_MS: u64 = 100 * 365 * 24 * 60 * 60 * 1000;

pub const PROMPT: &str = "ttlcache> ";
