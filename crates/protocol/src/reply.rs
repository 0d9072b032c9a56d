use std::fmt;

use ttlcache_common::ABSENT;

/// Resposta de um comando executado contra o cache.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Bool(bool),
    Integer(i64),
    /// Chave ausente ou expirada.
    Absent,
    Null,
    Error(String),
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Bool(b) => write!(f, "{b}"),
            Reply::Integer(n) => write!(f, "{n}"),
            Reply::Absent => write!(f, "{ABSENT}"),
            Reply::Null => write!(f, "null"),
            Reply::Error(msg) => write!(f, "(error) {msg}"),
        }
    }
}

impl From<Option<i64>> for Reply {
    fn from(value: Option<i64>) -> Self {
        value.map_or(Reply::Absent, Reply::Integer)
    }
}
