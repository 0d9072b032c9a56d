/// Erros do store com expiração.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("duração deve ser positiva")]
    InvalidDuration,
    #[error("duração de {requested_ms}ms excede o máximo de {max_ms}ms")]
    DurationTooLong { requested_ms: u128, max_ms: u128 },
}

/// Erros de parsing/validação de comandos do script.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("comando desconhecido: {0}")]
    Unknown(String),
    #[error("número errado de argumentos para '{0}'")]
    WrongArity(String),
    #[error("argumento inválido: {0}")]
    InvalidArgument(String),
    #[error("offset de agendamento inválido: {0}")]
    InvalidOffset(String),
}

/// Erro top-level do ttlcache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias.
pub type CacheResult<T> = Result<T, CacheError>;
