use ttlcache_common::CommandError;

/// Quebra uma linha de script em tokens. `#` inicia um comentário.
pub fn tokenize(line: &str) -> Vec<String> {
    let code = match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    };
    code.split_whitespace().map(str::to_string).collect()
}

/// Cursor sobre os tokens de um comando para extrair argumentos sequencialmente.
pub struct Parse {
    parts: Vec<String>,
    pos: usize,
}

impl Parse {
    /// Cria um Parse a partir dos tokens. Precisa de pelo menos um token.
    pub fn new(parts: Vec<String>) -> Result<Parse, CommandError> {
        if parts.is_empty() {
            return Err(CommandError::InvalidArgument("linha vazia".into()));
        }
        Ok(Parse { parts, pos: 0 })
    }

    /// Retorna o próximo token.
    pub fn next_string(&mut self) -> Result<String, CommandError> {
        self.next()
    }

    /// Retorna o próximo token como i64.
    pub fn next_int(&mut self) -> Result<i64, CommandError> {
        let s = self.next()?;
        s.parse::<i64>()
            .map_err(|_| CommandError::InvalidArgument(format!("'{s}' não é um inteiro")))
    }

    /// Retorna o próximo token como inteiro não negativo (durações em ms).
    pub fn next_uint(&mut self) -> Result<u64, CommandError> {
        let s = self.next()?;
        s.parse::<u64>().map_err(|_| {
            CommandError::InvalidArgument(format!("'{s}' não é um inteiro não negativo"))
        })
    }

    /// Verifica se todos os argumentos foram consumidos.
    pub fn finish(&self) -> Result<(), CommandError> {
        if self.pos < self.parts.len() {
            Err(CommandError::InvalidArgument(
                "argumentos extras não esperados".into(),
            ))
        } else {
            Ok(())
        }
    }

    /// Verifica se ainda há argumentos restantes.
    pub fn has_remaining(&self) -> bool {
        self.pos < self.parts.len()
    }

    /// Retorna o número de argumentos restantes.
    pub fn remaining(&self) -> usize {
        self.parts.len() - self.pos
    }

    fn next(&mut self) -> Result<String, CommandError> {
        let Some(part) = self.parts.get(self.pos) else {
            return Err(CommandError::InvalidArgument(
                "argumentos insuficientes".into(),
            ));
        };
        self.pos += 1;
        Ok(part.clone())
    }
}
