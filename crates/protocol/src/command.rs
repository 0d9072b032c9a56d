use ttlcache_common::CommandError;

use crate::Parse;
use crate::parse::tokenize;

/// Enum com todos os comandos suportados.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Set {
        key: i64,
        value: i64,
        duration_ms: u64,
    },
    Get(i64),
    Count,
    Ttl(i64),
    Del(i64),
    Clear,
    Sleep(u64),
}

impl Command {
    /// Faz o parse dos tokens de uma linha em um Command.
    pub fn from_tokens(tokens: Vec<String>) -> Result<Command, CommandError> {
        let mut parse = Parse::new(tokens)?;
        let cmd_name = parse.next_string()?.to_uppercase();

        let cmd = match cmd_name.as_str() {
            "SET" => {
                expect_args(&parse, "SET", 3)?;
                let key = parse.next_int()?;
                let value = parse.next_int()?;
                let duration_ms = parse.next_uint()?;
                Command::Set {
                    key,
                    value,
                    duration_ms,
                }
            }
            "GET" => {
                expect_args(&parse, "GET", 1)?;
                Command::Get(parse.next_int()?)
            }
            "COUNT" => {
                expect_args(&parse, "COUNT", 0)?;
                Command::Count
            }
            "TTL" => {
                expect_args(&parse, "TTL", 1)?;
                Command::Ttl(parse.next_int()?)
            }
            "DEL" => {
                expect_args(&parse, "DEL", 1)?;
                Command::Del(parse.next_int()?)
            }
            "CLEAR" => {
                expect_args(&parse, "CLEAR", 0)?;
                Command::Clear
            }
            "SLEEP" => {
                expect_args(&parse, "SLEEP", 1)?;
                Command::Sleep(parse.next_uint()?)
            }
            _ => return Err(CommandError::Unknown(cmd_name)),
        };

        parse.finish()?;
        Ok(cmd)
    }

    /// Nome do comando, para logs.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Set { .. } => "SET",
            Command::Get(_) => "GET",
            Command::Count => "COUNT",
            Command::Ttl(_) => "TTL",
            Command::Del(_) => "DEL",
            Command::Clear => "CLEAR",
            Command::Sleep(_) => "SLEEP",
        }
    }
}

fn expect_args(parse: &Parse, name: &str, n: usize) -> Result<(), CommandError> {
    if parse.remaining() != n {
        return Err(CommandError::WrongArity(name.into()));
    }
    Ok(())
}

/// Uma linha de script: comando com offset opcional `@<ms>` a partir do
/// início do script.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptLine {
    pub at_ms: Option<u64>,
    pub command: Command,
}

impl ScriptLine {
    /// Retorna `None` para linhas vazias ou só com comentário.
    pub fn parse(line: &str) -> Result<Option<ScriptLine>, CommandError> {
        let mut tokens = tokenize(line);
        if tokens.is_empty() {
            return Ok(None);
        }

        let at_ms = match tokens[0].strip_prefix('@') {
            Some(offset) => {
                let at = offset
                    .parse::<u64>()
                    .map_err(|_| CommandError::InvalidOffset(tokens[0].clone()))?;
                tokens.remove(0);
                Some(at)
            }
            None => None,
        };

        if tokens.is_empty() {
            return Err(CommandError::InvalidArgument(
                "comando ausente após o offset".into(),
            ));
        }

        Ok(Some(ScriptLine {
            at_ms,
            command: Command::from_tokens(tokens)?,
        }))
    }
}
