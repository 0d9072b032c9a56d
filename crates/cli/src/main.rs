use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;
use tokio::time::Duration;
use tracing::info;

use ttlcache_cli::{Runner, load_script};
use ttlcache_common::{MAX_DURATION_MS, PROMPT};
use ttlcache_storage::{CacheConfig, ExpirationMode};

#[derive(Parser, Debug)]
#[command(name = "ttlcache", about = "ttlcache: cache chave-valor com expiração por chave")]
struct Args {
    /// Sem task de purga: chaves expiradas são removidas no acesso
    #[arg(long)]
    lazy: bool,
    #[arg(long, default_value_t = MAX_DURATION_MS, value_parser = clap::value_parser!(u64).range(1..))]
    max_duration_ms: u64,
    /// Script com um comando por linha (`[@ms] COMANDO args`)
    #[arg(long, short, value_name = "FILE")]
    script: Option<PathBuf>,

    /// Comando para executar diretamente (modo não interativo)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

impl Args {
    fn cache_config(&self) -> CacheConfig {
        let mode = if self.lazy {
            ExpirationMode::Lazy
        } else {
            ExpirationMode::Eager
        };
        CacheConfig::default()
            .with_expiration(mode)
            .with_max_duration(Duration::from_millis(self.max_duration_ms))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ttlcache_cli=info".into()),
        )
        .init();

    let args = Args::parse();
    let config = args.cache_config();
    info!(mode = ?config.expiration, "cache iniciado");
    let runner = Runner::new(config);

    // Modo script
    if let Some(ref path) = args.script {
        let script = load_script(path).await?;
        for line in script.lines() {
            if let Some(reply) = runner.run_line(line).await {
                println!("{reply}");
            }
        }
        return Ok(());
    }

    // Modo comando único (via argumentos)
    if !args.command.is_empty() {
        if let Some(reply) = runner.run_line(&args.command.join(" ")).await {
            println!("{reply}");
        }
        return Ok(());
    }

    let stdin = io::stdin();
    let mut input = String::new();

    loop {
        print!("{PROMPT}");
        io::stdout().flush()?;

        input.clear();
        if stdin.read_line(&mut input)? == 0 {
            break; // EOF
        }

        let line = input.trim();
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            break;
        }

        if let Some(reply) = runner.run_line(line).await {
            println!("{reply}");
        }
    }

    Ok(())
}
