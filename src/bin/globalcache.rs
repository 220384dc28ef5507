use clap::{Parser, Subcommand};
use globalcache::cache::CacheConfig;
use globalcache::cli::{self as prog_cli, OutputMode, StressOptions};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "globalcache", version, about = "GlobalCache sweep and refresh driver", long_about = None)]
struct Cli {
    /// Path to a config file (TOML)
    #[arg(long, help = "Path to a config file (TOML). If omitted, defaults are used.")]
    config: Option<PathBuf>,
    #[arg(long, help = "Log level for stderr output: error|warn|info|debug|trace")]
    log_level: Option<String>,
    #[arg(long, conflicts_with = "plain", help = "Print results as JSON")]
    json: bool,
    #[arg(long, help = "Print results as a single key=value line")]
    plain: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Print the effective configuration (defaults < file < GLOBALCACHE_* env)")]
    Config,
    #[command(about = "Run concurrent get/put/contains traffic against a cache with its sweep running")]
    Stress {
        #[arg(long, default_value_t = 4, help = "Worker threads")]
        threads: usize,
        #[arg(long, default_value_t = 2000, help = "Run duration in milliseconds")]
        duration_ms: u64,
        #[arg(long, default_value_t = 256, help = "Size of the key space")]
        keys: usize,
        #[arg(long, default_value_t = 200, help = "TTL of written entries in milliseconds")]
        ttl_ms: u64,
        #[arg(long, help = "Override the sweep interval in milliseconds")]
        sweep_ms: Option<u64>,
        #[arg(long, default_value_t = 0.5, value_parser = parse_ratio, help = "Share of writes that store refreshable entries (0..1)")]
        refreshable_ratio: f64,
        #[arg(long, default_value_t = 0.0, value_parser = parse_ratio, help = "Share of refreshable entries whose refresh fails (0..1)")]
        failing_ratio: f64,
    },
}

fn parse_ratio(s: &str) -> Result<f64, String> {
    let v: f64 = s.trim().parse().map_err(|e| format!("invalid ratio '{s}': {e}"))?;
    if !(0.0..=1.0).contains(&v) {
        return Err(format!("ratio must be between 0 and 1, got '{s}'"));
    }
    Ok(v)
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = globalcache::logger::init_console(cli.log_level.as_deref()) {
        eprintln!("warning: logging disabled: {e}");
    }
    let mut cfg = match CacheConfig::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(2);
        }
    };
    let mode = if cli.json {
        OutputMode::Json
    } else if cli.plain {
        OutputMode::Plain
    } else {
        OutputMode::Human
    };

    let cmd = match cli.command {
        Commands::Config => prog_cli::Command::ShowConfig,
        Commands::Stress { threads, duration_ms, keys, ttl_ms, sweep_ms, refreshable_ratio, failing_ratio } => {
            if let Some(ms) = sweep_ms {
                cfg = cfg.with_sweep_interval(Duration::from_millis(ms));
            }
            prog_cli::Command::Stress(StressOptions {
                threads,
                duration: Duration::from_millis(duration_ms),
                keys,
                ttl: Duration::from_millis(ttl_ms),
                refreshable_ratio,
                failing_ratio,
            })
        }
    };

    if let Err(e) = prog_cli::run_with_format(&cfg, cmd, mode) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_parser_rejects_non_finite_and_out_of_range() {
        assert_eq!(parse_ratio("0.25"), Ok(0.25));
        assert!(parse_ratio("NaN").is_err());
        assert!(parse_ratio("inf").is_err());
        assert!(parse_ratio("1.5").is_err());
        assert!(parse_ratio("-0.1").is_err());
    }

    #[test]
    fn stress_command_parses_ratios() {
        assert!(Cli::try_parse_from(["globalcache", "stress", "--refreshable-ratio", "NaN"]).is_err());
        let cli = Cli::try_parse_from(["globalcache", "stress", "--failing-ratio", "0.1"]).unwrap();
        assert!(matches!(cli.command, Commands::Stress { failing_ratio, .. } if failing_ratio == 0.1));
    }
}
