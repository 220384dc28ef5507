use crate::cache::{CacheConfig, GlobalCache};
use crate::errors::CacheError;

use super::command::Command;
use super::stress::run_stress;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputMode {
    Human,
    Plain,
    Json,
}

pub fn run(config: &CacheConfig, cmd: Command) -> Result<(), CacheError> {
    run_with_format(config, cmd, OutputMode::Human)
}

pub fn run_with_format(config: &CacheConfig, cmd: Command, mode: OutputMode) -> Result<(), CacheError> {
    match cmd {
        Command::ShowConfig => {
            match mode {
                OutputMode::Json => println!("{}", serde_json::to_string_pretty(config)?),
                OutputMode::Plain | OutputMode::Human => print!("{}", config.to_toml_string()?),
            }
            Ok(())
        }
        Command::Stress(opts) => {
            let cache: GlobalCache<u64> = GlobalCache::initialize(config.clone())?;
            let report = run_stress(&cache, &opts);
            cache.stop();
            match mode {
                OutputMode::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputMode::Plain => println!(
                    "gets={} hits={} puts={} sweeps={} refreshes={} refresh_failures={} final_evicted={} final_len={} consistent={}",
                    report.gets,
                    report.hits,
                    report.puts,
                    report.metrics.sweeps,
                    report.metrics.refreshes,
                    report.metrics.refresh_failures,
                    report.final_sweep.evicted(),
                    report.final_len,
                    report.is_consistent()
                ),
                OutputMode::Human => {
                    println!("stress run: {} threads for {} ms", report.threads, report.elapsed_ms);
                    println!(
                        "  reads:   {} ({} hits, {} misses, hit rate {:.1}%)",
                        report.gets,
                        report.hits,
                        report.misses,
                        report.metrics.hit_rate() * 100.0
                    );
                    println!("  writes:  {}", report.puts);
                    println!(
                        "  sweeps:  {} (untouched evictions {}, stale evictions {}, refreshes {}, failed {})",
                        report.metrics.sweeps,
                        report.metrics.untouched_evictions,
                        report.metrics.stale_evictions,
                        report.metrics.refreshes,
                        report.metrics.refresh_failures
                    );
                    println!(
                        "  final sweep: {} evicted, {} refreshed, {} failed",
                        report.final_sweep.evicted(),
                        report.final_sweep.refreshed,
                        report.final_sweep.refresh_failed
                    );
                    println!("  entries: {}", report.final_len);
                    println!("  consistent: {}", report.is_consistent());
                }
            }
            if report.is_consistent() {
                Ok(())
            } else {
                Err(CacheError::Consistency(format!(
                    "stress run found {} mismatched reads and {} foreign keys",
                    report.mismatched_reads, report.foreign_keys
                )))
            }
        }
    }
}
