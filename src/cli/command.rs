use std::time::Duration;

pub enum Command {
    /// Print the effective configuration.
    ShowConfig,
    /// Hammer the cache from several threads while the sweep runs.
    Stress(StressOptions),
}

#[derive(Clone, Debug)]
pub struct StressOptions {
    pub threads: usize,
    pub duration: Duration,
    /// Number of distinct keys the workers pick from.
    pub keys: usize,
    /// TTL for the entries written during the run.
    pub ttl: Duration,
    /// Share of writes that store refreshable entries instead of plain ones.
    pub refreshable_ratio: f64,
    /// Share of refreshable entries whose refresher always fails.
    pub failing_ratio: f64,
}

impl Default for StressOptions {
    fn default() -> Self {
        Self {
            threads: 4,
            duration: Duration::from_secs(2),
            keys: 256,
            ttl: Duration::from_millis(200),
            refreshable_ratio: 0.5,
            failing_ratio: 0.0,
        }
    }
}
