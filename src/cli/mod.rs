mod command;
mod runner;
mod stress;

pub use command::{Command, StressOptions};
pub use runner::{OutputMode, run, run_with_format};
pub use stress::{StressReport, run_stress};
