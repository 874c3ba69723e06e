mod bench;
mod list;

use clap::ValueEnum;

pub use bench::{BenchOptions, handle_bench};
pub use list::handle_list;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Family {
    Forward,
    SplitKv,
    BatchPrefill,
}

impl Family {
    pub const ALL: [Family; 3] = [Family::Forward, Family::SplitKv, Family::BatchPrefill];

    pub fn name(&self) -> &'static str {
        match self {
            Family::Forward => "forward",
            Family::SplitKv => "split-kv",
            Family::BatchPrefill => "batch-prefill",
        }
    }
}
