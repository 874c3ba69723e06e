mod attention;
mod batch_prefill;
mod fwd;
mod split_kv;

pub use attention::{AttentionArguments, SequenceLayout, Strides};
pub use batch_prefill::{BatchPrefillArguments, KvCache};
pub use fwd::FwdArguments;
pub use split_kv::{MAX_SPLITS, SplitKvArguments, num_splits_heuristic};
