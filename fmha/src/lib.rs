pub mod arguments;
pub mod backends;
pub mod bias;
pub mod data_type;
pub mod dispatch;
pub mod error;
pub mod mask;
pub mod registry;
pub mod stream_config;
pub mod timing;
pub mod traits;

pub use bias::BiasType;
pub use data_type::{ArrayElement, DataType};
pub use dispatch::{batch_prefill, forward, forward_split_kv};
pub use error::{DispatchError, DispatchResult, MISS_SENTINEL, legacy_elapsed_ms};
pub use mask::{MaskInfo, MaskType};
pub use stream_config::StreamConfig;
