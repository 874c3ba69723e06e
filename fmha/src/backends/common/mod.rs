mod backend;
mod event;
pub mod kernel;
mod native_buffer;
mod stream;

pub use backend::Backend;
pub use event::Event;
pub use kernel::{BatchPrefillKernel, ForwardKernel, Kernels, SplitKvKernel};
pub use native_buffer::NativeBuffer;
pub use stream::Stream;
