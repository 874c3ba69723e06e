mod backend;
mod buffer;
mod error;
mod event;
pub mod kernel;
mod stream;

pub use backend::Cpu;
pub use buffer::CpuBuffer;
pub use error::CpuError;
pub use event::CpuEvent;
pub use kernel::CpuKernels;
pub use stream::CpuStream;
