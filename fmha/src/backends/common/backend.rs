use std::error::Error;

use super::{Event, NativeBuffer, Stream};

pub trait Backend: Sized + 'static {
    type NativeBuffer: NativeBuffer<Backend = Self>;
    type Stream: Stream<Backend = Self>;
    type Event: Event<Backend = Self>;
    type Error: Error;
}
