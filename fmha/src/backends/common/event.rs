use super::Backend;

/// Timestamp marker recorded into a stream.
pub trait Event {
    type Backend: Backend;

    /// Blocks the host until the event has been reached on its stream.
    fn synchronize(&self) -> Result<(), <Self::Backend as Backend>::Error>;

    /// Milliseconds between this event and a later one recorded on the same stream.
    fn elapsed_ms(
        &self,
        end: &Self,
    ) -> Result<f32, <Self::Backend as Backend>::Error>;
}
