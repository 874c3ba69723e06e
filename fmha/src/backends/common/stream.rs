use super::Backend;

/// Caller-owned, in-order device queue.
///
/// Launch failures are not returned by the launch itself; they surface from
/// the next [`Stream::synchronize`].
pub trait Stream: Send + Sync {
    type Backend: Backend;

    fn id(&self) -> usize;

    fn create_event(&self) -> Result<<Self::Backend as Backend>::Event, <Self::Backend as Backend>::Error>;

    fn record_event(
        &self,
        event: &<Self::Backend as Backend>::Event,
    );

    fn synchronize(&self) -> Result<(), <Self::Backend as Backend>::Error>;
}
