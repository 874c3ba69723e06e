/// Stream handle plus the timing policy of one dispatch call.
#[derive(Debug)]
pub struct StreamConfig<'s, S> {
    pub stream: &'s S,
    pub time_kernel: bool,
    /// Untimed warmup launches issued before timing starts.
    pub cold_niters: usize,
    /// Timed launches; the reported time is their mean.
    pub nrepeat: usize,
}

impl<'s, S> StreamConfig<'s, S> {
    pub const DEFAULT_COLD_NITERS: usize = 3;
    pub const DEFAULT_NREPEAT: usize = 10;

    /// Untimed submission: one launch, no events, no synchronization.
    pub fn new(stream: &'s S) -> Self {
        Self {
            stream,
            time_kernel: false,
            cold_niters: 0,
            nrepeat: 1,
        }
    }

    pub fn timed(
        stream: &'s S,
        cold_niters: usize,
        nrepeat: usize,
    ) -> Self {
        Self {
            stream,
            time_kernel: true,
            cold_niters,
            nrepeat,
        }
    }
}

impl<S> Clone for StreamConfig<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for StreamConfig<'_, S> {}
