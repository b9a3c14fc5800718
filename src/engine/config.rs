/// Read buffer used by the executor for each network read.
pub const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;

#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Number of workers, i.e. the cap on simultaneously active transfers.
    pub max_concurrent: usize,
    /// Dispatch channel capacity. `None` means "same as `max_concurrent`".
    pub dispatch_capacity: Option<usize>,
    pub chunk_size: usize,
    pub event_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            dispatch_capacity: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            event_capacity: 256,
        }
    }
}

impl QueueConfig {
    pub fn with_max_concurrent(max_concurrent: usize) -> Self {
        Self { max_concurrent, ..Self::default() }
    }

    pub(crate) fn workers(&self) -> usize {
        self.max_concurrent.max(1)
    }

    pub(crate) fn channel_capacity(&self) -> usize {
        self.dispatch_capacity.unwrap_or(self.max_concurrent).max(1)
    }

    pub(crate) fn read_buffer(&self) -> usize {
        self.chunk_size.max(1)
    }

    pub(crate) fn broadcast_capacity(&self) -> usize {
        self.event_capacity.max(1)
    }
}
