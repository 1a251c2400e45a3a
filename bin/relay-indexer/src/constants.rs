/// Name the service reports itself as in logs and traces.
pub(crate) const SERVICE_NAME: &str = "relay-indexer";

pub(crate) const DEFAULT_THREAD_COUNT: usize = 4;

/// Number of chain events buffered per chain before the listener has to wait.
pub(crate) const DEFAULT_FEED_CAPACITY: usize = 64;
