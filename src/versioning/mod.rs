mod allocator;

pub use allocator::{VersionAllocator, DEFAULT_LEASE_TIMEOUT_MS};
