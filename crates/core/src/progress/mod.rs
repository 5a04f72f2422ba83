//! In-process import progress: the registry sessions write to and the
//! sampling stream pollers read from.

mod registry;
mod stream;

use std::time::Duration;

pub use registry::{ProgressRegistry, Registration};
pub use stream::progress_stream;

/// How often a progress stream samples the registry.
pub const PROGRESS_SAMPLE_INTERVAL: Duration = Duration::from_millis(500);

/// How long a terminal snapshot stays readable before eviction.
pub const SNAPSHOT_EVICTION_GRACE: Duration = Duration::from_secs(30);
