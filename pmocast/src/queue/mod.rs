mod session;
mod snapshot;
mod sync;

pub use session::{SessionEntry, SessionState};
pub use snapshot::{QueuedTrack, SessionSnapshot};
pub use sync::{Placement, QueueSynchronizer};
