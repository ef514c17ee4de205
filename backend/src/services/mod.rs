pub mod connections;
pub mod notices;
pub mod session_cache;

pub use connections::{ConnectionManager, DeletionOutcome, RetryPolicy};
pub use notices::Notices;
pub use session_cache::SessionCache;
