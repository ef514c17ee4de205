// =============================================================================
// SkillSwap Backend Constants
// =============================================================================
// This file contains all constants used throughout the backend to enable
// easy tuning and configuration from a single location.

// =============================================================================
// DELETE VERIFICATION
// =============================================================================

/// Total delete attempts (first delete plus retries) before giving up
pub const DELETE_VERIFY_MAX_ATTEMPTS: u32 = 3;

/// Pause between a failed verification read and the next delete attempt
pub const DELETE_VERIFY_BACKOFF_MS: u64 = 150;

// =============================================================================
// CHANGE FEED
// =============================================================================

/// Postgres NOTIFY channel written by the connections trigger
pub const CONNECTION_CHANGES_CHANNEL: &str = "connection_changes";

/// Buffered change events per subscriber before it is considered lagged
pub const CHANGE_FEED_CAPACITY: usize = 256;

/// How long to wait before re-establishing a dropped LISTEN connection
pub const CHANGE_FEED_RECONNECT_SECS: u64 = 5;

// =============================================================================
// SESSION CACHE
// =============================================================================

/// Most users whose connection lists are held at once
pub const SESSION_CACHE_MAX_USERS: u64 = 10_000;

/// A cached list is dropped after this long without a read
pub const SESSION_CACHE_IDLE_SECS: u64 = 15 * 60;

// =============================================================================
// NOTIFICATIONS
// =============================================================================

/// Deep link for the incoming requests tab
pub const REQUESTS_LINK: &str = "/connections?tab=requests";

/// Deep link for the connections page
pub const CONNECTIONS_LINK: &str = "/connections";

/// Deep link prefix for a user's profile page
pub const PROFILE_LINK_PREFIX: &str = "/profile/";

/// Display name used when a profile row is missing
pub const UNKNOWN_USER_NAME: &str = "Someone";

// =============================================================================
// SWEEPER
// =============================================================================

/// Default pause between legacy declined-row sweeps
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

// =============================================================================
// SERVER CONFIGURATION
// =============================================================================

/// Default server port if not specified in environment
pub const DEFAULT_SERVER_PORT: u16 = 3000;

/// Default Postgres pool size
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

/// Header carrying the authenticated user id, set by the upstream auth layer
pub const USER_ID_HEADER: &str = "x-user-id";
