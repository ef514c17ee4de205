pub mod change_feed;
pub mod connection;
pub mod connections;
pub mod memory;
pub mod migrations;
pub mod notifications;
pub mod ports;
pub mod profiles;

pub use change_feed::PgChangeFeed;
pub use connection::{get_db_pool, DatabaseConfig};
pub use connections::PgConnectionStore;
pub use notifications::PgNotificationSink;
pub use ports::{ChangeFeed, ConnectionStore, NotificationSink, ProfileDirectory};
pub use profiles::PgProfileDirectory;
