pub mod connections;
pub mod notifications;
pub mod profiles;

pub use connections::{
    ChangeOp, Connection, ConnectionActionInput, ConnectionChange, ConnectionEntry,
    ConnectionFilter, ConnectionId, ConnectionList, ConnectionRow, ConnectionStatus, FeedEvent,
    NewConnection, SendRequestInput, UserId,
};
pub use notifications::{Notification, NotificationCategory};
pub use profiles::Profile;
