pub mod connection;
pub mod messages;
pub mod receiver;

pub use connection::LiveStream;
pub use receiver::{LiveDeltaReceiver, LiveState};
