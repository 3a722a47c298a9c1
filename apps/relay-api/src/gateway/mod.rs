pub mod coordinator;
pub mod dispatch;
pub mod events;
pub mod fanout;
pub mod server;
pub mod session;
