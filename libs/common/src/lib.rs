pub mod id;
pub mod message;

pub use message::Message;
