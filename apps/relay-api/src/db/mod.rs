pub mod redis_store;
pub mod store;

pub use redis_store::RedisStore;
pub use store::{HistoryStore, MemoryStore, UnavailableStore};
