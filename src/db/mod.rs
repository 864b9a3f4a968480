pub mod redis;
pub mod store;

pub use self::redis::create_redis_client;
pub use self::redis::RedisStore;
pub use self::store::{KeyValueStore, MemoryStore, StoreKey};
