pub mod collections;
mod redis;

pub use self::redis::{CacheError, RedisCache};
