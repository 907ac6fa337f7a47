pub mod db;
pub mod redis;

pub use db::{DATABASE_NAME, connect_to_mongo};
pub use redis::{RedisService, connect_to_redis};
