pub mod driver;

pub use driver::{RedisKeyStore, RedisParams};
