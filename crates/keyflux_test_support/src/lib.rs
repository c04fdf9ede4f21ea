pub mod containers;
pub mod fake_store;
pub mod fixtures;

pub use fake_store::{FakeKeyStore, FakeKeyStoreStats, ScanOrder};
