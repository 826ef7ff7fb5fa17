//! Helpers for tests that need a real MySQL server.

pub mod container;

pub use container::MySQLContainer;
