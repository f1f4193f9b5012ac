//! Reusable test fixtures.

pub mod loopback;

pub use loopback::LoopbackTransfer;
