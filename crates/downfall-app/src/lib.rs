// Downfall companion runtime: gated pollers, automation engines, and the
// configuration context that ties them together.

pub mod connection;
pub mod dodge;
pub mod live_match;
pub mod lock;
pub mod logging;
pub mod party;
pub mod poller;
pub mod runtime;
pub mod session;
pub mod store;

#[cfg(test)]
mod test_support;

pub use runtime::Companion;
pub use store::ConfigStore;
