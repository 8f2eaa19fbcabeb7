//! Service layer.
//!
//! - [`Bootstrap`]: connects the backend's dependencies at startup.

mod bootstrap;

pub use bootstrap::{Bootstrap, BootstrapReport};
