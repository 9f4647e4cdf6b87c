//! Sample data used by the demo binary and the integration tests.

pub mod ice_cream;

pub use ice_cream::{IceCream, IceCreamProperties, SupplierInformation, seed};
