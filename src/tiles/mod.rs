pub mod fetch;
pub mod memory;
pub mod source;
pub mod store;
pub mod transport;
