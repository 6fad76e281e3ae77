//! Overlay routing for Quire stores.
//!
//! [`OverlayStore`] wraps any [`quire_store::Store`] and presents the same
//! interface. Writes and most reads pass straight through. Board-scoped
//! reads (`get_blocks_for_board`, `get_members_for_board`) run through an
//! ordered chain of [`BoardReadInterceptor`]s, each able to pass, augment
//! or replace the result.
//!
//! The standard chain holds a single [`VirtualDriverInterceptor`], which
//! looks up a board's `virtual_driver` attribute in a [`DriverRegistry`]
//! and asks the named [`Driver`] for the board's content.

pub mod driver;
pub mod error;
pub mod interceptor;
pub mod registry;
pub mod store;
pub mod virtual_driver;

#[cfg(test)]
mod testing;

pub use driver::Driver;
pub use error::{DriverError, DriverResult, OverlayError};
pub use interceptor::{BoardReadInterceptor, Interception};
pub use registry::{DriverRegistry, DriverRegistryBuilder};
pub use store::OverlayStore;
pub use virtual_driver::VirtualDriverInterceptor;
