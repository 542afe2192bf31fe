//! Message routing between the cores, memory and the device side.

/// Device-side router.
pub mod pch;
/// CPU-side router.
pub mod uncore;

pub use pch::PlatformControlHub;
pub use uncore::Uncore;

use thiserror::Error;

use crate::memory::Word;

/// Rejected hub configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RouteError {
    /// Devices must be attached in strictly increasing base-address order.
    #[error("device base {base} does not follow previous base {previous}")]
    NonMonotonicBase {
        /// Base of the rejected device.
        base: Word,
        /// Base of the last attached device.
        previous: Word,
    },
}
