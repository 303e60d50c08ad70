//! Utility re-exports and helper macros for the tank drive.
//!
//! This module re-exports the drive controller, slew limiting and command-link
//! components:
//!
//! - `connection`: text command grammar and fixed-capacity line buffering
//! - `controllers`: wheel axes, step pulse generation and the drive controller
//! - `math`: slew-rate limiting of wheel speed
//!
//! The `mk_static!` macro simplifies static initialization in no-std contexts.

pub mod connection;
pub mod controllers;
pub mod math;

pub use connection::CommandChannel;
pub use controllers::{DriveConfig, DriveController};
pub use math::slew;
#[doc(hidden)]
pub use static_cell;

#[macro_export]
/// Initialize a no-std static cell and write the given value into it.
///
/// This macro creates a `static_cell::StaticCell` for type `$t` and initializes
/// it with `$val`, returning a mutable reference to the stored value.
macro_rules! mk_static {
    ($t:ty, $val:expr) => {{
        static STATIC_CELL: $crate::utils::static_cell::StaticCell<$t> =
            $crate::utils::static_cell::StaticCell::new();
        STATIC_CELL.uninit().write($val)
    }};
}
