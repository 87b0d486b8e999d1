//! hvprog-core - High-voltage in-circuit programming engine
//!
//! This crate implements the programming engine of a USB-attached
//! high-voltage programmer: automatic detection of the target's wiring
//! variant (full parallel bus, short bus, serial high-voltage), the
//! signal-level protocol drivers for each variant, paged flash write
//! buffering with extended-address tracking, and the streaming session
//! state machine behind the transport's setup/read-chunk/write-chunk
//! contract. It is `no_std` so it runs on the programmer's own
//! microcontroller; the `std` feature is for host-side testing.
//!
//! # Features
//!
//! - `std` - Standard library support (error trait integration)
//! - `embedded-hal` - Adapter implementing the port trait over
//!   `embedded-hal` 1.0 pins
//!
//! # Example
//!
//! ```ignore
//! use hvprog_core::{Session, port::TargetPort};
//!
//! fn serve<P: TargetPort>(port: P) {
//!     let mut session = Session::new(port);
//!     // transport loop: session.setup(..) / read_chunk(..) / write_chunk(..)
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "std")]
extern crate std;

pub mod alt;
pub mod detect;
pub mod error;
pub mod fuse;
#[cfg(feature = "embedded-hal")]
pub mod hal;
pub mod port;
pub mod protocol;
pub mod request;
pub mod session;
pub mod timing;

pub use error::{Error, Result};
pub use protocol::DeviceVariant;
pub use request::{Reply, Request};
pub use session::{Session, SessionState, WriteStatus};
pub use timing::Timings;
