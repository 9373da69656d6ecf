//! # Kernel Log Buffer
//!
//! A `log::Log` sink modeled on the kernel's `printk` ring: every record is
//! formatted once into a `[LEVEL] target: message` line and appended to a
//! bounded in-memory buffer that can be read back with [`dmesg`]. An optional
//! console hook receives each line as it is written, the way a serial
//! console would.
//!
//! ## Usage
//!
//! ```rust
//! use kernel_printk::PrintkLogger;
//! use log::{LevelFilter, info};
//!
//! // Early in initialization; a second call reports `SetLoggerError`.
//! let _ = PrintkLogger::new(LevelFilter::Debug).init();
//!
//! info!(target: "rpi_gpio", "Device open");
//! assert!(kernel_printk::dmesg().iter().any(|l| l == "[INFO] rpi_gpio: Device open"));
//! ```
//!
//! ## `enabled` Feature (default)
//!
//! Without it the logger still installs but discards every record, so
//! callers need no conditional compilation of their own.
//!
//! ## Capacity
//!
//! The ring keeps the newest [`LOG_BUF_LINES`] lines. Older lines are
//! dropped and counted, see [`dropped_lines`].

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

mod logger;
mod ring;

pub use logger::PrintkLogger;
pub use ring::{LOG_BUF_LINES, dmesg, dmesg_clear, dropped_lines};
