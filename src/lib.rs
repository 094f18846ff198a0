// SPDX-License-Identifier: MPL-2.0

//! Device-independent POSIX termios line discipline for a microkernel TTY
//! driver: dispatch loop, per-line state machine, input cooking
//! (`in_process`/`in_transfer`), output post-processing (`out_process`),
//! echo/erase/reprint discipline, VMIN/VTIME timers, and select/revive
//! readiness.

pub mod backend;
pub mod backends;
pub mod dispatcher;
pub mod echo;
pub mod error;
pub mod in_process;
pub mod in_transfer;
pub mod ioctl;
pub mod line;
pub mod message;
pub mod minors;
pub mod out_process;
pub mod output_ring;
pub mod ring;
pub mod select;
pub mod signal;
pub mod termios;
pub mod timers;
pub mod usermem;

pub use dispatcher::Driver;
pub use error::{Errno, Error, Result};
pub use minors::DriverConfig;
