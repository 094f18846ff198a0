// SPDX-License-Identifier: MPL-2.0

//! The virtual-to-physical memory copy primitive, modeled as a narrow
//! trait so `do_read`/`do_write` can surface `EFAULT` without this
//! crate knowing anything about address spaces.

use crate::error::{Errno, Result};
use crate::return_errno_with_message;

pub trait UserMemory: Send {
    fn copy_to_user(&mut self, offset: usize, data: &[u8]) -> Result<()>;
    fn copy_from_user(&mut self, offset: usize, buf: &mut [u8]) -> Result<()>;
}

/// In-memory stand-in used by tests and the demo binary: a plain `Vec<u8>`
/// that never faults unless explicitly told to.
pub struct VecUserMemory {
    pub buf: Vec<u8>,
    pub fault: bool,
}

impl VecUserMemory {
    pub fn new(len: usize) -> Self {
        VecUserMemory { buf: vec![0u8; len], fault: false }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        VecUserMemory { buf: bytes.to_vec(), fault: false }
    }
}

impl UserMemory for VecUserMemory {
    fn copy_to_user(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        if self.fault {
            return_errno_with_message!(Errno::EFAULT, "simulated unmappable user buffer");
        }
        let end = offset + data.len();
        if end > self.buf.len() {
            self.buf.resize(end, 0);
        }
        self.buf[offset..end].copy_from_slice(data);
        Ok(())
    }

    fn copy_from_user(&mut self, offset: usize, buf: &mut [u8]) -> Result<()> {
        if self.fault {
            return_errno_with_message!(Errno::EFAULT, "simulated unmappable user buffer");
        }
        let end = offset + buf.len();
        if end > self.buf.len() {
            return_errno_with_message!(Errno::EFAULT, "read past end of user buffer");
        }
        buf.copy_from_slice(&self.buf[offset..end]);
        Ok(())
    }
}
