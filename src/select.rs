// SPDX-License-Identifier: MPL-2.0

//! SELECT readiness.

use bitflags::bitflags;

bitflags! {
    pub struct SelectOps: u8 {
        const READ = 0b001;
        const WRITE = 0b010;
        const ERROR = 0b100;
    }
}

impl Default for SelectOps {
    fn default() -> Self {
        SelectOps::empty()
    }
}
