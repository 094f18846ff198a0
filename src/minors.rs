// SPDX-License-Identifier: MPL-2.0

//! Minor device numbering.

/// Tunable device-class sizes, supplied at `Driver` construction rather
/// than baked in as constants.
#[derive(Debug, Clone, Copy)]
pub struct DriverConfig {
    pub cons_minor: u32,
    pub nr_cons: u32,
    pub rs232_minor: u32,
    pub nr_rs_lines: u32,
    pub ttypx_minor: u32,
    pub ptypx_minor: u32,
    pub nr_ptys: u32,
    pub input_ring_capacity: usize,
    pub output_ring_capacity: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            cons_minor: 0,
            nr_cons: 4,
            rs232_minor: 16,
            nr_rs_lines: 2,
            ttypx_minor: 128,
            ptypx_minor: 192,
            nr_ptys: 32,
            input_ring_capacity: 1024,
            output_ring_capacity: 2048,
        }
    }
}

/// The device class a minor number resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass {
    Console,
    /// Console minor 0, write-only (opens with read permission fail with
    /// EACCES), requests otherwise forwarded to the same line as console 0.
    Log,
    Serial,
    PtyTerminal,
    PtyMaster,
}

/// Resolves `minor` against `config`'s device-class ranges, returning the
/// class and the dense per-class line-table index. `None` if the minor is
/// unconfigured (`ENXIO`).
pub fn resolve(config: &DriverConfig, minor: u32) -> Option<(LineClass, usize)> {
    if minor == config.cons_minor {
        return Some((LineClass::Log, 0));
    }
    if minor >= config.cons_minor && minor < config.cons_minor + config.nr_cons {
        return Some((LineClass::Console, (minor - config.cons_minor) as usize));
    }
    if minor >= config.rs232_minor && minor < config.rs232_minor + config.nr_rs_lines {
        return Some((LineClass::Serial, (minor - config.rs232_minor) as usize));
    }
    if minor >= config.ttypx_minor && minor < config.ttypx_minor + config.nr_ptys {
        return Some((LineClass::PtyTerminal, (minor - config.ttypx_minor) as usize));
    }
    if minor >= config.ptypx_minor && minor < config.ptypx_minor + config.nr_ptys {
        return Some((LineClass::PtyMaster, (minor - config.ptypx_minor) as usize));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minor_zero_is_the_log_device() {
        let config = DriverConfig::default();
        assert_eq!(resolve(&config, 0), Some((LineClass::Log, 0)));
    }

    #[test]
    fn console_range_resolves_to_dense_index() {
        let config = DriverConfig::default();
        assert_eq!(resolve(&config, 2), Some((LineClass::Console, 2)));
    }

    #[test]
    fn unconfigured_minor_is_none() {
        let config = DriverConfig::default();
        assert_eq!(resolve(&config, 9999), None);
    }

    #[test]
    fn pty_master_and_terminal_ranges_are_distinct() {
        let config = DriverConfig::default();
        assert_eq!(resolve(&config, config.ttypx_minor + 1), Some((LineClass::PtyTerminal, 1)));
        assert_eq!(resolve(&config, config.ptypx_minor + 1), Some((LineClass::PtyMaster, 1)));
    }
}
