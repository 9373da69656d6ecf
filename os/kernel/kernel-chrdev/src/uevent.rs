//! # Uevents
//!
//! Every device added to or removed from a class emits a uevent whose
//! environment (`KEY=value` strings) reaches user space. A class may install
//! a hook (`dev_uevent`) that appends its own variables; devtmpfs honors
//! `DEVMODE` when it creates the node.

use crate::dev_t::DeviceNumber;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt::{self, Write};

/// Maximum number of variables in one environment (`UEVENT_NUM_ENVP`).
pub const UEVENT_NUM_ENVP: usize = 64;

/// Maximum total size of one environment, NUL terminators included
/// (`UEVENT_BUFFER_SIZE`).
pub const UEVENT_BUFFER_SIZE: usize = 2048;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum UeventAction {
    Add,
    Remove,
}

impl UeventAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UeventError {
    #[error("too many uevent variables")]
    TooManyVariables,
    #[error("uevent buffer size too small")]
    BufferFull,
    #[error("uevent suppressed by class hook")]
    Suppressed,
}

/// The device a uevent is about.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeviceInfo {
    pub devt: DeviceNumber,
    /// Node name, e.g. `RPI_GPIO_2`.
    pub name: String,
    /// Name of the class the device belongs to.
    pub class: String,
}

/// A uevent environment under construction (`struct kobj_uevent_env`).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UeventEnv {
    vars: Vec<String>,
    buflen: usize,
}

impl UeventEnv {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            vars: Vec::new(),
            buflen: 0,
        }
    }

    /// Append a formatted `KEY=value` variable (`add_uevent_var`).
    ///
    /// # Errors
    /// Fails without modifying the environment once either limit is hit.
    pub fn add_var(&mut self, args: fmt::Arguments<'_>) -> Result<(), UeventError> {
        if self.vars.len() >= UEVENT_NUM_ENVP {
            log::warn!("add_uevent_var: too many keys");
            return Err(UeventError::TooManyVariables);
        }

        let mut var = String::new();
        var.write_fmt(args).map_err(|_| UeventError::BufferFull)?;
        if self.buflen + var.len() + 1 > UEVENT_BUFFER_SIZE {
            log::warn!("add_uevent_var: buffer size too small");
            return Err(UeventError::BufferFull);
        }

        self.buflen += var.len() + 1;
        self.vars.push(var);
        Ok(())
    }

    /// Value of the first variable named `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.iter().find_map(|var| {
            let (k, v) = var.split_once('=')?;
            (k == key).then_some(v)
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.vars.iter().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Bytes used so far, NUL terminators included.
    #[must_use]
    pub const fn buflen(&self) -> usize {
        self.buflen
    }
}

/// A class `dev_uevent` hook.
pub type UeventHook =
    Arc<dyn Fn(&DeviceInfo, &mut UeventEnv) -> Result<(), UeventError> + Send + Sync>;
