//! # Character Device Plumbing
//!
//! Types and service contracts a character driver is written against:
//!
//! | Item | Kernel counterpart |
//! |------|--------------------|
//! | [`DeviceNumber`], [`DeviceNumberRange`] | `dev_t`, `MKDEV`, a reserved minor range |
//! | [`File`], [`OpenFlags`] | `struct file`, `O_*` |
//! | [`FileOperations`] | `struct file_operations` |
//! | [`UeventEnv`], [`UeventHook`] | `struct kobj_uevent_env`, `class->dev_uevent` |
//! | [`ChrdevRegionAllocator`] | `alloc_chrdev_region` / `unregister_chrdev_region` |
//! | [`CdevRegistrar`] | `cdev_add` / `cdev_del` |
//! | [`DeviceClassRegistrar`] | `class_create` / `device_create` and their inverses |
//! | [`Errno`] | `errno.h` |
//!
//! The services are traits so drivers can be exercised against an in-memory
//! kernel; the registration order a driver follows is the usual one:
//!
//! ```text
//! alloc_chrdev_region ─► class_create ─► (cdev_add ─► device_create) × N
//! unregister_chrdev_region ◄─ class_destroy ◄─ (device_destroy ◄─ cdev_del) × N
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

mod cdev;
mod class;
mod dev_t;
mod errno;
mod error;
mod file;
mod region;
mod uevent;

pub use crate::cdev::{CdevId, CdevRegistrar};
pub use crate::class::{ClassId, DeviceClassRegistrar};
pub use crate::dev_t::{DeviceNumber, DeviceNumberRange, MAJOR_MAX, MINOR_BITS, MINOR_MAX};
pub use crate::errno::Errno;
pub use crate::error::ChrdevError;
pub use crate::file::{File, FileOperations, OpenFlags};
pub use crate::region::ChrdevRegionAllocator;
pub use crate::uevent::{
    DeviceInfo, UEVENT_BUFFER_SIZE, UEVENT_NUM_ENVP, UeventAction, UeventEnv, UeventError,
    UeventHook,
};
