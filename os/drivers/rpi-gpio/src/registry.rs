//! # Device Instance Registry
//!
//! A fixed arena of [`MAX_MINOR_DEVS`] slots, one per minor. Each slot walks
//!
//! ```text
//! Unregistered ──cdev_add──► Registered ──device_create──► NodeCreated
//!        ▲                        │                            │
//!        └──── node failed ───────┘          destroy ──────────┴──► Destroyed
//! ```
//!
//! and [`DeviceRegistry::destroy`] only undoes the stages a slot actually
//! reached, so it is safe on any slot at any time.

use crate::Platform;
use crate::config::MAX_MINOR_DEVS;
use crate::error::RegistryError;
use crate::guards::DeviceClass;
use alloc::format;
use alloc::sync::Arc;
use kernel_chrdev::{CdevId, ClassId, DeviceNumber, FileOperations};
use log::{debug, warn};

/// Lifecycle of one slot.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum SlotState {
    #[default]
    Unregistered,
    /// The operations table is bound to the number, no node yet.
    Registered,
    /// Bound and visible as `/dev/<FAMILY>_<index>`.
    NodeCreated,
    Destroyed,
}

impl SlotState {
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Registered | Self::NodeCreated)
    }
}

/// One exposed device node.
#[derive(Copy, Clone, Debug, Default)]
pub struct DeviceInstance {
    index: usize,
    state: SlotState,
    devt: Option<DeviceNumber>,
    class: Option<ClassId>,
    cdev: Option<CdevId>,
}

impl DeviceInstance {
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub const fn state(&self) -> SlotState {
        self.state
    }

    /// Bound number; `None` until the slot has been created once.
    #[must_use]
    pub const fn devt(&self) -> Option<DeviceNumber> {
        self.devt
    }

    #[must_use]
    pub const fn class(&self) -> Option<ClassId> {
        self.class
    }
}

pub struct DeviceRegistry<P: Platform> {
    platform: Arc<P>,
    family: &'static str,
    slots: [DeviceInstance; MAX_MINOR_DEVS],
}

impl<P: Platform> DeviceRegistry<P> {
    #[must_use]
    pub fn new(platform: Arc<P>, family: &'static str) -> Self {
        Self {
            platform,
            family,
            slots: core::array::from_fn(|index| DeviceInstance {
                index,
                ..DeviceInstance::default()
            }),
        }
    }

    /// Bind `ops` to `devt` and create node `<FAMILY>_<index>` in `class`.
    ///
    /// # Errors
    /// - [`RegistryError::IndexOutOfRange`] / [`RegistryError::SlotInUse`]
    ///   for a bad slot,
    /// - [`RegistryError::RegistrationFailed`] if the binding fails,
    /// - [`RegistryError::NamespaceFailed`] if the node cannot be created;
    ///   the binding is undone first.
    ///
    /// The slot is left `Unregistered` on any failure after the checks.
    pub fn create(
        &mut self,
        index: usize,
        class: &DeviceClass<P>,
        devt: DeviceNumber,
        ops: Arc<dyn FileOperations>,
    ) -> Result<&DeviceInstance, RegistryError> {
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(RegistryError::IndexOutOfRange(index))?;
        if slot.state.is_live() {
            return Err(RegistryError::SlotInUse(index));
        }

        let cdev = self
            .platform
            .cdev_add(devt, 1, ops)
            .map_err(|source| RegistryError::RegistrationFailed { devt, source })?;
        *slot = DeviceInstance {
            index,
            state: SlotState::Registered,
            devt: Some(devt),
            class: Some(class.id()),
            cdev: Some(cdev),
        };
        debug!("{}_{index}: bound to {devt}", self.family);

        let name = format!("{}_{index}", self.family);
        if let Err(source) = self.platform.device_create(class.id(), devt, &name) {
            warn!("{name}: node creation failed: {source}");
            self.platform.cdev_del(cdev);
            *slot = DeviceInstance {
                index,
                devt: Some(devt),
                ..DeviceInstance::default()
            };
            return Err(RegistryError::NamespaceFailed { devt, source });
        }

        slot.state = SlotState::NodeCreated;
        debug!("{name}: node created");
        Ok(slot)
    }

    /// Remove the node and the binding of slot `index`, whatever of them
    /// exists. Out-of-range indices are ignored.
    pub fn destroy(&mut self, index: usize) {
        let Some(slot) = self.slots.get_mut(index) else {
            warn!("{}: no slot {index} to destroy", self.family);
            return;
        };

        if slot.state == SlotState::NodeCreated
            && let (Some(class), Some(devt)) = (slot.class, slot.devt)
        {
            self.platform.device_destroy(class, devt);
        }
        if let Some(cdev) = slot.cdev.take() {
            self.platform.cdev_del(cdev);
        }
        if slot.state.is_live() {
            debug!("{}_{index}: destroyed", self.family);
        }
        slot.class = None;
        slot.state = SlotState::Destroyed;
    }

    /// Destroy every slot, in index order.
    pub fn destroy_all(&mut self) {
        for index in 0..MAX_MINOR_DEVS {
            self.destroy(index);
        }
    }

    #[must_use]
    pub fn instance(&self, index: usize) -> Option<&DeviceInstance> {
        self.slots.get(index)
    }

    /// Live instance bound to `devt`.
    #[must_use]
    pub fn find(&self, devt: DeviceNumber) -> Option<&DeviceInstance> {
        self.iter().find(|i| i.devt == Some(devt))
    }

    /// Live instances in index order.
    pub fn iter(&self) -> impl Iterator<Item = &DeviceInstance> {
        self.slots.iter().filter(|s| s.state.is_live())
    }

    #[must_use]
    pub fn live_count(&self) -> usize {
        self.iter().count()
    }
}

impl<P: Platform> Drop for DeviceRegistry<P> {
    fn drop(&mut self) {
        if self.live_count() > 0 {
            self.destroy_all();
        }
    }
}
