//! Owning handles for the driver-wide resources. Each releases its resource
//! on drop, so a failed start unwinds by returning early.

use crate::Platform;
use alloc::sync::Arc;
use kernel_chrdev::{ChrdevError, ClassId, DeviceNumberRange, UeventHook};
use log::debug;

/// An allocated device number region.
pub struct DeviceNumbers<P: Platform> {
    platform: Arc<P>,
    range: DeviceNumberRange,
}

impl<P: Platform> DeviceNumbers<P> {
    /// # Errors
    /// Whatever the region allocator reports.
    pub fn allocate(
        platform: &Arc<P>,
        base_minor: u32,
        count: u32,
        name: &str,
    ) -> Result<Self, ChrdevError> {
        let range = platform.alloc_chrdev_region(base_minor, count, name)?;
        debug!(
            "{name}: allocated major {} minors {}..{}",
            range.major(),
            range.base_minor(),
            range.base_minor() + range.count()
        );
        Ok(Self {
            platform: Arc::clone(platform),
            range,
        })
    }

    #[must_use]
    pub const fn range(&self) -> DeviceNumberRange {
        self.range
    }
}

impl<P: Platform> Drop for DeviceNumbers<P> {
    fn drop(&mut self) {
        self.platform.unregister_chrdev_region(self.range);
        debug!("released major {}", self.range.major());
    }
}

/// A registered device class.
pub struct DeviceClass<P: Platform> {
    platform: Arc<P>,
    id: ClassId,
    name: &'static str,
}

impl<P: Platform> DeviceClass<P> {
    /// # Errors
    /// Whatever the class registrar reports.
    pub fn create(platform: &Arc<P>, name: &'static str) -> Result<Self, ChrdevError> {
        let id = platform.class_create(name)?;
        debug!("{name}: class created");
        Ok(Self {
            platform: Arc::clone(platform),
            id,
            name,
        })
    }

    /// Install the naming-event hook of the class.
    ///
    /// # Errors
    /// Whatever the class registrar reports.
    pub fn set_uevent(&self, hook: UeventHook) -> Result<(), ChrdevError> {
        self.platform.class_set_uevent(self.id, hook)
    }

    #[must_use]
    pub const fn id(&self) -> ClassId {
        self.id
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<P: Platform> Drop for DeviceClass<P> {
    fn drop(&mut self) {
        self.platform.class_destroy(self.id);
        debug!("{}: class destroyed", self.name);
    }
}
