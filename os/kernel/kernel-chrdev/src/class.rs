use crate::dev_t::DeviceNumber;
use crate::error::ChrdevError;
use crate::uevent::UeventHook;

/// Handle of a registered device class (`struct class *`).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ClassId(pub u64);

/// The driver model's class and device registry, which in turn drives
/// uevents and devtmpfs.
pub trait DeviceClassRegistrar {
    /// Register a class named `name` (`class_create`).
    ///
    /// # Errors
    /// [`ChrdevError::ClassExists`] if the name is taken.
    fn class_create(&self, name: &str) -> Result<ClassId, ChrdevError>;

    /// Install the class' `dev_uevent` hook, replacing any previous one.
    ///
    /// # Errors
    /// [`ChrdevError::NoSuchClass`] for a stale handle.
    fn class_set_uevent(&self, class: ClassId, hook: UeventHook) -> Result<(), ChrdevError>;

    /// Unregister a class (`class_destroy`). Stale handles are ignored.
    fn class_destroy(&self, class: ClassId);

    /// Create device `name` for `devt` under `class` and emit its `add`
    /// uevent (`device_create`).
    ///
    /// # Errors
    /// [`ChrdevError::NoSuchClass`], [`ChrdevError::DeviceExists`], or the
    /// hook's [`ChrdevError::Uevent`] failure, in which case no device is left.
    fn device_create(
        &self,
        class: ClassId,
        devt: DeviceNumber,
        name: &str,
    ) -> Result<(), ChrdevError>;

    /// Remove the device for `devt` and emit its `remove` uevent
    /// (`device_destroy`). Unknown devices are ignored.
    fn device_destroy(&self, class: ClassId, devt: DeviceNumber);
}
