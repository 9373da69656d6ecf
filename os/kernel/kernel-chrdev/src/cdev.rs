use crate::dev_t::DeviceNumber;
use crate::error::ChrdevError;
use crate::file::FileOperations;
use alloc::sync::Arc;

/// Handle of a registered character device (`struct cdev`).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct CdevId(pub u64);

/// Binds file operations to device numbers so `open` can find them.
pub trait CdevRegistrar {
    /// Make `count` numbers starting at `devt` live (`cdev_init` + `cdev_add`).
    ///
    /// # Errors
    /// [`ChrdevError::CdevBusy`] if any of the numbers is already bound.
    fn cdev_add(
        &self,
        devt: DeviceNumber,
        count: u32,
        fops: Arc<dyn FileOperations>,
    ) -> Result<CdevId, ChrdevError>;

    /// Unbind a device (`cdev_del`). Open files keep their operations.
    fn cdev_del(&self, cdev: CdevId);
}
