//! # Driver Lifecycle
//!
//! ```text
//! Uninitialized ─► NumbersAllocated ─► ClassCreated ─► InstancesPopulated(k) ─► Running
//!                                                                                  │
//! Uninitialized ◄─ NumbersReleased ◄─ Unregistering ◄──────────────────────────────┘
//! ```
//!
//! [`GpioDriver::start`] acquires the number region, the class and the four
//! instances as owning guards. If any stage fails the guards acquired so far
//! drop in reverse order, so a failed start leaves nothing registered.

use crate::Platform;
use crate::config::{BASE_MINOR, DriverConfig, MAX_MINOR_DEVS};
use crate::error::{GpioError, RegistryError};
use crate::fops::{GpioFileOps, devmode_hook};
use crate::guards::{DeviceClass, DeviceNumbers};
use crate::registry::DeviceRegistry;
use alloc::sync::Arc;
use core::fmt;
use kernel_chrdev::{ChrdevError, ClassId, DeviceNumberRange, FileOperations};
use log::{debug, info, warn};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DriverState {
    Uninitialized,
    NumbersAllocated,
    ClassCreated,
    /// `k` instances created so far.
    InstancesPopulated(usize),
    Running,
    Unregistering,
    NumbersReleased,
}

/// A running driver.
///
/// Fields drop in declaration order: instances, then the class, then the
/// number region.
pub struct GpioDriver<P: Platform> {
    registry: DeviceRegistry<P>,
    class: DeviceClass<P>,
    numbers: DeviceNumbers<P>,
    fops: Arc<GpioFileOps<P>>,
    state: DriverState,
}

impl<P: Platform> fmt::Debug for GpioDriver<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpioDriver")
            .field("state", &self.state)
            .field("numbers", &self.numbers.range())
            .field("class", &self.class.id())
            .field("live", &self.registry.live_count())
            .finish()
    }
}

impl<P: Platform> GpioDriver<P> {
    /// Register the number region, the class and every instance.
    ///
    /// # Errors
    /// The first failing stage, after everything acquired before it has
    /// been released again.
    pub fn start(platform: Arc<P>, config: DriverConfig) -> Result<Self, GpioError> {
        let name = config.name;
        let mode = config.mode;
        let mut state = DriverState::Uninitialized;

        #[allow(clippy::cast_possible_truncation)]
        let numbers = DeviceNumbers::allocate(&platform, BASE_MINOR, MAX_MINOR_DEVS as u32, name)
            .map_err(|e| {
                warn!("{name}: failed to allocate device numbers: {e}");
                GpioError::AllocationFailed(e)
            })?;
        if numbers.range().count() as usize != MAX_MINOR_DEVS {
            warn!(
                "{name}: got {} device numbers, need {MAX_MINOR_DEVS}",
                numbers.range().count()
            );
            return Err(GpioError::AllocationFailed(ChrdevError::InvalidRange));
        }
        transition(name, &mut state, DriverState::NumbersAllocated);

        let class = DeviceClass::create(&platform, name).map_err(|e| {
            warn!("{name}: failed to create the device class: {e}");
            GpioError::ClassCreationFailed(e)
        })?;
        class.set_uevent(devmode_hook(mode)).map_err(|e| {
            warn!("{name}: failed to install the uevent hook: {e}");
            GpioError::ClassCreationFailed(e)
        })?;
        transition(name, &mut state, DriverState::ClassCreated);

        let fops = Arc::new(GpioFileOps::new(Arc::clone(&platform), config));
        let mut registry = DeviceRegistry::new(platform, name);
        let range = numbers.range();
        for index in 0..MAX_MINOR_DEVS {
            let ops: Arc<dyn FileOperations> = fops.clone();
            let created = u32::try_from(index)
                .ok()
                .and_then(|i| range.nth(i))
                .ok_or(RegistryError::IndexOutOfRange(index))
                .and_then(|devt| registry.create(index, &class, devt, ops).map(|_| ()));
            if let Err(source) = created {
                warn!("{name}: instance {index} failed, rolling back: {source}");
                return Err(GpioError::PartialInitFailure {
                    populated: index,
                    source,
                });
            }
            transition(name, &mut state, DriverState::InstancesPopulated(index + 1));
        }

        transition(name, &mut state, DriverState::Running);
        info!("{name}: Device init successful (major {})", range.major());
        Ok(Self {
            registry,
            class,
            numbers,
            fops,
            state,
        })
    }

    /// Destroy every instance, then the class, then release the numbers.
    pub fn stop(self) {
        let Self {
            mut registry,
            class,
            numbers,
            fops,
            mut state,
        } = self;
        let name = class.name();

        transition(name, &mut state, DriverState::Unregistering);
        registry.destroy_all();
        drop(registry);
        drop(class);
        drop(numbers);
        transition(name, &mut state, DriverState::NumbersReleased);
        drop(fops);
        transition(name, &mut state, DriverState::Uninitialized);
        info!("{name}: Device exit successful");
    }

    #[must_use]
    pub const fn state(&self) -> DriverState {
        self.state
    }

    #[must_use]
    pub const fn numbers(&self) -> DeviceNumberRange {
        self.numbers.range()
    }

    #[must_use]
    pub const fn major(&self) -> u32 {
        self.numbers.range().major()
    }

    #[must_use]
    pub const fn class(&self) -> ClassId {
        self.class.id()
    }

    #[must_use]
    pub const fn registry(&self) -> &DeviceRegistry<P> {
        &self.registry
    }

    #[must_use]
    pub fn file_operations(&self) -> &GpioFileOps<P> {
        &self.fops
    }
}

fn transition(name: &str, state: &mut DriverState, next: DriverState) {
    debug!("{name}: {state:?} -> {next:?}");
    *state = next;
}

/// Module load/unload entry points around a [`GpioDriver`].
pub struct GpioModule<P: Platform> {
    platform: Arc<P>,
    config: DriverConfig,
    driver: Option<GpioDriver<P>>,
}

impl<P: Platform> GpioModule<P> {
    #[must_use]
    pub const fn new(platform: Arc<P>, config: DriverConfig) -> Self {
        Self {
            platform,
            config,
            driver: None,
        }
    }

    /// `module_init`.
    ///
    /// # Errors
    /// [`GpioError::AlreadyRunning`] if loaded twice, otherwise the start
    /// error.
    pub fn init(&mut self) -> Result<(), GpioError> {
        if self.driver.is_some() {
            return Err(GpioError::AlreadyRunning);
        }
        let driver = GpioDriver::start(Arc::clone(&self.platform), self.config.clone())?;
        self.driver = Some(driver);
        Ok(())
    }

    /// `module_exit`. Does nothing if the driver is not running.
    pub fn exit(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.stop();
        }
    }

    #[must_use]
    pub fn state(&self) -> DriverState {
        self.driver
            .as_ref()
            .map_or(DriverState::Uninitialized, GpioDriver::state)
    }

    #[must_use]
    pub const fn driver(&self) -> Option<&GpioDriver<P>> {
        self.driver.as_ref()
    }
}

impl<P: Platform> Drop for GpioModule<P> {
    fn drop(&mut self) {
        self.exit();
    }
}
