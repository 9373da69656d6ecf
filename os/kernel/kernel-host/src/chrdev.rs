//! Device numbers, cdevs, classes and devices.

use crate::kernel::{
    CdevEntry, ClassEntry, DevNode, DeviceEntry, HostKernel, RegionEntry, UeventRecord,
};
use kernel_chrdev::{
    CdevId, CdevRegistrar, ChrdevError, ChrdevRegionAllocator, ClassId, DeviceClassRegistrar,
    DeviceInfo, DeviceNumber, DeviceNumberRange, FileOperations, UeventAction, UeventEnv,
    UeventHook,
};
use log::{debug, warn};
use std::sync::Arc;

/// Dynamic majors are handed out from the top of the extended range down.
pub const CHRDEV_MAJOR_DYN_EXT_START: u32 = 511;

/// Lowest dynamic major.
pub const CHRDEV_MAJOR_DYN_END: u32 = 234;

/// Mode devtmpfs gives a node when udev has nothing to say.
pub const DEFAULT_NODE_MODE: u32 = 0o600;

impl ChrdevRegionAllocator for HostKernel {
    fn alloc_chrdev_region(
        &self,
        base_minor: u32,
        count: u32,
        name: &str,
    ) -> Result<DeviceNumberRange, ChrdevError> {
        if self.faults().fail_alloc_region {
            return Err(ChrdevError::NoFreeMajor);
        }

        let mut state = self.state.lock();
        let major = (CHRDEV_MAJOR_DYN_END..=CHRDEV_MAJOR_DYN_EXT_START)
            .rev()
            .find(|major| state.regions.iter().all(|r| r.range.major() != *major))
            .ok_or(ChrdevError::NoFreeMajor)?;

        let first = DeviceNumber::mkdev(major, base_minor).ok_or(ChrdevError::InvalidRange)?;
        let range = DeviceNumberRange::new(first, count).ok_or(ChrdevError::InvalidRange)?;
        state.regions.push(RegionEntry {
            range,
            name: name.to_owned(),
        });
        debug!("chrdev: reserved {range} for {name}");
        Ok(range)
    }

    fn unregister_chrdev_region(&self, range: DeviceNumberRange) {
        let mut state = self.state.lock();
        let before = state.regions.len();
        state.regions.retain(|r| r.range != range);
        if state.regions.len() == before {
            warn!("chrdev: releasing unknown range {range}");
        } else {
            debug!("chrdev: released {range}");
        }
    }
}

impl CdevRegistrar for HostKernel {
    fn cdev_add(
        &self,
        devt: DeviceNumber,
        count: u32,
        fops: Arc<dyn FileOperations>,
    ) -> Result<CdevId, ChrdevError> {
        if self.faults().fail_cdev_add_at_minor == Some(devt.minor()) {
            return Err(ChrdevError::OutOfMemory);
        }

        let range = DeviceNumberRange::new(devt, count).ok_or(ChrdevError::InvalidRange)?;
        let mut state = self.state.lock();
        if state.cdevs.values().any(|c| c.range.overlaps(&range)) {
            return Err(ChrdevError::CdevBusy(devt));
        }
        let id = CdevId(state.next_id());
        state.cdevs.insert(id, CdevEntry { range, fops });
        Ok(id)
    }

    fn cdev_del(&self, cdev: CdevId) {
        if self.state.lock().cdevs.remove(&cdev).is_none() {
            warn!("chrdev: deleting unknown cdev {cdev:?}");
        }
    }
}

impl DeviceClassRegistrar for HostKernel {
    fn class_create(&self, name: &str) -> Result<ClassId, ChrdevError> {
        if self.faults().fail_class_create {
            return Err(ChrdevError::OutOfMemory);
        }

        let mut state = self.state.lock();
        if state.classes.values().any(|c| c.name == name) {
            return Err(ChrdevError::ClassExists);
        }
        let id = ClassId(state.next_id());
        state.classes.insert(
            id,
            ClassEntry {
                name: name.to_owned(),
                hook: None,
            },
        );
        debug!("class: created {name}");
        Ok(id)
    }

    fn class_set_uevent(&self, class: ClassId, hook: UeventHook) -> Result<(), ChrdevError> {
        let mut state = self.state.lock();
        let entry = state.classes.get_mut(&class).ok_or(ChrdevError::NoSuchClass)?;
        entry.hook = Some(hook);
        Ok(())
    }

    fn class_destroy(&self, class: ClassId) {
        let mut state = self.state.lock();
        let Some(entry) = state.classes.remove(&class) else {
            warn!("class: destroying unknown class {class:?}");
            return;
        };
        let orphans = state.devices.values().filter(|d| d.class == class).count();
        if orphans > 0 {
            warn!("class: {} destroyed with {orphans} devices left", entry.name);
        }
        debug!("class: destroyed {}", entry.name);
    }

    fn device_create(
        &self,
        class: ClassId,
        devt: DeviceNumber,
        name: &str,
    ) -> Result<(), ChrdevError> {
        if self.faults().fail_device_create_at_minor == Some(devt.minor()) {
            return Err(ChrdevError::OutOfMemory);
        }

        let (class_name, hook) = {
            let state = self.state.lock();
            let entry = state.classes.get(&class).ok_or(ChrdevError::NoSuchClass)?;
            if state.devices.contains_key(&devt) || state.nodes.contains_key(name) {
                return Err(ChrdevError::DeviceExists(devt));
            }
            (entry.name.clone(), entry.hook.clone())
        };

        let info = DeviceInfo {
            devt,
            name: name.to_owned(),
            class: class_name,
        };
        // The hook is driver code; run it without holding the state lock.
        let env = build_uevent(UeventAction::Add, &info, hook.as_ref())?;
        let mode = env
            .get("DEVMODE")
            .and_then(|m| u32::from_str_radix(m, 8).ok())
            .unwrap_or(DEFAULT_NODE_MODE);

        let mut state = self.state.lock();
        state.devices.insert(
            devt,
            DeviceEntry {
                class,
                name: info.name.clone(),
            },
        );
        state.nodes.insert(info.name.clone(), DevNode { devt, mode });
        state.uevents.push(UeventRecord {
            action: UeventAction::Add,
            devt,
            env,
        });
        debug!("device: created /dev/{name} ({devt}) mode {mode:04o}");
        Ok(())
    }

    fn device_destroy(&self, class: ClassId, devt: DeviceNumber) {
        let (info, hook) = {
            let mut state = self.state.lock();
            let known = state.devices.get(&devt).is_some_and(|d| d.class == class);
            if !known {
                warn!("device: destroying unknown device {devt}");
                return;
            }
            let Some(device) = state.devices.remove(&devt) else {
                return;
            };
            state.nodes.remove(&device.name);
            let class_entry = state.classes.get(&class);
            let info = DeviceInfo {
                devt,
                name: device.name,
                class: class_entry.map(|c| c.name.clone()).unwrap_or_default(),
            };
            (info, class_entry.and_then(|c| c.hook.clone()))
        };

        match build_uevent(UeventAction::Remove, &info, hook.as_ref()) {
            Ok(env) => self.state.lock().uevents.push(UeventRecord {
                action: UeventAction::Remove,
                devt,
                env,
            }),
            Err(e) => warn!("device: remove uevent for {} failed: {e}", info.name),
        }
        debug!("device: destroyed /dev/{} ({devt})", info.name);
    }
}

/// The environment `device_add`/`device_del` emit, class hook last.
fn build_uevent(
    action: UeventAction,
    info: &DeviceInfo,
    hook: Option<&UeventHook>,
) -> Result<UeventEnv, ChrdevError> {
    let mut env = UeventEnv::new();
    env.add_var(format_args!("ACTION={}", action.as_str()))?;
    env.add_var(format_args!("DEVPATH=/devices/virtual/{}/{}", info.class, info.name))?;
    env.add_var(format_args!("SUBSYSTEM={}", info.class))?;
    env.add_var(format_args!("MAJOR={}", info.devt.major()))?;
    env.add_var(format_args!("MINOR={}", info.devt.minor()))?;
    env.add_var(format_args!("DEVNAME={}", info.name))?;
    if let Some(hook) = hook {
        hook(info, &mut env)?;
    }
    Ok(env)
}
