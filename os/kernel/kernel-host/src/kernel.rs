use crate::config::{FaultPlan, HostArch, HostConfig};
use kernel_chrdev::{
    CdevId, ClassId, DeviceNumber, DeviceNumberRange, FileOperations, UeventAction, UeventEnv,
    UeventHook,
};
use kernel_memory_addresses::PAGE_SIZE;
use kernel_vmem::{
    Arm64MemoryPolicy, MmId, PassThroughPolicy, PfnMapping, ProtectionPolicy,
};
use spin::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

pub(crate) struct RegionEntry {
    pub range: DeviceNumberRange,
    pub name: String,
}

pub(crate) struct ClassEntry {
    pub name: String,
    pub hook: Option<UeventHook>,
}

pub(crate) struct DeviceEntry {
    pub class: ClassId,
    pub name: String,
}

pub(crate) struct CdevEntry {
    pub range: DeviceNumberRange,
    pub fops: Arc<dyn FileOperations>,
}

/// A node as seen under `/dev` once udev applied the uevent.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DevNode {
    pub devt: DeviceNumber,
    /// Permission bits; `0600` unless the uevent carried `DEVMODE`.
    pub mode: u32,
}

/// A uevent as delivered to user space.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UeventRecord {
    pub action: UeventAction,
    pub devt: DeviceNumber,
    pub env: UeventEnv,
}

#[derive(Default)]
pub(crate) struct HostState {
    pub regions: Vec<RegionEntry>,
    pub classes: BTreeMap<ClassId, ClassEntry>,
    pub devices: BTreeMap<DeviceNumber, DeviceEntry>,
    pub nodes: BTreeMap<String, DevNode>,
    pub uevents: Vec<UeventRecord>,
    pub cdevs: BTreeMap<CdevId, CdevEntry>,
    pub mms: BTreeSet<MmId>,
    /// Leaf entries per address space, keyed by virtual page number.
    pub page_tables: BTreeMap<MmId, BTreeMap<u64, PfnMapping>>,
    pub next_id: u64,
}

impl HostState {
    pub fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// The in-memory kernel.
///
/// Implements every service contract a character driver consumes and keeps
/// enough bookkeeping to inspect the result: reserved device numbers,
/// classes, devices and their `/dev` nodes, uevents, bound cdevs, page
/// tables and physical memory.
///
/// ```rust
/// # use kernel_host::{HostConfig, HostKernel};
/// # use kernel_chrdev::ChrdevRegionAllocator;
/// let kernel = HostKernel::new(HostConfig::default());
/// let range = kernel.alloc_chrdev_region(0, 4, "demo").unwrap();
/// assert_eq!(range.major(), 511);
/// assert_eq!(kernel.allocated_regions(), vec![range]);
/// ```
pub struct HostKernel {
    pub(crate) config: HostConfig,
    pub(crate) policy: ProtectionPolicy,
    pub(crate) faults: Mutex<FaultPlan>,
    pub(crate) state: Mutex<HostState>,
    /// Sparse physical memory, one zero-filled page per touched frame.
    pub(crate) phys: Mutex<BTreeMap<u64, Box<[u8]>>>,
}

impl HostKernel {
    #[must_use]
    pub fn new(config: HostConfig) -> Arc<Self> {
        let policy = match config.arch {
            HostArch::Arm64 => ProtectionPolicy::from(
                Arm64MemoryPolicy::new(config.ram.clone()).with_capabilities(config.capabilities),
            ),
            HostArch::Generic => ProtectionPolicy::from(PassThroughPolicy {
                capabilities: config.capabilities,
            }),
        };
        let faults = Mutex::new(config.faults.clone());
        Arc::new(Self {
            config,
            policy,
            faults,
            state: Mutex::new(HostState::default()),
            phys: Mutex::new(BTreeMap::new()),
        })
    }

    #[must_use]
    pub const fn config(&self) -> &HostConfig {
        &self.config
    }

    #[must_use]
    pub const fn policy(&self) -> &ProtectionPolicy {
        &self.policy
    }

    /// Replace the active fault plan.
    pub fn set_faults(&self, faults: FaultPlan) {
        *self.faults.lock() = faults;
    }

    pub(crate) fn faults(&self) -> FaultPlan {
        self.faults.lock().clone()
    }

    #[must_use]
    pub fn allocated_regions(&self) -> Vec<DeviceNumberRange> {
        self.state.lock().regions.iter().map(|r| r.range).collect()
    }

    /// Name a region was reserved under, as listed in `/proc/devices`.
    #[must_use]
    pub fn region_name(&self, major: u32) -> Option<String> {
        self.state
            .lock()
            .regions
            .iter()
            .find(|r| r.range.major() == major)
            .map(|r| r.name.clone())
    }

    #[must_use]
    pub fn class_names(&self) -> Vec<String> {
        self.state
            .lock()
            .classes
            .values()
            .map(|c| c.name.clone())
            .collect()
    }

    /// Devices known to the driver model, with their names.
    #[must_use]
    pub fn devices(&self) -> Vec<(DeviceNumber, String)> {
        self.state
            .lock()
            .devices
            .iter()
            .map(|(devt, d)| (*devt, d.name.clone()))
            .collect()
    }

    #[must_use]
    pub fn dev_node(&self, name: &str) -> Option<DevNode> {
        self.state.lock().nodes.get(name).copied()
    }

    #[must_use]
    pub fn dev_node_names(&self) -> Vec<String> {
        self.state.lock().nodes.keys().cloned().collect()
    }

    #[must_use]
    pub fn uevents(&self) -> Vec<UeventRecord> {
        self.state.lock().uevents.clone()
    }

    #[must_use]
    pub fn cdev_count(&self) -> usize {
        self.state.lock().cdevs.len()
    }

    /// Whether `open` on `devt` would find a driver.
    #[must_use]
    pub fn has_cdev(&self, devt: DeviceNumber) -> bool {
        self.lookup_cdev(devt).is_some()
    }

    pub(crate) fn lookup_cdev(&self, devt: DeviceNumber) -> Option<Arc<dyn FileOperations>> {
        self.state
            .lock()
            .cdevs
            .values()
            .find(|c| c.range.contains(devt))
            .map(|c| Arc::clone(&c.fops))
    }

    /// Number of pages currently mapped in `mm`.
    #[must_use]
    pub fn mapped_pages(&self, mm: MmId) -> usize {
        self.state
            .lock()
            .page_tables
            .get(&mm)
            .map_or(0, BTreeMap::len)
    }

    /// Total bytes mapped across all address spaces.
    #[must_use]
    pub fn mapped_bytes(&self) -> u64 {
        let pages: usize = self
            .state
            .lock()
            .page_tables
            .values()
            .map(BTreeMap::len)
            .sum();
        pages as u64 * PAGE_SIZE
    }

    /// Whether nothing is registered any more: no numbers, classes,
    /// devices, nodes or cdevs.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        let state = self.state.lock();
        state.regions.is_empty()
            && state.classes.is_empty()
            && state.devices.is_empty()
            && state.nodes.is_empty()
            && state.cdevs.is_empty()
    }

    pub(crate) fn register_mm(&self) -> MmId {
        let mut state = self.state.lock();
        let mm = MmId(state.next_id());
        state.mms.insert(mm);
        state.page_tables.insert(mm, BTreeMap::new());
        mm
    }

    pub(crate) fn unregister_mm(&self, mm: MmId) {
        let mut state = self.state.lock();
        state.mms.remove(&mm);
        state.page_tables.remove(&mm);
    }
}
