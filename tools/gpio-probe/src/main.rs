use kernel_chrdev::{Errno, OpenFlags};
use kernel_host::{HostConfig, HostKernel, MmapFlags, MmapProt};
use kernel_printk::PrintkLogger;
use log::{LevelFilter, info};
use rpi_gpio::{DriverConfig, GpioError, GpioModule};
use std::env;
use std::process::ExitCode;

/// One page.
const BLOCK_SIZE: u64 = 4 * 1024;

/// GPIO block offset inside the peripheral window.
const GPIO_BASE: u64 = 0x0020_0000;

/// `GPLEV0`: pin levels 0..31.
const GPLEV0: u64 = 0x34;

#[derive(Debug, thiserror::Error)]
enum ProbeError {
    #[error("ERROR loading RPI_GPIO driver: {0}")]
    Load(#[from] GpioError),
    #[error("ERROR opening RPI_GPIO device: {0}")]
    Open(Errno),
    #[error("ERROR mmaping into RPI_GPIO device: {0}")]
    Map(Errno),
    #[error("usage: gpio-probe [/dev/NODE] [HEX_OFFSET]")]
    Usage,
}

impl ProbeError {
    /// `-1` and `-2` as a shell sees them.
    const fn exit_code(&self) -> u8 {
        match self {
            Self::Open(_) => 255,
            Self::Map(_) => 254,
            Self::Load(_) => 1,
            Self::Usage => 2,
        }
    }
}

fn console(line: &str) {
    eprintln!("{line}");
}

fn main() -> ExitCode {
    let _ = PrintkLogger::new(LevelFilter::Info)
        .with_console(console)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("{e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn run() -> Result<(), ProbeError> {
    // args: [node] [offset]
    let mut args = env::args().skip(1);
    let node = args.next().unwrap_or_else(|| String::from("/dev/RPI_GPIO_3"));
    let offset = match args.next() {
        Some(arg) => u64::from_str_radix(arg.trim_start_matches("0x"), 16)
            .map_err(|_| ProbeError::Usage)?,
        None => GPIO_BASE,
    };

    let kernel = HostKernel::new(HostConfig::raspberry_pi4());
    let mut module = GpioModule::new(kernel.clone(), DriverConfig::default());
    module.init()?;

    let mut proc = kernel.spawn();
    let fd = proc
        .open(&node, OpenFlags::RDWR | OpenFlags::SYNC | OpenFlags::CLOEXEC)
        .map_err(ProbeError::Open)?;

    let gpio = proc
        .mmap(
            BLOCK_SIZE,
            MmapProt::READ | MmapProt::WRITE,
            MmapFlags::SHARED,
            fd,
            offset,
        )
        .map_err(ProbeError::Map)?;

    let prot = proc.vma_at(gpio).map(|vma| vma.page_prot.attr_index());
    info!("{node}: {BLOCK_SIZE} bytes of {offset:#x} at {gpio} ({prot:?})");
    if let Ok(levels) = proc.load_u32(gpio + GPLEV0) {
        info!("GPLEV0 = {levels:#010x}");
    }

    // the mapping outlives the descriptor
    proc.close(fd).map_err(ProbeError::Open)?;
    drop(proc);
    module.exit();
    Ok(())
}
