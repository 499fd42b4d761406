//! BT character-device adapter.
//!
//! Implements [`BtDevice`] on top of the kernel's `bt-bmc` driver, which
//! exposes the host's BT buffer as `/dev/ipmi-bt-host`. The device is
//! opened non-blocking; each `read(2)` returns one whole frame and each
//! `write(2)` submits one.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use crate::bt::device::BtDevice;

/// Default device node created by the bt-bmc driver.
pub const DEFAULT_DEVICE_PATH: &str = "/dev/ipmi-bt-host";

const BT_BMC_IOCTL_MAGIC: u8 = 0xb1;

// BT_BMC_IOCTL_SMS_ATN from <linux/bt-bmc.h>: _IO(0xb1, 0x00)
nix::ioctl_none!(bt_bmc_ioctl_sms_atn, BT_BMC_IOCTL_MAGIC, 0x00);

/// The host-facing BT device node.
pub struct BtBmcDevice {
    file: File,
    name: String,
}

impl BtBmcDevice {
    /// Open `path` read-write and non-blocking.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(nix::libc::O_NONBLOCK)
            .open(path)?;
        Ok(Self {
            file,
            name: path.display().to_string(),
        })
    }
}

impl BtDevice for BtBmcDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }

    fn write(&mut self, frame: &[u8]) -> io::Result<usize> {
        self.file.write(frame)
    }

    fn send_attention(&mut self) -> io::Result<()> {
        // SAFETY: the fd is owned by `self.file` and stays open for the
        // duration of the call; SMS_ATN takes no argument.
        unsafe { bt_bmc_ioctl_sms_atn(self.file.as_raw_fd()) }
            .map(drop)
            .map_err(io::Error::from)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl AsFd for BtBmcDevice {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}
