//! Linux sysfs GPIO backend (`/sys/class/gpio`).
//!
//! Each opened line holds the `value` file of an exported pin. Edge
//! detection is armed by writing `both` to the pin's `edge` attribute;
//! the kernel then flags the value fd `POLLPRI | POLLERR` on an
//! interrupt, and the condition is cleared by reading the file from the
//! start again.

use crate::backend::{LineBackend, WaitEvent};
use crate::lock;
use gatehouse_core::{Error, LineId, Result};
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::fd::AsFd;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

const EDGE_FLAGS: PollFlags = PollFlags::POLLPRI.union(PollFlags::POLLERR);

/// Backend over the kernel's sysfs GPIO interface.
pub struct SysfsLineBackend {
    base: PathBuf,
    values: Mutex<HashMap<LineId, File>>,
}

impl SysfsLineBackend {
    /// Backend rooted at the standard `/sys/class/gpio`.
    pub fn new() -> Self {
        Self::with_base("/sys/class/gpio")
    }

    /// Backend rooted at an arbitrary directory. Intended for tests that
    /// lay out `gpio<n>/value` files under a scratch directory.
    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            values: Mutex::new(HashMap::new()),
        }
    }

    fn pin_dir(&self, id: LineId) -> PathBuf {
        self.base.join(format!("gpio{}", id.as_u32()))
    }

    /// Export the pin if its attribute directory does not exist yet.
    fn export(&self, id: LineId) -> Result<()> {
        if self.pin_dir(id).is_dir() {
            return Ok(());
        }
        write_attribute(&self.base.join("export"), &id.as_u32().to_string())?;
        Ok(())
    }
}

impl Default for SysfsLineBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl LineBackend for SysfsLineBackend {
    fn open(&self, id: LineId) -> Result<()> {
        let mut values = lock(&self.values);
        if values.contains_key(&id) {
            return Err(Error::hardware(format!("line {id} is already open")));
        }

        self.export(id)?;
        let dir = self.pin_dir(id);
        // Arm edge detection; absent on pins that cannot generate
        // interrupts, which is not fatal for output-only lines.
        let edge = dir.join("edge");
        if edge.exists() {
            write_attribute(&edge, "both")?;
        }

        let value = OpenOptions::new()
            .read(true)
            .write(true)
            .open(dir.join("value"))?;
        debug!(line = %id, path = %dir.display(), "opened sysfs line");
        values.insert(id, value);
        Ok(())
    }

    fn close(&self, id: LineId) {
        if lock(&self.values).remove(&id).is_some() {
            let _ = write_attribute(&self.base.join("unexport"), &id.as_u32().to_string());
        }
    }

    fn wait(&self, table: &[LineId], timeout: Duration) -> Result<WaitEvent> {
        // Clone the fds under the lock, then poll outside it so open and
        // close never block behind a full timeout.
        let files: Vec<File> = {
            let values = lock(&self.values);
            table
                .iter()
                .map(|id| {
                    values
                        .get(id)
                        .ok_or(Error::unknown_line(*id))
                        .and_then(|file| file.try_clone().map_err(Error::from))
                })
                .collect::<Result<_>>()?
        };

        let mut fds: Vec<PollFd<'_>> = files
            .iter()
            .map(|file| PollFd::new(file.as_fd(), EDGE_FLAGS))
            .collect();
        let millis = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);

        match poll(&mut fds, PollTimeout::from(millis)) {
            Ok(0) => Ok(WaitEvent::Timeout),
            Ok(_) => {
                let ready = fds
                    .iter()
                    .enumerate()
                    .filter(|(_, fd)| {
                        fd.revents().is_some_and(|r| r.intersects(EDGE_FLAGS))
                    })
                    .map(|(slot, _)| slot)
                    .collect();
                Ok(WaitEvent::Ready(ready))
            }
            Err(Errno::EINTR) => Ok(WaitEvent::Interrupted),
            Err(errno) => Err(Error::hardware(format!("poll: {errno}"))),
        }
    }

    fn clear_edge(&self, id: LineId) -> Result<()> {
        let mut values = lock(&self.values);
        let file = values.get_mut(&id).ok_or(Error::unknown_line(id))?;
        let mut buf = [0u8; 16];
        file.seek(SeekFrom::Start(0))?;
        let _ = file.read(&mut buf)?;
        file.seek(SeekFrom::Start(0))?;
        Ok(())
    }

    fn read_level(&self, id: LineId) -> Result<bool> {
        let mut values = lock(&self.values);
        let file = values.get_mut(&id).ok_or(Error::unknown_line(id))?;
        let mut buf = [0u8; 16];
        file.seek(SeekFrom::Start(0))?;
        let n = file.read(&mut buf)?;
        Ok(buf[..n].first() == Some(&b'1'))
    }

    fn write_level(&self, id: LineId, level: bool) -> Result<()> {
        let mut values = lock(&self.values);
        let file = values.get_mut(&id).ok_or(Error::unknown_line(id))?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(if level { b"1" } else { b"0" })?;
        Ok(())
    }
}

fn write_attribute(path: &Path, value: &str) -> Result<()> {
    let mut file = OpenOptions::new().write(true).open(path)?;
    file.write_all(value.as_bytes())?;
    Ok(())
}
