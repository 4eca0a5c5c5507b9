//! mmap-backed colormode importer

use super::colormode::{BufferId, DmaBufImporter, DmaBufMapping};
use crate::error::{DqeError, DqeResult};
use std::io;
use std::os::unix::io::RawFd;
use std::ptr::NonNull;

/// Maps client descriptors read-only with `mmap(2)`.
///
/// Buffer identity is the (device, inode) pair, so a descriptor reused for a
/// different buffer gets remapped.
#[derive(Debug, Default, Clone, Copy)]
pub struct MmapImporter;

impl MmapImporter {
    /// New importer
    pub fn new() -> Self {
        Self
    }
}

fn raw_fd(fd: i64) -> DqeResult<RawFd> {
    RawFd::try_from(fd).map_err(|_| DqeError::DmaBuf(format!("fd {} out of range", fd)))
}

fn stat(fd: RawFd) -> io::Result<libc::stat> {
    let mut st: libc::stat = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::fstat(fd, &mut st) };
    if result < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(st)
}

fn buffer_size(fd: RawFd) -> io::Result<usize> {
    let st = stat(fd)?;
    if st.st_size > 0 {
        return Ok(st.st_size as usize);
    }

    // older dma-buf exporters only report the size through lseek; the file
    // offset is shared with the client and must be put back
    let pos = unsafe { libc::lseek(fd, 0, libc::SEEK_CUR) };
    if pos < 0 {
        return Err(io::Error::last_os_error());
    }
    let end = unsafe { libc::lseek(fd, 0, libc::SEEK_END) };
    let err = io::Error::last_os_error();
    unsafe { libc::lseek(fd, pos, libc::SEEK_SET) };
    if end < 0 {
        return Err(err);
    }
    Ok(end as usize)
}

impl DmaBufImporter for MmapImporter {
    fn get(&mut self, fd: i64) -> DqeResult<BufferId> {
        let st = stat(raw_fd(fd)?).map_err(|e| DqeError::DmaBuf(e.to_string()))?;
        Ok(BufferId::new(st.st_dev as u64, st.st_ino as u64))
    }

    fn vmap(&mut self, fd: i64) -> DqeResult<Box<dyn DmaBufMapping>> {
        let fd = raw_fd(fd)?;
        let len = buffer_size(fd).map_err(|e| DqeError::DmaBuf(e.to_string()))?;
        if len == 0 {
            return Err(DqeError::DmaBuf("empty buffer".into()));
        }

        let addr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(DqeError::DmaBuf(io::Error::last_os_error().to_string()));
        }
        let ptr = NonNull::new(addr as *mut u8).ok_or_else(|| DqeError::DmaBuf("null mapping".into()))?;
        Ok(Box::new(MmapRegion { ptr, len }))
    }
}

struct MmapRegion {
    ptr: NonNull<u8>,
    len: usize,
}

// The region is read-only and owned by this handle until drop.
unsafe impl Send for MmapRegion {}

impl DmaBufMapping for MmapRegion {
    fn len(&self) -> usize {
        self.len
    }

    fn copy_to(&self, dst: &mut [u8]) {
        let n = dst.len().min(self.len);
        let src = unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), n) };
        dst[..n].copy_from_slice(src);
    }
}

impl Drop for MmapRegion {
    fn drop(&mut self) {
        unsafe { libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.len) };
    }
}
