//! Colormode buffer transfer
//!
//! The compositor hands over a DMA buffer descriptor every frame. The buffer
//! stays mapped across frames and is snapshot into a small ring so that the
//! decoder never reads memory the producer is rewriting.

use crate::error::{DqeError, DqeResult};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Snapshot slots in the ring
pub const MAX_COLORMODE_CTX: usize = 3;

/// Identity of the buffer behind a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId {
    /// Device of the backing file
    pub dev: u64,
    /// Inode of the backing file
    pub ino: u64,
}

impl BufferId {
    /// Identity from a device/inode pair
    pub const fn new(dev: u64, ino: u64) -> Self {
        Self { dev, ino }
    }
}

/// A mapped colormode buffer
pub trait DmaBufMapping: Send {
    /// Buffer size in bytes
    fn len(&self) -> usize;

    /// Whether the buffer is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the first `dst.len()` bytes of the buffer
    fn copy_to(&self, dst: &mut [u8]);
}

/// Resolves client descriptors to mapped buffers
#[cfg_attr(test, mockall::automock)]
pub trait DmaBufImporter: Send {
    /// Identity of the buffer behind `fd`
    fn get(&mut self, fd: i64) -> DqeResult<BufferId>;

    /// Map the buffer behind `fd` for reading
    fn vmap(&mut self, fd: i64) -> DqeResult<Box<dyn DmaBufMapping>>;
}

/// Importer for hosts without colormode transfer; every lookup fails
#[derive(Debug, Default, Clone, Copy)]
pub struct NoImporter;

impl DmaBufImporter for NoImporter {
    fn get(&mut self, fd: i64) -> DqeResult<BufferId> {
        Err(DqeError::DmaBuf(format!("no buffer for fd {}", fd)))
    }

    fn vmap(&mut self, fd: i64) -> DqeResult<Box<dyn DmaBufMapping>> {
        Err(DqeError::DmaBuf(format!("no buffer for fd {}", fd)))
    }
}

/// Shared, rewritable buffer served by [`MemoryImporter`]
#[derive(Debug, Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    /// Buffer holding `bytes`
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Arc::new(Mutex::new(bytes)))
    }

    /// Replace the content, as the producer would
    pub fn write(&self, bytes: &[u8]) {
        let mut buf = self.0.lock().unwrap_or_else(|e| e.into_inner());
        buf.clear();
        buf.extend_from_slice(bytes);
    }
}

impl DmaBufMapping for SharedBuf {
    fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn copy_to(&self, dst: &mut [u8]) {
        let buf = self.0.lock().unwrap_or_else(|e| e.into_inner());
        let n = dst.len().min(buf.len());
        dst[..n].copy_from_slice(&buf[..n]);
    }
}

/// In-memory buffers keyed by descriptor
#[derive(Debug, Clone, Default)]
pub struct MemoryImporter {
    buffers: Arc<Mutex<HashMap<i64, (BufferId, SharedBuf)>>>,
    next_ident: Arc<Mutex<u64>>,
}

impl MemoryImporter {
    /// No buffers installed
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `bytes` behind `fd`, replacing any previous buffer
    pub fn install(&self, fd: i64, bytes: Vec<u8>) -> SharedBuf {
        let buf = SharedBuf::new(bytes);
        let ident = {
            let mut next = self.next_ident.lock().unwrap_or_else(|e| e.into_inner());
            *next += 1;
            BufferId::new(0, *next)
        };
        self.buffers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(fd, (ident, buf.clone()));
        buf
    }

    /// Close `fd`
    pub fn remove(&self, fd: i64) {
        self.buffers.lock().unwrap_or_else(|e| e.into_inner()).remove(&fd);
    }

    fn lookup(&self, fd: i64) -> DqeResult<(BufferId, SharedBuf)> {
        self.buffers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&fd)
            .cloned()
            .ok_or_else(|| DqeError::DmaBuf(format!("bad fd {}", fd)))
    }
}

impl DmaBufImporter for MemoryImporter {
    fn get(&mut self, fd: i64) -> DqeResult<BufferId> {
        self.lookup(fd).map(|(ident, _)| ident)
    }

    fn vmap(&mut self, fd: i64) -> DqeResult<Box<dyn DmaBufMapping>> {
        self.lookup(fd).map(|(_, buf)| Box::new(buf) as Box<dyn DmaBufMapping>)
    }
}

/// Mapped client buffer plus the snapshot ring
pub(crate) struct ColormodeRing {
    id: u32,
    importer: Box<dyn DmaBufImporter>,
    fd: i64,
    ident: Option<BufferId>,
    mapping: Option<Box<dyn DmaBufMapping>>,
    slots: Vec<Arc<Vec<u8>>>,
    ctx_size: usize,
    ctx_no: u32,
}

impl ColormodeRing {
    pub(crate) fn new(id: u32, importer: Box<dyn DmaBufImporter>) -> Self {
        Self {
            id,
            importer,
            fd: -1,
            ident: None,
            mapping: None,
            slots: Vec::new(),
            ctx_size: 0,
            ctx_no: 0,
        }
    }

    /// Resolve `fd` and snapshot the buffer; `None` drops the colormode for
    /// this frame.
    pub(crate) fn prepare(&mut self, fd: i64) -> Option<Arc<Vec<u8>>> {
        if fd <= 0 {
            debug!("dqe{}: not allocated dqe fd {}", self.id, fd);
            return None;
        }

        match self.importer.get(fd) {
            Err(e) if fd == self.fd && self.mapping.is_some() => {
                debug!("dqe{}: bad fd ({}) but continued with old vbuf", self.id, e);
            }
            Err(e) => {
                warn!("dqe{}: failed to get dma buf of fd {}: {}", self.id, fd, e);
                return None;
            }
            Ok(ident) if fd == self.fd && Some(ident) == self.ident && self.mapping.is_some() => {}
            Ok(ident) => {
                self.mapping = None;
                self.ident = None;
                match self.importer.vmap(fd) {
                    Ok(mapping) => {
                        self.fd = fd;
                        self.ident = Some(ident);
                        self.mapping = Some(mapping);
                    }
                    Err(e) => {
                        log::error!("dqe{}: failed to vmap buffer: {}", self.id, e);
                        return None;
                    }
                }
            }
        }

        self.acquire()
    }

    fn acquire(&mut self) -> Option<Arc<Vec<u8>>> {
        let mapping = self.mapping.as_ref()?;
        let size = mapping.len();
        if self.ctx_size != size || self.slots.len() != MAX_COLORMODE_CTX {
            self.slots = (0..MAX_COLORMODE_CTX).map(|_| Arc::new(vec![0u8; size])).collect();
            info!("dqe{}: ctx realloc {} -> {}", self.id, self.ctx_size, size);
        }
        self.ctx_size = size;

        self.ctx_no = self.ctx_no.wrapping_add(1);
        let ctx_no = (self.ctx_no & i32::MAX as u32) as usize % MAX_COLORMODE_CTX;
        let slot = &mut self.slots[ctx_no];
        let buf = Arc::make_mut(slot);
        buf.resize(size, 0);
        mapping.copy_to(buf);
        Some(Arc::clone(slot))
    }

    #[cfg(test)]
    fn ctx_no(&self) -> u32 {
        self.ctx_no
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ring(importer: &MemoryImporter) -> ColormodeRing {
        ColormodeRing::new(0, Box::new(importer.clone()))
    }

    #[test]
    fn test_no_fd_drops_context() {
        let importer = MemoryImporter::new();
        let mut ring = ring(&importer);
        assert!(ring.prepare(0).is_none());
        assert!(ring.prepare(-1).is_none());
    }

    #[test]
    fn test_snapshot_follows_producer() {
        let importer = MemoryImporter::new();
        let buf = importer.install(7, vec![1, 2, 3]);
        let mut ring = ring(&importer);

        let first = ring.prepare(7).unwrap();
        assert_eq!(first.as_slice(), &[1, 2, 3]);
        buf.write(&[4, 5, 6]);
        let second = ring.prepare(7).unwrap();
        assert_eq!(second.as_slice(), &[4, 5, 6]);
        // the earlier snapshot is untouched
        assert_eq!(first.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn test_ring_rotates() {
        let importer = MemoryImporter::new();
        importer.install(3, vec![0; 16]);
        let mut ring = ring(&importer);
        for _ in 0..5 {
            ring.prepare(3).unwrap();
        }
        assert_eq!(ring.ctx_no(), 5);
        assert_eq!(ring.slots.len(), MAX_COLORMODE_CTX);
    }

    #[test]
    fn test_resize_reallocates() {
        let importer = MemoryImporter::new();
        let buf = importer.install(3, vec![9; 8]);
        let mut ring = ring(&importer);
        assert_eq!(ring.prepare(3).unwrap().len(), 8);
        buf.write(&[1; 32]);
        assert_eq!(ring.prepare(3).unwrap().len(), 32);
        assert!(ring.slots.iter().all(|s| s.len() == 32));
    }

    #[test]
    fn test_same_fd_failure_keeps_old_buffer() {
        let importer = MemoryImporter::new();
        importer.install(5, vec![0xDA; 4]);
        let mut ring = ring(&importer);
        ring.prepare(5).unwrap();

        importer.remove(5);
        assert_eq!(ring.prepare(5).unwrap().as_slice(), &[0xDA; 4]);
        // a different bad fd drops the context
        assert!(ring.prepare(6).is_none());
    }

    #[test]
    fn test_new_buffer_behind_same_fd_is_remapped() {
        let importer = MemoryImporter::new();
        importer.install(5, vec![1; 4]);
        let mut ring = ring(&importer);
        ring.prepare(5).unwrap();
        importer.install(5, vec![2; 4]);
        assert_eq!(ring.prepare(5).unwrap().as_slice(), &[2; 4]);
    }

    #[test]
    fn test_vmap_failure_drops_context() {
        let mut importer = MockDmaBufImporter::new();
        importer.expect_get().returning(|_| Ok(BufferId::new(0, 1)));
        importer
            .expect_vmap()
            .returning(|_| Err(DqeError::DmaBuf("vmap".into())));
        let mut ring = ColormodeRing::new(0, Box::new(importer));
        assert!(ring.prepare(9).is_none());
    }

    #[test]
    fn test_mapping_reused_while_identity_holds() {
        let mut importer = MockDmaBufImporter::new();
        importer.expect_get().times(3).returning(|_| Ok(BufferId::new(3, 42)));
        importer
            .expect_vmap()
            .times(1)
            .returning(|_| Ok(Box::new(SharedBuf::new(vec![7; 12])) as Box<dyn DmaBufMapping>));
        let mut ring = ColormodeRing::new(0, Box::new(importer));
        for _ in 0..3 {
            assert_eq!(ring.prepare(4).unwrap().len(), 12);
        }
    }
}
