//! DQE device and its display-pipe entry points
//!
//! A [`Dqe`] owns the LUT store, the shadow registers and the restore
//! counters of one display pipe. The pipe calls [`Dqe::prepare`] and
//! [`Dqe::update`] on every commit and the power hooks on transitions;
//! everything else is driven from those calls.
//!
//! ## Example
//!
//! ```rust
//! use exynos_dqe::config::DqeConfig;
//! use exynos_dqe::device::{register, Backends, MemoryImporter};
//! use exynos_dqe::regs::MemoryRegs;
//! use exynos_dqe::update::FrameState;
//!
//! let regs = MemoryRegs::new(0x0400_0000);
//! let backends = Backends::new(Box::new(regs.clone()), Box::new(MemoryImporter::new()));
//! let dqe = register(&DqeConfig::default(), backends).expect("pipe 0 has a DQE");
//!
//! dqe.enable();
//! let mut frame = FrameState::new(1080, 2400, 10, 8);
//! dqe.prepare(&mut frame);
//! dqe.update(&frame);
//! assert_eq!(regs.inits(), vec![(1080, 2400)]);
//! ```

mod colormode;
#[cfg(all(feature = "dmabuf", unix))]
mod dmabuf;
pub mod restore;

pub use colormode::{
    BufferId, DmaBufImporter, DmaBufMapping, MemoryImporter, NoImporter, SharedBuf, MAX_COLORMODE_CTX,
};
#[cfg(all(feature = "dmabuf", unix))]
pub use dmabuf::MmapImporter;

use crate::config::DqeConfig;
use crate::context::LutStore;
use crate::encoder::{encode_all, BpcInfo, ShadowRegs};
use crate::error::{DqeError, DqeResult};
use crate::protocol::{parse_records, ColormodeWalk, GlobalHeader, SEQ_NONE};
use crate::regs::{BlockMask, EdmaEngine, RegBlock, RegisterBackend, CGC_LUT_MAX};
use crate::update::{DisplayConfig, FrameState, ResetKind, ResetTarget, UpdateCounters};
use chrono::{DateTime, Utc};
use colormode::ColormodeRing;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// Bytes reserved for the CGC EDMA source buffer (3 channels, 16-bit samples)
pub const CGC_DMA_BUF_SIZE: usize = CGC_LUT_MAX * 3 * 2;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Power state of the pipe as seen by the IRQ handler
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DqeState {
    /// Pipe off, interrupts disabled
    #[default]
    Disable,
    /// Pipe running
    Enable,
}

/// Hardware seams handed to [`Dqe::probe`]
pub struct Backends {
    /// DQE register window
    pub regs: Box<dyn RegisterBackend>,
    /// CGC EDMA engine, when the pipe has one
    pub edma: Option<Box<dyn EdmaEngine>>,
    /// Colormode buffer importer
    pub importer: Box<dyn DmaBufImporter>,
}

impl Backends {
    /// Register window and importer, no EDMA
    pub fn new(regs: Box<dyn RegisterBackend>, importer: Box<dyn DmaBufImporter>) -> Self {
        Self {
            regs,
            edma: None,
            importer,
        }
    }

    /// Attach an EDMA engine
    pub fn with_edma(mut self, edma: Box<dyn EdmaEngine>) -> Self {
        self.edma = Some(edma);
        self
    }
}

/// State guarded by the device mutex
pub(crate) struct DqeInner {
    pub(crate) regs: Box<dyn RegisterBackend>,
    pub(crate) store: LutStore,
    pub(crate) shadow: ShadowRegs,
    pub(crate) cfg: DisplayConfig,
    pub(crate) seq: u8,
    pub(crate) mode_idx: usize,
    pub(crate) dimming: bool,
    pub(crate) xml_suffix: String,
}

/// One DQE instance
pub struct Dqe {
    pub(crate) id: u32,
    pub(crate) inner: Mutex<DqeInner>,
    pub(crate) counters: UpdateCounters,
    colormode: Mutex<ColormodeRing>,
    edma: Option<Mutex<Box<dyn EdmaEngine>>>,
    state: Mutex<DqeState>,
    pipe_partial: bool,
}

/// Snapshot of the device for logs and tools
#[derive(Debug, Clone, Serialize)]
pub struct DqeDump {
    /// Pipe id
    pub id: u32,
    /// When the snapshot was taken
    pub timestamp: DateTime<Utc>,
    /// Hardware version word
    pub version: u32,
    /// Power state
    pub state: DqeState,
    /// Last programmed geometry
    pub config: DisplayConfig,
    /// Pending global restores
    pub pending: u32,
    /// Pending CGC refreshes
    pub cgc_pending: u32,
    /// Control label per block
    pub blocks: BTreeMap<&'static str, &'static str>,
    /// Backend register dump
    pub registers: String,
}

impl Dqe {
    /// Build a device from its description and hardware seams.
    ///
    /// Reads the current hardware state into the shadow and reserves the CGC
    /// EDMA buffer. Fails on an inconsistent preset table or when the
    /// description asks for EDMA without an engine.
    pub fn probe(config: &DqeConfig, backends: Backends) -> DqeResult<Self> {
        let presets = config.presets()?;
        let Backends {
            regs,
            edma,
            importer,
        } = backends;

        let mut edma = match (config.edma, edma) {
            (true, Some(engine)) => Some(engine),
            (true, None) => {
                return Err(DqeError::InvalidConfig("edma requested without an engine".into()));
            }
            (false, _) => None,
        };

        let mut shadow = ShadowRegs::new();
        restore::load_context(regs.as_ref(), &mut shadow);
        if let Some(engine) = edma.as_mut() {
            shadow.cgc_dma_addr = engine.alloc_lut(CGC_DMA_BUF_SIZE)?;
        }

        let store = LutStore::new(&presets);
        info!(
            "dqe{}: version {:08x}, {} luts, sram retention {}, edma {}",
            config.id,
            shadow.version,
            store.len(),
            config.sram_retention,
            edma.is_some()
        );

        Ok(Self {
            id: config.id,
            inner: Mutex::new(DqeInner {
                regs,
                store,
                shadow,
                cfg: DisplayConfig::default(),
                seq: SEQ_NONE,
                mode_idx: 0,
                dimming: false,
                xml_suffix: config.xml_suffix.clone(),
            }),
            counters: UpdateCounters::new(config.sram_retention),
            colormode: Mutex::new(ColormodeRing::new(config.id, importer)),
            edma: edma.map(Mutex::new),
            state: Mutex::new(DqeState::Disable),
            pipe_partial: config.partial_update,
        })
    }

    /// Pipe id
    pub fn id(&self) -> u32 {
        self.id
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, DqeInner> {
        lock(&self.inner)
    }

    /// Snapshot the colormode buffer of this commit into `frame`
    pub fn prepare(&self, frame: &mut FrameState) {
        frame.colormode = lock(&self.colormode).prepare(frame.dqe_fd);
    }

    /// Fold the frame into the shadow and commit to hardware when owed
    pub fn update(&self, frame: &FrameState) {
        let mut updated = self.update_colormode(frame);
        if updated {
            updated |= self.update_preset(frame);
        }
        updated |= self.update_config(frame);

        if updated {
            let mut inner = self.lock();
            let bpc = BpcInfo::new(inner.cfg.in_bpc);
            let DqeInner { store, shadow, .. } = &mut *inner;
            encode_all(shadow, store.main(), bpc);
            self.counters.reset(ResetTarget::Global, ResetKind::Full);
        }

        if self.counters.update_required() {
            match self.restore_context() {
                Ok(_) => {}
                Err(DqeError::NotConfigured) => debug!("dqe{}: no frame geometry yet", self.id),
                Err(e) => error!("dqe{}: restore failed: {}", self.id, e),
            }
        }
    }

    /// Decode a new colormode blob into MAIN; true when it was taken
    fn update_colormode(&self, frame: &FrameState) -> bool {
        let Some(blob) = frame.colormode.as_deref() else {
            return false;
        };

        let hdr = match GlobalHeader::parse(blob) {
            Ok(hdr) => hdr,
            Err(e) => {
                error!("dqe{}: {}", self.id, e);
                return false;
            }
        };

        {
            let mut inner = self.lock();
            if inner.seq == hdr.seq {
                return false;
            }
            inner.seq = hdr.seq;
        }

        let records = match parse_records(blob, &hdr) {
            Ok(records) => records,
            Err(e) => {
                error!("dqe{}: {}", self.id, e);
                return false;
            }
        };

        let mut walk = ColormodeWalk::new(self.id);
        for record in &records {
            let mut inner = self.lock();
            match walk.apply(inner.store.main_mut(), record) {
                Ok(changed) => {
                    if changed.contains(BlockMask::CGC) {
                        self.counters.reset(ResetTarget::Cgc, ResetKind::Full);
                    }
                }
                Err(e) => {
                    error!("dqe{}: {}", self.id, e);
                    return false;
                }
            }
        }
        walk.finish(&hdr);
        true
    }

    fn update_preset(&self, frame: &FrameState) -> bool {
        let mut inner = self.lock();
        let merged = inner.store.apply_preset(frame.color_mode, frame.render_intent);
        if merged.contains(BlockMask::CGC) {
            self.counters.reset(ResetTarget::Cgc, ResetKind::Full);
        }
        !merged.is_empty()
    }

    fn update_config(&self, frame: &FrameState) -> bool {
        let mut inner = self.lock();
        inner.dimming = frame.dimming;
        inner.cfg.check(frame, self.pipe_partial)
    }

    /// Commit the shadow to hardware now.
    ///
    /// Returns whether the CGC cube was reloaded.
    pub fn restore_context(&self) -> DqeResult<bool> {
        let mut inner = self.lock();
        let mut edma = self.edma.as_ref().map(lock);
        let engine = match edma.as_mut() {
            Some(guard) => Some(&mut ***guard as &mut dyn EdmaEngine),
            None => None,
        };
        let DqeInner {
            regs, shadow, cfg, ..
        } = &mut *inner;
        restore::restore_context(self.id, regs.as_mut(), shadow, cfg, engine, &self.counters)
    }

    /// Pipe powered on
    pub fn enable(&self) {
        {
            let mut inner = self.lock();
            let DqeInner { regs, shadow, .. } = &mut *inner;
            restore::restore_lpd(regs.as_mut(), shadow);
        }
        self.counters.reset(ResetTarget::Global, ResetKind::Full);
        self.counters.reset(ResetTarget::Cgc, ResetKind::Opt);

        let mut state = lock(&self.state);
        if let Some(edma) = &self.edma {
            let mut edma = lock(edma);
            edma.clear_irqs();
            edma.set_irq_mask(false);
            edma.set_irq_enable(true);
        }
        *state = DqeState::Enable;
        debug!("dqe{}: enabled", self.id);
    }

    /// Pipe powering off
    pub fn disable(&self) {
        {
            let mut inner = self.lock();
            let DqeInner { regs, shadow, .. } = &mut *inner;
            restore::save_lpd(regs.as_ref(), shadow);
        }

        let mut state = lock(&self.state);
        if let Some(edma) = &self.edma {
            let mut edma = lock(edma);
            edma.clear_irqs();
            edma.set_irq_enable(false);
        }
        *state = DqeState::Disable;
        debug!("dqe{}: disabled", self.id);
    }

    /// System suspend
    pub fn suspend(&self) {
        debug!("dqe{}: suspend", self.id);
    }

    /// System resume; the CGC SRAM content is gone
    pub fn resume(&self) {
        debug!("dqe{}: resume", self.id);
        self.counters.reset(ResetTarget::Cgc, ResetKind::Full);
    }

    /// EDMA interrupt: read and clear the status.
    ///
    /// `None` when the pipe has no EDMA or is not enabled.
    pub fn irq_handler(&self) -> Option<u32> {
        let state = lock(&self.state);
        let edma = self.edma.as_ref()?;
        if *state != DqeState::Enable {
            return None;
        }
        let status = lock(edma).take_irq_status();
        debug!("dqe{}: edma irq status {:#x}", self.id, status);
        Some(status)
    }

    /// Current power state
    pub fn power_state(&self) -> DqeState {
        *lock(&self.state)
    }

    /// Whether `block` is switched on in the shadow
    pub fn state(&self, block: RegBlock) -> bool {
        self.lock()
            .shadow
            .ctrl(block)
            .map_or(false, |ctrl| ctrl.is_on())
    }

    /// Pending global restores and CGC refreshes
    pub fn pending(&self) -> (u32, u32) {
        (self.counters.pending(), self.counters.cgc_pending())
    }

    /// Copy of the shadow registers
    pub fn shadow(&self) -> ShadowRegs {
        self.lock().shadow.clone()
    }

    /// Log and return a snapshot of the device
    pub fn dump(&self) -> DqeDump {
        let inner = self.lock();
        let blocks = RegBlock::ALL
            .iter()
            .filter_map(|&block| inner.shadow.ctrl(block).map(|ctrl| (block.name(), ctrl.label())))
            .collect();
        let dump = DqeDump {
            id: self.id,
            timestamp: Utc::now(),
            version: inner.shadow.version,
            state: self.power_state(),
            config: inner.cfg,
            pending: self.counters.pending(),
            cgc_pending: self.counters.cgc_pending(),
            blocks,
            registers: inner.regs.dump(true),
        };
        info!("dqe{}: {}", self.id, dump.registers);
        dump
    }
}

/// Entry points a display pipe calls; every hook defaults to a no-op
pub trait DqeOps: Send + Sync {
    /// Device snapshot
    fn dump(&self) -> Option<DqeDump> {
        None
    }
    /// Before the commit
    fn prepare(&self, _frame: &mut FrameState) {}
    /// At the commit
    fn update(&self, _frame: &FrameState) {}
    /// Pipe on
    fn enable(&self) {}
    /// Pipe off
    fn disable(&self) {}
    /// System suspend
    fn suspend(&self) {}
    /// System resume
    fn resume(&self) {}
}

/// Stand-in for pipes without a DQE
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDqe;

impl DqeOps for NoDqe {}

impl DqeOps for Dqe {
    fn dump(&self) -> Option<DqeDump> {
        Some(Dqe::dump(self))
    }

    fn prepare(&self, frame: &mut FrameState) {
        Dqe::prepare(self, frame)
    }

    fn update(&self, frame: &FrameState) {
        Dqe::update(self, frame)
    }

    fn enable(&self) {
        Dqe::enable(self)
    }

    fn disable(&self) {
        Dqe::disable(self)
    }

    fn suspend(&self) {
        Dqe::suspend(self)
    }

    fn resume(&self) {
        Dqe::resume(self)
    }
}

/// Create the DQE of a pipe, `None` when the pipe has no DQE interface or
/// probing failed
pub fn register(config: &DqeConfig, backends: Backends) -> Option<Dqe> {
    if !config.wants_dqe() {
        warn!("dqe{}: no dqe interface ({:?})", config.id, config.output);
        return None;
    }
    match Dqe::probe(config, backends) {
        Ok(dqe) => Some(dqe),
        Err(e) => {
            error!("dqe{}: probe failed: {}", config.id, e);
            None
        }
    }
}

/// Entry points for a pipe, falling back to [`NoDqe`]
pub fn attach(config: &DqeConfig, backends: Backends) -> Box<dyn DqeOps> {
    match register(config, backends) {
        Some(dqe) => Box::new(dqe),
        None => Box::new(NoDqe),
    }
}
