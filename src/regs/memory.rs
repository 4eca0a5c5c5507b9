//! In-memory register backend
//!
//! Keeps register contents in a map and records every write in order. Clones
//! share the same state, so a caller can hand one clone to a [`crate::Dqe`]
//! and inspect the other.

use super::{EdmaEngine, RegBlock, RegisterBackend, CGC_LUT_MAX};
use crate::error::DqeResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, MutexGuard};

/// One recorded register write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegWrite {
    /// Target block
    pub block: RegBlock,
    /// Register index
    pub index: usize,
    /// Bank selector
    pub opt: usize,
    /// Written word
    pub value: u32,
}

#[derive(Debug, Default)]
struct RegState {
    version: u32,
    regs: BTreeMap<(RegBlock, usize, usize), u32>,
    on: BTreeMap<RegBlock, bool>,
    writes: Vec<RegWrite>,
    inits: Vec<(u32, u32)>,
    ibsi: Option<(u32, u32)>,
    dma_pending_polls: u32,
}

/// Register backend backed by a map
#[derive(Debug, Clone, Default)]
pub struct MemoryRegs {
    state: Arc<Mutex<RegState>>,
}

impl MemoryRegs {
    /// Empty register file reporting `version`
    pub fn new(version: u32) -> Self {
        let regs = Self::default();
        regs.lock().version = version;
        regs
    }

    fn lock(&self) -> MutexGuard<'_, RegState> {
        // a poisoned map is still a valid map
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Preload a register value without recording a write
    pub fn preload(&self, block: RegBlock, index: usize, opt: usize, value: u32) {
        self.lock().regs.insert((block, index, opt), value);
    }

    /// Current content of one register
    pub fn value(&self, block: RegBlock, index: usize, opt: usize) -> u32 {
        self.lock().regs.get(&(block, index, opt)).copied().unwrap_or(0)
    }

    /// Last on/off state programmed for `block`
    pub fn is_on(&self, block: RegBlock) -> bool {
        self.lock().on.get(&block).copied().unwrap_or(false)
    }

    /// All writes since the last [`MemoryRegs::clear_log`]
    pub fn writes(&self) -> Vec<RegWrite> {
        self.lock().writes.clone()
    }

    /// Number of writes since the last [`MemoryRegs::clear_log`]
    pub fn write_count(&self) -> usize {
        self.lock().writes.len()
    }

    /// Frame sizes passed to `init`
    pub fn inits(&self) -> Vec<(u32, u32)> {
        self.lock().inits.clone()
    }

    /// Last ATC partial image size
    pub fn atc_ibsi(&self) -> Option<(u32, u32)> {
        self.lock().ibsi
    }

    /// Make the CGC DMA request stay pending for `polls` reads
    pub fn set_dma_pending_polls(&self, polls: u32) {
        self.lock().dma_pending_polls = polls;
    }

    /// Forget recorded writes and inits
    pub fn clear_log(&self) {
        let mut state = self.lock();
        state.writes.clear();
        state.inits.clear();
    }
}

impl RegisterBackend for MemoryRegs {
    fn version(&self) -> u32 {
        self.lock().version
    }

    fn init(&mut self, width: u32, height: u32) {
        self.lock().inits.push((width, height));
    }

    fn read(&self, block: RegBlock, index: usize, opt: usize) -> u32 {
        self.value(block, index, opt)
    }

    fn write(&mut self, block: RegBlock, index: usize, value: u32, opt: usize) {
        let mut state = self.lock();
        state.regs.insert((block, index, opt), value);
        state.writes.push(RegWrite {
            block,
            index,
            opt,
            value,
        });
    }

    fn set_on(&mut self, block: RegBlock, on: bool) {
        self.lock().on.insert(block, on);
    }

    fn set_atc_partial_ibsi(&mut self, width: u32, height: u32) {
        self.lock().ibsi = Some((width, height));
    }

    fn cgc_dma_pending(&self) -> bool {
        let mut state = self.lock();
        if state.dma_pending_polls > 0 {
            state.dma_pending_polls -= 1;
            true
        } else {
            false
        }
    }

    fn dump(&self, verbose: bool) -> String {
        let state = self.lock();
        let mut out = String::new();
        let _ = writeln!(out, "DQE version {:08x}", state.version);
        for (block, on) in &state.on {
            let _ = writeln!(out, "{:<13} {}", block.name(), if *on { "on" } else { "off" });
        }
        if verbose {
            for ((block, index, opt), value) in &state.regs {
                let _ = writeln!(out, "{}[{}][{}] = {:08x}", block.name(), opt, index, value);
            }
        }
        out
    }
}

#[derive(Debug, Default)]
struct EdmaState {
    base: u64,
    starts: u32,
    last_lut: Vec<[u16; 3]>,
    irq_enabled: bool,
    irq_masked: bool,
    irq_status: u32,
}

/// EDMA engine that copies the LUT on `start`
#[derive(Debug, Clone, Default)]
pub struct MemoryEdma {
    state: Arc<Mutex<EdmaState>>,
}

impl MemoryEdma {
    /// Idle engine
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, EdmaState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of burst loads started
    pub fn starts(&self) -> u32 {
        self.lock().starts
    }

    /// Programmed base address
    pub fn base_addr(&self) -> u64 {
        self.lock().base
    }

    /// LUT content of the last burst
    pub fn last_lut(&self) -> Vec<[u16; 3]> {
        self.lock().last_lut.clone()
    }

    /// Whether interrupts are enabled and unmasked
    pub fn irq_active(&self) -> bool {
        let state = self.lock();
        state.irq_enabled && !state.irq_masked
    }

    /// Latch an interrupt status as if raised by hardware
    pub fn raise_irq(&self, status: u32) {
        self.lock().irq_status |= status;
    }
}

impl EdmaEngine for MemoryEdma {
    fn alloc_lut(&mut self, bytes: usize) -> DqeResult<u64> {
        let _ = bytes;
        Ok(0x8000_0000 + CGC_LUT_MAX as u64)
    }

    fn set_base_addr(&mut self, addr: u64) {
        self.lock().base = addr;
    }

    fn start(&mut self, lut: &[[u16; 3]]) {
        let mut state = self.lock();
        state.starts += 1;
        state.last_lut = lut.to_vec();
    }

    fn clear_irqs(&mut self) {
        self.lock().irq_status = 0;
    }

    fn set_irq_mask(&mut self, masked: bool) {
        self.lock().irq_masked = masked;
    }

    fn set_irq_enable(&mut self, enabled: bool) {
        self.lock().irq_enabled = enabled;
    }

    fn take_irq_status(&mut self) -> u32 {
        std::mem::take(&mut self.lock().irq_status)
    }
}
