//! Shadow to hardware
//!
//! [`restore_context`] walks the shadow in a fixed order. Later blocks rely on
//! earlier ones being committed, so the order below is part of the contract:
//! display dither, CGC dither, gamma matrix, degamma, CGC, regamma, HSC, ATC,
//! detail enhancement, scaler.

use crate::encoder::ShadowRegs;
use crate::error::{DqeError, DqeResult};
use crate::regs::layout::cgc;
use crate::regs::{
    EdmaEngine, RegBlock, RegisterBackend, ATC_DSTEP_REG, CGC_REG_MAX, HSC_CON, HSC_GAIN, HSC_POLY,
    LPD_REG_MAX,
};
use crate::update::{DisplayConfig, UpdateCounters};
use log::{debug, error, warn};
use std::time::Instant;

/// Polls of the CGC DMA request before giving up on a burst
pub const CGC_DMA_POLL_LIMIT: u32 = 1000;

/// Write `regs[from..]` of `block`
fn write_all(backend: &mut dyn RegisterBackend, block: RegBlock, regs: &[u32], from: usize, opt: usize) {
    for (i, &value) in regs.iter().enumerate().skip(from) {
        backend.write(block, i, value, opt);
    }
}

/// Load the CGC cube into SRAM through EDMA or register by register
fn load_cgc_lut(id: u32, backend: &mut dyn RegisterBackend, shadow: &ShadowRegs, edma: Option<&mut dyn EdmaEngine>) {
    match edma {
        Some(edma) => {
            backend.set_on(RegBlock::CgcDma, true);
            edma.set_base_addr(shadow.cgc_dma_addr);
            edma.start(&shadow.cgc_lut);
            let mut polls = 0;
            while backend.cgc_dma_pending() {
                polls += 1;
                if polls >= CGC_DMA_POLL_LIMIT {
                    warn!("dqe{}: timeout waiting for cgc dma request", id);
                    break;
                }
            }
        }
        None => {
            for i in 0..CGC_REG_MAX {
                for opt in 0..3 {
                    let hi = shadow.cgc_lut.get(2 * i + 1).map_or(0, |e| e[opt]);
                    let lo = shadow.cgc_lut.get(2 * i).map_or(0, |e| e[opt]);
                    let value = cgc::LUT_H.pack(hi as u32) | cgc::LUT_L.pack(lo as u32);
                    backend.write(RegBlock::Cgc, i, value, opt);
                }
            }
        }
    }
}

/// Commit the shadow to hardware.
///
/// Returns whether the CGC cube was reloaded. Fails with
/// [`DqeError::NotConfigured`] before the first frame geometry is known.
pub fn restore_context(
    id: u32,
    backend: &mut dyn RegisterBackend,
    shadow: &ShadowRegs,
    cfg: &DisplayConfig,
    edma: Option<&mut dyn EdmaEngine>,
    counters: &UpdateCounters,
) -> DqeResult<bool> {
    if !cfg.is_complete() {
        return Err(DqeError::NotConfigured);
    }

    let start = Instant::now();
    let mut cgc_updated = false;

    backend.init(cfg.width, cfg.height);

    // display dither
    if shadow.disp_dither_on.is_auto() {
        backend.set_on(RegBlock::DispDither, cfg.in_bpc >= 10 && cfg.out_bpc == 8);
    } else if shadow.disp_dither_on.is_on() {
        backend.write(RegBlock::DispDither, 0, shadow.disp_dither, 0);
        backend.set_on(RegBlock::DispDither, true);
    } else {
        backend.set_on(RegBlock::DispDither, false);
    }

    // CGC dither
    if shadow.cgc_dither_on.is_on() {
        backend.write(RegBlock::CgcDither, 0, shadow.cgc_dither, 0);
        backend.set_on(RegBlock::CgcDither, true);
    } else {
        backend.set_on(RegBlock::CgcDither, false);
        if shadow.regamma_on.is_on() || shadow.degamma_on.is_on() || shadow.cgc_on.is_on() {
            error!("dqe{}: CGC Dither must be on", id);
        }
    }

    if shadow.gamma_matrix_on.is_on() {
        write_all(backend, RegBlock::GammaMatrix, &shadow.gamma_matrix, 1, 0);
    }
    backend.set_on(RegBlock::GammaMatrix, shadow.gamma_matrix_on.is_on());

    if shadow.degamma_on.is_on() {
        write_all(backend, RegBlock::Degamma, &shadow.degamma_lut, 1, 0);
    }
    backend.set_on(RegBlock::Degamma, shadow.degamma_on.is_on());

    if shadow.cgc_on.is_on() {
        if counters.cgc_update_required() {
            load_cgc_lut(id, backend, shadow, edma);
            cgc_updated = true;
        }
        write_all(backend, RegBlock::CgcCon, &shadow.cgc_con, 0, 0);
    }
    backend.set_on(RegBlock::CgcCon, shadow.cgc_on.is_on());

    if shadow.regamma_on.is_on() {
        write_all(backend, RegBlock::Regamma, &shadow.regamma_lut, 1, 0);
    }
    backend.set_on(RegBlock::Regamma, shadow.regamma_on.is_on());

    // HSC control word 0 carries the enable and goes last
    if shadow.hsc_on.is_on() {
        write_all(backend, RegBlock::Hsc, &shadow.hsc_con, 1, HSC_CON);
        write_all(backend, RegBlock::Hsc, &shadow.hsc_poly, 0, HSC_POLY);
        write_all(backend, RegBlock::Hsc, &shadow.hsc_gain, 0, HSC_GAIN);
        backend.write(RegBlock::Hsc, 0, shadow.hsc_con[0], HSC_CON);
    }
    backend.set_on(RegBlock::Hsc, shadow.hsc_on.is_on());

    for (i, &value) in shadow.atc.iter().enumerate() {
        let value = if shadow.atc_dim_off != 0 && i == ATC_DSTEP_REG { 0 } else { value };
        backend.write(RegBlock::Atc, i, value, 0);
    }
    if shadow.atc_on.is_on() {
        backend.set_atc_partial_ibsi(cfg.width, cfg.height);
    }
    backend.set_on(RegBlock::Atc, shadow.atc_on.is_on());

    if shadow.de_on.is_on() {
        write_all(backend, RegBlock::De, &shadow.de, 0, 0);
    }
    backend.set_on(RegBlock::De, shadow.de_on.is_on());

    // the scaler has no enable bit
    if shadow.scl_on.is_on() {
        write_all(backend, RegBlock::Scl, &shadow.scl, 0, 0);
    }

    let elapsed = start.elapsed().as_micros();
    debug!(
        "dqe{}: update-{},{} {}.{:03}ms di {}/{} gm {} dg {} cgc{} {} rg {} hsc {} atc {} scl {}",
        id,
        counters.pending(),
        cfg.in_bpc,
        elapsed / 1000,
        elapsed % 1000,
        shadow.disp_dither_on.label(),
        shadow.cgc_dither_on.label(),
        shadow.gamma_matrix_on.label(),
        shadow.degamma_on.label(),
        if cgc_updated { "+" } else { "" },
        shadow.cgc_on.label(),
        shadow.regamma_on.label(),
        shadow.hsc_on.label(),
        shadow.atc_on.label(),
        shadow.scl_on.label(),
    );

    Ok(cgc_updated)
}

/// Read the low-power-mode bank into the shadow
pub fn save_lpd(backend: &dyn RegisterBackend, shadow: &mut ShadowRegs) {
    for (i, reg) in shadow.lpd.iter_mut().enumerate().take(LPD_REG_MAX) {
        *reg = backend.read(RegBlock::Lpd, i, 0);
    }
}

/// Turn the low-power-mode bank on and write back the saved words
pub fn restore_lpd(backend: &mut dyn RegisterBackend, shadow: &ShadowRegs) {
    backend.set_on(RegBlock::Lpd, true);
    write_all(backend, RegBlock::Lpd, &shadow.lpd, 0, 0);
}

fn read_all(backend: &dyn RegisterBackend, block: RegBlock, regs: &mut [u32], opt: usize) {
    for (i, reg) in regs.iter_mut().enumerate() {
        *reg = backend.read(block, i, opt);
    }
}

/// Seed the shadow from what the bootloader left in hardware.
///
/// Display dither ends up in AUTO.
pub fn load_context(backend: &dyn RegisterBackend, shadow: &mut ShadowRegs) {
    shadow.version = backend.version();

    read_all(backend, RegBlock::GammaMatrix, &mut shadow.gamma_matrix, 0);
    read_all(backend, RegBlock::Degamma, &mut shadow.degamma_lut, 0);
    read_all(backend, RegBlock::CgcCon, &mut shadow.cgc_con, 0);

    for i in 0..CGC_REG_MAX {
        for rgb in 0..3 {
            let value = backend.read(RegBlock::Cgc, i, rgb);
            if let Some(entry) = shadow.cgc_lut.get_mut(2 * i + 1) {
                entry[rgb] = cgc::LUT_H.extract(value) as u16;
            }
            if let Some(entry) = shadow.cgc_lut.get_mut(2 * i) {
                entry[rgb] = cgc::LUT_L.extract(value) as u16;
            }
        }
    }

    read_all(backend, RegBlock::Regamma, &mut shadow.regamma_lut, 0);
    shadow.disp_dither = backend.read(RegBlock::DispDither, 0, 0);
    shadow.cgc_dither = backend.read(RegBlock::CgcDither, 0, 0);

    read_all(backend, RegBlock::Hsc, &mut shadow.hsc_con, HSC_CON);
    read_all(backend, RegBlock::Hsc, &mut shadow.hsc_poly, HSC_POLY);
    read_all(backend, RegBlock::Hsc, &mut shadow.hsc_gain, HSC_GAIN);
    read_all(backend, RegBlock::Atc, &mut shadow.atc, 0);
    read_all(backend, RegBlock::Scl, &mut shadow.scl, 0);
    read_all(backend, RegBlock::De, &mut shadow.de, 0);
    read_all(backend, RegBlock::Lpd, &mut shadow.lpd, 0);

    shadow.disp_dither_on.set_onoff(crate::encoder::Ctrl::AUTO, true);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::Ctrl;
    use crate::regs::{MemoryRegs, MockEdmaEngine, MockRegisterBackend, CGC_LUT_MAX};
    use mockall::predicate::eq;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    fn cfg(in_bpc: u32, out_bpc: u32) -> DisplayConfig {
        DisplayConfig {
            width: 1080,
            height: 2400,
            in_bpc,
            out_bpc,
        }
    }

    fn all_on() -> ShadowRegs {
        let mut shadow = ShadowRegs::new();
        for block in RegBlock::ALL {
            if let Some(ctrl) = shadow.ctrl_mut(block) {
                ctrl.set_onoff(Ctrl::ON, true);
            }
        }
        shadow.hsc_con[0] = 0x1;
        shadow
    }

    type WriteLog = Arc<Mutex<Vec<(RegBlock, usize, usize)>>>;

    fn recording_backend(log: &WriteLog) -> MockRegisterBackend {
        let mut backend = MockRegisterBackend::new();
        backend.expect_init().times(1).return_const(());
        backend.expect_set_on().return_const(());
        backend.expect_set_atc_partial_ibsi().return_const(());
        backend.expect_cgc_dma_pending().return_const(false);
        let log = Arc::clone(log);
        backend.expect_write().returning(move |block, index, _, opt| {
            log.lock().unwrap().push((block, index, opt));
        });
        backend
    }

    #[test]
    fn test_write_order() {
        let log: WriteLog = Arc::default();
        let mut backend = recording_backend(&log);
        let counters = UpdateCounters::new(false);

        let cgc = restore_context(0, &mut backend, &all_on(), &cfg(10, 8), None, &counters).unwrap();
        assert!(cgc);

        let writes = log.lock().unwrap().clone();
        let mut order: Vec<RegBlock> = writes.iter().map(|w| w.0).collect();
        order.dedup();
        assert_eq!(
            order,
            vec![
                RegBlock::DispDither,
                RegBlock::CgcDither,
                RegBlock::GammaMatrix,
                RegBlock::Degamma,
                RegBlock::Cgc,
                RegBlock::CgcCon,
                RegBlock::Regamma,
                RegBlock::Hsc,
                RegBlock::Atc,
                RegBlock::De,
                RegBlock::Scl,
            ]
        );

        // HSC control word 0 closes the block
        let last_hsc = writes.iter().rev().find(|w| w.0 == RegBlock::Hsc).unwrap();
        assert_eq!(*last_hsc, (RegBlock::Hsc, 0, HSC_CON));
        // curve enable words are not rewritten
        assert!(!writes.contains(&(RegBlock::Degamma, 0, 0)));
    }

    #[test]
    fn test_not_configured_touches_nothing() {
        let mut backend = MockRegisterBackend::new();
        backend.expect_init().times(0);
        backend.expect_write().times(0);
        let counters = UpdateCounters::new(false);
        let err = restore_context(0, &mut backend, &all_on(), &DisplayConfig::default(), None, &counters);
        assert!(matches!(err, Err(DqeError::NotConfigured)));
    }

    #[test]
    fn test_direct_cgc_load() {
        let regs = MemoryRegs::new(0);
        let mut backend = regs.clone();
        let mut shadow = all_on();
        for (i, entry) in shadow.cgc_lut.iter_mut().enumerate() {
            *entry = [(i % 4096) as u16, 1, 2];
        }
        let counters = UpdateCounters::new(false);
        restore_context(0, &mut backend, &shadow, &cfg(10, 10), None, &counters).unwrap();

        let cgc_writes = regs.writes().iter().filter(|w| w.block == RegBlock::Cgc).count();
        assert_eq!(cgc_writes, CGC_REG_MAX * 3);
        assert_eq!(regs.value(RegBlock::Cgc, 1, 0), (3 << 16) | 2);
        // the odd tail has no partner sample
        let last = regs.value(RegBlock::Cgc, CGC_REG_MAX - 1, 0);
        assert_eq!(last >> 16, 0);
        assert_eq!(last & 0x1fff, ((CGC_LUT_MAX - 1) % 4096) as u32);
    }

    #[test]
    fn test_edma_cgc_load() {
        let regs = MemoryRegs::new(0);
        regs.set_dma_pending_polls(3);
        let mut backend = regs.clone();
        let mut shadow = all_on();
        shadow.cgc_dma_addr = 0x9000_0000;

        let mut edma = MockEdmaEngine::new();
        edma.expect_set_base_addr().with(eq(0x9000_0000u64)).times(1).return_const(());
        edma.expect_start().times(1).return_const(());

        let counters = UpdateCounters::new(false);
        restore_context(0, &mut backend, &shadow, &cfg(10, 10), Some(&mut edma), &counters).unwrap();
        assert!(regs.is_on(RegBlock::CgcDma));
        assert!(regs.writes().iter().all(|w| w.block != RegBlock::Cgc));
        assert!(!regs.cgc_dma_pending());
    }

    #[test]
    fn test_edma_timeout_is_not_fatal() {
        let regs = MemoryRegs::new(0);
        regs.set_dma_pending_polls(u32::MAX);
        let mut backend = regs.clone();
        let mut edma = crate::regs::MemoryEdma::new();
        let counters = UpdateCounters::new(false);
        let cgc = restore_context(0, &mut backend, &all_on(), &cfg(10, 10), Some(&mut edma), &counters).unwrap();
        assert!(cgc);
        assert_eq!(edma.starts(), 1);
    }

    #[test]
    fn test_sram_retention_skips_reload() {
        let regs = MemoryRegs::new(0);
        let mut backend = regs.clone();
        let counters = UpdateCounters::new(true);
        let cgc = restore_context(0, &mut backend, &all_on(), &cfg(10, 10), None, &counters).unwrap();
        assert!(!cgc);
        assert!(regs.writes().iter().all(|w| w.block != RegBlock::Cgc));
        assert!(regs.writes().iter().any(|w| w.block == RegBlock::CgcCon));
    }

    #[test]
    fn test_disp_dither_auto() {
        let counters = UpdateCounters::new(true);
        let mut shadow = ShadowRegs::new();
        shadow.disp_dither_on.set_onoff(Ctrl::AUTO, true);

        let regs = MemoryRegs::new(0);
        restore_context(0, &mut regs.clone(), &shadow, &cfg(10, 8), None, &counters).unwrap();
        assert!(regs.is_on(RegBlock::DispDither));

        restore_context(0, &mut regs.clone(), &shadow, &cfg(8, 8), None, &counters).unwrap();
        assert!(!regs.is_on(RegBlock::DispDither));
        assert!(regs.writes().iter().all(|w| w.block != RegBlock::DispDither));
    }

    #[test]
    fn test_atc_dim_off_and_ibsi() {
        let counters = UpdateCounters::new(true);
        let mut shadow = ShadowRegs::new();
        shadow.atc = [7; 12];
        shadow.atc_dim_off = 1;

        let regs = MemoryRegs::new(0);
        restore_context(0, &mut regs.clone(), &shadow, &cfg(10, 8), None, &counters).unwrap();
        assert_eq!(regs.value(RegBlock::Atc, ATC_DSTEP_REG, 0), 0);
        assert_eq!(regs.value(RegBlock::Atc, 7, 0), 7);
        assert_eq!(regs.atc_ibsi(), None);
        assert!(!regs.is_on(RegBlock::Atc));

        shadow.atc_on.set_onoff(Ctrl::ON, true);
        restore_context(0, &mut regs.clone(), &shadow, &cfg(10, 8), None, &counters).unwrap();
        assert_eq!(regs.atc_ibsi(), Some((1080, 2400)));
    }

    #[test]
    fn test_missing_cgc_dither_does_not_block() {
        let counters = UpdateCounters::new(true);
        let mut shadow = all_on();
        shadow.cgc_dither_on.set_onoff(Ctrl::OFF, true);
        let regs = MemoryRegs::new(0);
        restore_context(0, &mut regs.clone(), &shadow, &cfg(10, 8), None, &counters).unwrap();
        assert!(regs.is_on(RegBlock::Degamma));
        assert!(!regs.is_on(RegBlock::CgcDither));
    }

    #[test]
    fn test_lpd_round_trip() {
        let regs = MemoryRegs::new(0);
        for i in 0..LPD_REG_MAX {
            regs.preload(RegBlock::Lpd, i, 0, 0x100 + i as u32);
        }
        let mut shadow = ShadowRegs::new();
        save_lpd(&regs, &mut shadow);
        assert_eq!(shadow.lpd, [0x100, 0x101, 0x102, 0x103]);

        let fresh = MemoryRegs::new(0);
        restore_lpd(&mut fresh.clone(), &shadow);
        assert!(fresh.is_on(RegBlock::Lpd));
        assert_eq!(fresh.write_count(), LPD_REG_MAX);
        assert_eq!(fresh.value(RegBlock::Lpd, 2, 0), 0x102);
    }

    #[test]
    fn test_load_context() {
        let regs = MemoryRegs::new(0x0400_0000);
        regs.preload(RegBlock::Cgc, 0, 1, (5 << 16) | 4);
        regs.preload(RegBlock::Hsc, 3, HSC_GAIN, 0xabc);
        regs.preload(RegBlock::Degamma, 0, 0, 1);
        let mut shadow = ShadowRegs::new();
        load_context(&regs, &mut shadow);
        assert_eq!(shadow.version, 0x0400_0000);
        assert_eq!(shadow.cgc_lut[0][1], 4);
        assert_eq!(shadow.cgc_lut[1][1], 5);
        assert_eq!(shadow.hsc_gain[3], 0xabc);
        assert_eq!(shadow.degamma_lut[0], 1);
        assert!(shadow.disp_dither_on.is_auto());
        assert_eq!(regs.write_count(), 0);
    }
}
