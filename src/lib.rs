//! # EXYNOS-DQE - Display Quality Enhancer engine
//!
//! Shadow-register, update-decision and restore engine for the Display
//! Quality Enhancer of the Exynos display pipeline: the chain of dither,
//! gamma matrix, degamma, 3D color gamut correction, regamma, hue/saturation,
//! adaptive tone, detail enhancement and scaler blocks behind the blender.
//!
//! ## Features
//!
//! - **Colormode decoder** for the compositor's tagged binary blobs
//! - **CGC17 DPCM codec** for the 17x17x17 gamut cube
//! - **Register encoders** turning tuning tables into shadow registers
//! - **Convergence counters** for the double-buffered CGC SRAM
//! - **Restore pipeline** with EDMA or register-by-register CGC loads
//! - **Preset modes** matched on color mode and render intent
//! - **Debug attributes** mirroring the tuning sysfs nodes
//! - **Pluggable hardware** through [`RegisterBackend`] and [`EdmaEngine`]
//!
//! ## Quick Start
//!
//! ```rust
//! use exynos_dqe::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let regs = MemoryRegs::new(0x0400_0000);
//!     let backends = Backends::new(Box::new(regs.clone()), Box::new(MemoryImporter::new()));
//!     let dqe = Dqe::probe(&DqeConfig::default(), backends)?;
//!
//!     let mut frame = FrameState::new(1080, 2400, 10, 8);
//!     dqe.prepare(&mut frame);
//!     dqe.update(&frame);
//!     println!("{} register writes", regs.write_count());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod context;
pub mod debug;
pub mod device;
pub mod encoder;
pub mod error;
pub mod protocol;
pub mod regs;
pub mod update;

// Re-export main API for easy access
pub use config::{DqeConfig, OutputType};
pub use context::{LutStore, ModeLut};
pub use debug::DebugAttr;
pub use device::{attach, register, Backends, Dqe, DqeDump, DqeOps, DqeState, NoDqe};
pub use encoder::{Ctrl, ShadowRegs};
pub use error::{DqeError, DqeResult};
pub use regs::{EdmaEngine, RegBlock, RegisterBackend};
pub use update::{DisplayConfig, FrameState, UpdateCounters};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Decode a colormode blob into a fresh MAIN mode
///
/// Useful for tools that inspect blobs without a device.
///
/// # Example
///
/// ```
/// use exynos_dqe::protocol::{BlockId, ColormodeBuilder};
///
/// let blob = ColormodeBuilder::new(1)
///     .record(BlockId::CgcDither, [0; 4], "1,0,0,0,0,0,0,0")
///     .build();
/// let lut = exynos_dqe::decode_colormode(&blob).unwrap();
/// assert_eq!(lut.cgc_dither[0], 1);
/// ```
pub fn decode_colormode(blob: &[u8]) -> DqeResult<ModeLut> {
    let mut lut = ModeLut::new();
    protocol::decode_into(&mut lut, blob)?;
    Ok(lut)
}

/// Get library information
///
/// # Example
///
/// ```
/// println!("Using exynos-dqe v{}", exynos_dqe::version());
/// ```
pub fn version() -> &'static str {
    VERSION
}


/// Prelude module for convenient imports
///
/// # Example
///
/// ```
/// use exynos_dqe::prelude::*;
///
/// let config = DqeConfig::default();
/// assert!(config.wants_dqe());
/// ```
pub mod prelude {
    pub use crate::config::{DqeConfig, OutputType};
    pub use crate::debug::DebugAttr;
    pub use crate::device::{
        attach, register, Backends, DmaBufImporter, Dqe, DqeOps, MemoryImporter, NoImporter,
    };
    pub use crate::error::{DqeError, DqeResult};
    pub use crate::regs::{MemoryEdma, MemoryRegs, RegBlock};
    pub use crate::update::FrameState;
    pub use crate::{decode_colormode, version};
}
