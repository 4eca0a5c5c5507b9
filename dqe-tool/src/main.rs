//! Command-line interface for exynos-dqe

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use exynos_dqe::context::LutStore;
use exynos_dqe::device::{Backends, Dqe, NoImporter};
use exynos_dqe::protocol::{dpcm, text};
use exynos_dqe::regs::{MemoryRegs, CGC_GRID};
use exynos_dqe::{DqeConfig, FrameState};
use log::LevelFilter;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "dqe-tool")]
#[command(version = exynos_dqe::VERSION)]
#[command(about = "Inspect colormode blobs and DQE register output", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output verbosity
    #[arg(short, long, value_enum, default_value_t = Verbosity::Normal)]
    verbosity: Verbosity,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a colormode blob and print the resulting shadow registers
    Decode {
        /// Colormode blob file
        blob: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Run a commit with a colormode blob and print the register writes
    Restore {
        /// Colormode blob file
        blob: PathBuf,

        /// Frame width
        #[arg(long, default_value_t = 1080)]
        width: u32,

        /// Frame height
        #[arg(long, default_value_t = 2400)]
        height: u32,

        /// Input bits per component
        #[arg(long, default_value_t = 10)]
        in_bpc: u32,

        /// Output bits per component
        #[arg(long, default_value_t = 8)]
        out_bpc: u32,

        /// Device description (JSON)
        #[arg(short, long, env = "DQE_CONFIG")]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Encode 17 comma separated samples as one CGC17 record
    CgcEncode {
        /// Samples, e.g. "0,256,512,..."
        samples: String,

        /// Force a DPCM mode (0, 1 or 2)
        #[arg(short, long)]
        mode: Option<u8>,
    },

    /// Decode a 680 character CGC17 row set
    CgcDecode {
        /// Hex text
        hex: String,
    },

    /// Show which preset a color mode and render intent select
    Presets {
        /// Device description (JSON)
        config: PathBuf,

        /// Color mode
        #[arg(long, default_value_t = 0)]
        color_mode: u32,

        /// Render intent
        #[arg(long, default_value_t = 0)]
        render_intent: u32,
    },

    /// Show version information
    Version,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Verbosity {
    Minimal,
    Normal,
    Detailed,
    Debug,
}

impl Verbosity {
    fn level(self) -> LevelFilter {
        match self {
            Verbosity::Minimal => LevelFilter::Error,
            Verbosity::Normal => LevelFilter::Warn,
            Verbosity::Detailed => LevelFilter::Info,
            Verbosity::Debug => LevelFilter::Debug,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn load_config(path: Option<&Path>) -> Result<DqeConfig> {
    match path {
        Some(path) => DqeConfig::from_file(path).with_context(|| format!("loading {}", path.display())),
        None => Ok(DqeConfig::default()),
    }
}

/// Device on an in-memory register file, fed one frame carrying `blob`
fn run_frame(config: &DqeConfig, blob: Vec<u8>, frame: FrameState) -> Result<(Dqe, MemoryRegs)> {
    let regs = MemoryRegs::new(0);
    let backends = Backends::new(Box::new(regs.clone()), Box::new(NoImporter));
    let dqe = Dqe::probe(config, backends)?;

    let mut frame = frame;
    frame.colormode = Some(Arc::new(blob));
    dqe.enable();
    dqe.update(&frame);
    Ok((dqe, regs))
}

fn read_blob(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::new().filter_level(cli.verbosity.level()).init();

    match &cli.command {
        Commands::Decode { blob, format } => {
            let blob = read_blob(blob)?;
            exynos_dqe::protocol::GlobalHeader::parse(&blob)?;
            let (dqe, _) = run_frame(&DqeConfig::default(), blob, FrameState::new(1080, 2400, 10, 8))?;

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&dqe.shadow())?),
                OutputFormat::Text => {
                    for (block, label) in dqe.dump().blocks {
                        println!("{:<13} {}", block, label);
                    }
                }
            }
        }

        Commands::Restore {
            blob,
            width,
            height,
            in_bpc,
            out_bpc,
            config,
            format,
        } => {
            let config = load_config(config.as_deref())?;
            let frame = FrameState::new(*width, *height, *in_bpc, *out_bpc);
            let (_, regs) = run_frame(&config, read_blob(blob)?, frame)?;

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&regs.writes())?),
                OutputFormat::Text => {
                    for w in regs.writes() {
                        println!("{}[{}][{}] = {:08x}", w.block.name(), w.opt, w.index, w.value);
                    }
                    println!("{} writes", regs.write_count());
                }
            }
        }

        Commands::CgcEncode { samples, mode } => {
            let mut values = [0u32; CGC_GRID];
            text::parse_lut(samples, &mut values)?;
            let record = match mode {
                Some(mode) => dpcm::encode(&values, *mode)?,
                None => dpcm::encode_best(&values)?,
            };
            let hex: String = record.iter().map(|w| format!("{:08x}", w)).collect();
            println!("{}", hex);
        }

        Commands::CgcDecode { hex } => {
            let rows = text::parse_cgc(hex.trim())?;
            for (i, row) in rows.iter().enumerate() {
                let samples = dpcm::decode(row)?;
                println!("{:2}: {}", i, text::lut_to_string(&samples));
            }
        }

        Commands::Presets {
            config,
            color_mode,
            render_intent,
        } => {
            let config = load_config(Some(config.as_path()))?;
            let presets = config.presets()?;
            if presets.is_empty() {
                bail!("{} has no presets", config.id);
            }
            let store = LutStore::new(&presets);
            match store.select_preset(*color_mode, *render_intent) {
                0 => println!("no preset for CM {}, RI {}", color_mode, render_intent),
                idx => println!("preset[{}] {:08x?}", idx, presets[idx - 1]),
            }
        }

        Commands::Version => {
            println!("dqe-tool v{}", exynos_dqe::version());
            println!("Exynos DQE colormode and register inspection");
        }
    }

    Ok(())
}
