//! 脑肿瘤 MRI 分析命令行工具: 患者登记, 图像分类, 三维分割与切片测量.

use clap::{ArgAction, Args, Parser, Subcommand};
use log::LevelFilter;
use mri_berry::consts::{CLASSIFY_SIZE, DEFAULT_SLICE, IMG_SIZE, VOLUME_SLICES, VOLUME_START_AT};
use mri_berry::preprocess::Normalization;
use simple_logger::SimpleLogger;
use std::path::PathBuf;

mod runner;

#[derive(Parser)]
#[command(name = "brainscan", version)]
#[command(about = "Brain tumor MRI analysis: patient intake, classification and 3D segmentation")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Directory holding the converted networks
    #[arg(long, value_name = "DIR", global = true)]
    model_dir: Option<PathBuf>,

    /// Directory for patient records and the session file
    #[arg(long, value_name = "DIR", global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Patient intake records
    #[command(subcommand)]
    Patient(PatientCommand),

    /// Classify a 2D MRI image (PNG, JPG, JPEG)
    Classify(ClassifyArgs),

    /// Segment a FLAIR / T1CE volume pair (.nii / .nii.gz)
    Segment(SegmentArgs),

    /// Measure one slice of the last segmentation
    Measure {
        /// Slice index inside the segmentation window
        #[arg(long, default_value_t = DEFAULT_SLICE)]
        slice: usize,
    },

    /// Render FLAIR | T1CE | mask for one slice of the last segmentation
    Render {
        /// Slice index inside the segmentation window
        #[arg(long, default_value_t = DEFAULT_SLICE)]
        slice: usize,

        /// Output image
        #[arg(long, value_name = "FILE")]
        out: PathBuf,
    },
}

#[derive(Subcommand)]
enum PatientCommand {
    /// Register a patient
    Add(PatientArgs),

    /// List registered patients
    List,
}

#[derive(Args)]
struct PatientArgs {
    /// Last name
    #[arg(long, default_value = "")]
    nom: String,

    /// First name
    #[arg(long, default_value = "")]
    prenom: String,

    #[arg(long, default_value = "")]
    email: String,

    /// Age in years (1..=120)
    #[arg(long, default_value_t = 0)]
    age: u32,

    #[arg(long, default_value = "")]
    telephone: String,

    #[arg(long, default_value = "")]
    adresse: String,

    /// Symptoms, medical history, anything else
    #[arg(long, default_value = "")]
    commentaires: String,
}

#[derive(Args)]
struct ClassifyArgs {
    /// Input image
    #[arg(value_name = "IMAGE")]
    image: PathBuf,

    /// Classification network (overrides the configured one)
    #[arg(long, value_name = "FILE")]
    model: Option<PathBuf>,

    /// Network input size
    #[arg(long, default_value_t = CLASSIFY_SIZE)]
    size: usize,

    /// Input normalization expected by the network
    #[arg(long, value_enum, default_value_t = Norm::Efficientnet)]
    norm: Norm,

    /// Write the text report to FILE
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Write the annotated image to FILE
    #[arg(long, value_name = "FILE")]
    annotate: Option<PathBuf>,
}

#[derive(Copy, Clone, clap::ValueEnum)]
enum Norm {
    Efficientnet,
    Unit,
    Symmetric,
}

impl From<Norm> for Normalization {
    fn from(value: Norm) -> Self {
        match value {
            Norm::Efficientnet => Self::EfficientNet,
            Norm::Unit => Self::UnitScale,
            Norm::Symmetric => Self::Symmetric,
        }
    }
}

#[derive(Args)]
struct SegmentArgs {
    /// FLAIR volume
    #[arg(long, value_name = "FILE")]
    flair: PathBuf,

    /// T1CE volume
    #[arg(long, value_name = "FILE")]
    t1ce: PathBuf,

    /// Segmentation network (overrides the configured one)
    #[arg(long, value_name = "FILE")]
    model: Option<PathBuf>,

    /// First slice of the window
    #[arg(long, default_value_t = VOLUME_START_AT)]
    start: usize,

    /// Number of slices in the window
    #[arg(long, default_value_t = VOLUME_SLICES)]
    count: usize,

    /// Side of the resampled slices
    #[arg(long, default_value_t = IMG_SIZE)]
    size: usize,

    /// Slice to measure, inside the window
    #[arg(long, default_value_t = DEFAULT_SLICE)]
    slice: usize,

    /// Export the label stack as .npy
    #[arg(long, value_name = "FILE")]
    npy: Option<PathBuf>,

    /// Render FLAIR | T1CE | mask of the measured slice
    #[arg(long, value_name = "FILE")]
    render: Option<PathBuf>,

    /// Write the text report to FILE
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Measure with the spacing of the resampled slices instead of the header spacing
    #[arg(long)]
    rescale_spacing: bool,
}

fn log_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    SimpleLogger::new()
        .with_level(log_level(cli.verbose, cli.quiet))
        .init()?;

    let paths = runner::Paths::resolve(cli.model_dir, cli.data_dir);
    match cli.command {
        Command::Patient(PatientCommand::Add(a)) => runner::patient_add(&paths, a),
        Command::Patient(PatientCommand::List) => runner::patient_list(&paths),
        Command::Classify(a) => runner::classify(&paths, a),
        Command::Segment(a) => runner::segment(&paths, a),
        Command::Measure { slice } => runner::measure(&paths, slice),
        Command::Render { slice, out } => runner::render(&paths, slice, &out),
    }
}
