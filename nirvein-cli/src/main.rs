use clap::Parser;
use nirvein::io::{load_frame, save_gray_image};
use nirvein::{
    AdaptiveContrast, ApprovalRegion, DisplayStage, FrameParams, FrangiProcessor, GlobalContrast,
};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/settings.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "Nirvein CLI (JSON settings driven)")]
struct Cli {
    /// Path to the JSON settings file.
    #[arg(short, long, value_name = "FILE", default_value = "settings.json")]
    config: PathBuf,
    /// Input image to process.
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,
    /// Where to write the processed artifact (PNG).
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
    /// Print an example settings file and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output.
    #[arg(long)]
    trace: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct FrangiSection {
    sigma: f32,
    beta: f32,
    c: f32,
    display_stage: usize,
    invert_enabled: bool,
    segmentation_threshold: f32,
}

impl Default for FrangiSection {
    fn default() -> Self {
        let params = FrameParams::default();
        Self {
            sigma: params.sigma,
            beta: params.beta,
            c: params.c,
            display_stage: params.stage.index(),
            invert_enabled: params.invert,
            segmentation_threshold: params.segmentation_threshold,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct GlobalContrastSection {
    enabled: bool,
    brightness: f32,
    contrast: f32,
}

impl Default for GlobalContrastSection {
    fn default() -> Self {
        let gc = GlobalContrast::default();
        Self {
            enabled: false,
            brightness: gc.brightness,
            contrast: gc.contrast,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ClaheSection {
    enabled: bool,
    max_iterations: usize,
    target_contrast: f32,
}

impl Default for ClaheSection {
    fn default() -> Self {
        let adaptive = AdaptiveContrast::default();
        Self {
            enabled: false,
            max_iterations: adaptive.max_iterations,
            target_contrast: adaptive.target_contrast,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PreprocessingSection {
    global_contrast: GlobalContrastSection,
    clahe: ClaheSection,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ApprovalSection {
    enabled: bool,
    mask_width: usize,
    mask_height: usize,
    threshold: f32,
}

impl Default for ApprovalSection {
    fn default() -> Self {
        let region = ApprovalRegion::default();
        Self {
            enabled: false,
            mask_width: region.width,
            mask_height: region.height,
            threshold: region.threshold,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Settings {
    frangi: FrangiSection,
    preprocessing: PreprocessingSection,
    approval: ApprovalSection,
    downscale_factor: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            frangi: FrangiSection::default(),
            preprocessing: PreprocessingSection::default(),
            approval: ApprovalSection::default(),
            downscale_factor: 1.0,
        }
    }
}

fn frame_params(settings: &Settings) -> Result<FrameParams, String> {
    let stage = DisplayStage::from_index(settings.frangi.display_stage)
        .ok_or_else(|| format!("unknown display_stage {}", settings.frangi.display_stage))?;

    let global_contrast = settings
        .preprocessing
        .global_contrast
        .enabled
        .then(|| GlobalContrast {
            brightness: settings.preprocessing.global_contrast.brightness,
            contrast: settings.preprocessing.global_contrast.contrast,
        });
    let adaptive_contrast = settings.preprocessing.clahe.enabled.then(|| AdaptiveContrast {
        max_iterations: settings.preprocessing.clahe.max_iterations,
        target_contrast: settings.preprocessing.clahe.target_contrast,
    });
    let approval = settings.approval.enabled.then(|| ApprovalRegion {
        width: settings.approval.mask_width,
        height: settings.approval.mask_height,
        threshold: settings.approval.threshold,
    });

    Ok(FrameParams {
        sigma: settings.frangi.sigma,
        beta: settings.frangi.beta,
        c: settings.frangi.c,
        stage,
        invert: settings.frangi.invert_enabled,
        global_contrast,
        adaptive_contrast,
        segmentation_threshold: settings.frangi.segmentation_threshold,
        downscale_factor: settings.downscale_factor,
        pre_blur: false,
        approval,
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env().add_directive("nirvein=info".parse()?))
            .with_target(false)
            .init();
    }

    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let settings: Settings = match fs::read_to_string(&cli.config) {
        Ok(text) => serde_json::from_str(&text)?,
        Err(_) => {
            eprintln!(
                "settings file {} not found, using defaults",
                cli.config.display()
            );
            Settings::default()
        }
    };
    let params = frame_params(&settings)?;

    let frame = load_frame(&cli.input)?;
    let mut processor = FrangiProcessor::new();
    eprintln!("processing with {}", processor.method_name());

    let output = processor.process(&frame, &params)?;
    let (pw, ph) = output.processed_size;
    eprintln!(
        "frame {}x{} processed at {}x{}",
        frame.width(),
        frame.height(),
        pw,
        ph
    );

    if let Some(approval) = output.approval {
        let verdict = if approval.approved {
            "APPROVED"
        } else {
            "NOT APPROVED"
        };
        println!(
            "vessel ratio {:.1}% -> {}",
            approval.ratio * 100.0,
            verdict
        );
    }

    if let Some(path) = &cli.output {
        save_gray_image(path, &output.image)?;
        eprintln!("wrote {}", path.display());
    }

    Ok(())
}
