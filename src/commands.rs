use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use crate::config::{self, AppConfig};
use crate::driver::{AppiumDriver, Driver, MatchOptions};
use crate::errors::{LocatorError, LocatorResult};
use crate::imaging::upload::UploadedFile;
use crate::imaging::DisplayedRect;
use crate::locator::strategy::needs_automation_name_hint;
use crate::locator::{
    available_strategies, DriverMatcher, DriverScreenshotSource, LocatorStrategy, LocatorWorkflow,
    MatchResult, Screenshot, ScreenshotSource,
};

#[derive(Parser)]
#[command(name = "imgloc", about = "Locate UI elements by image template matching")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config.toml (searched for when omitted)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the locator strategies offered for a backend
    Strategies(StrategiesArgs),
    /// Save the current device screenshot
    Screenshot(ScreenshotArgs),
    /// Capture a screenshot and search it for a template
    Find(FindArgs),
    /// Write the effective configuration to a config.toml
    InitConfig(InitConfigArgs),
}

#[derive(Args)]
pub struct StrategiesArgs {
    /// Backend identifier (defaults to driver.automation_name from config)
    #[arg(long)]
    pub automation_name: Option<String>,

    /// Check whether one strategy (wire name, or `image`) is offered
    #[arg(long, allow_hyphen_values = true)]
    pub check: Option<LocatorStrategy>,
}

#[derive(Args)]
pub struct ScreenshotArgs {
    /// Output PNG file
    #[arg(short, long)]
    pub output: PathBuf,
}

#[derive(Args)]
pub struct InitConfigArgs {
    /// Destination (defaults to the user config directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

/// Size of the rendered screenshot, `WIDTHxHEIGHT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplaySize {
    pub width: u32,
    pub height: u32,
}

#[derive(Args)]
pub struct FindArgs {
    /// Template image to search for
    #[arg(long, conflicts_with = "crop", required_unless_present = "crop")]
    pub template: Option<PathBuf>,

    /// Crop the template from the screenshot: X,Y,WIDTH,HEIGHT in displayed pixels
    #[arg(long, value_parser = parse_rect)]
    pub crop: Option<DisplayedRect>,

    /// Displayed size the crop was drawn on (defaults to the screenshot's own size)
    #[arg(long, value_parser = parse_size, requires = "crop")]
    pub displayed: Option<DisplaySize>,

    /// Match threshold in [0.0, 1.0] (overrides config)
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Do not request a visualization of the match
    #[arg(long)]
    pub no_visualize: bool,

    /// Where to write the visualization PNG
    #[arg(long)]
    pub visualization_output: Option<PathBuf>,

    /// Where to write the selected template PNG
    #[arg(long)]
    pub candidate_output: Option<PathBuf>,
}

fn parse_rect(s: &str) -> Result<DisplayedRect, String> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid number in '{s}': {e}"))?;
    match parts.as_slice() {
        [x, y, w, h] => Ok(DisplayedRect::new(*x, *y, *w, *h)),
        _ => Err(format!("expected X,Y,WIDTH,HEIGHT, got '{s}'")),
    }
}

fn parse_size(s: &str) -> Result<DisplaySize, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let width = w.trim().parse().map_err(|e| format!("invalid width '{w}': {e}"))?;
    let height = h.trim().parse().map_err(|e| format!("invalid height '{h}': {e}"))?;
    Ok(DisplaySize { width, height })
}

pub async fn dispatch(cli: Cli) -> LocatorResult<()> {
    let config = config::load_config(cli.config.as_deref())?;
    match &cli.command {
        Commands::Strategies(args) => strategies(args, &config),
        Commands::Screenshot(args) => screenshot(args, &config).await,
        Commands::Find(args) => find(args, &config).await,
        Commands::InitConfig(args) => init_config(args, &config),
    }
}

fn strategies(args: &StrategiesArgs, config: &AppConfig) -> LocatorResult<()> {
    let automation_name = args
        .automation_name
        .as_deref()
        .or(config.driver.automation_name.as_deref());
    let offered = available_strategies(automation_name);
    if let Some(wanted) = args.check {
        if !offered.contains(&wanted) {
            return Err(LocatorError::Config(format!(
                "strategy '{wanted}' is not offered for automation name {}",
                automation_name.unwrap_or("(unset)")
            )));
        }
        println!("{:<24} {}", wanted.wire_name(), wanted.label());
        return Ok(());
    }
    for strategy in offered {
        println!("{:<24} {}", strategy.wire_name(), strategy.label());
    }
    if needs_automation_name_hint(automation_name) {
        println!();
        println!("Set an automation name to see backend-specific strategies.");
    }
    Ok(())
}

fn connect(config: &AppConfig) -> LocatorResult<Arc<dyn Driver>> {
    Ok(Arc::new(AppiumDriver::from_config(&config.driver)?))
}

async fn screenshot(args: &ScreenshotArgs, config: &AppConfig) -> LocatorResult<()> {
    let source = DriverScreenshotSource::new(connect(config)?);
    let shot = Screenshot::load(source.capture().await?).await?;
    let (w, h) = shot.natural_size();
    tokio::fs::write(&args.output, shot.image.bytes()).await?;
    println!("Saved {w}x{h} screenshot to {}", args.output.display());
    Ok(())
}

fn init_config(args: &InitConfigArgs, config: &AppConfig) -> LocatorResult<()> {
    let path = args
        .output
        .clone()
        .or_else(config::user_config_path)
        .ok_or_else(|| LocatorError::Config("no user config directory; pass --output".into()))?;
    if path.exists() && !args.force {
        return Err(LocatorError::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    config::save_config(config, &path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn match_options(args: &FindArgs, config: &AppConfig) -> LocatorResult<MatchOptions> {
    let mut options = config.matching.options();
    if let Some(threshold) = args.threshold {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(LocatorError::Config(format!(
                "threshold must be within [0, 1], got {threshold}"
            )));
        }
        options.threshold = threshold;
    }
    if args.no_visualize {
        options.visualize = false;
    }
    Ok(options)
}

async fn find(args: &FindArgs, config: &AppConfig) -> LocatorResult<()> {
    let options = match_options(args, config)?;
    let driver = connect(config)?;
    let mut workflow = LocatorWorkflow::new(
        Arc::new(DriverScreenshotSource::new(driver.clone())),
        Arc::new(DriverMatcher::with_mode(driver, config.matching.mode.clone())),
        options,
    );

    workflow.refresh_screenshot().await?;

    if let Some(path) = &args.template {
        let file = UploadedFile::from_path(path).await?;
        workflow.upload(file).await?;
    } else if let Some(rect) = args.crop {
        let natural = workflow
            .state()
            .screenshot()
            .map(|s| s.natural_size())
            .ok_or(LocatorError::NoScreenshot)?;
        let size = args.displayed.unwrap_or(DisplaySize {
            width: natural.0,
            height: natural.1,
        });
        workflow.set_displayed_size(size.width, size.height)?;
        workflow.start_cropping()?;
        workflow.update_crop(rect)?;
        if !workflow.complete_cropping()? {
            return Err(LocatorError::EmptySelection);
        }
    }

    if let (Some(path), Some(candidate)) = (&args.candidate_output, workflow.state().candidate()) {
        tokio::fs::write(path, candidate.image.bytes()).await?;
        println!("Saved template to {}", path.display());
    }

    match workflow.search().await? {
        MatchResult::Found {
            visualization,
            score,
            rect,
        } => {
            println!("Image found in screenshot");
            if let Some(score) = score {
                println!("  score: {score:.3}");
            }
            if let Some(r) = rect {
                println!("  rect: {},{} {}x{}", r.x, r.y, r.width, r.height);
            }
            match (visualization, &args.visualization_output) {
                (Some(viz), Some(path)) => {
                    tokio::fs::write(path, viz.bytes()).await?;
                    println!("  visualization saved to {}", path.display());
                }
                (None, Some(_)) => println!("  no visualization returned"),
                _ => {}
            }
        }
        MatchResult::NotFound => println!("Image not found in screenshot"),
    }
    Ok(())
}
