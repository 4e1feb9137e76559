use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use console::style;
use dialoguer::{Confirm, Select, theme::ColorfulTheme};
use flashpick_core::constraints::{self, DriveStatus};
use flashpick_core::progress::Ticker;
use flashpick_core::{
    Device, DeviceId, ErrorKind, Estimator, EstimatorOptions, Image, OsSelection,
    ProgressSnapshot, Selection,
};
use indicatif::{HumanBytes, HumanDuration, ProgressBar, ProgressStyle};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "flashpick")]
#[command(about = "Pick a safe target device for a disk image", version)]
struct Cli {
    /// JSON device catalog to use instead of scanning the system
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// JSON OS manifest; its size variants are matched to each device
    #[arg(long, global = true)]
    os: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List devices and whether they can take the image
    List {
        /// Image file to check devices against
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Check whether an image can be written to a device
    Check {
        /// Image file to write
        #[arg(long)]
        image: Option<PathBuf>,

        /// Device identity, e.g. /dev/sdb
        #[arg(long, required = true)]
        device: String,
    },
    /// Choose a target device for an image interactively
    Pick {
        /// Image file to write
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Preview progress reporting with a synthetic write
    Simulate {
        /// Total bytes to "write"
        #[arg(long, default_value_t = 4_000_000_000)]
        size: u64,

        /// Bytes per second
        #[arg(long, default_value_t = 40_000_000)]
        rate: u64,

        /// Seconds between stalls (0 disables them)
        #[arg(long, default_value_t = 0)]
        stall_every: u64,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

fn load_catalog(path: Option<&Path>) -> Result<Vec<Device>> {
    match path {
        Some(path) => {
            let data = fs::read_to_string(path)
                .with_context(|| format!("Failed to read catalog {}", path.display()))?;
            serde_json::from_str(&data)
                .with_context(|| format!("Invalid catalog {}", path.display()))
        }
        None => flashpick_core::platform::scan_devices(),
    }
}

fn load_os(path: &Path) -> Result<OsSelection> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read OS manifest {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("Invalid OS manifest {}", path.display()))
}

fn image_from_file(path: &Path) -> Result<Image> {
    let size = fs::metadata(path)
        .with_context(|| format!("Cannot open image {}", path.display()))?
        .len();
    // Mount point comparisons need an absolute path.
    let path = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    Ok(Image::new(path.to_string_lossy(), size))
}

/// Builds the engine from the global options plus an optional image file.
fn build_selection(cli: &Cli, image: Option<&Path>) -> Result<Selection> {
    let mut selection = Selection::with_catalog(load_catalog(cli.catalog.as_deref())?);
    if let Some(image) = image {
        selection.set_image(image_from_file(image)?)?;
    }
    if let Some(os) = &cli.os {
        selection.set_os(load_os(os)?);
    }
    debug!("Loaded {} devices", selection.catalog().len());
    Ok(selection)
}

fn format_statuses(statuses: &[DriveStatus]) -> String {
    statuses
        .iter()
        .map(|s| {
            if s.is_error() {
                style(s.to_string()).red().to_string()
            } else {
                style(s.to_string()).yellow().to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_error(err: &flashpick_core::Error) -> String {
    let label = match err.kind() {
        ErrorKind::InvalidArgument => "Invalid input",
        ErrorKind::NotFound => "Not found",
        ErrorKind::WriteProtected => "Locked",
        ErrorKind::InsufficientCapacity => "Too small",
        ErrorKind::LifecycleViolation => "Internal error",
    };
    format!("{} {}", style(format!("{label}:")).red().bold(), err)
}

fn list(selection: &Selection) {
    let devices = selection.catalog();
    if devices.is_empty() {
        println!("No devices found.");
        return;
    }

    let image = selection.image();
    println!("Found {} devices:", devices.len());
    println!(
        "\n  {:<15} {:<25} {:>9}  {:<10} {}",
        "DEVICE", "NAME", "SIZE", "VARIANT", "STATUS"
    );
    println!("  {:-<15} {:-<25} {:-<9}  {:-<10} {:-<20}", "", "", "", "", "");
    for device in devices {
        // Each device is judged against the image it would actually receive.
        let candidate = flashpick_core::selection::effective_image(
            image.as_ref(),
            selection.os(),
            Some(device),
        );
        let variant = selection
            .recommended_image(&device.id)
            .map(|v| HumanBytes(v.recommended_drive_size).to_string())
            .unwrap_or_else(|| "-".to_string());
        let statuses = constraints::drive_statuses(device, candidate.as_ref());
        println!(
            "  {:<15} {:<25} {:>9}  {:<10} {}",
            device.id.to_string(),
            device.name,
            HumanBytes(device.size).to_string(),
            variant,
            format_statuses(&statuses)
        );
    }
}

fn check(mut selection: Selection, device: &str) -> Result<()> {
    let id = DeviceId::from(device);
    if let Err(e) = selection.set_device(&id) {
        println!("{}", describe_error(&e));
        return Err(e.into());
    }

    // set_device succeeded, so the device is in the catalog.
    let device = selection
        .drive()
        .ok_or_else(|| anyhow!("Device {} vanished", id))?;
    let image = selection.image();
    let warnings = constraints::drive_statuses(device, image.as_ref());

    println!("  Device: {}", style(device).cyan());
    if let Some(image) = &image {
        println!(
            "  Image:  {} ({})",
            style(&image.path).cyan(),
            HumanBytes(image.size)
        );
    }
    if !warnings.is_empty() {
        println!("  {}  {}", style("Warnings:").yellow().bold(), format_statuses(&warnings));
    }
    if warnings.iter().any(|s| s.is_error()) {
        return Err(anyhow!("{} cannot be written", device.id));
    }
    println!("\n✨ {} can be written.", style(&device.id).cyan());
    Ok(())
}

/// Presents an interactive menu until the user picks a valid device or quits.
/// Statuses of the selected device against the image it would receive.
fn selected_warnings(selection: &Selection) -> Vec<DriveStatus> {
    selection
        .drive()
        .map(|device| constraints::drive_statuses(device, selection.image().as_ref()))
        .unwrap_or_default()
}

fn pick(mut selection: Selection) -> Result<()> {
    if selection.catalog().is_empty() {
        return Err(anyhow!("No devices found."));
    }

    loop {
        let image = selection.image();
        let items: Vec<String> = selection
            .catalog()
            .iter()
            .map(|d| {
                let candidate = flashpick_core::selection::effective_image(
                    image.as_ref(),
                    selection.os(),
                    Some(d),
                );
                let statuses = constraints::drive_statuses(d, candidate.as_ref());
                let marker = if selection.is_current_drive(&d.id) { "*" } else { " " };
                format!("{marker} {d} {}", format_statuses(&statuses))
            })
            .collect();

        let Some(index) = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Select the target device (Esc to quit)")
            .items(&items)
            .default(0)
            .interact_opt()?
        else {
            println!("No device selected.");
            return Ok(());
        };

        let id = selection.catalog()[index].id.clone();
        if let Err(e) = selection.toggle_device(&id) {
            println!("{}", describe_error(&e));
            continue;
        }

        let Some(device) = selection.drive() else {
            continue;
        };
        let warnings = selected_warnings(&selection);
        if !warnings.is_empty() {
            println!("{} {}", style("WARNING:").yellow().bold(), format_statuses(&warnings));
        }

        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Use '{}' ({})?", device.name, HumanBytes(device.size)))
            .default(false)
            .interact()?;
        if confirmed {
            println!("\n✨ Selected {}.", style(&device.id).cyan());
            return Ok(());
        }
        selection.remove_device();
    }
}

fn render(bar: &ProgressBar, snapshot: ProgressSnapshot) {
    bar.set_position(snapshot.percentage as u64);
    let speed = snapshot
        .speed
        .map(|s| format!("{}/s", HumanBytes(s as u64)))
        .unwrap_or_else(|| "-- B/s".to_string());
    let eta = snapshot
        .eta
        .map(|e| HumanDuration(Duration::from_secs(e)).to_string())
        .unwrap_or_else(|| "unknown".to_string());
    bar.set_message(format!("{speed}, {eta} left"));
}

fn simulate(size: u64, rate: u64, stall_every: u64) -> Result<()> {
    if rate == 0 {
        return Err(anyhow!("--rate must be greater than zero"));
    }

    // This flag allows for graceful cancellation of the simulated write.
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let bar = ProgressBar::new(100);
    bar.set_prefix("Writing");
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{prefix:12} [{elapsed_precise}] [{bar:40.green/black}] {pos:>3}% ({msg})")?
            .progress_chars("■ "),
    );

    let sink = bar.clone();
    let estimator = Estimator::new(EstimatorOptions::default().total_size(size), move |snapshot| {
        render(&sink, snapshot)
    });
    let ticker = Ticker::start(estimator)?;

    let step = Duration::from_millis(100);
    let chunk = (rate / 10).max(1);
    let mut written: u64 = 0;
    let mut elapsed = Duration::ZERO;
    while written < size {
        if !running.load(Ordering::SeqCst) {
            ticker.abort()?;
            bar.abandon_with_message("Cancelled.");
            return Err(anyhow!("Operation cancelled by user"));
        }

        thread::sleep(step);
        elapsed += step;
        let stalled = stall_every > 0 && (elapsed.as_secs() / stall_every) % 2 == 1;
        if !stalled {
            let n = chunk.min(size - written);
            ticker.update(n)?;
            written += n;
        }
    }

    ticker.complete()?;
    bar.finish_with_message("Write complete.");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Commands::List { image } => {
            let selection = build_selection(&cli, image.as_deref())?;
            list(&selection);
        }
        Commands::Check { image, device } => {
            let selection = build_selection(&cli, image.as_deref())?;
            check(selection, device)?;
        }
        Commands::Pick { image } => {
            let selection = build_selection(&cli, image.as_deref())?;
            pick(selection)?;
        }
        Commands::Simulate {
            size,
            rate,
            stall_every,
        } => simulate(*size, *rate, *stall_every)?,
    }

    Ok(())
}
