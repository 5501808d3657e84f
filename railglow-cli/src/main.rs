use std::fs;
use std::path::{Path, PathBuf};
use std::slice;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn, LevelFilter};
use railglow_lighting_lib::{
    suggested_tick_interval, DurationRange, EngineState, Layout, LedConfig, LightProfile,
    LoadReport, RandSampler, Snapshot, PWM_PINS,
};

/// Configure, preview and export the autonomous lighting of a model layout.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Log verbosity.
    #[arg(long, value_enum, default_value_t = LogLevel::default(), global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a layout document and list its LEDs.
    Check {
        /// Path to the layout .json file.
        file: PathBuf,
    },
    /// Generate the Arduino sketch for a layout.
    Export {
        /// Path to the layout .json file.
        file: PathBuf,

        /// Where to write the sketch (defaults to the layout path with .ino).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replay one LED offline and print its phase changes.
    Preview {
        /// Path to the layout .json file.
        file: PathBuf,

        /// LED number, starting at 1.
        #[arg(short, long, default_value_t = 1)]
        led: usize,

        /// Simulated time to replay, in seconds.
        #[arg(short, long, default_value_t = 120.0)]
        seconds: f64,

        /// Tick interval before speed scaling, in milliseconds.
        #[arg(long, default_value_t = 50)]
        tick_ms: u32,

        /// Speed multiplier (defaults to the one stored in the layout).
        #[arg(long)]
        speed: Option<f64>,

        /// Seed for a reproducible replay.
        #[arg(long)]
        seed: Option<u64>,

        /// Print every tick instead of only changes.
        #[arg(long)]
        every_tick: bool,
    },
    /// List the built-in light profiles and their defaults.
    Profiles,
    /// Write a layout document with every LED disabled.
    Init {
        #[arg(short, long, default_value = "layout.json")]
        output: PathBuf,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    #[default]
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    #[must_use]
    const fn as_level_filter(self) -> LevelFilter {
        match self {
            Self::Off => LevelFilter::Off,
            Self::Error => LevelFilter::Error,
            Self::Warn => LevelFilter::Warn,
            Self::Info => LevelFilter::Info,
            Self::Debug => LevelFilter::Debug,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::builder()
        .filter_level(args.log_level.as_level_filter())
        .format_timestamp(None)
        .init();

    match args.command {
        Command::Check { file } => check(&file),
        Command::Export { file, output } => export(&file, output),
        Command::Preview {
            file,
            led,
            seconds,
            tick_ms,
            speed,
            seed,
            every_tick,
        } => preview(
            &file,
            &PreviewOptions {
                led,
                seconds,
                tick_ms,
                speed,
                seed,
                every_tick,
            },
        ),
        Command::Profiles => {
            print_profiles();
            Ok(())
        }
        Command::Init { output, force } => init(&output, force),
    }
}

fn load_layout(path: &Path) -> Result<(Layout, LoadReport)> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Error reading {}", path.display()))?;
    let mut layout = Layout::default();
    let report = layout
        .load_json(&text)
        .with_context(|| format!("Invalid layout {}", path.display()))?;
    info!("Loaded {}", path.display());
    Ok((layout, report))
}

fn log_warnings(report: &LoadReport) {
    for warning in &report.load_warnings {
        warn!("{warning}");
    }
    for warning in &report.validation_warnings {
        warn!("{warning}");
    }
}

fn check(path: &Path) -> Result<()> {
    let (layout, report) = load_layout(path)?;

    for warning in &report.load_warnings {
        println!("warning: {warning}");
    }
    for warning in &report.validation_warnings {
        println!("warning: {warning}");
    }

    println!(
        "{}: {} LEDs valid, simulation speed {:.1}x",
        path.display(),
        layout.leds().len(),
        layout.speed_factor()
    );
    println!();
    println!(
        "{:>3}  {:>4}  {:<18}  {:<15}  {:<15}  Extras",
        "#", "Pin", "Profile", "On (s)", "Off (s)"
    );
    println!("{}", "-".repeat(78));
    for (index, led) in layout.leds().leds().iter().enumerate() {
        println!(
            "{:>3}  {:>4}  {:<18}  {:<15}  {:<15}  {}",
            index + 1,
            led.pin(),
            led.profile().name(),
            range_secs(led.on()),
            range_secs(led.off()),
            extras(led)
        );
    }
    Ok(())
}

fn export(path: &Path, output: Option<PathBuf>) -> Result<()> {
    let (layout, report) = load_layout(path)?;
    log_warnings(&report);

    let (sketch, warnings) = layout
        .export_firmware()
        .context("Layout cannot be exported")?;
    for warning in &warnings {
        warn!("{warning}");
    }

    let output = output.unwrap_or_else(|| path.with_extension("ino"));
    fs::write(&output, sketch).with_context(|| format!("Error writing {}", output.display()))?;
    println!(
        "Wrote {} ({} LEDs)",
        output.display(),
        layout.leds().len()
    );
    Ok(())
}

struct PreviewOptions {
    led: usize,
    seconds: f64,
    tick_ms: u32,
    speed: Option<f64>,
    seed: Option<u64>,
    every_tick: bool,
}

fn preview(path: &Path, options: &PreviewOptions) -> Result<()> {
    let (layout, report) = load_layout(path)?;
    log_warnings(&report);

    let Some(config) = options
        .led
        .checked_sub(1)
        .and_then(|index| layout.leds().get(index))
    else {
        bail!(
            "LED {} does not exist (layout has {} LEDs)",
            options.led,
            layout.leds().len()
        );
    };

    let speed = options.speed.unwrap_or_else(|| layout.speed_factor());
    if !(speed.is_finite() && speed > 0.0) {
        bail!("Speed must be a positive number, got {speed}");
    }
    if options.tick_ms == 0 {
        bail!("Tick interval must be at least 1 ms");
    }
    if !(options.seconds.is_finite() && options.seconds >= 0.0) {
        bail!("Duration must be a non-negative number of seconds");
    }

    // Simulated milliseconds covered by one tick
    let step = f64::from(options.tick_ms) * speed;
    if let Some(suggested) = suggested_tick_interval(slice::from_ref(config)) {
        if step > f64::from(suggested) {
            warn!(
                "Each tick covers {step:.0} ms of simulated time; blink edges every {suggested} ms will be missed"
            );
        } else {
            info!("Blink edges fall on multiples of {suggested} ms");
        }
    }

    let mut sampler = options
        .seed
        .map_or_else(RandSampler::from_entropy, RandSampler::seeded);
    let mut engine = EngineState::new(config, &mut sampler);

    println!(
        "LED {} on pin {} ({}), {:.1}x speed",
        options.led,
        config.pin(),
        config.profile(),
        speed
    );
    println!();
    println!(
        "{:>12}  {:<8}  {:>5}  {:<7}  {:>12}",
        "Time (s)", "Mode", "Level", "Color", "Phase (s)"
    );
    println!("{}", "-".repeat(52));

    let total_ms = sim_time_ms(1, options.seconds * 1000.0);
    let mut last: Option<Snapshot> = None;
    for tick in 0u64.. {
        let now = sim_time_ms(tick, step);
        if now > total_ms {
            break;
        }
        let snapshot = engine.advance(config, now, &mut sampler);
        let changed = last.map_or(true, |prev| {
            prev.mode != snapshot.mode || prev.brightness != snapshot.brightness
        });
        if changed || options.every_tick {
            print_snapshot(now, &snapshot);
        }
        last = Some(snapshot);
    }
    Ok(())
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn sim_time_ms(tick: u64, step: f64) -> u64 {
    (tick as f64 * step).round() as u64
}

fn print_snapshot(now_ms: u64, snapshot: &Snapshot) {
    let color = snapshot.color();
    println!(
        "{:>12}  {:<8}  {:>5}  #{}  {:>12}",
        secs(now_ms),
        snapshot.mode.label(),
        snapshot.brightness,
        hex::encode([color.r, color.g, color.b]),
        secs(snapshot.phase_duration_ms)
    );
}

fn print_profiles() {
    println!(
        "{:<18}  {:<15}  {:<15}  {:<8}  Brightness",
        "Profile", "On (s)", "Off (s)", "Blink"
    );
    println!("{}", "-".repeat(72));
    for profile in LightProfile::ALL {
        let led = profile.defaults(PWM_PINS[0]);
        let vb = led.variable_brightness();
        let brightness = if vb.enabled {
            format!("{}-{}", vb.min, vb.max)
        } else {
            "255".to_string()
        };
        let blink = if profile.capabilities().allow_blink {
            "allowed"
        } else {
            "-"
        };
        println!(
            "{:<18}  {:<15}  {:<15}  {:<8}  {}",
            profile.name(),
            range_secs(led.on()),
            range_secs(led.off()),
            blink,
            brightness
        );
    }
}

fn init(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", output.display());
    }
    let text = Layout::default().to_json()?;
    fs::write(output, text).with_context(|| format!("Error writing {}", output.display()))?;
    println!("Wrote {}", output.display());
    Ok(())
}

fn secs(ms: u64) -> String {
    format!("{}.{:03}", ms / 1000, ms % 1000)
}

fn range_secs(range: DurationRange) -> String {
    if range.min_ms == range.max_ms {
        secs(range.min_ms)
    } else {
        format!("{}-{}", secs(range.min_ms), secs(range.max_ms))
    }
}

fn extras(led: &LedConfig) -> String {
    let mut extras = Vec::new();
    if led.fade_in().enabled {
        extras.push(format!("fade in {}", range_secs(led.fade_in().range)));
    }
    if led.fade_out().enabled {
        extras.push(format!("fade out {}", range_secs(led.fade_out().range)));
    }
    let vb = led.variable_brightness();
    if vb.enabled {
        extras.push(format!("brightness {}-{}", vb.min, vb.max));
    }
    if led.blink_active() {
        let blink = led.blink();
        extras.push(format!("blink {}/{} ms", blink.on_ms, blink.off_ms));
    }
    extras.join(", ")
}
