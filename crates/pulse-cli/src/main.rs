use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use plotters::prelude::*;
use pulse_lib::{
    io::{self as trace_io, text as text_io, TraceSample},
    plot::{figure_from_snapshot, Figure, Series},
    run_trace, Pipeline, PipelineConfig,
};
use pulse_sim::{read_spec, simulate, write_beats_json, SimulationSpec};
use std::{
    io::{self, Read},
    path::{Path, PathBuf},
};

const PLOT_MAX_POINTS: usize = 2000;

#[derive(Parser)]
#[command(
    name = "pulse",
    version,
    about = "PULSE: camera PPG heart-rate and rhythm tools"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a synthetic fingertip brightness trace as CSV (time_ms,value)
    Simulate {
        #[arg(long)]
        spec: Option<PathBuf>,
        #[arg(long)]
        bpm: Option<f64>,
        #[arg(long)]
        duration_s: Option<f64>,
        #[arg(long)]
        fps: Option<f64>,
        #[arg(long)]
        ectopic_every: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        out: PathBuf,
        /// Also write ground-truth beat times as JSON
        #[arg(long)]
        beats: Option<PathBuf>,
    },
    /// Stream a trace through the pipeline and print every accepted peak as JSON
    DetectPeaks {
        #[arg(long)]
        input: Option<PathBuf>,
        /// Treat input as one value per line sampled at this rate (Hz)
        #[arg(long)]
        fs: Option<f64>,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Stream a trace through the pipeline and print the recording summary
    Process {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        fs: Option<f64>,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Render the final buffer window with peak markers to a PNG
    Plot {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        fs: Option<f64>,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        out: PathBuf,
    },
    /// Print the default pipeline configuration as TOML
    ConfigTemplate,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Simulate {
            spec,
            bpm,
            duration_s,
            fps,
            ectopic_every,
            seed,
            out,
            beats,
        } => {
            let mut sim = match spec {
                Some(path) => read_spec(&path)?,
                None => SimulationSpec::default(),
            };
            if let Some(bpm) = bpm {
                sim.bpm = bpm;
            }
            if let Some(duration_s) = duration_s {
                sim.duration_s = duration_s;
            }
            if let Some(fps) = fps {
                sim.fps = fps;
            }
            if let Some(every) = ectopic_every {
                sim.ectopic_every = every;
            }
            if let Some(seed) = seed {
                sim.seed = seed;
            }
            cmd_simulate(&sim, &out, beats.as_deref())?
        }
        Commands::DetectPeaks { input, fs, config } => {
            cmd_detect_peaks(input.as_deref(), fs, config.as_deref())?
        }
        Commands::Process { input, fs, config } => {
            cmd_process(input.as_deref(), fs, config.as_deref())?
        }
        Commands::Plot {
            input,
            fs,
            config,
            out,
        } => cmd_plot(input.as_deref(), fs, config.as_deref(), &out)?,
        Commands::ConfigTemplate => print!("{}", PipelineConfig::default().to_toml_string()?),
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let cfg = match path {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    Ok(cfg)
}

/// A CSV trace, or a bare column of values when a sampling rate is given.
fn load_trace(input: Option<&Path>, fs: Option<f64>) -> Result<Vec<TraceSample>> {
    let trace = match (input, fs) {
        (Some(path), Some(fs)) => text_io::series_to_trace(&text_io::read_f64_series(path)?, fs)?,
        (Some(path), None) => trace_io::read_trace(path)?,
        (None, fs) => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("reading trace from stdin")?;
            match fs {
                Some(fs) => text_io::series_to_trace(&text_io::parse_f64_series(&buf)?, fs)?,
                None => trace_io::read_trace_from(buf.as_bytes())?,
            }
        }
    };
    log::info!("loaded {} samples", trace.len());
    Ok(trace)
}

fn cmd_simulate(sim: &SimulationSpec, out: &Path, beats: Option<&Path>) -> Result<()> {
    let trace = simulate(sim)?;
    trace_io::write_trace(out, &trace.samples)?;
    if let Some(path) = beats {
        write_beats_json(path, &trace)?;
    }
    log::info!(
        "wrote {} samples ({} beats) to {}",
        trace.samples.len(),
        trace.beat_times_ms.len(),
        out.display()
    );
    Ok(())
}

fn cmd_detect_peaks(input: Option<&Path>, fs: Option<f64>, config: Option<&Path>) -> Result<()> {
    let trace = load_trace(input, fs)?;
    let summary = run_trace(load_config(config)?, &trace)?;
    println!("{}", serde_json::to_string(&summary.peaks)?);
    Ok(())
}

fn cmd_process(input: Option<&Path>, fs: Option<f64>, config: Option<&Path>) -> Result<()> {
    let trace = load_trace(input, fs)?;
    let summary = run_trace(load_config(config)?, &trace)?;
    if summary.rejected > 0 {
        log::warn!("{} samples rejected", summary.rejected);
    }
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

fn cmd_plot(
    input: Option<&Path>,
    fs: Option<f64>,
    config: Option<&Path>,
    out: &Path,
) -> Result<()> {
    let trace = load_trace(input, fs)?;
    let mut pipeline = Pipeline::new(load_config(config)?)?;
    pipeline.start();
    for sample in &trace {
        pipeline.submit_sample(sample.value, sample.time_ms);
    }
    let fig = figure_from_snapshot(&pipeline.snapshot(), PLOT_MAX_POINTS);
    draw_plotters_figure(out, &fig)
}

fn draw_plotters_figure(path: &Path, fig: &Figure) -> Result<()> {
    let backend = BitMapBackend::new(path, (800, 480));
    let root = backend.into_drawing_area();
    root.fill(&WHITE)?;
    let (x_min, x_max, y_min, y_max) = fig.bounds().unwrap_or((0.0, 1.0, 0.0, 1.0));
    let y_pad = ((y_max - y_min) * 0.05).max(1e-3);
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption(
            fig.title.clone().unwrap_or_else(|| "PPG".into()),
            ("sans-serif", 24),
        )
        .x_label_area_size(30)
        .y_label_area_size(40)
        .build_cartesian_2d(x_min..x_max.max(x_min + 1.0), (y_min - y_pad)..(y_max + y_pad))?;
    let mut mesh = chart.configure_mesh();
    if let Some(label) = &fig.x_label {
        mesh.x_desc(label.as_str());
    }
    if let Some(label) = &fig.y_label {
        mesh.y_desc(label.as_str());
    }
    mesh.draw()?;
    for series in &fig.series {
        match series {
            Series::Line(line) => {
                let (r, g, b) = line.style.color.rgb();
                chart.draw_series(LineSeries::new(
                    line.points.iter().map(|p| (p[0], p[1])),
                    RGBColor(r, g, b).stroke_width(line.style.width.max(1.0) as u32),
                ))?;
            }
            Series::Markers(markers) => {
                let (r, g, b) = markers.style.color.rgb();
                let color = RGBColor(r, g, b);
                chart.draw_series(
                    markers
                        .points
                        .iter()
                        .map(|p| Circle::new((p[0], p[1]), 4, color.filled())),
                )?;
            }
        }
    }
    root.present()?;
    Ok(())
}
