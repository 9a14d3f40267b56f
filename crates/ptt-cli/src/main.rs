mod simulate;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use plotters::prelude::*;
use ptt_lib::{
    channels::{ChannelKind, EcgRecord},
    config::{PipelineConfig, SanitizeStrategy},
    io::{self as ptt_io, ColumnTable},
    plot::{figure_for_channel, figure_from_rr, Figure, PlotBackend, Series},
    recording::{session_ids, Recording, SessionData, SessionReport},
    signal::Signal,
};
use serde::Serialize;
use std::{
    fs::File,
    io::{self, Write},
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[command(
    name = "ptt",
    version,
    about = "Pulse transit time and heart rate from synchronized ECG, BCG, PPG and IMU recordings"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Channel {
    Ecg,
    Bcg,
    Ppg,
    Imu,
}

impl From<Channel> for ChannelKind {
    fn from(channel: Channel) -> Self {
        match channel {
            Channel::Ecg => ChannelKind::Ecg,
            Channel::Bcg => ChannelKind::Bcg,
            Channel::Ppg => ChannelKind::Ppg,
            Channel::Imu => ChannelKind::Imu,
        }
    }
}

/// Input table, configuration and column overrides shared by the session
/// commands.
#[derive(Args)]
struct TableArgs {
    /// CSV recording with a header row
    #[arg(long)]
    input: PathBuf,
    /// TOML pipeline configuration
    #[arg(long)]
    config: Option<PathBuf>,
    /// Sampling rate in Hz (overrides the config)
    #[arg(long)]
    fs: Option<u32>,
    #[arg(long)]
    ecg_column: Option<String>,
    #[arg(long)]
    bcg_column: Option<String>,
    #[arg(long)]
    ppg_column: Option<String>,
    /// Accelerometer axis column, repeat for up to three axes
    #[arg(long = "imu-column")]
    imu_columns: Vec<String>,
    #[arg(long)]
    session_column: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every session (or one with --session) and print JSON reports
    Session {
        #[command(flatten)]
        table: TableArgs,
        #[arg(long)]
        session: Option<i64>,
    },
    /// Heart rate and R-peaks from newline-delimited ECG samples (stdin or --input)
    Ecg {
        #[arg(long, default_value_t = ptt_lib::config::DEFAULT_FS)]
        fs: u32,
        #[arg(long)]
        input: Option<PathBuf>,
        /// Drop samples outside the 1st-98th percentile before filtering
        #[arg(long)]
        trim: bool,
    },
    /// Write time, filtered waveform and event markers of one channel as CSV
    Markers {
        #[command(flatten)]
        table: TableArgs,
        #[arg(long, default_value_t = 0)]
        session: i64,
        #[arg(long, value_enum)]
        channel: Channel,
        /// Output CSV, stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Render one channel's filtered waveform and events to PNG
    Plot {
        #[command(flatten)]
        table: TableArgs,
        #[arg(long, default_value_t = 0)]
        session: i64,
        #[arg(long, value_enum)]
        channel: Channel,
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = 4000)]
        max_points: usize,
        /// Plot instantaneous heart rate per beat instead of the waveform (ecg only)
        #[arg(long)]
        heart_rate: bool,
    },
    /// Write a synthetic multi-session recording CSV
    Simulate {
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = ptt_lib::config::DEFAULT_FS)]
        fs: u32,
        #[arg(long, default_value_t = 2)]
        sessions: usize,
        #[arg(long, default_value_t = 20.0)]
        seconds: f64,
        #[arg(long, default_value_t = 72.0)]
        hr: f64,
        #[arg(long, default_value_t = 7)]
        seed: u64,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Session { table, session } => cmd_session(&table, session)?,
        Commands::Ecg { fs, input, trim } => cmd_ecg(fs, input.as_deref(), trim)?,
        Commands::Markers {
            table,
            session,
            channel,
            out,
        } => cmd_markers(&table, session, channel.into(), out.as_deref())?,
        Commands::Plot {
            table,
            session,
            channel,
            out,
            max_points,
            heart_rate,
        } => cmd_plot(
            &table,
            session,
            channel.into(),
            &out,
            max_points,
            heart_rate,
        )?,
        Commands::Simulate {
            out,
            fs,
            sessions,
            seconds,
            hr,
            seed,
        } => cmd_simulate(
            &out,
            simulate::SimulationSpec {
                fs,
                sessions,
                seconds,
                base_hr_bpm: hr,
                seed,
            },
        )?,
    }
    Ok(())
}

fn load_config(args: &TableArgs) -> Result<PipelineConfig> {
    let mut cfg = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(fs) = args.fs {
        cfg.fs = fs;
    }
    let map = &mut cfg.channels;
    if let Some(col) = &args.ecg_column {
        map.ecg = col.clone();
    }
    if args.bcg_column.is_some() {
        map.bcg = args.bcg_column.clone();
    }
    if args.ppg_column.is_some() {
        map.ppg = args.ppg_column.clone();
    }
    if !args.imu_columns.is_empty() {
        map.imu = args.imu_columns.clone();
    }
    if args.session_column.is_some() {
        map.session = args.session_column.clone();
    }
    cfg.validate().context("invalid pipeline configuration")?;
    Ok(cfg)
}

fn load_table(args: &TableArgs) -> Result<(PipelineConfig, ColumnTable)> {
    let cfg = load_config(args)?;
    let wanted = SessionData::columns(&cfg.channels);
    let table = ptt_io::read_columns_from_path(&args.input, &wanted)?;
    log::info!("{}: {} rows", args.input.display(), table.rows());
    Ok((cfg, table))
}

fn process_session(cfg: &PipelineConfig, table: &ColumnTable, id: i64) -> Result<Recording> {
    let data = SessionData::select(table, &cfg.channels, cfg.fs, id)?;
    Recording::process(&data, cfg).with_context(|| format!("processing session {id}"))
}

fn cmd_session(args: &TableArgs, session: Option<i64>) -> Result<()> {
    let (cfg, table) = load_table(args)?;
    let ids = match session {
        Some(id) => vec![id],
        None => session_ids(&table, &cfg.channels)?,
    };
    let reports = ids
        .into_iter()
        .map(|id| process_session(&cfg, &table, id)?.report().map_err(Into::into))
        .collect::<Result<Vec<SessionReport>>>()?;
    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}

#[derive(Serialize)]
struct EcgOutput {
    fs: u32,
    samples: usize,
    heart_rate_bpm: f64,
    r_peaks: Vec<usize>,
    rr_s: Vec<f64>,
}

fn read_samples(input: Option<&Path>) -> Result<Vec<f64>> {
    match input {
        Some(path) => ptt_io::read_f64_series(path),
        None => ptt_io::read_samples(io::stdin().lock()),
    }
}

fn cmd_ecg(fs: u32, input: Option<&Path>, trim: bool) -> Result<()> {
    let signal = Signal::new("ECG", fs, read_samples(input)?);
    let mut cfg = PipelineConfig::default().ecg;
    if trim {
        cfg.sanitize = SanitizeStrategy::QuantileTrim;
    }
    let record = EcgRecord::process(&signal, &cfg)?;
    let output = EcgOutput {
        fs,
        samples: record.raw.len(),
        heart_rate_bpm: record.heart_rate_bpm,
        rr_s: record.rr().rr,
        r_peaks: record.r_peaks.indices,
    };
    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}

fn cmd_markers(args: &TableArgs, session: i64, kind: ChannelKind, out: Option<&Path>) -> Result<()> {
    let (cfg, table) = load_table(args)?;
    let recording = process_session(&cfg, &table, session)?;
    let Some(record) = recording.channel(kind) else {
        bail!("{kind} channel is not available for session {session}");
    };
    match out {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
            ptt_io::write_markers(file, record.filtered(), record.events())?;
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            ptt_io::write_markers(&mut lock, record.filtered(), record.events())?;
            lock.flush()?;
        }
    }
    Ok(())
}

fn cmd_plot(
    args: &TableArgs,
    session: i64,
    kind: ChannelKind,
    out: &Path,
    max_points: usize,
    heart_rate: bool,
) -> Result<()> {
    if heart_rate && kind != ChannelKind::Ecg {
        bail!("--heart-rate is only available for the ecg channel");
    }
    let (cfg, table) = load_table(args)?;
    let recording = process_session(&cfg, &table, session)?;
    let Some(record) = recording.channel(kind) else {
        bail!("{kind} channel is not available for session {session}");
    };
    let mut fig = if heart_rate {
        figure_from_rr(&recording.ecg.rr(), max_points)
    } else {
        figure_for_channel(record, max_points)
    };
    if let Some(title) = &fig.title {
        fig.title = Some(format!("{} | {}", recording.label, title));
    }
    PngBackend { path: out }.draw(&fig)
}

fn cmd_simulate(out: &Path, spec: simulate::SimulationSpec) -> Result<()> {
    if spec.sessions == 0 || !spec.seconds.is_finite() || spec.seconds <= 1.0 {
        bail!("simulate needs at least one session longer than one second");
    }
    if !(spec.base_hr_bpm > 0.0 && spec.base_hr_bpm.is_finite()) {
        bail!("simulate needs a positive heart rate, got {}", spec.base_hr_bpm);
    }
    let data = simulate::simulate(&spec);
    let file = File::create(out).with_context(|| format!("creating {}", out.display()))?;
    ptt_io::write_columns(file, &data.columns())?;
    log::info!("wrote {} rows to {}", data.ecg.len(), out.display());
    Ok(())
}

struct PngBackend<'a> {
    path: &'a Path,
}

impl PlotBackend for PngBackend<'_> {
    fn draw(&mut self, fig: &Figure) -> Result<()> {
        let backend = BitMapBackend::new(self.path, (1200, 480));
        let root = backend.into_drawing_area();
        root.fill(&WHITE)?;
        let (x_min, x_max, y_min, y_max) = fig.bounds().unwrap_or((0.0, 1.0, 0.0, 1.0));
        let pad = ((y_max - y_min) * 0.05).max(1e-9);
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .caption(
                fig.title.clone().unwrap_or_else(|| "Plot".into()),
                ("sans-serif", 24),
            )
            .x_label_area_size(30)
            .y_label_area_size(50)
            .build_cartesian_2d(x_min..x_max.max(x_min + 1e-9), (y_min - pad)..(y_max + pad))?;
        let mut mesh = chart.configure_mesh();
        if let Some(label) = &fig.x.label {
            mesh.x_desc(label.as_str());
        }
        if let Some(label) = &fig.y.label {
            mesh.y_desc(label.as_str());
        }
        mesh.draw()?;
        for series in &fig.series {
            match series {
                Series::Line(line) => {
                    let (r, g, b) = line.style.color.rgb();
                    chart.draw_series(LineSeries::new(
                        line.points.iter().map(|p| (p[0], p[1])),
                        &RGBColor(r, g, b),
                    ))?;
                }
                Series::Markers(markers) => {
                    let (r, g, b) = markers.style.color.rgb();
                    let color = RGBColor(r, g, b);
                    let size = markers.style.width.round() as i32;
                    chart.draw_series(
                        markers
                            .points
                            .iter()
                            .map(|p| Circle::new((p[0], p[1]), size, color.filled())),
                    )?;
                }
            }
        }
        root.present()?;
        Ok(())
    }
}
