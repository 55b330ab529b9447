use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::PathBuf,
    process::ExitCode,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use clap::{Parser, ValueEnum};
use image::RgbaImage;
use num::BigRational;
use rf_core::{
    binary_fixed::types::I20F44, registry, BigFixed, BinaryFixed, Decimal, EscapeTime,
    HuePalette, MaskedFloat, Number, NumberError, StandardFactory, UnknownPlugin, Viewport,
};
use rf_render::{
    persist, Consumer, FormatError, Persist, ProduceError, Production, ProgressiveRefinement,
    ProgressiveRefinementConsumer, RasterScan, RasterScanConsumer, Workers,
};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Renders an escape-time fractal over a rectangle of the complex plane.
#[derive(Debug, Parser)]
#[command(name = "refract", allow_negative_numbers = true)]
struct Args {
    x_start: Decimal,
    x_end: Decimal,
    y_start: Decimal,
    y_end: Decimal,

    width: u32,
    height: u32,

    /// Where to write the PNG.
    out: PathBuf,

    /// Iteration limit per point.
    #[arg(long, default_value_t = 256)]
    iters: u32,

    #[arg(long, default_value_t = num_cpus::get())]
    workers: usize,

    /// Number representation; see NUMERICS.
    #[arg(long, default_value = "f64")]
    numeric: String,

    #[arg(long, default_value = "mandelbrot")]
    formula: String,

    /// Real part of the Julia constant; renders the Julia set instead.
    #[arg(long, requires = "julia_im")]
    julia_re: Option<Decimal>,

    #[arg(long, requires = "julia_re")]
    julia_im: Option<Decimal>,

    #[arg(long, value_enum, default_value_t = Algorithm::Refine)]
    algorithm: Algorithm,

    /// Passes of progressive refinement.
    #[arg(long, default_value_t = 4)]
    steps: u32,

    /// How often to repaint and report progress.
    #[arg(long, default_value_t = 250)]
    interval_ms: u64,

    /// Interrupt the render after this long.
    #[arg(long)]
    time_limit_ms: Option<u64>,

    /// Resume from this file if it exists; save the final state to it.
    #[arg(long)]
    checkpoint: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Algorithm {
    Scan,
    Refine,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("unknown numeric {name:?}; expected one of: {known}")]
    UnknownNumeric { name: String, known: String },
    #[error(transparent)]
    Plugin(#[from] UnknownPlugin),
    #[error(transparent)]
    Number(#[from] NumberError),
    #[error(transparent)]
    Render(#[from] rf_render::Error),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Produce(#[from] ProduceError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

type Render = fn(&Args) -> Result<(), CliError>;

/// Representations selectable with `--numeric`.
const NUMERICS: &[(&str, Render)] = &[
    ("f32", render::<f32>),
    ("f64", render::<f64>),
    ("masked-3-50", render::<MaskedFloat<3, 50>>),
    ("masked-4-50", render::<MaskedFloat<4, 50>>),
    ("i20f44", render::<BinaryFixed<I20F44>>),
    ("fixed-32", render::<BigFixed<32>>),
    ("rational", render::<BigRational>),
];

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    let args = Args::parse();

    let result = match NUMERICS.iter().find(|(name, _)| *name == args.numeric) {
        Some((_, render)) => render(&args),
        None => Err(CliError::UnknownNumeric {
            name: args.numeric.clone(),
            known: NUMERICS
                .iter()
                .map(|(name, _)| *name)
                .collect::<Vec<_>>()
                .join(", "),
        }),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "render failed");
            ExitCode::FAILURE
        }
    }
}

/// Everything about a job that does not depend on the schedule.
struct Job<V> {
    factory: Arc<StandardFactory<V>>,
    formula: Box<dyn rf_core::Formula<V>>,
    transform: Arc<Viewport<V>>,
}

fn render<V: Number>(args: &Args) -> Result<(), CliError> {
    let _span = tracing::info_span!("render", numeric = %args.numeric, formula = %args.formula)
        .entered();
    let job = Job {
        factory: Arc::new(StandardFactory::new()),
        formula: registry::formulas::<V>().create(&args.formula)?,
        transform: Arc::new(Viewport::new(
            args.x_start.clone()..args.x_end.clone(),
            args.y_start.clone()..args.y_end.clone(),
            args.width,
            args.height,
        )?),
    };
    let palette = HuePalette::default();
    match args.algorithm {
        Algorithm::Scan => {
            let schedule = RasterScan::new(args.width, args.height, args.workers)?;
            let consumer = RasterScanConsumer::new(&schedule, &palette);
            drive(args, job, schedule, consumer)
        }
        Algorithm::Refine => {
            let schedule =
                ProgressiveRefinement::new(args.width, args.height, args.steps, args.workers)?;
            let consumer = ProgressiveRefinementConsumer::new(&schedule, &palette);
            drive(args, job, schedule, consumer)
        }
    }
}

/// Runs the producers while this thread repaints, then writes the outputs.
fn drive<V: Number, S: Persist>(
    args: &Args,
    job: Job<V>,
    schedule: S,
    mut consumer: impl Consumer,
) -> Result<(), CliError> {
    if let Some(path) = args.checkpoint.as_ref().filter(|path| path.exists()) {
        persist::load(&schedule, BufReader::new(File::open(path)?))?;
        tracing::info!(path = %path.display(), "resuming from checkpoint");
    }
    let mut production = Production::new(
        schedule,
        job.factory,
        job.formula,
        Box::new(EscapeTime::new(args.iters)),
        job.transform,
    );
    if let (Some(re), Some(im)) = (&args.julia_re, &args.julia_im) {
        production = production.with_julia(re.clone(), im.clone());
    }

    let mut target = RgbaImage::new(args.width, args.height);
    let interval = Duration::from_millis(args.interval_ms.max(1));
    let deadline = args
        .time_limit_ms
        .map(|ms| Instant::now() + Duration::from_millis(ms));
    let workers = Workers::spawn(production.producers())?;
    loop {
        let finished = workers.is_finished();
        if consumer.consume(&mut target)? {
            tracing::debug!(regions = ?consumer.available_regions(), "repainted");
        }
        tracing::info!(percentages = ?consumer.percentages(), "progress");
        if finished {
            break;
        }
        if deadline.map_or(false, |deadline| Instant::now() >= deadline) {
            tracing::warn!("time limit reached");
            production.interrupt();
            break;
        }
        thread::sleep(interval);
    }

    let mut failure = None;
    for finished in workers.join()? {
        if let Err(error) = finished.outcome {
            failure = Some(error);
        }
    }
    consumer.consume(&mut target)?;
    target.save(&args.out)?;
    tracing::info!(path = %args.out.display(), complete = consumer.is_complete(), "wrote image");

    if let Some(path) = &args.checkpoint {
        persist::save(production.schedule().as_ref(), BufWriter::new(File::create(path)?))?;
        tracing::info!(path = %path.display(), "saved checkpoint");
    }
    match failure {
        Some(error) => Err(error.into()),
        None => Ok(()),
    }
}
