use anyhow::{Context, Result};
use log::{error, info};
use structopt::StructOpt;

use geohierarchy::serializer::{serialize_csv, serialize_jsonl};
use geohierarchy::{CoreError, Stats};

#[derive(StructOpt, Debug)]
struct Args {
    /// OSM PBF file to read.
    #[structopt(short = "i", long = "input")]
    input: String,

    #[structopt(long = "borders")]
    borders: Option<String>,

    #[structopt(long = "output-jsonl", default_value = "geohierarchy.jsonl")]
    output_jsonl: String,

    #[structopt(long = "output-csv")]
    output_csv: Option<String>,

    #[structopt(long = "threads")]
    threads: Option<usize>,

    #[structopt(long = "no-stats")]
    no_stats: bool,

    #[structopt(short = "v", long = "verbose")]
    verbose: bool,
}

fn configure_thread_pool(threads: Option<usize>) -> Result<()> {
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build_global()
        .context("failed to configure the worker pool")
}

fn run(args: Args) -> Result<()> {
    configure_thread_pool(args.threads)?;

    if let Some(borders) = &args.borders {
        info!(
            "borders file {} given; affiliation-index bucketing is exposed as a library \
             API (geohierarchy::affiliation) for downstream consumers, the country-tree \
             builder itself nests by region bbox and does not consult it",
            borders
        );
    }

    let (hierarchy, stats) =
        geohierarchy::run_from_file(&args.input).with_context(|| format!("reading {}", args.input))?;

    serialize_jsonl(&hierarchy, &args.output_jsonl, args.verbose)
        .with_context(|| format!("writing {}", args.output_jsonl))?;

    if let Some(csv_path) = &args.output_csv {
        serialize_csv(&hierarchy, csv_path).with_context(|| format!("writing {}", csv_path))?;
    }

    if !args.no_stats {
        print_stats(&stats);
    }

    Ok(())
}

fn print_stats(stats: &Stats) {
    info!("run statistics:\n{}", stats);
}

fn init_logger() {
    let mut builder = env_logger::Builder::new();
    builder.filter(None, log::LevelFilter::Info);
    if let Ok(s) = std::env::var("RUST_LOG") {
        builder.parse_filters(&s);
    }
    builder.init();
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(core_err) = cause.downcast_ref::<CoreError>() {
            return match core_err {
                CoreError::IoMissing(_) => 1,
                CoreError::FormatMismatch { .. } => 2,
                _ => 3,
            };
        }
    }
    3
}

fn main() {
    init_logger();
    let args = Args::from_args();
    if let Err(e) = run(args) {
        error!("geohierarchy failed: {:?}", e);
        for cause in e.chain().skip(1) {
            error!("  caused by: {}", cause);
        }
        std::process::exit(exit_code_for(&e));
    }
}
