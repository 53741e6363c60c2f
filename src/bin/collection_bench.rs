use clap::{Parser, Subcommand, ValueEnum};
use collection_bench::harness::InProcessEngine;
use collection_bench::plan::{Profile, TimingMode};
use collection_bench::registry::Registry;
use collection_bench::{workloads, BaselinePolicy, Orchestrator, RunRequest, Verbosity};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProfileArg {
    Quick,
    Normal,
    Slow,
}

impl From<ProfileArg> for Profile {
    fn from(v: ProfileArg) -> Self {
        match v {
            ProfileArg::Quick => Profile::Quick,
            ProfileArg::Normal => Profile::Normal,
            ProfileArg::Slow => Profile::Slow,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    /// Operations per second.
    Throughput,
    /// Seconds per operation (reported as ops/s).
    AverageTime,
}

impl From<ModeArg> for TimingMode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::Throughput => TimingMode::Throughput,
            ModeArg::AverageTime => TimingMode::AverageTime,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the selected workloads and print the comparison report.
    Run {
        /// Implementation tags to include (default: all registered).
        #[arg(short, long, value_name = "TAG", num_args = 1.., value_delimiter = ',', action = clap::ArgAction::Append)]
        include: Vec<String>,

        /// Workload groups to run (default: curated list).
        #[arg(short, long, value_name = "GROUP", num_args = 1.., value_delimiter = ',', action = clap::ArgAction::Append)]
        group: Vec<String>,

        /// Container sizes, overriding each group's own.
        #[arg(long, value_name = "N,...", value_delimiter = ',')]
        sizes: Vec<usize>,

        /// Baseline tag (default: "vavr", else the first tag alphabetically, among
        /// included tags registered by every selected group).
        #[arg(long, value_name = "TAG")]
        baseline: Option<String>,

        #[arg(long, value_enum, default_value_t = ModeArg::Throughput)]
        mode: ModeArg,

        /// Override the profile's warmup iteration count.
        #[arg(long)]
        warmup: Option<u32>,

        /// Override the profile's measurement iteration count.
        #[arg(long)]
        iterations: Option<u32>,

        /// Override the profile's iteration duration.
        #[arg(long, value_name = "MS")]
        duration_ms: Option<u64>,

        /// Override the profile's engine verbosity.
        #[arg(long, value_enum)]
        verbosity: Option<Verbosity>,

        /// Do not write the raw result sink.
        #[arg(long, default_value_t = false)]
        no_sink: bool,

        /// Print the report as JSON instead of tables.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List registered groups, operations and implementation tags.
    List,
}

#[derive(Parser, Debug)]
#[command(name = "collection-bench")]
#[command(about = "Cross-implementation collection benchmarks: throughput and retained heap footprint")]
struct Args {
    #[arg(long, value_enum, default_value_t = ProfileArg::Quick, global = true)]
    profile: ProfileArg,

    #[arg(long, default_value_t = 0, global = true)]
    seed: u64,

    /// Where to write raw engine results (default: benchmark_results.json).
    #[arg(long, global = true)]
    out: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

fn init_tracing(verbosity: Verbosity) {
    let default = match verbosity {
        Verbosity::Quiet => "warn",
        Verbosity::Normal => "info",
        Verbosity::Extra => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn print_registry(registry: &Registry, out: &mut dyn Write) -> io::Result<()> {
    for group in registry.groups() {
        let curated = registry.curated().iter().any(|id| id == group.id());
        writeln!(
            out,
            "{}{} sizes={:?}",
            group.id(),
            if curated { " (curated)" } else { "" },
            group.sizes()
        )?;
        for op in group.operations() {
            let methods: Vec<&str> = op.variants().iter().map(|v| v.method()).collect();
            writeln!(out, "  {:<16} {}", op.name(), methods.join(" "))?;
        }
    }
    let tags: Vec<String> = registry.known_tags().into_iter().collect();
    writeln!(out, "tags: {}", tags.join(", "))
}

fn run(args: Args) -> collection_bench::Result<()> {
    let registry = workloads::registry();

    let Command::Run {
        include,
        group,
        sizes,
        baseline,
        mode,
        warmup,
        iterations,
        duration_ms,
        verbosity,
        no_sink,
        json,
    } = args.cmd
    else {
        print_registry(&registry, &mut io::stdout().lock())?;
        return Ok(());
    };

    let mut profile = Profile::from(args.profile).settings();
    if let Some(n) = warmup {
        profile.warmup_iterations = n;
    }
    if let Some(n) = iterations {
        profile.measurement_iterations = n;
    }
    if let Some(ms) = duration_ms {
        profile.iteration_millis = ms;
    }
    if let Some(v) = verbosity {
        profile.verbosity = v;
    }
    if no_sink {
        profile.result_sink = None;
    } else if let Some(out) = args.out {
        profile.result_sink = Some(out);
    }
    init_tracing(profile.verbosity);

    let mut request = RunRequest::new(profile)
        .include(include)
        .groups(group)
        .seed(args.seed)
        .mode(mode.into());
    if !sizes.is_empty() {
        request = request.container_sizes(sizes);
    }
    if let Some(tag) = baseline {
        request = request.baseline(BaselinePolicy::Fixed(tag));
    }

    let orchestrator = Orchestrator::new(registry, InProcessEngine);
    let (_outcome, report) = orchestrator.run(&request)?;

    let mut stdout = io::stdout().lock();
    if json {
        let text = serde_json::to_string_pretty(&report).map_err(io::Error::other)?;
        writeln!(stdout, "{text}")?;
    } else {
        report.print(&mut stdout)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
