use std::env;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, bail};
use log::info;
use tb_delay_synthesis::error::util::validate_directory;
use tb_delay_synthesis::utils::logging::console::{
    print_estimate_summary, print_ranking, print_regression,
};
use tb_delay_synthesis::{
    BatchAdapter, DelayBatchAdapter, DelayRecordStore, PanelBatchAdapter, SynthesisConfig,
    SynthesisPipeline, export_report, read_parquet_path,
};

const USAGE: &str = "usage: tb-delay-synthesis <delays.parquet|dir> <panel.parquet|dir> <output-dir> [prevalence-cases]";
const CONFIG_ENV: &str = "TB_SYNTHESIS_CONFIG";
const RANKING_ROWS: usize = 10;

struct Args {
    delays: PathBuf,
    panel: PathBuf,
    output: PathBuf,
    prevalence_cases: Option<f64>,
}

fn parse_args() -> anyhow::Result<Args> {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.len() < 3 || args.len() > 4 {
        bail!(USAGE);
    }
    let prevalence_cases = args
        .get(3)
        .map(|raw| {
            raw.parse::<f64>()
                .with_context(|| format!("Invalid prevalence case count '{raw}'"))
        })
        .transpose()?;
    Ok(Args {
        delays: PathBuf::from(&args[0]),
        panel: PathBuf::from(&args[1]),
        output: PathBuf::from(&args[2]),
        prevalence_cases,
    })
}

fn load_config() -> anyhow::Result<SynthesisConfig> {
    match env::var(CONFIG_ENV) {
        Ok(path) => {
            info!("Loading configuration from {path}");
            SynthesisConfig::from_json_file(Path::new(&path))
                .with_context(|| format!("Failed to load configuration from {path}"))
        }
        Err(_) => Ok(SynthesisConfig::default()),
    }
}

fn main() -> anyhow::Result<()> {
    // Setup logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = parse_args()?;
    let mut config = load_config()?;
    if args.prevalence_cases.is_some() {
        config = config.with_prevalence_cases(args.prevalence_cases);
    }
    let start = Instant::now();

    info!("Loading delay studies from: {}", args.delays.display());
    let delay_batches = read_parquet_path(&args.delays)?;
    let raw = DelayBatchAdapter::new().from_record_batches(&delay_batches)?;
    let store = DelayRecordStore::from_raw(&raw, &config.pooling.variance_imputation)?;
    info!("Loaded {} delay observations", store.len());

    info!("Loading state panel from: {}", args.panel.display());
    let panel_batches = read_parquet_path(&args.panel)?;
    let panel = PanelBatchAdapter::new().from_record_batches(&panel_batches)?;
    info!("Loaded {} state-year rows", panel.len());

    let report = SynthesisPipeline::new(config).run(&store, &panel)?;

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    validate_directory(&args.output, "output directory")?;
    let written = export_report(&report, &args.output)?;
    info!("Wrote {} files to {}", written.len(), args.output.display());

    print_estimate_summary(&report.estimates);
    print_ranking(&report.scores, RANKING_ROWS);
    if let Some(regression) = &report.regression {
        print_regression(regression);
    }

    if !report.warnings.is_empty() {
        info!("Run finished with {} warnings", report.warnings.len());
    }
    info!("Total time: {:?}", start.elapsed());
    Ok(())
}
