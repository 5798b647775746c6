use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use snpkit_core::{AnalysisConfig, FilterConfig, Linkage};
use snpkit_io::FileFormat;

mod commands;
mod output;

/// snpkit: load, filter and summarize SNP genotype files
#[derive(Parser)]
#[command(
    name = "snpkit",
    version,
    about = "snpkit: SNP genotype loading, QC filtering, HWE/LD statistics, PCA and clustering"
)]
struct Cli {
    /// JSON file with analysis defaults (explicit flags override it)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long, global = true, default_value_t = false, conflicts_with = "quiet")]
    verbose: bool,

    /// Only warnings and errors
    #[arg(short, long, global = true, default_value_t = false)]
    quiet: bool,

    /// Worker threads for parallel steps (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by every subcommand: inputs, loading and filtering.
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Genotype files (VCF, BED, PED, CSV/TSV; optionally gzipped), merged in
    /// order with later files winning
    #[arg(long = "input", short = 'i', required = true, num_args = 1..)]
    pub inputs: Vec<PathBuf>,

    /// Declared format for every input (vcf, bed, ped, text); detected when omitted
    #[arg(long)]
    pub format: Option<FileFormat>,

    /// Records folded into the matrix per chunk
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Minimum per-variant call rate (0 disables)
    #[arg(long)]
    pub min_call_rate: Option<f64>,

    /// Minimum minor allele frequency (0 disables)
    #[arg(long)]
    pub min_maf: Option<f64>,

    /// Minimum per-sample call rate over the kept variants (0 disables)
    #[arg(long)]
    pub max_sample_missing: Option<f64>,

    /// Skip the quality & missingness filter
    #[arg(long, default_value_t = false)]
    pub no_filter: bool,

    /// Output TSV (stdout when omitted)
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load, merge and filter inputs; report counts, rejected rows and conflicts
    Summary {
        #[command(flatten)]
        input: InputArgs,

        /// Also write every merge conflict to this TSV
        #[arg(long)]
        conflicts: Option<PathBuf>,

        /// Also write every excluded variant and sample to this TSV
        #[arg(long)]
        exclusions: Option<PathBuf>,
    },

    /// Per-variant allele counts and frequencies
    Freq {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Hardy-Weinberg chi-square and exact tests per variant
    Hwe {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Pairwise linkage disequilibrium (r²)
    Ld {
        #[command(flatten)]
        input: InputArgs,

        /// All same-chromosome pairs at most N variants apart
        #[arg(long, conflicts_with = "pair")]
        window: Option<usize>,

        /// Explicit pair "A,B" of variant ids (or chrom:pos, or 0-based index); repeatable
        #[arg(long, num_args = 1..)]
        pair: Vec<String>,
    },

    /// Principal component scores per sample
    Pca {
        #[command(flatten)]
        input: InputArgs,

        /// Number of components
        #[arg(long)]
        components: Option<usize>,

        /// Also write the full embedding (scores, loadings, dropped columns) as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Cluster samples in principal-component space
    Cluster {
        #[command(flatten)]
        input: InputArgs,

        /// kmeans or hierarchical
        #[arg(long, default_value = "kmeans")]
        method: String,

        /// Number of clusters
        #[arg(long)]
        k: Option<usize>,

        /// k-means iteration cap
        #[arg(long)]
        max_iterations: Option<usize>,

        /// k-means++ seed
        #[arg(long)]
        seed: Option<u64>,

        /// Hierarchical linkage (single, complete, average, ward)
        #[arg(long)]
        linkage: Option<String>,

        /// Principal components used as clustering coordinates
        #[arg(long)]
        components: Option<usize>,

        /// Also write the assignment (and dendrogram) as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },
}

fn init_logging(cli: &Cli) {
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn load_config(cli: &Cli) -> Result<AnalysisConfig> {
    match &cli.config {
        Some(path) => AnalysisConfig::from_json_file(path)
            .with_context(|| format!("reading config {}", path.display())),
        None => Ok(AnalysisConfig::default()),
    }
}

/// Filter thresholds: config file first, then any explicit flag.
pub fn filter_config(base: &FilterConfig, input: &InputArgs) -> Result<FilterConfig> {
    if input.no_filter {
        return Ok(FilterConfig::no_op());
    }
    let cfg = FilterConfig {
        min_call_rate: input.min_call_rate.unwrap_or(base.min_call_rate),
        min_minor_allele_freq: input.min_maf.unwrap_or(base.min_minor_allele_freq),
        max_sample_missing: input.max_sample_missing.unwrap_or(base.max_sample_missing),
    };
    cfg.validate()?;
    Ok(cfg)
}

fn parse_method(method: &str) -> Result<commands::ClusterMethod> {
    match method.to_ascii_lowercase().as_str() {
        "kmeans" | "k-means" => Ok(commands::ClusterMethod::KMeans),
        "hierarchical" | "hclust" => Ok(commands::ClusterMethod::Hierarchical),
        other => bail!("Invalid method: {}. Use 'kmeans' or 'hierarchical'", other),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    if let Some(n) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .context("configuring the rayon thread pool")?;
    }

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Summary {
            input,
            conflicts,
            exclusions,
        } => {
            commands::run_summary(&config, &input, conflicts.as_deref(), exclusions.as_deref())?;
        }
        Commands::Freq { input } => {
            commands::run_freq(&config, &input)?;
        }
        Commands::Hwe { input } => {
            commands::run_hwe(&config, &input)?;
        }
        Commands::Ld {
            input,
            window,
            pair,
        } => {
            let request = match (window, pair.is_empty()) {
                (Some(w), _) => commands::LdRequest::Window(w),
                (None, false) => commands::LdRequest::Pairs(pair),
                (None, true) => bail!("ld needs --window <N> or at least one --pair A,B"),
            };
            commands::run_ld(&config, &input, request)?;
        }
        Commands::Pca {
            input,
            components,
            json,
        } => {
            let n = components.unwrap_or(config.pca.n_components);
            commands::run_pca(&config, &input, n, json.as_deref())?;
        }
        Commands::Cluster {
            input,
            method,
            k,
            max_iterations,
            seed,
            linkage,
            components,
            json,
        } => {
            let method = parse_method(&method)?;
            let mut kmeans = config.kmeans;
            let mut hierarchical = config.hierarchical;
            if let Some(k) = k {
                kmeans.k = k;
                hierarchical.n_clusters = k;
            }
            if let Some(it) = max_iterations {
                kmeans.max_iterations = it;
            }
            if let Some(seed) = seed {
                kmeans.seed = seed;
            }
            if let Some(l) = linkage {
                hierarchical.linkage = l.parse::<Linkage>()?;
            }
            let settings = commands::ClusterSettings {
                method,
                kmeans,
                hierarchical,
                n_components: components.unwrap_or(config.pca.n_components),
            };
            commands::run_cluster(&config, &input, &settings, json.as_deref())?;
        }
    }

    Ok(())
}
