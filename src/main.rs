use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use prettytable::{Cell, Row, Table};
use std::path::PathBuf;
use tracing::info;

use techmap::embedding::EmbeddingCache;
use techmap::graph::ActivityMatch;
use techmap::logging::configure_logging;
use techmap::{pipeline, Granularity, PipelineConfig};

#[derive(Parser)]
#[clap(
    name = "techmap",
    about = "Map project taxonomies onto an external technology vocabulary"
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the taxonomy tree JSON from a raw `###` project export
    BuildTree {
        #[clap(short, long)]
        input: PathBuf,

        #[clap(short, long, default_value = "tree.json")]
        output: PathBuf,
    },

    /// Flatten the taxonomy tree into (project, path) rows
    Extract {
        #[clap(short, long)]
        input: PathBuf,

        #[clap(short, long, default_value = "items.csv")]
        output: PathBuf,
    },

    /// Match internal labels against the external vocabulary
    MatchLabels {
        /// Vector file of internal labels (full paths)
        #[clap(long)]
        internal: PathBuf,

        /// Vector file of external labels
        #[clap(long)]
        external: PathBuf,

        #[clap(short, long, default_value = "label_mapping.csv")]
        output: PathBuf,

        /// Also write the reverse index here
        #[clap(long)]
        reverse_output: Option<PathBuf>,

        #[clap(long)]
        cache_dir: Option<PathBuf>,

        #[clap(short = 'k', long)]
        top_k: Option<usize>,

        #[clap(long)]
        min_score: Option<f32>,
    },

    /// Match project names against the external vocabulary
    MatchProjects {
        /// Item table written by `extract`
        #[clap(long)]
        items: PathBuf,

        /// Vector file of project names
        #[clap(long)]
        vectors: PathBuf,

        #[clap(long)]
        external: PathBuf,

        #[clap(short, long, default_value = "project_matches.csv")]
        output: PathBuf,

        #[clap(long)]
        cache_dir: Option<PathBuf>,

        #[clap(short = 'k', long)]
        top_k: Option<usize>,

        #[clap(long)]
        min_score: Option<f32>,
    },

    /// Build the flattened report with reverse attributions
    Report {
        #[clap(long)]
        projects: PathBuf,

        #[clap(long)]
        mapping: PathBuf,

        #[clap(short, long, default_value = "report.csv")]
        output: PathBuf,

        #[clap(long)]
        reverse_output: Option<PathBuf>,
    },

    /// Add amount and start time from the raw export to a report
    Enrich {
        #[clap(long)]
        report: PathBuf,

        #[clap(long)]
        records: PathBuf,

        #[clap(short, long, default_value = "report_enriched.csv")]
        output: PathBuf,
    },

    /// Count internal paths appearing together on report rows
    InternalCooccur {
        #[clap(long)]
        report: PathBuf,

        #[clap(short, long, default_value = "internal_cooccurrence.csv")]
        output: PathBuf,
    },

    /// Build the weighted external technology graph
    Graph {
        #[clap(long)]
        report: PathBuf,

        #[clap(long)]
        mapping: PathBuf,

        #[clap(short, long, default_value = "technology_graph.csv")]
        output: PathBuf,

        #[clap(long)]
        indirect_weight: Option<f64>,

        /// exact, leaf-suffix, fuzzy or fuzzy:<threshold>
        #[clap(long)]
        activity_match: Option<ActivityMatch>,
    },

    /// Lead/lag correlation between heavily connected technologies
    Correlate {
        /// Report with a start time column
        #[clap(long)]
        report: PathBuf,

        #[clap(long)]
        edges: PathBuf,

        #[clap(short, long, default_value = "correlation.csv")]
        output: PathBuf,

        #[clap(long)]
        granularity: Option<Granularity>,

        #[clap(long)]
        max_lag: Option<usize>,

        /// Only edges heavier than this are analysed
        #[clap(long)]
        weight_threshold: Option<f64>,
    },
}

fn print_summary(title: &str, rows: &[(&str, String)]) {
    println!("\n{}", title.bright_blue().bold());
    let mut table = Table::new();
    table.add_row(Row::new(vec![Cell::new("Metric"), Cell::new("Value")]));
    for (name, value) in rows {
        table.add_row(Row::new(vec![Cell::new(name), Cell::new(value)]));
    }
    table.printstd();
}

fn main() -> Result<()> {
    configure_logging();
    let args = Cli::parse();
    let mut config = PipelineConfig::from_env();

    match args.command {
        Commands::BuildTree { input, output } => {
            let s = pipeline::build_tree(&input, &output)?;
            print_summary(
                "Taxonomy tree",
                &[
                    ("records", s.records.to_string()),
                    ("dirty lines", s.dirty_lines.to_string()),
                    ("projects in tree", s.projects_in_tree.to_string()),
                    ("nodes", s.nodes.to_string()),
                ],
            );
        }
        Commands::Extract { input, output } => {
            let s = pipeline::extract(&input, &output)?;
            print_summary(
                "Extraction",
                &[
                    ("items", s.items.to_string()),
                    ("empty items skipped", s.skipped_empty.to_string()),
                ],
            );
        }
        Commands::MatchLabels {
            internal,
            external,
            output,
            reverse_output,
            cache_dir,
            top_k,
            min_score,
        } => {
            config.top_k = top_k.unwrap_or(config.top_k);
            config.min_score = min_score.unwrap_or(config.min_score);
            config.validate()?;
            let cache = cache_dir.map(EmbeddingCache::new);
            let (s, reverse) = pipeline::match_labels(
                &config,
                &internal,
                &external,
                &output,
                reverse_output.as_deref(),
                cache.as_ref(),
            )?;
            let mut rows = vec![
                ("internal labels", s.internal.to_string()),
                ("external labels", s.external.to_string()),
                ("dimension", s.dimension.to_string()),
                ("top k", config.top_k.to_string()),
                ("below threshold", s.below_threshold.to_string()),
            ];
            if let Some(stats) = reverse {
                rows.push(("reverse replacements", stats.replacements.to_string()));
                rows.push(("unusable matches", stats.unusable_matches.to_string()));
            }
            print_summary("Label matching", &rows);
        }
        Commands::MatchProjects {
            items,
            vectors,
            external,
            output,
            cache_dir,
            top_k,
            min_score,
        } => {
            config.top_k = top_k.unwrap_or(config.top_k);
            config.min_score = min_score.unwrap_or(config.min_score);
            config.validate()?;
            let cache = cache_dir.map(EmbeddingCache::new);
            let s = pipeline::match_projects(
                &config,
                &items,
                &vectors,
                &external,
                &output,
                cache.as_ref(),
            )?;
            print_summary(
                "Project matching",
                &[
                    ("projects", s.internal.to_string()),
                    ("external labels", s.external.to_string()),
                    ("dimension", s.dimension.to_string()),
                    ("below threshold", s.below_threshold.to_string()),
                ],
            );
        }
        Commands::Report {
            projects,
            mapping,
            output,
            reverse_output,
        } => {
            let (s, stats) =
                pipeline::report(&projects, &mapping, &output, reverse_output.as_deref())?;
            print_summary(
                "Flattened report",
                &[
                    ("rows", s.rows.to_string()),
                    ("reverse misses", s.reverse_misses.to_string()),
                    ("empty matches", s.empty_matches.to_string()),
                    ("mapping rows", stats.rows.to_string()),
                ],
            );
        }
        Commands::Enrich {
            report,
            records,
            output,
        } => {
            let s = pipeline::enrich(&report, &records, &output)?;
            print_summary(
                "Enrichment",
                &[
                    ("report rows", s.rows.to_string()),
                    ("matched", s.matched.to_string()),
                    ("records", s.records.to_string()),
                    ("dirty lines", s.dirty_lines.to_string()),
                ],
            );
        }
        Commands::InternalCooccur { report, output } => {
            let pairs = pipeline::internal_cooccur(&report, &output)?;
            print_summary("Internal co-occurrence", &[("pairs", pairs.to_string())]);
        }
        Commands::Graph {
            report,
            mapping,
            output,
            indirect_weight,
            activity_match,
        } => {
            config.indirect_weight_factor =
                indirect_weight.unwrap_or(config.indirect_weight_factor);
            config.activity_match = activity_match.unwrap_or(config.activity_match);
            config.validate()?;
            let s = pipeline::graph(&config, &report, &mapping, &output)?;
            print_summary(
                "Technology graph",
                &[
                    ("projects", s.projects.to_string()),
                    ("direct co-occurrences", s.direct_cooccurrences.to_string()),
                    ("active internal paths", s.active_internal_paths.to_string()),
                    ("active mapping rows", s.active_mapping_rows.to_string()),
                    ("activity match", config.activity_match.to_string()),
                    ("edges", s.edges.to_string()),
                ],
            );
        }
        Commands::Correlate {
            report,
            edges,
            output,
            granularity,
            max_lag,
            weight_threshold,
        } => {
            config.granularity = granularity.unwrap_or(config.granularity);
            config.max_lag = max_lag.unwrap_or(config.max_lag);
            config.candidate_weight_threshold =
                weight_threshold.unwrap_or(config.candidate_weight_threshold);
            config.validate()?;
            let s = pipeline::correlate(&config, &report, &edges, &output)?;
            print_summary(
                "Lag correlation",
                &[
                    ("edges read", s.edges.to_string()),
                    ("candidates", s.correlation.candidates.to_string()),
                    ("events", s.events.events.to_string()),
                    ("rows without time", s.events.rows_without_time.to_string()),
                    ("periods", s.periods.to_string()),
                    ("period span", s.span.unwrap_or_default()),
                    ("technologies", s.technologies.to_string()),
                    ("analyzed", s.correlation.analyzed.to_string()),
                    ("name mismatches", s.correlation.name_mismatch.to_string()),
                    ("too short", s.correlation.too_short.to_string()),
                    ("granger failures", s.correlation.granger_failures.to_string()),
                ],
            );
        }
    }

    info!("Done");
    Ok(())
}
