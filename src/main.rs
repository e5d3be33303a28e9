use clap::Parser;
use log::{info, warn};
use rayon::ThreadPoolBuilder;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::num::NonZeroUsize;
use std::path::Path;
use txmap::index;
use txmap::input::{self, ErrorPolicy};
use txmap::query::{self, Query};
use txmap::registry::MappingRegistry;

/// Common options shared between all commands
#[derive(Parser, Debug)]
struct CommonOpts {
    /// Genome mapping file with four columns: transcript, chromosome, 0-based start, CIGAR.
    #[clap(short = 'g', long, value_parser)]
    genome_mapping_file: String,

    /// Rebuild the mappings from the genome mapping file even if an index exists.
    #[clap(short = 'I', long, action)]
    force_reindex: bool,

    /// Skip malformed input lines with a warning instead of aborting.
    #[clap(long, action)]
    lenient: bool,

    /// Number of threads for decompression and query resolution.
    #[clap(short = 't', long, value_parser, default_value_t = NonZeroUsize::new(4).unwrap())]
    threads: NonZeroUsize,

    /// Verbosity level (0 = warn, 1 = info, 2 = debug)
    #[clap(short, long, default_value = "0")]
    verbose: u8,
}

impl CommonOpts {
    fn policy(&self) -> ErrorPolicy {
        if self.lenient {
            ErrorPolicy::Lenient
        } else {
            ErrorPolicy::Strict
        }
    }
}

/// Translate transcript coordinates to genomic coordinates using CIGAR alignments.
#[derive(Parser, Debug)]
#[command(author, version, about, disable_help_subcommand = true)]
enum Args {
    /// Translate transcript coordinates to chromosome coordinates
    Query {
        #[clap(flatten)]
        common: CommonOpts,

        /// Two-column query file: transcript, 0-based transcript coordinate
        #[clap(short = 'q', long, value_parser)]
        transcript_processing_file: Option<String>,

        /// Single query in the format `transcript:coordinate`
        #[clap(short = 'r', long, value_parser)]
        query: Option<String>,

        /// Output file for the tab-separated results (stdout if omitted)
        #[clap(short = 'o', long, value_parser)]
        output: Option<String>,
    },
    /// Build the index of a genome mapping file. With --lenient, malformed lines are left
    /// out of the index and later queries using it will not report them.
    Index {
        #[clap(flatten)]
        common: CommonOpts,
    },
    /// Print mapping statistics
    Stats {
        #[clap(flatten)]
        common: CommonOpts,
    },
}

fn main() -> io::Result<()> {
    let args = Args::parse();

    match args {
        Args::Query {
            common,
            transcript_processing_file,
            query,
            output,
        } => {
            initialize(&common)?;
            if let Some(ref path) = transcript_processing_file {
                check_input_file(path, "Transcript processing file")?;
            }
            if let Some(ref path) = output {
                check_output_location(path)?;
            }

            let queries = match (transcript_processing_file, query) {
                (Some(path), None) => {
                    let reader = input::open_reader(&path, common.threads)?;
                    input::read_queries(reader, common.policy())?
                }
                (None, Some(region)) => vec![Query::from_region(&region)?],
                _ => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "Exactly one of --transcript-processing-file or --query must be provided \
                         for query subcommand",
                    ))
                }
            };

            let registry = load_registry(&common)?;
            run_queries(&registry, &queries, output.as_deref())?;
        }
        Args::Index { common } => {
            initialize(&common)?;
            if common.genome_mapping_file == "-" {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "Cannot write an index for a genome mapping file read from stdin",
                ));
            }
            let registry = build_registry(&common)?;
            let index_file = index::index_path(&common.genome_mapping_file);
            index::save(&registry, common.policy(), &index_file)?;
            info!("Index written to {}", index_file);
        }
        Args::Stats { common } => {
            initialize(&common)?;
            let registry = load_registry(&common)?;
            print_stats(&registry);
        }
    }

    Ok(())
}

/// Initialize logging and the thread pool, then validate the mapping file path
fn initialize(common: &CommonOpts) -> io::Result<()> {
    env_logger::Builder::new()
        .filter_level(match common.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    ThreadPoolBuilder::new()
        .num_threads(common.threads.into())
        .build_global()
        .map_err(io::Error::other)?;

    check_input_file(&common.genome_mapping_file, "Genome mapping file")
}

fn check_input_file(path: &str, what: &str) -> io::Result<()> {
    if path != "-" && !Path::new(path).is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} '{}' does not exist", what, path),
        ));
    }
    Ok(())
}

fn check_output_location(path: &str) -> io::Result<()> {
    let parent = Path::new(path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    if !parent.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Output file location '{}' does not exist", parent.display()),
        ));
    }
    Ok(())
}

fn build_registry(common: &CommonOpts) -> io::Result<MappingRegistry> {
    let reader = input::open_reader(&common.genome_mapping_file, common.threads)?;
    let records = input::read_records(reader, common.policy())?;
    let registry = MappingRegistry::from_records(&records)?;
    if registry.is_empty() {
        warn!(
            "Genome mapping file {} contains no alignments",
            common.genome_mapping_file
        );
    }
    Ok(registry)
}

/// Use the index of the mapping file if one exists, else build the mappings
fn load_registry(common: &CommonOpts) -> io::Result<MappingRegistry> {
    if !common.force_reindex && common.genome_mapping_file != "-" {
        if let Some(registry) = index::load_for(&common.genome_mapping_file, common.policy())? {
            info!(
                "Loaded index with {} coordinate maps",
                registry.num_mappings()
            );
            return Ok(registry);
        }
    }
    build_registry(common)
}

fn run_queries(
    registry: &MappingRegistry,
    queries: &[Query],
    output: Option<&str>,
) -> io::Result<()> {
    let mut writer: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let mut num_mapped = 0usize;
    let mut num_unresolved = 0usize;
    for resolution in query::resolve_all(queries, registry).iter().flatten() {
        if resolution.is_mapped() {
            writeln!(writer, "{}", resolution)?;
            num_mapped += 1;
        } else {
            warn!("{}", resolution);
            num_unresolved += 1;
        }
    }
    writer.flush()?;

    info!(
        "Resolved {} queries: {} mapped, {} unresolved",
        queries.len(),
        num_mapped,
        num_unresolved
    );
    Ok(())
}

fn print_stats(registry: &MappingRegistry) {
    let stats = registry.stats();
    println!("Number of transcripts: {}", stats.num_transcripts);
    println!("Number of mappings: {}", stats.num_mappings);
    println!("Number of chromosomes: {}", stats.num_chromosomes);
    println!("Total mapped bases: {} bp", stats.mapped_bases);

    if !stats.mappings_per_chromosome.is_empty() {
        println!("\nMappings per chromosome:");
        for (name, count) in &stats.mappings_per_chromosome {
            println!("{}\t{}", name, count);
        }
    }
}
