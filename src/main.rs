//! This program reduces data files from the Google Books Ngram dataset,
//! whose general documentation you can find at
//! <http://storage.googleapis.com/books/ngrams/books/datasetsv3.html>,
//! into one compact aggregate record per ngram.
//!
//! It can also re-ingest its own output, which is handy for re-filtering a
//! previously reduced corpus without paying for the aggregation math again.

mod filter;
mod parse;
mod record;
mod reduce;
mod sink;
mod source;
mod tags;

use crate::{
    filter::FilterOptions,
    reduce::NgramReducer,
    sink::{RecordSink, TsvFileSink},
    source::GzipLineSource,
};
use clap::{ArgGroup, Parser};
use log::LevelFilter;
use std::{num::NonZeroUsize, path::PathBuf, sync::Arc};
#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

/// Reduce Google Books Ngram data files into compact per-ngram aggregates
///
/// Every input line carries one ngram with its full list of per-year
/// match/volume counts; every output line carries that ngram with a single
/// aggregate over all of those years. Optional filters drop records on the
/// way, which also works on previously reduced files.
#[derive(Parser, Debug)]
#[command(version, author)]
#[command(group(ArgGroup::new("input").required(true)))]
struct Args {
    /// Google Books Ngram data file (gzipped TSV) or previously reduced file
    #[arg(short = 'i', long, group = "input")]
    input_file: Option<PathBuf>,

    /// URL of a Google Books Ngram data file or previously reduced file
    #[arg(short = 'u', long, group = "input")]
    input_url: Option<Box<str>>,

    /// Directory whose *.gz files are all processed, one after another
    #[arg(short = 'd', long, group = "input")]
    input_dir: Option<PathBuf>,

    /// Output file for the reduced corpus (gzipped TSV)
    #[arg(short = 'o', long)]
    output_file: PathBuf,

    /// Drop records where any word is longer than this many characters
    #[arg(short = 'l', long)]
    length_filter: Option<NonZeroUsize>,

    /// Drop records carrying any of these tag codes [NVJARDPMCT.XSE_]
    #[arg(short = 't', long)]
    tag_filter: Option<Box<str>>,

    /// Drop records where some word contains no letters at all
    #[arg(short = 'n', long)]
    no_letters_filter: bool,

    /// Number of parallel line processing workers
    ///
    /// The default processes lines in input order. Higher counts speed up
    /// ingestion of large corpora but stop guaranteeing output order.
    #[arg(short = 'p', long, default_value = "1")]
    processing_threads: NonZeroUsize,
}
//
impl Args {
    /// Filtering subset of the configuration
    fn filter_options(&self) -> FilterOptions {
        FilterOptions {
            max_word_length: self.length_filter,
            rejected_tag_codes: self.tag_filter.clone(),
            reject_no_letter_words: self.no_letters_filter,
        }
    }
}
//
#[tokio::main]
async fn main() -> Result<()> {
    // Set up logging
    setup_logging().map_err(|e| anyhow::format_err!("{e}"))?;

    // Decode CLI arguments
    let args = Args::parse();
    let filters = args.filter_options().build()?;

    // Open the output sink, then reduce every requested input into it
    let sink = Arc::new(TsvFileSink::new(args.output_file.clone()));
    sink.init().await?;
    let reducer = NgramReducer::new(filters, args.processing_threads, sink.clone());
    let outcome = reduce_inputs(&args, &reducer).await;

    // Flush the sink even after a failed run, as it may hold accepted records
    let shutdown = sink.end().await;
    outcome?;
    shutdown
}

/// Run the reduction pipeline over whichever input was selected
async fn reduce_inputs(args: &Args, reducer: &NgramReducer) -> Result<()> {
    if let Some(path) = &args.input_file {
        reducer
            .run(&mut GzipLineSource::open_file(path).await?)
            .await?;
    } else if let Some(url) = &args.input_url {
        let client = reqwest::Client::new();
        reducer
            .run(&mut GzipLineSource::open_url(&client, url).await?)
            .await?;
    } else if let Some(dir) = &args.input_dir {
        // One pipeline run per file, all feeding the same sink
        for path in source::gzip_files_in_dir(dir)? {
            reducer
                .run(&mut GzipLineSource::open_file(&path).await?)
                .await?;
        }
    }
    Ok(())
}

/// Use anyhow for Result type erasure
pub use anyhow::Result;

/// Year of Gregorian Calendar
pub type Year = i16;

/// Set up logging
fn setup_logging() -> syslog::Result<()> {
    syslog::init(
        syslog::Facility::LOG_USER,
        if cfg!(feature = "log-trace") {
            LevelFilter::Trace
        } else if cfg!(debug_assertions) {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        },
        None,
    )
}

/// Use jemalloc for improved multi-thread performance
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;
