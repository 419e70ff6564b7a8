use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use log::{error, warn};
use textpipe::pipeline::require_extension;
use textpipe::topic_modeling::report_path;
use textpipe::{
    logging, run_ingest, run_lemmatize, run_statistics, run_topic_modeling, FailurePolicy, GibbsLda, LdaConfig,
    PipelineConfig, PipelineError, PipelineResult, RuleLemmatizer, StopwordSet,
};

#[derive(Parser, Debug)]
#[command(version, about = "Staged text pipeline over a JSON document store", long_about = None)]
struct Args {
    #[clap(long, global = true, help = "Stopword list, one token per line; created with defaults if missing")]
    stopwords: Option<PathBuf>,
    #[clap(long, global = true, help = "trace, debug, info, warn or error")]
    log_level: Option<String>,
    #[clap(long, global = true, help = "Fail the stage when the datastore cannot be read instead of starting empty")]
    strict: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a .txt file into the datastore, one document per non-blank line
    Ingest {
        input: PathBuf,
        store: PathBuf,
        #[clap(long, help = "Number new documents after the highest existing docN")]
        append: bool,
    },
    /// Clean, lemmatize and stopword-filter every document
    Lemmatize {
        store: PathBuf,
        #[clap(long, help = "Stop at the first document that fails instead of skipping it")]
        abort_on_error: bool,
    },
    /// Write word_count.csv and documentWordCount.csv
    Stats {
        store: PathBuf,
        #[clap(long)]
        out_dir: Option<PathBuf>,
    },
    /// Fit topics and write the top words of each one to a CSV file
    Topics {
        store: PathBuf,
        #[clap(short, long, help = "Number of topics; prompted for when omitted")]
        topics: Option<usize>,
        #[clap(short, long, help = "Report file name; prompted for when omitted")]
        output: Option<String>,
        #[clap(long)]
        iterations: Option<usize>,
        #[clap(long)]
        workers: Option<usize>,
    },
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                e.exit();
            }
            let _ = e.print();
            return ExitCode::from(1);
        }
    };

    let level = logging::resolve_level(args.log_level.as_deref());
    if let Err(e) = logging::init_logging(&level) {
        eprintln!("Error: {}", e);
        return ExitCode::from(1);
    }

    let mut config = PipelineConfig::from_env();
    if let Some(path) = args.stopwords {
        config.stopwords_path = path;
    }
    config.strict_load |= args.strict;

    match run(args.command, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_fatal() => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::from(1)
        }
        Err(e) => {
            error!("stage did not complete: {}", e);
            ExitCode::SUCCESS
        }
    }
}

fn run(command: Command, mut config: PipelineConfig) -> PipelineResult<()> {
    match command {
        Command::Ingest { input, store, append } => {
            let report = run_ingest(&input, &store, &config, append)?;
            if report.truncated {
                warn!("input was only partially read; {} documents stored", report.accepted);
            }
        }
        Command::Lemmatize { store, abort_on_error } => {
            require_extension(&store, "json", "datastore")?;
            if abort_on_error {
                config.failure_policy = FailurePolicy::AbortBatch;
            }
            let stopwords = StopwordSet::load(&config.stopwords_path);
            run_lemmatize(
                &store,
                &stopwords,
                &RuleLemmatizer::new(),
                config.failure_policy,
                config.strict_load,
            )?;
        }
        Command::Stats { store, out_dir } => {
            let out_dir = out_dir.unwrap_or_else(|| config.output_dir.clone());
            run_statistics(&store, &out_dir, config.strict_load)?;
        }
        Command::Topics {
            store,
            topics,
            output,
            iterations,
            workers,
        } => {
            require_extension(&store, "json", "datastore")?;
            config.topics.num_topics = match topics {
                Some(n) => n,
                None => prompt_topic_count(config.topics.num_topics)?,
            };
            let output = match output {
                Some(name) => name,
                None => prompt("Please input the topic file name for the modeling result in CSV format:")?,
            };
            if output.trim().is_empty() {
                return Err(PipelineError::Argument("a topic report file name is required".into()));
            }
            if let Some(n) = iterations {
                config.topics.num_iterations = n;
            }
            if let Some(n) = workers {
                config.topics.num_workers = n;
            }

            let stopwords = StopwordSet::load(&config.stopwords_path);
            let engine = GibbsLda::new(LdaConfig::from(&config.topics));
            run_topic_modeling(&store, &stopwords, &config, &report_path(&output), &engine)?;
        }
    }
    Ok(())
}

fn prompt(question: &str) -> PipelineResult<String> {
    println!("{}", question);
    io::stdout().flush().map_err(|e| PipelineError::io("<stdout>", e))?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| PipelineError::io("<stdin>", e))?;
    Ok(line.trim().to_string())
}

fn prompt_topic_count(default: usize) -> PipelineResult<usize> {
    let answer = prompt(&format!("Please input the number of topics [{}]:", default))?;
    if answer.is_empty() {
        return Ok(default);
    }
    answer
        .parse()
        .map_err(|_| PipelineError::Argument(format!("`{}` is not a valid number of topics", answer)))
}
