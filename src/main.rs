use clap::{App, Arg, ArgMatches, SubCommand};
use std::fs;
use std::path::Path;
use std::process::exit;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use adorntools::config::IdScheme;
use adorntools::pipeline::*;
use adorntools::readorn::KeepAdornments;
use adorntools::*;

const SUBCOMMANDS: [&'static str; 3] = ["adorn", "readorn", "strip"];

fn common_arguments<'a>() -> Vec<clap::Arg<'a>> {
    let mut args: Vec<Arg> = Vec::new();
    args.push(
        Arg::with_name("verbose")
            .long("verbose")
            .short('V')
            .help("Produce verbose output")
            .required(false),
    );
    args.push(
        Arg::with_name("config")
            .long("config")
            .short('c')
            .help("Configuration file (TOML) with the adornment settings. Options given on the command line take precedence.")
            .takes_value(true),
    );
    args.push(
        Arg::with_name("output-dir")
            .long("output-dir")
            .short('o')
            .help("Directory to write the output files to. Existing files are not overwritten, a versioned file name (-001, -002, ...) is chosen instead.")
            .takes_value(true)
            .default_value("."),
    );
    args.push(
        Arg::with_name("files")
            .help("Input TEI XML files")
            .takes_value(true)
            .multiple(true)
            .required(true),
    );
    args
}

fn adorn_arguments<'a>() -> Vec<clap::Arg<'a>> {
    let mut args: Vec<Arg> = Vec::new();
    args.push(
        Arg::with_name("sentence-milestones")
            .long("sentence-milestones")
            .help("Mark the start and end of every sentence with a milestone element"),
    );
    args.push(
        Arg::with_name("pseudo-pages")
            .long("pseudo-pages")
            .help("Mark runs of this many words with pseudo-page milestones")
            .takes_value(true),
    );
    args.push(
        Arg::with_name("sentence-numbers")
            .long("sentence-numbers")
            .help("Add a sentence number attribute to every word"),
    );
    args.push(
        Arg::with_name("word-numbers")
            .long("word-numbers")
            .help("Add a word number attribute to every word"),
    );
    args.push(
        Arg::with_name("running-word-numbers")
            .long("running-word-numbers")
            .help("Number words through the whole document rather than within each sentence"),
    );
    args.push(
        Arg::with_name("nonredundant")
            .long("nonredundant")
            .help("Only output attributes whose values can not be derived from other attributes"),
    );
    args.push(
        Arg::with_name("no-whitespace")
            .long("no-whitespace")
            .help("Do not output whitespace elements between words"),
    );
    args.push(
        Arg::with_name("id-scheme")
            .long("id-scheme")
            .help("How to generate word ids")
            .takes_value(true)
            .possible_values(&["reading-context-order", "word-within-page-block"]),
    );
    args.push(
        Arg::with_name("id-spacing")
            .long("id-spacing")
            .help("Spacing between consecutive generated word ids")
            .takes_value(true),
    );
    args.push(
        Arg::with_name("word-paths")
            .long("word-paths")
            .help("Add the XML path of every word as an attribute"),
    );
    args
}

fn app<'a>() -> App<'a> {
    App::new("adorn")
        .version(VERSION)
        .author("adorn-tools contributors")
        .about("Adorns the word elements of TEI XML documents with identifiers, sentence structure and linguistic attributes.")
        .subcommand(
            SubCommand::with_name("adorn")
                .about("Regenerate word ids and word attributes of documents carrying word elements")
                .args(&common_arguments())
                .args(&adorn_arguments()),
        )
        .subcommand(
            SubCommand::with_name("readorn")
                .about("Rewrite the word attributes of already adorned documents")
                .args(&common_arguments())
                .args(&adorn_arguments()),
        )
        .subcommand(
            SubCommand::with_name("strip")
                .about("Reduce word elements to their ids, preparing documents for fresh adornment")
                .args(&common_arguments()),
        )
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .with_writer(std::io::stderr)
        .init();
}

fn config_from_args(args: &ArgMatches, adorn_options: bool) -> Result<AdornConfig, AdornError> {
    let mut config = if let Some(filename) = args.value_of("config") {
        let configdata = fs::read_to_string(filename).map_err(|e| {
            AdornError::Config(format!("Failure reading config file {}: {}", filename, e))
        })?;
        AdornConfig::from_toml_str(&configdata)?
    } else {
        AdornConfig::new()
    };
    if !adorn_options {
        return Ok(config);
    }
    if args.is_present("sentence-milestones") {
        config = config.with_sentence_milestones(true);
    }
    if let Some(size) = args.value_of("pseudo-pages") {
        let size = size.parse::<usize>().map_err(|_| {
            AdornError::Config(format!("pseudo page size must be a number, got {}", size))
        })?;
        config = config.with_pseudo_pages(size);
    }
    if args.is_present("sentence-numbers") {
        config = config.with_sentence_numbers(true);
    }
    if args.is_present("word-numbers") {
        config = config.with_word_numbers(true);
    }
    if args.is_present("running-word-numbers") {
        config = config.with_running_word_numbers(true);
    }
    if args.is_present("nonredundant") {
        config = config.with_nonredundant_attributes_only(true);
    }
    if args.is_present("no-whitespace") {
        config = config.with_whitespace(false);
    }
    if let Some(scheme) = args.value_of("id-scheme") {
        config = config.with_id_scheme(IdScheme::try_from(scheme)?);
    }
    if let Some(spacing) = args.value_of("id-spacing") {
        let spacing = spacing.parse::<usize>().map_err(|_| {
            AdornError::Config(format!("id spacing must be a number, got {}", spacing))
        })?;
        config = config.with_id_spacing(spacing);
    }
    if args.is_present("word-paths") {
        config = config.with_word_paths(true);
    }
    config.validate()?;
    Ok(config)
}

fn main() {
    let rootargs = app().get_matches();

    let mut command: Option<(&str, &ArgMatches)> = None;
    for subcommand in SUBCOMMANDS.iter() {
        if let Some(matchedargs) = rootargs.subcommand_matches(subcommand) {
            command = Some((*subcommand, matchedargs));
        }
    }
    let (command, args) = match command {
        Some(command) => command,
        None => {
            eprintln!("[error] No command specified, please see 'adorn help'");
            exit(2);
        }
    };

    init_tracing(args.is_present("verbose"));

    let config = match config_from_args(args, command != "strip") {
        Ok(config) => config,
        Err(err) => {
            eprintln!("[error] {}", &err);
            exit(1);
        }
    };

    let output_dir = Path::new(args.value_of("output-dir").unwrap_or("."));
    if let Err(err) = fs::create_dir_all(output_dir) {
        eprintln!(
            "[error] Unable to create output directory {}: {}",
            output_dir.display(),
            err
        );
        exit(1);
    }

    let mut processed = 0;
    let mut failed = 0;
    for filename in args.values_of("files").into_iter().flatten() {
        let input = Path::new(filename);
        if !input.is_file() {
            warn!("{}: file not found, skipped", filename);
            failed += 1;
            continue;
        }
        let output = output_file_name(input, output_dir);
        let result = match command {
            "adorn" => adorn_file(input, &output, &config).map(|_| ()),
            "readorn" => readorn_file(input, &output, &config, &mut KeepAdornments).map(|_| ()),
            _ => strip_file(input, &output, &config),
        };
        match result {
            Ok(()) => processed += 1,
            Err(err) if err.is_fatal() => {
                eprintln!("[error] {}", &err);
                exit(1);
            }
            Err(err) => {
                error!("{}: {}", filename, err);
                failed += 1;
            }
        }
    }
    info!("{} documents processed, {} failed", processed, failed);
}
