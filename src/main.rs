//! Command-line front end: loads a file into a buffer, edits it, and prints the result

use chunktext::config::{self, Config};
use chunktext::text::{EditKind, EditSource};
use chunktext::{logger, Buffer, BufferManager};
use clap::{Arg, ArgMatches, Command};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use std::process::exit;

fn main() {
    let matches = generate_clap_app().get_matches();

    if let Err(e) = logger::init() {
        eprintln!("fatal error: failed to initialize logging: {}", e);
        exit(1);
    }

    let config = load_config(&matches);
    logger::set_level(config.log_level);
    if let Some(path) = config.log_file.as_ref() {
        match File::create(path) {
            Ok(f) => drop(logger::set_file(f)),
            Err(e) => {
                eprintln!(
                    "fatal error: failed to open logging file '{}': {}",
                    path.display(),
                    e
                );
                exit(1);
            }
        }
    }

    log::info!("config parsed, logging fully initialized");

    let inserts = parse_all(&matches, "insert", parse_insert);
    let erases = parse_all(&matches, "erase", parse_erase);
    let undo_count = match matches.value_of("undo").map(str::parse::<usize>) {
        None => 0,
        Some(Ok(n)) => n,
        Some(Err(e)) => fail(format!("invalid value for '--undo': {}", e)),
    };

    let manager = BufferManager::new(config);
    let path = Path::new(matches.value_of("FILE").expect("FILE is a required argument"));
    let buffer = match manager.open(path, |p| fs::read(p)) {
        Ok(b) => b,
        Err(e) => fail(format!("failed to read '{}': {}", path.display(), e)),
    };

    for (pos, text) in inserts {
        check_range(&buffer, pos, 0);
        let mut m = buffer.begin(EditKind::Normal, EditSource::UNKNOWN);
        m.modify(pos, 0, &text);
        m.end();
    }

    for (pos, len) in erases {
        check_range(&buffer, pos, len);
        let mut m = buffer.begin(EditKind::Normal, EditSource::UNKNOWN);
        m.modify(pos, len, &[]);
        m.end();
    }

    for i in 0..undo_count {
        if !buffer.try_undo() {
            log::warn!("ran out of edits to undo after {}", i);
            eprintln!("warning: only {} edit(s) could be undone", i);
            break;
        }
    }

    let res = match matches.is_present("stats") {
        true => print_stats(&buffer),
        false => io::stdout().write_all(&buffer.to_vec()),
    };

    if let Err(e) = res {
        fail(format!("failed to write output: {}", e));
    }

    log::logger().flush();
}

/// Prints the message and exits with a non-zero status
fn fail(msg: String) -> ! {
    log::error!("{}", msg);
    eprintln!("error: {}", msg);
    exit(1)
}

/// Loads the configuration file given on the command line (or the default one in the current
/// directory, if it exists), then applies any overrides from the arguments
fn load_config(matches: &ArgMatches) -> Config {
    let explicit = matches.value_of("config").map(Path::new);
    let default = Path::new(config::DEFAULT_CONFIG_FILE_NAME);

    let mut cfg = match explicit {
        Some(path) => Config::from_file(path),
        None if default.exists() => Config::from_file(default),
        None => Ok(Config::default()),
    }
    .unwrap_or_else(|e| fail(e.to_string()));

    if let Some(file_name) = matches.value_of("log-file") {
        cfg.log_file = Some(file_name.into());
    }

    if let Some(level) = matches.value_of("log-level") {
        cfg.log_level = logger::level_filter_from_str(level);
    }

    cfg
}

fn parse_all<T>(
    matches: &ArgMatches,
    name: &str,
    parse: fn(&str) -> Result<T, String>,
) -> Vec<T> {
    let values = match matches.values_of(name) {
        Some(vs) => vs,
        None => return Vec::new(),
    };

    values
        .map(|s| {
            parse(s).unwrap_or_else(|e| fail(format!("invalid value for '--{}': {}", name, e)))
        })
        .collect()
}

/// Parses a `POS:TEXT` pair
fn parse_insert(s: &str) -> Result<(usize, Vec<u8>), String> {
    let (pos, text) = s.split_once(':').ok_or("expected POS:TEXT")?;
    let pos = pos
        .parse::<usize>()
        .map_err(|e| format!("bad position {:?}: {}", pos, e))?;
    Ok((pos, text.as_bytes().to_vec()))
}

/// Parses a `POS:LEN` pair
fn parse_erase(s: &str) -> Result<(usize, usize), String> {
    let (pos, len) = s.split_once(':').ok_or("expected POS:LEN")?;
    let pos = pos
        .parse::<usize>()
        .map_err(|e| format!("bad position {:?}: {}", pos, e))?;
    let len = len
        .parse::<usize>()
        .map_err(|e| format!("bad length {:?}: {}", len, e))?;
    Ok((pos, len))
}

/// Exits with an error if the range doesn't fit in the buffer, so that it never gets as far as
/// the buffer's own (panicking) bounds checks
fn check_range(buffer: &Buffer, pos: usize, len: usize) {
    let buf_len = buffer.len();
    if pos.checked_add(len).map(|end| end > buf_len).unwrap_or(true) {
        fail(format!(
            "range {}..{} is out of bounds for a buffer of {} bytes",
            pos,
            pos.saturating_add(len),
            buf_len
        ));
    }
}

fn print_stats(buffer: &Buffer) -> io::Result<()> {
    let content = buffer.read();
    let chunks = content.chunks();
    let history = content.history();

    let mut out = io::stdout();
    writeln!(out, "buffer:  {}", buffer.id())?;
    writeln!(out, "length:  {} bytes", chunks.len())?;
    writeln!(out, "lines:   {}", chunks.line_count())?;
    writeln!(
        out,
        "chunks:  {} (max {} bytes each)",
        chunks.chunk_count(),
        chunks.limits().max_chunk_size
    )?;
    writeln!(
        out,
        "history: {} of {} edit(s) applied",
        history.current(),
        history.len()
    )
}

/// Generates the clap application for the command line arguments
#[rustfmt::skip]
fn generate_clap_app() -> Command<'static> {
    Command::new("chunktext")
        .version("0.1")
        .about("Loads a file into a chunked buffer, edits it, and prints the result")
        .arg(Arg::new("FILE")
            .help("The file to load")
            .required(true)
        )
        .arg(Arg::new("config")
            .long("config")
            .help("Sets the config file to use")
            .long_help(concat!(
                "Sets the config file to use.\n",
                "If not given, we use 'chunktext.yml' in the current directory, if it exists.",
            ))
            .takes_value(true)
        )
        .arg(Arg::new("log-file")
            .long("log-file")
            .help("Optionally enables logging to a file")
            .takes_value(true)
        )
        .arg(Arg::new("log-level")
            .long("log-level")
            .help("Sets the level of log output to provide")
            .long_help(concat!(
                "Sets the level of log output to provide.\n",
                r#"Defaults to "Warn" - i.e. excluding "Trace", "Debug", and "Info" messages."#,
                " This can also be provided by the 'log_level' field in the configuration file",
            ))
            .takes_value(true)
            .possible_values(["Off", "Trace", "Debug", "Info", "Warn", "Error"])
        )
        .arg(Arg::new("insert")
            .long("insert")
            .value_name("POS:TEXT")
            .help("Inserts TEXT at byte POS, as its own edit")
            .takes_value(true)
            .multiple_occurrences(true)
        )
        .arg(Arg::new("erase")
            .long("erase")
            .value_name("POS:LEN")
            .help("Erases LEN bytes starting at byte POS, as its own edit")
            .long_help(concat!(
                "Erases LEN bytes starting at byte POS, as its own edit.\n",
                "All erasures are applied after all insertions.",
            ))
            .takes_value(true)
            .multiple_occurrences(true)
        )
        .arg(Arg::new("undo")
            .long("undo")
            .value_name("N")
            .help("Undoes the last N edits after applying them")
            .takes_value(true)
        )
        .arg(Arg::new("stats")
            .long("stats")
            .help("Prints statistics about the buffer instead of its content")
        )
}
