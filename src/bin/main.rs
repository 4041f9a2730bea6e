use std::{
    fs,
    io::{self, Write},
    path::PathBuf,
};

use bvc::{
    driver, parser,
    token::Token,
    util::fmt::tree::{SemanticTreeDisplay, SyntaxTreeDisplay},
};
use clap::{value_parser, ArgAction, Parser, ValueEnum};
use eyre::WrapErr;
use tracing::{debug, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

/// Front end of the bvc language.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Source file to compile. Reads lines from stdin when absent.
    file: Option<PathBuf>,
    /// Last stage to run, whose output is printed.
    #[arg(long, value_enum, default_value_t = Emit::Semantic)]
    emit: Emit,
    #[command(flatten)]
    logging: LoggingArgs,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Emit {
    Tokens,
    Syntax,
    Semantic,
}

#[derive(Debug, Clone, Copy, clap::Args)]
struct LoggingArgs {
    /// More logging, up to `-vv`.
    #[arg(short = 'v', value_parser = value_parser!(u8).range(0..=2), action = ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,
    /// Less logging, down to `-qq`.
    #[arg(short = 'q', value_parser = value_parser!(u8).range(0..=2), action = ArgAction::Count, conflicts_with = "verbose")]
    quiet: u8,
}

impl LoggingArgs {
    fn level_filter(self) -> LevelFilter {
        match i16::from(self.verbose) - i16::from(self.quiet) {
            ..=-2 => LevelFilter::OFF,
            -1 => LevelFilter::ERROR,
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            2.. => LevelFilter::TRACE,
        }
    }
}

fn main() -> eyre::Result<()> {
    let args = Args::parse();
    init_logging(args.logging.level_filter());
    debug!(?args, "starting");

    match &args.file {
        Some(path) => {
            let src = fs::read_to_string(path)
                .wrap_err_with(|| format!("failed to read {}", path.display()))?;
            let out = emit(args.emit, &src)?;
            print!("{out}");
            Ok(())
        }
        None => repl(args.emit),
    }
}

fn init_logging(level: LevelFilter) {
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Runs the front end up to `stage`, returning the printed result.
fn emit(stage: Emit, src: &str) -> Result<String, driver::Error> {
    let out = match stage {
        Emit::Tokens => {
            let tokens = driver::tokenize(src)?;
            tokens.iter().map(format_token).collect()
        }
        Emit::Syntax => {
            let root = parser::parse(src).map_err(driver::Error::from)?;
            SyntaxTreeDisplay(&root).to_string()
        }
        Emit::Semantic => {
            let compilation = driver::compile(src)?;
            SemanticTreeDisplay(&compilation.semantic).to_string()
        }
    };
    Ok(out)
}

fn format_token(token: &Token) -> String {
    match &token.value {
        Some(value) => format!("{}: {:?} {}\n", token.span(), token.kind, value),
        None => format!("{}: {:?} {:?}\n", token.span(), token.kind, token.text),
    }
}

fn repl(stage: Emit) -> eyre::Result<()> {
    let mut input = String::new();
    loop {
        print!("> ");
        io::stdout().flush()?;

        input.clear();
        let n = io::stdin().read_line(&mut input)?;

        if n == 0 {
            println!("^D");
            return Ok(());
        }

        match emit(stage, &input) {
            Ok(out) => print!("{out}"),
            Err(error) => println!("{error}"),
        }
    }
}

