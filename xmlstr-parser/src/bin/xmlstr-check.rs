use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;
use xmlstr_parser::{
    Element, ParseXmlString, ParserConfig, XmlStrError, XmlStringParser,
};

#[derive(Parser, Debug)]
#[command(name = "xmlstr-check")]
#[command(about = "Check that XML files are well-formed and print descriptive diagnostics")]
struct Args {
    /// Files to check (`-` reads standard input)
    #[arg(value_name = "FILES", required = true)]
    files: Vec<PathBuf>,

    /// YAML parser configuration; flags below are applied on top of it
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Restrict child elements and attributes to this namespace
    #[arg(long)]
    namespace: Option<String>,

    /// Treat --namespace as a prefix instead of a URI
    #[arg(long)]
    prefix: bool,

    /// Parser option flag, e.g. NO_BLANKS (repeatable)
    #[arg(short = 'O', long = "option", value_name = "FLAG")]
    options: Vec<String>,

    /// Force the entity loader off (true) or on (false)
    #[arg(long, value_name = "BOOL")]
    disable_entity_loader: Option<bool>,

    /// Print diagnostics as JSON instead of the text report
    #[arg(long)]
    json: bool,

    /// Verbose output (-v for debug, -vv for trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let parser = build_parser(&args)?;
    let mut exit_code = 0;

    for path in &args.files {
        let name = path.display().to_string();
        match check_file(&parser, path) {
            Ok(root) => {
                println!("✓ {} is well-formed ({})", name, root.name());
            }
            Err(XmlStrError::Parse(e)) => {
                eprintln!("✗ {} has errors:", name);
                if args.json {
                    eprintln!("{}", serde_json::to_string_pretty(e.errors())?);
                } else {
                    eprintln!("{}", e);
                }
                exit_code = 1;
            }
            Err(e) => {
                eprintln!("✗ {}: {}", name, e);
                exit_code = 1;
            }
        }
    }

    process::exit(exit_code);
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn build_parser(args: &Args) -> Result<XmlStringParser> {
    let mut config = match &args.config {
        Some(path) => ParserConfig::from_file(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => ParserConfig::default(),
    };

    config.options.extend(args.options.iter().cloned());
    if let Some(namespace) = &args.namespace {
        config.namespace = namespace.clone();
    }
    if args.prefix {
        config.is_prefix = true;
    }
    if args.disable_entity_loader.is_some() {
        config.disable_entity_loader = args.disable_entity_loader;
    }

    Ok(config.build()?)
}

fn check_file(parser: &XmlStringParser, path: &Path) -> Result<Element, XmlStrError> {
    let content = if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        fs::read_to_string(path)?
    };

    Ok(parser.parse_xml_string(&content)?)
}
