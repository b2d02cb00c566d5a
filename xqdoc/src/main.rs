//! xqdoc: generate xqDoc XML from XQuery main and library modules.
//!
//! Two modes:
//!
//! - **stdin mode**: `xqdoc < module.xqm` writes the document to stdout
//! - **file mode**: `xqdoc -o docs/ src/*.xqm` writes `docs/<stem>.xml` per input

use anyhow::{Context, Result};
use clap::Parser;
use std::collections::HashSet;
use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use xqdoc::{NamespaceConfig, Preset, Renderer, XmlRenderer};

#[derive(Parser)]
#[command(
    name = "xqdoc",
    about = "Generate xqDoc XML documentation from XQuery modules",
    version
)]
struct Cli {
    /// Input files, directories or glob patterns. If omitted, reads from stdin.
    files: Vec<String>,

    /// Output directory (required when files are given)
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Predefined namespace table
    #[arg(long, value_enum, default_value_t = Preset::W3c)]
    preset: Preset,

    /// Extra predefined namespace as prefix=uri. Can be given multiple times.
    #[arg(short = 'D', long = "define", value_name = "PREFIX=URI")]
    define: Vec<String>,

    /// TOML file with a [namespaces] table
    #[arg(long, value_name = "FILE")]
    namespaces: Option<PathBuf>,

    /// Replace '/' with '~2F' in resolved namespace URIs
    #[arg(long)]
    encode_uris: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli)?;

    if cli.files.is_empty() {
        return stdin_mode(&config);
    }

    file_mode(&cli, &config)
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{}={level}", env!("CARGO_CRATE_NAME"))));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .init();
}

/// Build the namespace configuration. Later layers override earlier ones:
/// preset, then --namespaces file, then -D pairs, then --encode-uris.
fn load_config(cli: &Cli) -> Result<NamespaceConfig> {
    let mut config = NamespaceConfig::preset(cli.preset);

    if let Some(path) = &cli.namespaces {
        config
            .load_file(path)
            .with_context(|| format!("failed to load namespace file {}", path.display()))?;
    }
    for pair in &cli.define {
        config.define(pair)?;
    }
    if cli.encode_uris {
        config.encode_uris = true;
    }

    debug!(
        preset = ?cli.preset,
        prefixes = config.prefixes.len(),
        encode_uris = config.encode_uris,
        "namespace configuration loaded"
    );
    Ok(config)
}

/// stdin mode: read one module from stdin, write XML to stdout.
fn stdin_mode(config: &NamespaceConfig) -> Result<()> {
    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .context("failed to read stdin")?;

    let out = xqdoc::generate(&input, config).context("failed to document stdin")?;
    print!("{}", out);
    Ok(())
}

/// file mode: document every input, write one file per module.
fn file_mode(cli: &Cli, config: &NamespaceConfig) -> Result<()> {
    let output_dir = cli
        .output
        .as_deref()
        .context("--output is required when files are given")?;

    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output directory: {}", output_dir.display()))?;

    let input_files = expand_globs(&cli.files)?;

    // One renderer per run so every document carries the same date.
    let renderer = XmlRenderer::default();
    let ext = renderer.file_extension();

    let mut failed = 0usize;
    let mut taken = HashSet::new();
    for path in &input_files {
        match document_file(path, config, &renderer) {
            Ok(xml) => {
                let stem = derive_output_name(path);
                let name = claim_output_name(&stem, &mut taken);
                if name != stem {
                    warn!("{} would overwrite {stem}.{ext}, writing {name}.{ext}", path.display());
                }
                let out_path = output_dir.join(format!("{}.{}", name, ext));
                fs::write(&out_path, xml)
                    .with_context(|| format!("failed to write {}", out_path.display()))?;
                info!("wrote {}", out_path.display());
            }
            Err(e) => {
                warn!("skipping {}: {:#}", path.display(), e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} inputs could not be documented", failed, input_files.len());
    }
    Ok(())
}

fn document_file(path: &Path, config: &NamespaceConfig, renderer: &dyn Renderer) -> Result<String> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let xml = xqdoc::generate_with(&content, config, renderer)?;
    Ok(xml)
}

/// File extensions recognized as XQuery modules.
const SUPPORTED_EXTENSIONS: &[&str] = &["xq", "xqy", "xql", "xqm", "xquery"];

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext))
}

/// Expand glob patterns into a list of real file paths.
/// Bare directories are scanned (non-recursively) for XQuery modules.
fn expand_globs(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        let path = Path::new(pattern);
        if path.is_file() {
            files.push(path.to_path_buf());
            continue;
        }
        if path.is_dir() {
            let entries = fs::read_dir(path)
                .with_context(|| format!("failed to read directory: {}", path.display()))?;
            files.extend(
                entries
                    .flatten()
                    .map(|entry| entry.path())
                    .filter(|p| p.is_file() && is_supported(p)),
            );
            continue;
        }
        let matches: Vec<_> = glob::glob(pattern)
            .with_context(|| format!("invalid glob pattern: {}", pattern))?
            .filter_map(|r| r.ok())
            .filter(|p| p.is_file())
            .collect();
        if matches.is_empty() {
            warn!("no files matched: {}", pattern);
        }
        files.extend(matches);
    }
    files.sort();
    files.dedup();
    Ok(files)
}

/// "src/functx.xqm" → "functx"
fn derive_output_name(source: &Path) -> String {
    source
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.to_string_lossy().into_owned())
}

/// Reserve an output name for this run. A stem already taken gets the
/// first free `-2`, `-3`, … suffix.
fn claim_output_name(stem: &str, taken: &mut HashSet<String>) -> String {
    if taken.insert(stem.to_string()) {
        return stem.to_string();
    }
    (2..)
        .map(|n| format!("{stem}-{n}"))
        .find(|candidate| taken.insert(candidate.clone()))
        .unwrap_or_else(|| stem.to_string())
}
