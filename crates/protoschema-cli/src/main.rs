//! protoschema - Regenerate proto2 schemas from type descriptor manifests
//!
//! This tool reads JSON manifests describing serializable types and writes
//! the proto2 schema for each one, or checks that checked-in schemas are
//! still up to date.

mod manifest;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, ValueEnum};
use manifest::Manifest;
use protoschema_core::proto::walk;
use protoschema_core::{Generator, GeneratorConfig, ScalarType, StatsWriter};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Regenerate proto2 schemas from type descriptor manifests
#[derive(Parser, Debug)]
#[command(name = "protoschema")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    input: InputMode,

    /// Output directory for generated .proto files
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Verify that existing .proto files match their manifests; writes nothing
    #[arg(long, conflicts_with_all = ["dry_run", "force"])]
    check: bool,

    /// Dry run - don't write files, just show what would be generated
    #[arg(long)]
    dry_run: bool,

    /// Overwrite existing files that differ from the generated schema
    #[arg(long)]
    force: bool,

    /// Omit `// serial name` comments
    #[arg(long)]
    no_comments: bool,

    /// Scalar emitted for contextual fields
    #[arg(long, value_enum, default_value = "bytes")]
    contextual_type: ContextualType,

    /// Don't render the synthesized map entry messages
    #[arg(long)]
    no_map_entries: bool,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputMode {
    /// Path to a single manifest
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Path to a directory of manifests to process
    #[arg(short, long)]
    directory: Option<PathBuf>,
}

/// Placeholder scalar for contextual fields
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ContextualType {
    Bytes,
    String,
    Int32,
    Int64,
}

impl From<ContextualType> for ScalarType {
    fn from(value: ContextualType) -> Self {
        match value {
            ContextualType::Bytes => ScalarType::Bytes,
            ContextualType::String => ScalarType::String,
            ContextualType::Int32 => ScalarType::Int32,
            ContextualType::Int64 => ScalarType::Int64,
        }
    }
}

impl Cli {
    fn generator(&self) -> Generator {
        Generator::new().with_config(
            GeneratorConfig::new()
                .include_comments(!self.no_comments)
                .contextual_type(self.contextual_type.into())
                .emit_map_entries(!self.no_map_entries),
        )
    }
}

/// Tracks generated outputs so two manifests never claim one file
#[derive(Default)]
struct SchemaRegistry {
    /// Maps output path -> (content_hash, manifest)
    seen: HashMap<PathBuf, (blake3::Hash, PathBuf)>,
    /// Statistics
    stats: RegistryStats,
}

#[derive(Default)]
struct RegistryStats {
    manifests: usize,
    written: usize,
    unchanged: usize,
    stale: usize,
    failed: usize,
    messages: usize,
    enums: usize,
    fields: usize,
}

/// What happened to one output file
#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    Written,
    Unchanged,
}

impl SchemaRegistry {
    fn new() -> Self {
        Self::default()
    }

    fn content_hash(content: &str) -> blake3::Hash {
        blake3::hash(content.as_bytes())
    }

    /// Registers `output_path` for `manifest`; fails when another manifest
    /// already produced it
    fn register(&mut self, output_path: &Path, hash: blake3::Hash, manifest: &Path) -> Result<()> {
        if let Some((_, first)) = self.seen.get(output_path) {
            bail!(
                "{} and {} both generate {}",
                first.display(),
                manifest.display(),
                output_path.display()
            );
        }
        self.seen
            .insert(output_path.to_path_buf(), (hash, manifest.to_path_buf()));
        Ok(())
    }

    fn record_stats(&mut self, stats: &StatsWriter) {
        self.stats.messages += stats.message_count;
        self.stats.enums += stats.enum_count;
        self.stats.fields += stats.field_count;
    }

    fn print_summary(&self) {
        info!(
            "Summary: {} manifests, {} written, {} unchanged, {} stale, {} failed",
            self.stats.manifests,
            self.stats.written,
            self.stats.unchanged,
            self.stats.stale,
            self.stats.failed
        );
        info!(
            "Generated {} messages, {} enums, {} fields",
            self.stats.messages, self.stats.enums, self.stats.fields
        );
    }

    /// Turns the collected statistics into the process result
    fn finish(&self, check: bool) -> Result<()> {
        if self.stats.failed > 0 {
            bail!("{} manifest(s) failed", self.stats.failed);
        }
        if check && self.stats.stale > 0 {
            bail!(
                "{} schema(s) are out of date; rerun without --check",
                self.stats.stale
            );
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    run(&cli)
}

fn run(cli: &Cli) -> Result<()> {
    let mut registry = SchemaRegistry::new();

    // Dispatch based on input mode
    if let Some(ref file) = cli.input.file {
        process_single_file(cli, file, &mut registry)?;
    } else if let Some(ref directory) = cli.input.directory {
        process_directory(cli, directory, &mut registry)?;
    } else {
        bail!("Either --file or --directory must be specified")
    }

    if !cli.dry_run {
        registry.print_summary();
    }
    registry.finish(cli.check)
}

/// Process a single manifest
fn process_single_file(cli: &Cli, file: &Path, registry: &mut SchemaRegistry) -> Result<()> {
    if !file.exists() {
        bail!("Input file does not exist: {}", file.display());
    }
    if !file.is_file() {
        bail!("Input path is not a file: {}", file.display());
    }

    process_manifest(cli, file, registry)
}

/// Process a directory of manifests recursively
fn process_directory(cli: &Cli, directory: &Path, registry: &mut SchemaRegistry) -> Result<()> {
    if !directory.exists() {
        bail!("Directory does not exist: {}", directory.display());
    }
    if !directory.is_dir() {
        bail!("Path is not a directory: {}", directory.display());
    }

    info!("Scanning directory: {}", directory.display());

    // Sorted so output and failures are reported in a stable order
    for entry in WalkDir::new(directory)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        // Skip directories
        if !path.is_file() {
            continue;
        }

        // Skip hidden files
        if path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('.'))
            .unwrap_or(false)
        {
            continue;
        }

        if !is_manifest(path) {
            trace!("Skipping non-manifest: {}", path.display());
            continue;
        }

        debug!("Processing manifest: {}", path.display());
        if let Err(e) = process_manifest(cli, path, registry) {
            // Log error but continue with other manifests
            warn!("Error processing {}: {:#}", path.display(), e);
            registry.stats.failed += 1;
        }
    }

    Ok(())
}

fn is_manifest(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// `<output>/<manifest stem>.proto`
fn output_path_for(output_dir: &Path, manifest_path: &Path) -> Result<PathBuf> {
    let stem = manifest_path
        .file_stem()
        .and_then(|s| s.to_str())
        .with_context(|| format!("Manifest has no usable name: {}", manifest_path.display()))?;
    Ok(output_dir.join(format!("{}.proto", stem)))
}

/// Generate one manifest and write, check or print the result
fn process_manifest(cli: &Cli, manifest_path: &Path, registry: &mut SchemaRegistry) -> Result<()> {
    trace!("Reading {}", manifest_path.display());
    let manifest = Manifest::from_path(manifest_path)?;
    let descriptors = manifest.descriptors()?;

    let generator = cli.generator();
    let file = generator
        .build(&descriptors, &manifest.package, &manifest.options)
        .with_context(|| format!("Failed to generate schema for {}", manifest_path.display()))?;
    let content = generator.render(&file)?;

    let mut stats = StatsWriter::default();
    walk(&file, &mut stats)?;
    debug!(
        "{}: {} messages, {} enums, {} fields",
        manifest_path.display(),
        stats.message_count,
        stats.enum_count,
        stats.field_count
    );

    let output_path = output_path_for(&cli.output, manifest_path)?;
    let hash = SchemaRegistry::content_hash(&content);
    registry.register(&output_path, hash, manifest_path)?;
    registry.stats.manifests += 1;
    registry.record_stats(&stats);

    if cli.check {
        if is_up_to_date(&output_path, &hash)? {
            debug!("Up to date: {}", output_path.display());
        } else {
            println!("Stale: {}", output_path.display());
            registry.stats.stale += 1;
        }
        return Ok(());
    }

    if cli.dry_run {
        println!("Would write: {}", output_path.display());
        if cli.verbose > 0 {
            println!("---");
            print!("{}", content);
            println!("---");
        }
        return Ok(());
    }

    match write_proto_file(&output_path, &content, cli.force) {
        Ok(Outcome::Written) => {
            println!("Wrote {}", output_path.display());
            registry.stats.written += 1;
        }
        Ok(Outcome::Unchanged) => {
            debug!("Unchanged: {}", output_path.display());
            registry.stats.unchanged += 1;
        }
        Err(e) => {
            error!("Failed to write {}: {:#}", output_path.display(), e);
            return Err(e);
        }
    }

    Ok(())
}

/// Whether `path` exists and hashes to `hash`
fn is_up_to_date(path: &Path, hash: &blake3::Hash) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    let existing =
        fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    Ok(blake3::hash(&existing) == *hash)
}

/// Write a proto file to disk, leaving identical files untouched
fn write_proto_file(output_path: &Path, content: &str, force: bool) -> Result<Outcome> {
    // Create parent directories
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    // Check if file exists
    if output_path.exists() {
        if is_up_to_date(output_path, &SchemaRegistry::content_hash(content))? {
            return Ok(Outcome::Unchanged);
        }
        if !force {
            bail!(
                "File already exists: {} (use --force to overwrite)",
                output_path.display()
            );
        }
    }

    // Write the file
    let mut file = fs::File::create(output_path)
        .with_context(|| format!("Failed to create file: {}", output_path.display()))?;

    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write file: {}", output_path.display()))?;

    Ok(Outcome::Written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const HOLDER: &str = r#"{
        "package": "api.v1",
        "roots": ["Holder"],
        "types": {
            "Holder": { "kind": "class", "fields": [{ "name": "id", "type": "long" }] }
        }
    }"#;

    const HOLDER_PROTO: &str = "syntax = \"proto2\";\n\npackage api.v1;\n\n\
                                message Holder {\n  optional int64 id = 1;\n}\n";

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("protoschema").chain(args.iter().copied()))
    }

    fn write_manifest(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_generates_file_from_manifest() {
        let temp_dir = TempDir::new().unwrap();
        let manifest = write_manifest(temp_dir.path(), "holder.json", HOLDER);
        let out = temp_dir.path().join("out");

        let cli = cli(&[
            "--file",
            manifest.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
        ]);
        run(&cli).unwrap();

        let written = fs::read_to_string(out.join("holder.proto")).unwrap();
        assert_eq!(written, HOLDER_PROTO);

        // Regenerating identical content needs no --force
        run(&cli).unwrap();
    }

    #[test]
    fn test_check_detects_stale_files() {
        let temp_dir = TempDir::new().unwrap();
        let manifest = write_manifest(temp_dir.path(), "holder.json", HOLDER);
        let out = temp_dir.path().join("out");
        let args = [
            "--file",
            manifest.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
        ];

        // Missing output is stale
        let mut check_args = args.to_vec();
        check_args.push("--check");
        assert!(run(&cli(&check_args)).is_err());

        run(&cli(&args)).unwrap();
        run(&cli(&check_args)).unwrap();

        fs::write(out.join("holder.proto"), "edited").unwrap();
        assert!(run(&cli(&check_args)).is_err());
    }

    #[test]
    fn test_directory_mode_processes_json_only() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in");
        fs::create_dir_all(input.join("nested")).unwrap();
        write_manifest(&input, "a.json", HOLDER);
        write_manifest(&input.join("nested"), "b.json", HOLDER);
        write_manifest(&input, "notes.txt", "not a manifest");
        let out = temp_dir.path().join("out");

        run(&cli(&[
            "--directory",
            input.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
        ]))
        .unwrap();

        assert!(out.join("a.proto").exists());
        assert!(out.join("b.proto").exists());
        assert!(!out.join("notes.proto").exists());
    }

    #[test]
    fn test_directory_mode_reports_failures() {
        let temp_dir = TempDir::new().unwrap();
        write_manifest(temp_dir.path(), "good.json", HOLDER);
        write_manifest(temp_dir.path(), "bad.json", r#"{ "package": "1bad", "roots": [], "types": {} }"#);
        let out = temp_dir.path().join("out");

        let result = run(&cli(&[
            "--directory",
            temp_dir.path().to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
        ]));
        assert!(result.is_err());
        assert!(out.join("good.proto").exists());
    }

    #[test]
    fn test_write_requires_force_for_changes() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("x.proto");

        assert_eq!(write_proto_file(&path, "one", false).unwrap(), Outcome::Written);
        assert_eq!(write_proto_file(&path, "one", false).unwrap(), Outcome::Unchanged);
        assert!(write_proto_file(&path, "two", false).is_err());
        assert_eq!(write_proto_file(&path, "two", true).unwrap(), Outcome::Written);
        assert_eq!(fs::read_to_string(&path).unwrap(), "two");
    }

    #[test]
    fn test_registry_rejects_shared_output() {
        let mut registry = SchemaRegistry::new();
        let hash = SchemaRegistry::content_hash("x");
        let output = Path::new("/tmp/out/a.proto");

        registry.register(output, hash, Path::new("in/a.json")).unwrap();
        let err = registry
            .register(output, hash, Path::new("in/nested/a.json"))
            .unwrap_err();
        assert!(err.to_string().contains("both generate"));
    }

    #[test]
    fn test_content_hash() {
        let hash1 = SchemaRegistry::content_hash("hello");
        let hash2 = SchemaRegistry::content_hash("hello");
        let hash3 = SchemaRegistry::content_hash("world");

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash3);
    }

    #[test]
    fn test_output_path_for() {
        let path = output_path_for(Path::new("out"), Path::new("schemas/orders.json")).unwrap();
        assert_eq!(path, Path::new("out/orders.proto"));
    }

    #[test]
    fn test_contextual_type_flag() {
        let cli = cli(&["--file", "m.json", "--contextual-type", "string", "--no-comments"]);
        let config = cli.generator().config().clone();
        assert_eq!(config.contextual_type, ScalarType::String);
        assert!(!config.include_comments);
        assert!(config.emit_map_entries);
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
