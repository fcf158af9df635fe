use std::{path::PathBuf, sync::Arc};

use clap::Parser;

use iidpatch::{metadata::resolver::FolderResolver, GuidPatcher, Module};

/// Precompute WinRT IIDs in a compiled module.
#[derive(Parser)]
#[command(name = "iidpatch", version, about)]
struct Cli {
    /// Input module container (.iidm)
    input: PathBuf,

    /// Additional directories searched for peer modules
    #[arg(short = 's', long = "search", value_name = "DIR")]
    search: Vec<PathBuf>,

    /// Output directory, created if absent
    #[arg(short = 'o', long = "output", value_name = "DIR", default_value = "Output")]
    output: PathBuf,

    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        eprintln!("\nCancelled.");
        std::process::exit(130);
    })
    .expect("failed to set Ctrl+C handler");

    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_module("iidpatch", level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();

    let module = Arc::new(Module::from_file(&cli.input)?);

    let mut directories: Vec<PathBuf> = Vec::new();
    match cli.input.parent() {
        Some(parent) if parent.as_os_str().is_empty() => directories.push(PathBuf::from(".")),
        Some(parent) => directories.push(parent.to_path_buf()),
        None => directories.push(PathBuf::from(".")),
    }
    directories.extend(cli.search.iter().cloned());
    let resolver = FolderResolver::new(&directories);
    log::debug!("{} peer modules available", resolver.len());

    let patcher = GuidPatcher::new(module, &resolver);
    let patched = patcher.process()?;

    std::fs::create_dir_all(&cli.output)?;
    let written = patcher.save(&cli.output)?;
    log::debug!("wrote {}", written.display());

    println!("{patched} IID calculations/fetches patched");
    Ok(())
}
