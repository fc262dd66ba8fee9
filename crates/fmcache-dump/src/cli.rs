use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use findmy_crypto::{CacheDecryptor, KeyGroup, KeyRing, SymmetricKey};
use serde::Serialize;

use crate::{
    discover_jobs, key_from_hex_dump, load_key_from_file, process_jobs, FileOutcome, Job, Outcome,
    ProcessOptions,
};

#[derive(Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(
    about = "Decrypt FindMy encrypted cache files (FMIP and FMF groups) into plaintext plists, JSON, or raw bytes."
)]
pub struct Args {
    /// FindMy container root holding `com.apple.findmy.fmipcore` /
    /// `com.apple.findmy.fmfcore` (or a re-rooted dump of them).
    root: Option<PathBuf>,

    /// Explicit cache files to decrypt (repeatable; requires --group).
    #[arg(long = "file")]
    files: Vec<PathBuf>,

    /// Key group for files passed via --file (`fmip` or `fmf`).
    #[arg(long)]
    group: Option<String>,

    /// FMIP key container (`FMIPDataManager.bplist`).
    #[arg(long, value_name = "PATH")]
    fmip_key_file: Option<PathBuf>,

    /// FMF key container (`FMFDataManager.bplist`).
    #[arg(long, value_name = "PATH")]
    fmf_key_file: Option<PathBuf>,

    /// Hex dump of the FMIP key container, as produced by
    /// `xxd -p FMIPDataManager.bplist | tr -d '\n'`.
    #[arg(long, value_name = "HEX", conflicts_with = "fmip_key_file")]
    fmip_key_hex: Option<String>,

    /// Hex dump of the FMF key container.
    #[arg(long, value_name = "HEX", conflicts_with = "fmf_key_file")]
    fmf_key_hex: Option<String>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Do not write `<file>.decrypted.plist` / `<file>.decrypted.bin` outputs.
    #[arg(long)]
    no_write: bool,

    /// Print the recursive rendering of decrypted plist/JSON payloads.
    #[arg(long)]
    print_values: bool,
}

#[derive(Debug, Serialize)]
struct JsonCounts {
    decrypted: usize,
    failed: usize,
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    root: Option<String>,
    key_notes: &'a [String],
    counts: JsonCounts,
    files: &'a [FileOutcome],
}

pub fn run() -> Result<()> {
    run_with_args(Args::parse())
}

pub fn run_with_args(args: Args) -> Result<()> {
    // Load whatever key material was supplied; a bad key source disables its
    // group but never aborts the run (the other group may still decrypt).
    let mut keys = KeyRing::new();
    let mut key_notes = Vec::new();

    let sources: [(KeyGroup, &Option<PathBuf>, &Option<String>); 2] = [
        (KeyGroup::Fmip, &args.fmip_key_file, &args.fmip_key_hex),
        (KeyGroup::Fmf, &args.fmf_key_file, &args.fmf_key_hex),
    ];
    for (group, file, hex_dump) in sources {
        match load_group_key(file.as_deref(), hex_dump.as_deref()) {
            Ok(Some(key)) => {
                // First install into an empty ring; conflicts are impossible.
                keys.install(group, key)
                    .with_context(|| format!("install {group} key"))?;
            }
            Ok(None) => {}
            Err(err) => key_notes.push(format!("{group} key unavailable: {err:#}")),
        }
    }

    let jobs = collect_jobs(&args)?;
    if jobs.is_empty() {
        anyhow::bail!("no cache files found (pass a FindMy root or --file)");
    }

    let decryptor = CacheDecryptor::new(keys);
    let outcomes = process_jobs(
        &decryptor,
        &jobs,
        ProcessOptions {
            write: !args.no_write,
            render: args.print_values,
        },
    );

    let decrypted = outcomes.iter().filter(|o| o.is_decrypted()).count();
    let failed = outcomes.len() - decrypted;

    match args.format {
        OutputFormat::Text => {
            println!("FindMy cache dump");
            if let Some(root) = &args.root {
                println!("  root: {}", root.display());
            }
            for group in [KeyGroup::Fmip, KeyGroup::Fmf] {
                println!(
                    "  {} key: {}",
                    group.as_str().to_lowercase(),
                    if decryptor.keys().contains(group) {
                        "installed"
                    } else {
                        "none"
                    }
                );
            }
            for note in &key_notes {
                println!("  note: {note}");
            }
            println!();

            for outcome in &outcomes {
                print_outcome_text(outcome);
            }

            println!();
            println!("Summary: decrypted={decrypted} failed={failed}");
        }
        OutputFormat::Json => {
            let report = JsonReport {
                root: args.root.as_ref().map(|p| p.display().to_string()),
                key_notes: &key_notes,
                counts: JsonCounts { decrypted, failed },
                files: &outcomes,
            };
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            serde_json::to_writer(&mut handle, &report)?;
            handle.write_all(b"\n")?;
        }
    }

    // Per-file failures are not fatal; a run that produced nothing is.
    if decrypted == 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn load_group_key(
    file: Option<&std::path::Path>,
    hex_dump: Option<&str>,
) -> Result<Option<SymmetricKey>> {
    match (file, hex_dump) {
        (Some(path), _) => load_key_from_file(path).map(Some),
        (None, Some(dump)) => key_from_hex_dump(dump).map(Some),
        (None, None) => Ok(None),
    }
}

fn collect_jobs(args: &Args) -> Result<Vec<Job>> {
    let mut jobs = Vec::new();

    if !args.files.is_empty() {
        let group_name = args
            .group
            .as_deref()
            .context("--file requires --group fmip|fmf")?;
        let group = KeyGroup::parse(group_name)
            .with_context(|| format!("unknown key group '{group_name}' (expected: fmip|fmf)"))?;
        for path in &args.files {
            jobs.push(Job {
                path: path.clone(),
                group,
            });
        }
    }

    if let Some(root) = &args.root {
        jobs.extend(discover_jobs(root));
    }

    Ok(jobs)
}

fn print_outcome_text(outcome: &FileOutcome) {
    match &outcome.status {
        Outcome::Decrypted {
            kind,
            plaintext_len,
            output,
            rendered,
        } => {
            print!(
                "  {} [{}] decrypted: {kind} ({plaintext_len} bytes)",
                outcome.path, outcome.group
            );
            match output {
                Some(out) => println!(" -> {out}"),
                None => println!(),
            }
            if let Some(rendered) = rendered {
                for line in rendered.lines() {
                    println!("    {line}");
                }
            }
        }
        Outcome::Failed { reason } => {
            println!("  {} [{}] failed: {reason}", outcome.path, outcome.group);
        }
    }
}
