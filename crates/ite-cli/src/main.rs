use clap::{Args as ClapArgs, Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ite_core::model::Session;

#[derive(Parser, Debug)]
#[command(
    name = "ite-cli",
    about = "Extract, translate and merge Impressions text tables (.eng)",
    version
)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Show header, index and cell statistics for a file
    Info(FileArgs),
    /// Dump the decoded cells (use --json for the full model)
    Dump(DumpArgs),
    /// Append missing cells to a translation ledger (additive, never
    /// rewrites existing blocks)
    Export(ExportArgs),
    /// Validate a translated batch against the ledger and, with --apply,
    /// write it into the binary (a timestamped backup is taken first)
    Merge(MergeArgs),
    /// Print the next untranslated ledger blocks, a batch to hand to a
    /// translator
    Pending(PendingArgs),
}

#[derive(ClapArgs, Debug)]
struct FileArgs {
    /// Binary text table (.eng)
    path: PathBuf,
    /// Dialect (emperor, zeus, poseidon); sniffed from the signature when
    /// omitted
    #[arg(long)]
    format: Option<String>,
}

#[derive(ClapArgs, Debug)]
struct DumpArgs {
    #[command(flatten)]
    file: FileArgs,
    /// Emit the full model as JSON instead of a cell listing
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(ClapArgs, Debug)]
struct ExportArgs {
    #[command(flatten)]
    file: FileArgs,
    /// Ledger file to create or append to
    #[arg(long)]
    ledger: PathBuf,
}

#[derive(ClapArgs, Debug)]
struct MergeArgs {
    #[command(flatten)]
    file: FileArgs,
    /// Authoritative ledger file
    #[arg(long)]
    ledger: PathBuf,
    /// Translated batch to merge (a pasted subset of ledger blocks)
    #[arg(long)]
    input: PathBuf,
    /// Apply accepted cells to the ledger and the binary; without this the
    /// merge is a dry run that only reports
    #[arg(long, default_value_t = false)]
    apply: bool,
}

#[derive(ClapArgs, Debug)]
struct PendingArgs {
    /// Ledger file to scan
    ledger: PathBuf,
    /// Maximum number of blocks to print (0 = all)
    #[arg(long, default_value_t = 50)]
    limit: usize,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    match Cli::parse().cmd {
        Cmd::Info(a) => cmd_info(a),
        Cmd::Dump(a) => cmd_dump(a),
        Cmd::Export(a) => cmd_export(a),
        Cmd::Merge(a) => cmd_merge(a),
        Cmd::Pending(a) => cmd_pending(a),
    }
}

fn open_session(args: &FileArgs) -> Session {
    let result = match &args.format {
        Some(name) => match ite_core::format::by_name(name) {
            Some(desc) => Session::open_as(&args.path, desc),
            None => {
                eprintln!("error: unknown format '{name}' (emperor, zeus, poseidon)");
                std::process::exit(2);
            }
        },
        None => Session::open(&args.path),
    };
    result.unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(2);
    })
}

fn cmd_info(args: FileArgs) {
    let session = open_session(&args);
    let file = &session.file;
    println!("file:      {}", args.path.display());
    println!("format:    {}", file.format.name);
    println!("signature: {}", file.header.signature_text());
    println!("size:      {} bytes", session.original.len());
    println!(
        "header:    {}",
        file.header
            .fields
            .iter()
            .map(|v| format!("0x{v:08X}"))
            .collect::<Vec<_>>()
            .join(" ")
    );
    println!("entries:   {}", file.entries.len());
    println!("cells:     {} ({} declared)", file.cells.len(), file.header.declared_cells());

    // cells-per-entry distribution, most frequent first
    let mut distribution: BTreeMap<usize, usize> = BTreeMap::new();
    for entry in &file.entries {
        let owned = match entry {
            ite_core::IndexEntry::Row { slots, .. } => {
                slots.iter().filter(|s| s.cell.is_some()).count()
            }
            ite_core::IndexEntry::Pair { count, .. } => *count as usize,
        };
        if owned > 0 {
            *distribution.entry(owned).or_default() += 1;
        }
    }
    let mut by_freq: Vec<(usize, usize)> = distribution.into_iter().collect();
    by_freq.sort_by(|a, b| b.1.cmp(&a.1));
    println!("distribution (cells per entry):");
    for (owned, freq) in by_freq.iter().take(15) {
        println!("  {owned:4} cells: {freq} entries");
    }

    if !session.warnings.is_empty() {
        println!("warnings:");
        for w in &session.warnings {
            println!("  {w}");
        }
    }
}

fn cmd_dump(args: DumpArgs) {
    let session = open_session(&args.file);
    if args.json {
        let v = ite_core::json::model_to_json(&session.file, &session.warnings);
        println!("{}", serde_json::to_string_pretty(&v).unwrap());
        return;
    }
    for cell in &session.file.cells {
        println!(
            "[{}] 0x{:08X} {}",
            cell.id,
            session.file.file_offset(cell),
            cell.text
        );
    }
}

fn cmd_export(args: ExportArgs) {
    let session = open_session(&args.file);
    match ite_core::export_to_path(&session.file, &args.ledger) {
        Ok(0) => println!("ledger already holds all {} cells", session.file.cells.len()),
        Ok(n) => println!("appended {n} cells to {}", args.ledger.display()),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(3);
        }
    }
}

fn cmd_merge(args: MergeArgs) {
    let mut session = open_session(&args.file);
    let ledger = read_text(&args.ledger);
    let input = read_text(&args.input);

    let outcome = ite_core::reconcile(&session.file, &ledger, &input);
    println!(
        "accepted {}, rejected {}, skipped {}",
        outcome.accepted.len(),
        outcome.rejected.len(),
        outcome.skipped
    );
    for r in &outcome.rejected {
        match r.offset {
            Some(off) => eprintln!("rejected cell {} (0x{off:08X}): {}", r.cell_id, r.reason),
            None => eprintln!("rejected cell {}: {}", r.cell_id, r.reason),
        }
    }

    if !args.apply {
        println!("dry run; pass --apply to write the ledger and the binary");
        return;
    }
    if outcome.accepted.is_empty() {
        println!("nothing to apply");
        return;
    }

    if let Err(e) = std::fs::write(&args.ledger, &outcome.ledger) {
        eprintln!("error writing ledger: {e}");
        std::process::exit(3);
    }
    if let Err(e) = outcome.apply(&mut session.file) {
        eprintln!("error: {e}");
        std::process::exit(4);
    }
    match session.save() {
        Ok(report) => {
            println!(
                "applied {} cells; wrote {} bytes (backup at {})",
                outcome.accepted.len(),
                report.bytes_written,
                report.backup.display()
            );
            for id in &report.encode.lossy_cells {
                eprintln!("warning: cell {id} written with lossy ? substitutes");
            }
        }
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(4);
        }
    }
}

fn cmd_pending(args: PendingArgs) {
    let ledger = read_text(&args.ledger);
    let blocks = ite_core::ledger::untranslated_blocks(&ledger, args.limit);
    for b in &blocks {
        println!("{}\n", b.raw);
    }
    eprintln!("{} untranslated block(s)", blocks.len());
}

fn read_text(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("error reading {}: {e}", path.display());
        std::process::exit(2);
    })
}
