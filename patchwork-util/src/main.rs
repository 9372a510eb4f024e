mod cli;

use clap::Parser;
use cli::{CipherArgs, Cli, Command};
use patchwork_image::{ImageBuffer, PrgHeader, ScrambleRange, Transform, decrypt, encrypt};
use patchwork_util::{
    Catalogue, ConsoleProgress, DirectorySource, JobRunner, PayloadSource, Platform,
    SilentProgress,
};
use snafu::{ResultExt, Snafu};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Top-level application errors for patchwork-util.
#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to load catalogue '{}'", path.display()))]
    LoadCatalogue {
        path: PathBuf,
        source: patchwork_util::CatalogueError,
    },

    #[snafu(display("failed to resolve catalogue"))]
    ResolveCatalogue {
        source: patchwork_util::CatalogueError,
    },

    #[snafu(display("failed to patch images"))]
    RunJobs { source: patchwork_util::JobError },

    #[snafu(display("failed to read input for job '{job}'"))]
    ReadInput {
        job: String,
        source: patchwork_util::PayloadError,
    },

    #[snafu(display("failed to read '{}'", path.display()))]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to write '{}'", path.display()))]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("invalid PRG header in '{}'", path.display()))]
    ParsePrg {
        path: PathBuf,
        source: patchwork_image::prg::ReadError,
    },

    #[snafu(display("cannot apply scramble range"))]
    Cipher {
        source: patchwork_image::CipherError,
    },
}

type Result<T, E = Error> = std::result::Result<T, E>;

#[snafu::report]
fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Apply {
            catalogue,
            source,
            output,
            platform,
            force,
            quiet,
            no_debug,
        } => cmd_apply(
            &catalogue,
            source,
            output,
            platform,
            force,
            quiet,
            no_debug,
        ),
        Command::Check {
            catalogue,
            source,
            platform,
        } => cmd_check(&catalogue, source, platform),
        Command::Decrypt(args) => cmd_cipher(args, Transform::Decrypt),
        Command::Encrypt(args) => cmd_cipher(args, Transform::Encrypt),
        Command::Info { path } => cmd_info(&path),
    }
}

/// Returns the directory a catalogue lives in.
fn catalogue_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .to_path_buf()
}

fn cmd_apply(
    path: &Path,
    source: Option<PathBuf>,
    output: Option<PathBuf>,
    platform: Option<Platform>,
    force: bool,
    quiet: bool,
    no_debug: bool,
) -> Result<()> {
    let catalogue = Catalogue::load(path).context(LoadCatalogueSnafu { path })?;
    let source_dir = source.unwrap_or_else(|| catalogue_dir(path));
    let output_dir = output.unwrap_or_else(|| source_dir.clone());

    // Every payload is fetched before any image is touched.
    let payloads = DirectorySource::new(&source_dir);
    let jobs = catalogue
        .resolve(platform, &payloads)
        .context(ResolveCatalogueSnafu)?;

    if !quiet {
        println!("{}", catalogue.title);

        if let Some(platform) = platform {
            println!("Platform: {}", platform);
        }
    }

    let start = std::time::Instant::now();

    if quiet {
        let runner = JobRunner::new(SilentProgress, force).debug_artifacts(!no_debug);
        runner
            .run_all(&jobs, &source_dir, &output_dir)
            .context(RunJobsSnafu)?;
    } else {
        let runner = JobRunner::new(ConsoleProgress::new(), force).debug_artifacts(!no_debug);
        runner
            .run_all(&jobs, &source_dir, &output_dir)
            .context(RunJobsSnafu)?;
    }

    let elapsed = start.elapsed();

    if !quiet {
        println!("Done in {:.2}s.", elapsed.as_secs_f64());
    }

    Ok(())
}

fn cmd_check(path: &Path, source: Option<PathBuf>, platform: Option<Platform>) -> Result<()> {
    let catalogue = Catalogue::load(path).context(LoadCatalogueSnafu { path })?;
    let source_dir = source.unwrap_or_else(|| catalogue_dir(path));
    let payloads = DirectorySource::new(&source_dir);
    let jobs = catalogue
        .resolve(platform, &payloads)
        .context(ResolveCatalogueSnafu)?;

    let runner = JobRunner::new(SilentProgress, false).debug_artifacts(false);

    println!("Catalogue: {}", catalogue.title);
    println!("{:<12}  {:>7}  {:>8}  {:>8}", "Job", "Patches", "In", "Out");
    println!("{:-<12}  {:-<7}  {:-<8}  {:-<8}", "", "", "", "");

    for job in &jobs {
        let input_name = job.input.to_string_lossy();
        let bytes = payloads
            .fetch(&input_name)
            .context(ReadInputSnafu { job: &job.name })?;
        let input_len = bytes.len();

        let artifacts = runner
            .run_in_memory(job, bytes)
            .context(RunJobsSnafu)?;
        let output_len = artifacts.last().map_or(0, |a| a.bytes.len());

        println!(
            "{:<12}  {:>7}  {:>8}  {:>8}",
            job.name,
            job.patches.len(),
            input_len,
            output_len
        );
    }

    println!("Catalogue is consistent with its inputs.");

    Ok(())
}

fn cmd_cipher(args: CipherArgs, transform: Transform) -> Result<()> {
    let path = args.path;
    let bytes = std::fs::read(&path).context(ReadFileSnafu { path: &path })?;

    let mut image = if args.prg {
        ImageBuffer::from_prg(bytes).context(ParsePrgSnafu { path: &path })?
    } else {
        ImageBuffer::new(bytes, args.base_offset.unwrap_or(0))
    };

    let range = ScrambleRange::new(args.from, args.to, args.seed).context(CipherSnafu)?;

    let suffix = match transform {
        Transform::Decrypt => {
            decrypt(&mut image, &range).context(CipherSnafu)?;
            "decrypted"
        }
        Transform::Encrypt => {
            encrypt(&mut image, &range).context(CipherSnafu)?;
            "encrypted"
        }
    };

    let output = args.output.unwrap_or_else(|| {
        let mut name = path.as_os_str().to_owned();
        name.push(".");
        name.push(suffix);
        PathBuf::from(name)
    });

    let mut opts = OpenOptions::new();
    opts.write(true);

    if args.force {
        opts.create(true).truncate(true);
    } else {
        opts.create_new(true);
    }

    let mut file = opts.open(&output).context(WriteFileSnafu { path: &output })?;
    file.write_all(image.as_bytes())
        .context(WriteFileSnafu { path: &output })?;

    println!(
        "{} 0x{:04X}-0x{:04X} of {} (seed 0x{:02X}) to {}",
        suffix,
        range.from(),
        range.to(),
        path.display(),
        range.seed(),
        output.display()
    );

    Ok(())
}

fn cmd_info(path: &Path) -> Result<()> {
    let bytes = std::fs::read(path).context(ReadFileSnafu { path })?;

    println!("Image: {}", path.display());
    println!();
    println!("Size:           {} bytes", bytes.len());
    println!("SHA-256:        {}", patchwork_util::sha256_hex(&bytes));

    match PrgHeader::read(&bytes) {
        Ok(header) => {
            let end = header.base_offset() as usize + bytes.len().max(1) - 1;
            println!("Load Address:   0x{:04X}", header.load_address());
            println!("Base Offset:    0x{:04X}", header.base_offset());
            println!("End Address:    0x{:04X}", end);
        }
        Err(e) => println!("Load Address:   none ({})", e),
    }

    Ok(())
}
