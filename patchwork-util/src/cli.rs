use clap::{Args, Parser, Subcommand};
use patchwork_util::Platform;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "patchwork-util")]
#[command(about = "Binary image patch utility", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Apply a patch catalogue
    Apply {
        /// Path to the catalogue
        #[arg(value_name = "CATALOGUE")]
        catalogue: PathBuf,

        /// Directory holding input images and payloads (defaults to the catalogue's directory)
        #[arg(short, long, value_name = "DIR")]
        source: Option<PathBuf>,

        /// Output directory (defaults to the source directory)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Release variant for platform-specific patches
        #[arg(short, long, value_enum)]
        platform: Option<Platform>,

        /// Overwrite existing files
        #[arg(short, long)]
        force: bool,

        /// Suppress progress output
        #[arg(short, long)]
        quiet: bool,

        /// Only write final images
        #[arg(long)]
        no_debug: bool,
    },

    /// Validate a catalogue and dry-run it without writing anything
    Check {
        /// Path to the catalogue
        #[arg(value_name = "CATALOGUE")]
        catalogue: PathBuf,

        /// Directory holding input images and payloads (defaults to the catalogue's directory)
        #[arg(short, long, value_name = "DIR")]
        source: Option<PathBuf>,

        /// Release variant for platform-specific patches
        #[arg(short, long, value_enum)]
        platform: Option<Platform>,
    },

    /// Unscramble a range of an image
    Decrypt(CipherArgs),

    /// Scramble a range of an image
    Encrypt(CipherArgs),

    /// Display information about an image file
    Info {
        /// Path to the image
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },
}

#[derive(Debug, Args)]
pub struct CipherArgs {
    /// Path to the image
    #[arg(value_name = "FILE")]
    pub path: PathBuf,

    /// First scrambled address
    #[arg(long, value_parser = parse_address)]
    pub from: u32,

    /// Last scrambled address (inclusive)
    #[arg(long, value_parser = parse_address)]
    pub to: u32,

    /// Initial running key
    #[arg(long, value_parser = parse_byte)]
    pub seed: u8,

    /// Address of the first byte of the file
    #[arg(long, value_parser = parse_address, conflicts_with = "prg")]
    pub base_offset: Option<u32>,

    /// Take the base from the PRG load-address header
    #[arg(long)]
    pub prg: bool,

    /// Output file (defaults to FILE with a .decrypted or .encrypted suffix)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Overwrite an existing output file
    #[arg(short, long)]
    pub force: bool,
}

fn parse_address(text: &str) -> Result<u32, String> {
    patchwork_util::catalogue::parse_literal(text)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| format!("'{text}' is not a valid address"))
}

fn parse_byte(text: &str) -> Result<u8, String> {
    patchwork_util::catalogue::parse_literal(text)
        .and_then(|v| u8::try_from(v).ok())
        .ok_or_else(|| format!("'{text}' is not a valid byte"))
}
