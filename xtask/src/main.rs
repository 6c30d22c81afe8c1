// Licensed under the Apache-2.0 license

use clap::{Parser, Subcommand};
use clap_num::maybe_hex;
use log::LevelFilter;
use simple_logger::SimpleLogger;

mod app_image;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Xtask {
    /// Print bootloader debug logs
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    xtask: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Commands related to application images
    AppImage {
        #[command(subcommand)]
        subcommand: AppImageCommands,
    },
}

#[derive(Subcommand)]
enum AppImageCommands {
    /// Fill in the size and checksum of the application descriptor
    Stamp {
        /// Path to the linked application binary
        input: String,

        /// Path of the stamped image
        #[arg(short, long, value_name = "OUTPUT", required = true)]
        output: String,

        /// Major version to record in the descriptor
        #[arg(long)]
        major: Option<u8>,

        /// Minor version to record in the descriptor
        #[arg(long)]
        minor: Option<u8>,

        /// VCS commit id to record in the descriptor
        #[arg(long, value_parser=maybe_hex::<u32>)]
        vcs_commit: Option<u32>,
    },
    /// Check an image the way the bootloader does and print its descriptor
    Verify {
        /// Path to the image
        file: String,
    },
}

fn main() {
    let cli = Xtask::parse();
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let _ = SimpleLogger::new().with_level(level).init();

    let result = match &cli.xtask {
        Commands::AppImage { subcommand } => match subcommand {
            AppImageCommands::Stamp {
                input,
                output,
                major,
                minor,
                vcs_commit,
            } => app_image::app_image_stamp(
                input,
                output,
                app_image::VersionOverride {
                    major: *major,
                    minor: *minor,
                    vcs_commit: *vcs_commit,
                },
            ),
            AppImageCommands::Verify { file } => app_image::app_image_verify(file),
        },
    };
    result.unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });
}
