use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use treepack::{back_up, info, restore};

#[derive(Parser)]
#[command(name = "treepack", version, about = "POSIX directory-tree backup container CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pack a directory tree into an archive
    Pack {
        /// Directory to back up
        source: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Compression method: NONE (default), LZ77, HUFFMAN
        #[arg(short, long, default_value = "NONE")]
        codec: String,
        /// Encryption method: NONE (default), AES_256_CBC
        #[arg(short, long, default_value = "NONE")]
        encrypt: String,
        #[arg(short, long, default_value = "")]
        password: String,
        /// Path relative to SOURCE to leave out; repeatable
        #[arg(long)]
        exclude: Vec<String>,
    },
    /// Print archive metadata and the member list
    Info {
        archive: PathBuf,
    },
    /// Restore an archive into a directory
    Restore {
        archive: PathBuf,
        #[arg(short = 'C', long, default_value = ".")]
        output_dir: PathBuf,
        #[arg(short, long, default_value = "")]
        password: String,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let status = match Cli::parse().command {
        Commands::Pack {
            source,
            output,
            codec,
            encrypt,
            password,
            exclude,
        } => back_up(
            &source,
            &output,
            &codec,
            &encrypt,
            &password,
            &exclude.join("\n"),
        ),
        Commands::Info { archive } => {
            let report = info(&archive);
            print!("{report}");
            return ExitCode::SUCCESS;
        }
        Commands::Restore {
            archive,
            output_dir,
            password,
        } => restore(&archive, &output_dir, &password),
    };

    println!("{status}");
    if status == "OK" {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
