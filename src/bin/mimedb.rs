use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mimedb::MimeDb;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mimedb")]
#[command(about = "Resolve MIME types from the shared MIME database", long_about = None)]
#[command(version)]
struct Cli {
    /// Data directory to search instead of the XDG path (repeatable,
    /// highest precedence first; <DIR>/mime/ is consulted)
    #[arg(short, long, global = true, value_name = "DIR")]
    dir: Vec<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the MIME type of a file (globs fused with content sniffing)
    Query {
        /// File to classify
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Resolve MIME types from a bare file name, no file access
    Filename {
        /// File name to match against the glob tables
        #[arg(value_name = "NAME")]
        name: String,

        /// Maximum number of ranked candidates to print
        #[arg(short, long, default_value_t = 1)]
        count: usize,
    },

    /// Sniff a MIME type from file contents only, ignoring the name
    Data {
        /// File whose bytes are sniffed
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Print the parent types of a MIME type
    Parents {
        /// MIME type to look up
        #[arg(value_name = "MIME")]
        mime: String,
    },

    /// Print the icon name registered for a MIME type
    Icon {
        /// MIME type to look up
        #[arg(value_name = "MIME")]
        mime: String,

        /// Print the generic (category) icon instead
        #[arg(short, long)]
        generic: bool,
    },

    /// Dump every loaded table
    Dump,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut db = if cli.dir.is_empty() {
        MimeDb::new()
    } else {
        MimeDb::new_with_dirs(cli.dir)
    };

    match cli.command {
        Commands::Query { file } => {
            let mime = db
                .mime_type_for_file(&file, None)
                .with_context(|| format!("file name is not valid UTF-8: {}", file.display()))?;
            println!("{mime}");
        }
        Commands::Filename { name, count } => {
            let mimes = db.mime_types_from_file_name(&name, count.max(1));
            if mimes.is_empty() {
                println!("{}", mimedb::UNKNOWN_TYPE);
            } else {
                for mime in mimes {
                    println!("{mime}");
                }
            }
        }
        Commands::Data { file } => {
            let data = std::fs::read(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let (mime, priority) = db.mime_type_for_data(&data);
            println!("{mime} (priority {priority})");
        }
        Commands::Parents { mime } => {
            for parent in db.parents(&mime) {
                println!("{parent}");
            }
        }
        Commands::Icon { mime, generic } => {
            let icon = if generic {
                db.generic_icon(&mime)
            } else {
                db.icon(&mime)
            };
            match icon {
                Some(icon) => println!("{icon}"),
                None => anyhow::bail!("no icon registered for {mime}"),
            }
        }
        Commands::Dump => {
            db.dump();
        }
    }

    Ok(())
}
