use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// "0.1.0" for releases, "0.1.0@abc1234 2024-01-15 14:30" for dev builds.
fn get_version() -> &'static str {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    const GIT_HASH: &str = env!("GIT_HASH");
    const GIT_COMMIT_DATE: &str = env!("GIT_COMMIT_DATE");
    const IS_RELEASE: &str = env!("IS_RELEASE");

    use std::sync::OnceLock;
    static VERSION_STRING: OnceLock<String> = OnceLock::new();

    VERSION_STRING.get_or_init(|| {
        if IS_RELEASE == "true" || GIT_HASH.is_empty() {
            VERSION.to_string()
        } else {
            format!("{}@{} {}", VERSION, GIT_HASH, GIT_COMMIT_DATE)
        }
    })
}

#[derive(Parser, Debug)]
#[command(name = "damfal", bin_name = "damfal", version = get_version())]
#[command(about = "Browse a DAM library through its read-only storage driver", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding the exported library (library.json)
    #[arg(short, long, global = true, default_value = ".")]
    pub library: PathBuf,

    /// Directory holding storage.json (defaults to the user config dir)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List sub-folders and files of a folder
    Ls {
        /// Folder identifier (defaults to the storage root)
        folder: Option<String>,

        /// Items to skip
        #[arg(long, default_value_t = 0)]
        start: usize,

        /// Items to show (0 for a full page)
        #[arg(short = 'n', long, default_value_t = 0)]
        limit: usize,

        /// Sort key for files: name, fileext, size or anything else for time
        #[arg(short, long, default_value = "name")]
        sort: String,

        /// Reverse sort order
        #[arg(short, long)]
        reverse: bool,

        /// Include folders below sub-folders
        #[arg(short = 'R', long)]
        recursive: bool,
    },

    /// Show the folder hierarchy
    Tree {
        /// Folder identifier (defaults to the storage root)
        folder: Option<String>,
    },

    /// Show metadata of a file or folder
    Stat {
        identifier: String,

        /// Only these fields (comma separated)
        #[arg(short, long, value_delimiter = ',')]
        fields: Vec<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print the public URL of a file
    Url { identifier: String },

    /// Copy the original bytes of a file
    Fetch {
        identifier: String,

        /// Output file (defaults to the asset name in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Search approved images and documents by keyword
    Search {
        keyword: String,

        #[arg(long, default_value_t = 0)]
        start: usize,

        #[arg(short = 'n', long, default_value_t = 30)]
        limit: usize,
    },

    /// Show the storage configuration and driver state
    Info,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ls_defaults() {
        let cli = Cli::try_parse_from(["damfal", "ls"]).unwrap();
        assert_eq!(cli.library, PathBuf::from("."));
        assert_eq!(cli.verbose, 0);
        match cli.command {
            Commands::Ls {
                folder,
                start,
                limit,
                sort,
                reverse,
                recursive,
            } => {
                assert!(folder.is_none());
                assert_eq!((start, limit), (0, 0));
                assert_eq!(sort, "name");
                assert!(!reverse && !recursive);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_stat_fields() {
        let cli = Cli::try_parse_from([
            "damfal", "-vv", "--library", "/tmp/lib", "stat", "image#a", "-f", "name,size",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.library, PathBuf::from("/tmp/lib"));
        match cli.command {
            Commands::Stat { identifier, fields, json } => {
                assert_eq!(identifier, "image#a");
                assert_eq!(fields, vec!["name", "size"]);
                assert!(!json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_command_is_required() {
        assert!(Cli::try_parse_from(["damfal"]).is_err());
    }
}
