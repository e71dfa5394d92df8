use clap::{Parser, Subcommand};

use crate::retrieval::GenderFilter;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate api docs in markdown format
    #[cfg(feature = "markdown-docs")]
    #[clap(hide = true)]
    MarkdownDocs {},

    /// Start style-guru as a service.
    Daemon {
        /// Address to listen on
        #[clap(long, default_value = "0.0.0.0:8080")]
        addr: String,
    },

    /// Find products for an outfit mood
    Search {
        /// What's your outfit-mood for the day?
        #[clap(allow_hyphen_values = true)]
        text: String,

        /// Number of options to return (1-10, config default otherwise)
        #[clap(short, long)]
        k: Option<usize>,

        /// Filter by gender: all, men or women
        #[clap(short, long, default_value = "all")]
        gender: GenderFilter,

        /// Include distance and score in the output
        #[clap(short, long, default_value = "false")]
        scores: bool,
    },

    /// Show model, index and catalog status
    Info {},
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_search() {
        let args = Args::try_parse_from([
            "style-guru",
            "search",
            "beach wedding in june",
            "-k",
            "5",
            "--gender",
            "women",
        ])
        .unwrap();

        match args.command {
            Command::Search {
                text,
                k,
                gender,
                scores,
            } => {
                assert_eq!(text, "beach wedding in june");
                assert_eq!(k, Some(5));
                assert_eq!(gender, GenderFilter::Women);
                assert!(!scores);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn search_defaults() {
        let args = Args::try_parse_from(["style-guru", "search", ""]).unwrap();
        match args.command {
            Command::Search { text, k, gender, .. } => {
                assert_eq!(text, "");
                assert_eq!(k, None);
                assert_eq!(gender, GenderFilter::All);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_gender() {
        let result = Args::try_parse_from(["style-guru", "search", "hoodie", "-g", "kids"]);
        assert!(result.is_err());
    }
}
