use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP API
    Serve {
        /// Listen address, overrides `server.listen`
        #[clap(short, long)]
        listen: Option<String>,
    },

    /// Index every user of a seed file
    SeedUsers {
        /// Path to a `{"users": [...]}` file, defaults to `seed.users_file`
        #[clap(short, long)]
        file: Option<PathBuf>,
    },

    /// Index a single user profile from a json file
    IndexUser {
        /// Path to the user json
        file: PathBuf,
    },

    /// Index an image from a local path or an http(s) url
    IndexImage {
        /// Image path or url
        path: String,

        /// Image id, defaults to the file name
        #[clap(long)]
        id: Option<String>,

        /// Comma separated labels
        #[clap(short, long)]
        labels: Option<String>,
    },

    /// Index a product from its image, or from its text when no image is given
    IndexProduct {
        #[clap(long)]
        id: String,

        /// Product name
        #[clap(short, long)]
        name: String,

        #[clap(short, long, default_value = "")]
        category: String,

        /// Selling price
        #[clap(short, long, default_value = "")]
        price: String,

        /// Path to the product image
        #[clap(long)]
        image: Option<PathBuf>,

        #[clap(short, long)]
        description: Option<String>,
    },

    /// Find users matching a natural-language query
    Match {
        query: String,

        #[clap(short, long)]
        limit: Option<usize>,

        #[clap(long)]
        page_token: Option<String>,
    },

    /// Find images similar to an indexed one
    Similar {
        /// Reference image id
        id: String,

        #[clap(short, long)]
        limit: Option<usize>,

        #[clap(long)]
        page_token: Option<String>,
    },

    /// Search products by text or by image
    Search {
        #[clap(short, long, conflicts_with = "image", required_unless_present = "image")]
        text: Option<String>,

        /// Path to a query image
        #[clap(short, long)]
        image: Option<PathBuf>,

        #[clap(short, long)]
        limit: Option<usize>,

        #[clap(long)]
        page_token: Option<String>,
    },

    /// Show collection status
    Collections {},
}

pub fn parse_labels(labels: &str) -> Vec<String> {
    let mut parsed: Vec<String> = labels
        .split(',')
        .map(|label| label.trim().to_lowercase())
        .filter(|label| !label.is_empty())
        .collect();
    parsed.dedup();
    parsed
}

/// Image id used when none is given: the last path or url segment.
pub fn default_image_id(path: &str) -> String {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_labels() {
        assert_eq!(
            parse_labels("Landscape, sunset,,  Oil Painting "),
            vec!["landscape", "sunset", "oil painting"]
        );
        assert!(parse_labels(" , ").is_empty());
    }

    #[test]
    fn test_default_image_id() {
        assert_eq!(default_image_id("/tmp/art/castle.png"), "castle.png");
        assert_eq!(
            default_image_id("https://cdn.example.com/images/abc123.webp"),
            "abc123.webp"
        );
        assert_eq!(default_image_id("plain.jpg"), "plain.jpg");
    }

    #[test]
    fn test_search_requires_one_input() {
        assert!(Args::try_parse_from(["affinity", "search"]).is_err());
        assert!(Args::try_parse_from(["affinity", "search", "--text", "a", "--image", "b.png"]).is_err());
        assert!(Args::try_parse_from(["affinity", "search", "--text", "red shoes"]).is_ok());
    }
}
