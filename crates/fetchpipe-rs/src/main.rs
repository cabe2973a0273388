//! Run a single browse, search, or resolve call against a spec document on
//! disk and print the resulting media as JSON.
//!
//! # Examples
//!
//! ```sh
//! # Browse the root of a source
//! fetchpipe --spec ./sources/example.xml browse
//!
//! # Search with paging
//! fetchpipe --spec ./sources/example.xml search --text "rust" --skip 0 --count 20
//!
//! # Resolve extra keys on a media, passing its prior private-keys blob back in
//! fetchpipe --spec ./sources/example.xml resolve --id abc123 --key description \
//!   --private '{"token":"abc"}'
//! ```

use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use fetchpipe::{DefaultKeyRegistry, Media, NullScriptEngine, ReqwestTransport, RetryConfig, Source};

/// Run browse/search/resolve against a declarative fetch-pipeline spec.
#[derive(Parser)]
#[command(name = "fetchpipe")]
struct Cli {
    /// Path to the spec's XML document.
    #[arg(long)]
    spec: String,

    /// Host-supplied minimum accepted `api` version.
    #[arg(long, default_value_t = 1)]
    api_min: i64,

    /// Host-supplied maximum accepted `api` version.
    #[arg(long, default_value_t = 100)]
    api_max: i64,

    /// Metadata keys to populate on every returned media (repeatable).
    #[arg(long = "key")]
    keys: Vec<String>,

    /// Override a `<config>` default as `name=value` (repeatable).
    #[arg(long = "set")]
    config_overrides: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List children of the source root.
    Browse {
        /// Number of leading results to skip.
        #[arg(long, default_value_t = 0)]
        skip: i64,
        /// Number of results to return.
        #[arg(long, default_value_t = 20)]
        count: i64,
    },
    /// Free-text search.
    Search {
        /// Search query text.
        #[arg(long)]
        text: String,
        /// Number of leading results to skip.
        #[arg(long, default_value_t = 0)]
        skip: i64,
        /// Number of results to return.
        #[arg(long, default_value_t = 20)]
        count: i64,
    },
    /// Resolve additional keys on an existing media.
    Resolve {
        /// The media's `id` key.
        #[arg(long)]
        id: String,
        /// Private-keys JSON blob previously persisted for this media.
        #[arg(long)]
        private: Option<String>,
    },
}

async fn run(cli: &Cli) -> Result<String, String> {
    let xml = std::fs::read_to_string(&cli.spec).map_err(|e| format!("failed to read spec '{}': {e}", cli.spec))?;
    let mut spec = fetchpipe::spec::load(&xml, cli.api_min, cli.api_max).map_err(|e| e.to_string())?;

    for pair in &cli.config_overrides {
        let Some((name, value)) = pair.split_once('=') else {
            return Err(format!("invalid --set '{pair}', expected name=value"));
        };
        spec.config.set_default(name, value);
    }

    let transport = Arc::new(ReqwestTransport::new(RetryConfig::default()));
    let source = Source::new(spec, transport, Arc::new(NullScriptEngine), Arc::new(DefaultKeyRegistry));

    let media = match &cli.command {
        Command::Browse { skip, count } => source
            .browse(None, &cli.keys, *skip, *count, "cli-call")
            .await
            .map_err(|e| e.to_string())?,
        Command::Search { text, skip, count } => source
            .search(text, &cli.keys, *skip, *count, "cli-call")
            .await
            .map_err(|e| e.to_string())?,
        Command::Resolve { id, private } => {
            let mut media = Media::new(fetchpipe::media::MediaType::Media);
            media.keys.insert("id".to_string(), fetchpipe::media::MetadataValue::Str(id.clone()));
            if let Some(private) = private {
                media.private = fetchpipe::source::private_keys_from_json(private).map_err(|e| e.to_string())?;
            }
            let resolved = source
                .resolve(media, &cli.keys, "cli-call")
                .await
                .map_err(|e| e.to_string())?;
            vec![resolved]
        }
    };

    serde_json::to_string_pretty(&media_summaries(&media)).map_err(|e| e.to_string())
}

fn media_summaries(media: &[Media]) -> Vec<serde_json::Value> {
    media
        .iter()
        .map(|m| {
            let keys: serde_json::Map<String, serde_json::Value> = m
                .keys
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.to_expand_string())))
                .collect();
            serde_json::Value::Object(keys)
        })
        .collect()
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match run(&cli).await {
        Ok(output) => println!("{output}"),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
