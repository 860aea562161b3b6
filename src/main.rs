use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::info;

use persona_rank::embedding::{BertEmbedder, Embedder};
use persona_rank::logging::{init_logging, BATCH};
use persona_rank::{run, PipelineConfig};

#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about,
    long_about = "Rank the sections of every PDF in each collection directory against the collection's persona and task."
)]
pub struct Args {
    /// Directory containing the collection directories
    #[clap(default_value = ".")]
    pub base_dir: PathBuf,

    /// JSON pipeline configuration; missing keys take their defaults
    #[clap(short, long)]
    pub config: Option<PathBuf>,

    /// Sections kept per document
    #[clap(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Lines after a heading kept as its context
    #[clap(long)]
    pub context_lines: Option<usize>,

    /// Hugging Face model id of the sentence encoder
    #[clap(long)]
    pub model: Option<String>,

    /// Per-document ranking timeout in seconds
    #[clap(long)]
    pub embed_timeout_secs: Option<u64>,

    /// Input spec file name inside each collection
    #[clap(long)]
    pub input_file: Option<String>,

    /// Report file name written inside each collection
    #[clap(long)]
    pub output_file: Option<String>,

    /// Directory for a file log in addition to stdout
    #[clap(long)]
    pub log_dir: Option<PathBuf>,

    /// Log pipeline internals at debug level
    #[clap(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }

    fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(&expand(path))?,
            None => PipelineConfig::default(),
        };
        if let Some(top_k) = self.top_k {
            config.top_k = top_k;
        }
        if let Some(context_lines) = self.context_lines {
            config.context_lines = context_lines;
        }
        if let Some(model) = &self.model {
            config.model_id = model.clone();
        }
        if let Some(secs) = self.embed_timeout_secs {
            config.embed_timeout_secs = secs;
        }
        if let Some(name) = &self.input_file {
            config.input_file_name = name.clone();
        }
        if let Some(name) = &self.output_file {
            config.output_file_name = name.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse_args();

    // Keep the guards alive until the end of main so buffered logs flush
    let _guards = init_logging(args.verbose, args.log_dir.as_deref().map(expand))
        .context("failed to initialise logging")?;

    let config = args.pipeline_config()?;
    let base_dir = expand(&args.base_dir);
    if !base_dir.is_dir() {
        bail!("{} is not a directory", base_dir.display());
    }

    let model_id = config.model_id.clone();
    let max_seq_len = config.max_seq_len;
    let summary = run(&base_dir, &config, move || {
        BertEmbedder::from_pretrained(&model_id, max_seq_len)
            .map(|embedder| Arc::new(embedder) as Arc<dyn Embedder>)
    })
    .await?;
    info!(
        target: BATCH,
        processed = summary.processed.len(),
        skipped = summary.skipped.len(),
        failed = summary.failed.len(),
        "Batch finished"
    );

    Ok(())
}
