use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::AppConfig;

#[derive(Parser, Debug)]
#[command(version, about = "Turn summary text into a narrated GIF video")]
pub struct Args {
    #[command(flatten)]
    pub overrides: ConfigOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP API
    Serve {
        #[clap(long)]
        host: Option<String>,

        #[clap(long)]
        port: Option<u16>,
    },
    /// Render one video from text and print its path
    Render {
        #[clap(long, conflicts_with = "text_file", required_unless_present = "text_file")]
        text: Option<String>,

        #[clap(long)]
        text_file: Option<PathBuf>,
    },
    /// Summarize a PDF into narration text
    Summarize {
        #[clap(long)]
        pdf: PathBuf,

        /// Also render the summary to video
        #[clap(long, default_value_t = false)]
        render: bool,
    },
}

/// Flags that take precedence over the environment.
#[derive(ClapArgs, Debug, Default)]
pub struct ConfigOverrides {
    #[clap(long, global = true)]
    pub output_dir: Option<PathBuf>,

    #[clap(long, global = true)]
    pub piper_model: Option<PathBuf>,

    #[clap(long, global = true)]
    pub giphy_api_key: Option<String>,

    #[clap(long, global = true)]
    pub openai_api_key: Option<String>,
}

impl ConfigOverrides {
    pub fn apply(&self, mut config: AppConfig) -> AppConfig {
        if let Some(dir) = &self.output_dir {
            config = config.with_output_dir(dir);
        }
        if let Some(model) = &self.piper_model {
            config.piper_model = model.clone();
        }
        if let Some(key) = &self.giphy_api_key {
            config.giphy_api_key = Some(key.clone());
        }
        if let Some(key) = &self.openai_api_key {
            config.openai_api_key = Some(key.clone());
        }
        config
    }
}
