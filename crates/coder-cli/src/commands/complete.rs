use anyhow::{bail, Result};
use std::path::PathBuf;
use tracing::{error, info};

use coder::models::message::Message;
use coder::providers::base::Provider;
use coder::providers::openai::OpenAiProvider;

use crate::configuration::Settings;
use crate::inputs::read_prompt;

pub struct CompleteArgs {
    pub prompt: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
    pub output: Option<PathBuf>,
}

/// Send one prompt to the completion service without any tools
pub async fn execute(settings: Settings, args: CompleteArgs) -> Result<()> {
    let Some(prompt) = read_prompt(args.prompt)? else {
        error!("Prompt is empty, aborting");
        bail!("empty prompt");
    };

    let mut provider_config = settings.provider.into_config()?;
    if args.max_tokens.is_some() {
        provider_config.max_tokens = args.max_tokens;
    }
    let provider = OpenAiProvider::new(provider_config)?;

    let model = args.model.unwrap_or(settings.agent.model);
    let temperature = args.temperature.unwrap_or(settings.agent.temperature);
    let (reply, usage) = provider
        .complete(&model, &[Message::user(prompt)], &[], temperature)
        .await?;
    info!(total_tokens = ?usage.total_tokens, "Completion finished");

    let text = reply.text().unwrap_or_default();
    match args.output {
        Some(path) => {
            std::fs::write(&path, text)?;
            info!(path = %path.display(), "Wrote the response");
        }
        None => println!("{}", text),
    }
    Ok(())
}
