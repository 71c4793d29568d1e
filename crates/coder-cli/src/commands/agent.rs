use anyhow::{bail, Result};
use console::style;
use std::sync::Arc;
use tracing::{error, info};

use coder::agent::Agent;
use coder::filesystem::filesystem_tools;
use coder::providers::openai::OpenAiProvider;
use coder::sandbox::SandboxConfig;
use coder::shell::ShellCommandTool;

use crate::configuration::Settings;
use crate::inputs::read_prompt;

pub struct AgentArgs {
    pub prompt: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_iterations: Option<usize>,
    pub allowed_dirs: Vec<String>,
    pub no_shell: bool,
}

pub async fn execute(settings: Settings, args: AgentArgs) -> Result<()> {
    let Some(prompt) = read_prompt(args.prompt)? else {
        error!("Prompt is empty, aborting");
        bail!("empty prompt");
    };

    let allowed_dirs = if args.allowed_dirs.is_empty() {
        vec![std::env::current_dir()?.display().to_string()]
    } else {
        args.allowed_dirs
    };
    let sandbox = Arc::new(SandboxConfig::new(&allowed_dirs));
    if sandbox.allowed_roots().is_empty() {
        error!(directories = ?allowed_dirs, "None of the allowed directories exist");
        bail!("no usable allowed directories");
    }
    info!(roots = ?sandbox.allowed_roots(), "Sandbox initialized");

    let mut config = settings.agent;
    if let Some(model) = args.model {
        config.model = model;
    }
    if let Some(temperature) = args.temperature {
        config.temperature = temperature;
    }
    if let Some(max_iterations) = args.max_iterations {
        config.max_iterations = max_iterations;
    }

    let provider = OpenAiProvider::new(settings.provider.into_config()?)?;
    let mut agent = Agent::new(Box::new(provider)).with_config(config);
    agent.add_tools(filesystem_tools(sandbox))?;
    if !args.no_shell {
        agent.add_tool(Box::new(ShellCommandTool::new()))?;
    }

    info!(prompt_length = prompt.len(), "Starting agent from the command line");
    let result = agent.run(&prompt).await?;

    println!("\n{}\n", style("===== Result =====").bold().green());
    println!("{}", result);
    Ok(())
}
