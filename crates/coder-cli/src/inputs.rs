use anyhow::Result;
use std::io::{self, BufRead, IsTerminal};

/// The prompt given on the command line, or else everything on stdin.
///
/// None means the prompt was empty.
pub fn read_prompt(argument: Option<String>) -> Result<Option<String>> {
    if let Some(prompt) = argument.filter(|prompt| !prompt.trim().is_empty()) {
        return Ok(Some(prompt));
    }

    let stdin = io::stdin();
    if stdin.is_terminal() {
        eprintln!("Reading the prompt from stdin (Ctrl+D to finish):");
    }
    read_prompt_from(stdin.lock())
}

pub fn read_prompt_from<R: BufRead>(reader: R) -> Result<Option<String>> {
    let lines = reader.lines().collect::<io::Result<Vec<_>>>()?;
    let prompt = lines.join("\n");
    if prompt.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(prompt))
    }
}
