use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

#[derive(Debug, PartialEq)]
pub enum InputResult {
    Message(String),
    Exit,
    Clear,
    Retry,
}

pub fn get_input(editor: &mut DefaultEditor) -> Result<InputResult> {
    let prompt = format!("{} ", console::style("news>").cyan().bold());
    let input = match editor.readline(&prompt) {
        Ok(text) => text,
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => return Ok(InputResult::Exit),
        Err(e) => return Err(e.into()),
    };

    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(InputResult::Retry);
    }
    editor.add_history_entry(trimmed)?;

    Ok(handle_slash_command(trimmed).unwrap_or_else(|| InputResult::Message(trimmed.to_string())))
}

fn handle_slash_command(input: &str) -> Option<InputResult> {
    match input {
        "/exit" | "/quit" => Some(InputResult::Exit),
        "/clear" => Some(InputResult::Clear),
        _ => None,
    }
}
