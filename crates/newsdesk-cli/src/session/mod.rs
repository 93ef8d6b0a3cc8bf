mod input;
mod output;

use std::io::Write;

use anyhow::Result;
use futures::StreamExt;
use rustyline::DefaultEditor;

use newsdesk::{Message, TurnSession};

use input::InputResult;
use output::{StreamPrinter, ThinkingIndicator};

/// A terminal conversation. History lives only as long as the process.
pub struct ChatSession {
    session: TurnSession,
    messages: Vec<Message>,
}

impl ChatSession {
    pub fn new(session: TurnSession) -> Self {
        Self {
            session,
            messages: Vec::new(),
        }
    }

    pub async fn interactive(&mut self) -> Result<()> {
        let mut editor = DefaultEditor::new()?;
        output::display_greeting();

        loop {
            match input::get_input(&mut editor)? {
                InputResult::Message(content) => {
                    self.process_message(&content, true).await?;
                }
                InputResult::Clear => {
                    self.messages.clear();
                    println!("{}", console::style("Conversation cleared.").yellow());
                }
                InputResult::Retry => continue,
                InputResult::Exit => break,
            }
        }
        Ok(())
    }

    /// One turn without a spinner, for `newsdesk ask`.
    pub async fn headless(&mut self, message: &str) -> Result<()> {
        if !self.process_message(message, false).await? {
            anyhow::bail!("the turn did not complete");
        }
        Ok(())
    }

    /// Run one turn, printing the answer as it grows. A failed turn is shown,
    /// leaves the history untouched and returns false.
    async fn process_message(&mut self, content: &str, interactive: bool) -> Result<bool> {
        let mut thinking = ThinkingIndicator::default();
        if interactive {
            thinking.show();
        }

        let mut printer = StreamPrinter::default();
        let mut stdout = std::io::stdout();
        let mut failed = false;
        {
            let mut stream = self.session.chat(content, &self.messages);
            while let Some(next) = stream.next().await {
                thinking.hide();
                match next {
                    Ok(text) => {
                        write!(stdout, "{}", printer.unseen(&text))?;
                        stdout.flush()?;
                        printer.advance(text);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "turn failed");
                        output::render_error(&e.to_string());
                        failed = true;
                    }
                }
            }
        }
        thinking.hide();
        println!();

        if failed {
            return Ok(false);
        }
        self.messages.push(Message::user().with_text(content));
        self.messages
            .push(Message::assistant().with_text(printer.into_text()));
        Ok(true)
    }
}
