use console::style;

#[derive(Default)]
pub struct ThinkingIndicator {
    spinner: Option<cliclack::ProgressBar>,
}

impl ThinkingIndicator {
    pub fn show(&mut self) {
        let spinner = cliclack::spinner();
        spinner.start("Reading the news...");
        self.spinner = Some(spinner);
    }

    pub fn hide(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.stop("");
        }
    }
}

/// Tracks what has already been printed of a cumulative answer.
#[derive(Debug, Default)]
pub struct StreamPrinter {
    printed: String,
}

impl StreamPrinter {
    /// The part of `latest` not yet on screen. A value that does not extend
    /// what was printed is returned whole.
    pub fn unseen<'a>(&self, latest: &'a str) -> &'a str {
        latest.strip_prefix(self.printed.as_str()).unwrap_or(latest)
    }

    pub fn advance(&mut self, latest: String) {
        self.printed = latest;
    }

    pub fn into_text(self) -> String {
        self.printed
    }
}

pub fn display_greeting() {
    println!(
        "{}",
        style("newsdesk is ready. Ask for today's news, type ./ <topic> for a digest, or ask about a story.")
            .green()
    );
    println!(
        "{}\n",
        style("/clear forgets the conversation, /exit quits.").dim()
    );
}

pub fn render_error(message: &str) {
    println!("\n  {} {}\n", style("error:").red().bold(), style(message).red());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unseen_suffix_of_cumulative_values() {
        let mut printer = StreamPrinter::default();
        assert_eq!(printer.unseen("# Tech\n\n"), "# Tech\n\n");
        printer.advance("# Tech\n\n".to_string());

        assert_eq!(printer.unseen("# Tech\n\n## Chips\n\n"), "## Chips\n\n");
        printer.advance("# Tech\n\n## Chips\n\n".to_string());

        // a repeated final emission prints nothing new
        assert_eq!(printer.unseen("# Tech\n\n## Chips\n\n"), "");
        assert_eq!(printer.into_text(), "# Tech\n\n## Chips\n\n");
    }

    #[test]
    fn test_unrelated_value_printed_whole() {
        let mut printer = StreamPrinter::default();
        printer.advance("abc".to_string());
        assert_eq!(printer.unseen("xyz"), "xyz");
    }
}
