use crate::error::ScrapeError;
use crate::pagination::ScrapeReport;
use crate::query::QueryParameters;
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use std::io::{self, BufRead, Write};

pub struct ScrapeTUI {
    pages_done: usize,
}

impl ScrapeTUI {
    pub fn new() -> Self {
        Self {
            pages_done: 0,
        }
    }

    /// Print the endpoint and every parameter the run starts with
    pub fn show_settings(&self, endpoint: &str, parameters: &QueryParameters) -> io::Result<()> {
        execute!(
            io::stdout(),
            SetForegroundColor(Color::White),
            Print("Scraping with the following settings:\n"),
            Print(format!("{}\n", endpoint)),
            ResetColor
        )?;
        for (key, value) in parameters.iter() {
            execute!(
                io::stdout(),
                SetForegroundColor(Color::DarkGrey),
                Print(format!("  {:<16} {}\n", key, value)),
                ResetColor
            )?;
        }
        Ok(())
    }

    /// Block until Enter. Any typed input cancels the run.
    pub fn confirm(&self) -> io::Result<bool> {
        let stdin = io::stdin();
        self.confirm_from(&mut stdin.lock())
    }

    pub fn confirm_from<R: BufRead>(&self, input: &mut R) -> io::Result<bool> {
        print!("Press enter to continue ...");
        io::stdout().flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(false);
        }
        Ok(is_confirmation(&line))
    }

    pub fn cursor_switch(&mut self, min_price: i64) -> io::Result<()> {
        execute!(
            io::stdout(),
            SetForegroundColor(Color::Blue),
            Print(format!("↻ Switching to price cursor: minPrice={}\n", min_price)),
            ResetColor
        )
    }

    pub fn page_done(&mut self, request: usize, added: usize, total: usize, max: Option<usize>) -> io::Result<()> {
        self.pages_done += 1;
        let target = max.map(|m| format!("/{}", m)).unwrap_or_default();
        execute!(
            io::stdout(),
            SetForegroundColor(Color::Green),
            Print(format!("✓ Request {}: +{} new, {}{} listings\n", request, added, total, target)),
            ResetColor
        )
    }

    pub fn show_summary(&mut self, report: &ScrapeReport) -> io::Result<()> {
        execute!(
            io::stdout(),
            Print("─".repeat(60)),
            Print("\n"),
            SetForegroundColor(Color::Green),
            Print(format!(
                "✅ Scrape completed: {} listings from {} requests ({} price cursors)",
                report.listings, report.requests, report.cursor_switches
            )),
            SetForegroundColor(Color::DarkGrey),
            Print(format!(
                " | table: {} total, {} added\n",
                report.stored.total, report.stored.added
            )),
            ResetColor
        )
    }

    pub fn show_abort(&mut self, error: &ScrapeError, accumulated: usize) -> io::Result<()> {
        execute!(
            io::stdout(),
            Print("─".repeat(60)),
            Print("\n"),
            SetForegroundColor(Color::Red),
            Print(format!("❌ Scrape aborted: {}", error)),
            ResetColor,
            SetForegroundColor(Color::DarkGrey),
            Print(format!(" | flushed {} listings after {} pages\n", accumulated, self.pages_done)),
            ResetColor
        )
    }
}

impl Default for ScrapeTUI {
    fn default() -> Self {
        Self::new()
    }
}

fn is_confirmation(line: &str) -> bool {
    line.trim_end_matches(['\r', '\n']).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn only_a_bare_enter_confirms() {
        let tui = ScrapeTUI::new();
        assert!(tui.confirm_from(&mut Cursor::new("\n")).unwrap());
        assert!(tui.confirm_from(&mut Cursor::new("\r\n")).unwrap());
        assert!(!tui.confirm_from(&mut Cursor::new("n\n")).unwrap());
        assert!(!tui.confirm_from(&mut Cursor::new(" \n")).unwrap());
        assert!(!tui.confirm_from(&mut Cursor::new("")).unwrap());
    }
}
