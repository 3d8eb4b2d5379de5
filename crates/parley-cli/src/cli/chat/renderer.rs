//! Terminal markdown rendering for assistant replies.
//!
//! `ChatRenderer` renders complete replies through `termimad`; code fences
//! are kept verbatim, indented, with a dim language label.

use console::style;
use termimad::MadSkin;
use termimad::crossterm::style::Color;

use parley_types::chat::{Message, MessageRole};

/// Longest message preview shown by `/history`.
const PREVIEW_CHARS: usize = 100;

/// Terminal markdown renderer.
pub struct ChatRenderer {
    skin: MadSkin,
}

impl ChatRenderer {
    pub fn new() -> Self {
        let mut skin = MadSkin::default_dark();
        skin.bold.set_fg(Color::Cyan);
        skin.headers[0].set_fg(Color::Cyan);
        skin.headers[1].set_fg(Color::Cyan);
        skin.inline_code.set_fg(Color::Yellow);
        Self { skin }
    }

    /// Render a complete markdown reply.
    pub fn render(&self, markdown: &str) -> String {
        let mut output = String::new();
        let mut prose = String::new();
        let mut code: Option<(String, String)> = None;

        for line in markdown.lines() {
            if line.trim_start().starts_with("```") {
                match code.take() {
                    Some((lang, body)) => output.push_str(&render_code(&lang, &body)),
                    None => {
                        output.push_str(&self.skin.term_text(&prose).to_string());
                        prose.clear();
                        let lang = line.trim_start().trim_start_matches('`').trim().to_string();
                        code = Some((lang, String::new()));
                    }
                }
            } else if let Some((_, body)) = code.as_mut() {
                body.push_str(line);
                body.push('\n');
            } else {
                prose.push_str(line);
                prose.push('\n');
            }
        }

        // Unclosed fence
        if let Some((lang, body)) = code {
            output.push_str(&render_code(&lang, &body));
        }
        if !prose.is_empty() {
            output.push_str(&self.skin.term_text(&prose).to_string());
        }

        output
    }

    /// Print an assistant reply with its label.
    pub fn print_reply(&self, content: &str) {
        println!();
        println!("  {}", style("Assistant").cyan().bold());
        println!("{}", self.render(content).trim_end());
        println!();
    }

    /// Print a session error in place of a reply.
    pub fn print_error(&self, error: &str) {
        eprintln!("\n  {} {error}", style("!").red().bold());
        eprintln!(
            "  {}",
            style("Type /retry to resend, or keep chatting.").dim()
        );
        eprintln!();
    }

    /// Print the transcript as one preview line per message.
    pub fn print_transcript(&self, transcript: &[Message]) {
        println!();
        if transcript.is_empty() {
            println!("  {}", style("No messages yet.").dim());
        }
        for message in transcript {
            let label = match message.role {
                MessageRole::User => style("You").green(),
                MessageRole::Assistant => style("Assistant").cyan(),
                MessageRole::System => style("System").dim(),
            };
            println!("  {} {}", label.bold(), preview(&message.content));
        }
        println!();
    }
}

impl Default for ChatRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn render_code(lang: &str, body: &str) -> String {
    let mut output = format!("  {}\n", style(format!("--- {lang} ---")).dim());
    for line in body.lines() {
        output.push_str("    ");
        output.push_str(line);
        output.push('\n');
    }
    output
}

/// First line of `content`, cut to [`PREVIEW_CHARS`] characters.
pub fn preview(content: &str) -> String {
    let first_line = content.lines().next().unwrap_or_default();
    if first_line.chars().count() > PREVIEW_CHARS {
        let cut: String = first_line.chars().take(PREVIEW_CHARS - 3).collect();
        format!("{cut}...")
    } else if content.lines().nth(1).is_some() {
        format!("{first_line} ...")
    } else {
        first_line.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_short_single_line() {
        assert_eq!(preview("hello"), "hello");
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let long = "é".repeat(150);
        let shown = preview(&long);
        assert_eq!(shown.chars().count(), PREVIEW_CHARS);
        assert!(shown.ends_with("..."));
    }

    #[test]
    fn test_preview_marks_multiline() {
        assert_eq!(preview("first\nsecond"), "first ...");
    }

    #[test]
    fn test_render_keeps_code_verbatim() {
        let renderer = ChatRenderer::new();
        let out = renderer.render("Here:\n```rust\nfn main() {}\n```\nDone.");
        assert!(out.contains("    fn main() {}"));
        assert!(out.contains("rust"));
        assert!(out.contains("Done."));
    }

    #[test]
    fn test_render_unclosed_fence() {
        let renderer = ChatRenderer::new();
        let out = renderer.render("```\nlet x = 1;");
        assert!(out.contains("    let x = 1;"));
    }
}
