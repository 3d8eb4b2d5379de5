//! Welcome banner display for chat sessions.
//!
//! Prints a styled banner when a chat session starts, showing the model,
//! where the transcript is stored, and who is signed in.

use console::style;

/// Print the welcome banner at the start of a chat session.
pub fn print_welcome_banner(model: &str, storage: &str, user: Option<&str>) {
    println!();
    println!("  * {}", style("Parley").cyan().bold());
    println!();
    println!("  {}    {}", style("Model:").bold(), style(model).dim());
    println!("  {}  {}", style("Storage:").bold(), style(storage).dim());
    if let Some(user) = user {
        println!("  {}     {}", style("User:").bold(), style(user).dim());
    }
    println!();
    println!(
        "  {}",
        style("Type /help for commands, Ctrl+D to exit").dim()
    );
    println!("  {}", style("---").dim());
    println!();
}

/// Short label for a conversation id in the banner.
pub fn short_id(id: &str) -> &str {
    &id[..8.min(id.len())]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0192f0c4-aaaa-bbbb"), "0192f0c4");
        assert_eq!(short_id("abc"), "abc");
    }
}
