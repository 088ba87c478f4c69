//! Operator-facing intake summary

use super::IntakeRecord;
use std::fmt::Write;

/// Escape characters that Telegram's legacy Markdown treats as markup
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Markdown summary sent to the operator when intake completes.
/// `order` is the number of live sessions at handoff.
pub fn render_summary(record: &IntakeRecord, order: usize) -> String {
    let field = |value: Option<&String>| escape_markdown(value.map_or("-", String::as_str));

    let mut out = String::from("🚨 *New Support Request*\n");
    let _ = writeln!(out, "Processing Order: #{order:03}");
    let _ = writeln!(out, "*Client:* {}", field(record.contact.as_ref()));
    let _ = writeln!(out, "*Phone:* {}", field(record.phone.as_ref()));
    let _ = writeln!(out, "*Inquiry:* {}", field(record.inquiry.as_ref()));
    out.push_str("\nSystem: Client marked as active. Reply to chat.");
    out
}
