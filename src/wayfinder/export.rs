//! Session rendering for the export formats of the storage contract.

use std::io::{self, Write};

use crate::wayfinder::session::Session;
use crate::wayfinder::storage::ExportFormat;

/// Render a session into `writer` in the requested format.
pub fn render_session(
    session: &Session,
    format: ExportFormat,
    writer: &mut (dyn Write + Send),
) -> io::Result<()> {
    match format {
        ExportFormat::Json => render_json(session, writer),
        ExportFormat::Markdown => render_markdown(session, writer),
        ExportFormat::Text => render_text(session, writer),
        ExportFormat::Html => render_html(session, writer),
    }
}

fn render_json(session: &Session, writer: &mut (dyn Write + Send)) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *writer, session)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    writeln!(writer)
}

fn render_markdown(session: &Session, writer: &mut (dyn Write + Send)) -> io::Result<()> {
    writeln!(writer, "# {}", session.name)?;
    writeln!(writer)?;
    writeln!(
        writer,
        "*{}/{}, created {}*",
        session.conversation.provider,
        session.conversation.model,
        session.created_at.format("%Y-%m-%d %H:%M UTC")
    )?;
    if !session.tags.is_empty() {
        writeln!(writer, "*Tags: {}*", session.tags.join(", "))?;
    }
    for message in &session.conversation.messages {
        writeln!(writer)?;
        writeln!(writer, "## {}", capitalize(message.role.as_str()))?;
        writeln!(writer)?;
        writeln!(writer, "{}", message.content)?;
        for attachment in &message.attachments {
            writeln!(
                writer,
                "- attachment: {} ({})",
                attachment.name.as_deref().unwrap_or(&attachment.id),
                attachment.kind.as_str()
            )?;
        }
    }
    Ok(())
}

fn render_text(session: &Session, writer: &mut (dyn Write + Send)) -> io::Result<()> {
    writeln!(writer, "=== {} ===", session.name)?;
    writeln!(
        writer,
        "{}/{} | {} messages",
        session.conversation.provider,
        session.conversation.model,
        session.conversation.messages.len()
    )?;
    for message in &session.conversation.messages {
        writeln!(writer)?;
        writeln!(writer, "[{}] {}", message.role.as_str(), message.content)?;
    }
    Ok(())
}

fn render_html(session: &Session, writer: &mut (dyn Write + Send)) -> io::Result<()> {
    writeln!(writer, "<!DOCTYPE html>")?;
    writeln!(writer, "<html><head><meta charset=\"utf-8\">")?;
    writeln!(writer, "<title>{}</title></head><body>", escape(&session.name))?;
    writeln!(writer, "<h1>{}</h1>", escape(&session.name))?;
    writeln!(
        writer,
        "<p class=\"meta\">{}/{}</p>",
        escape(&session.conversation.provider),
        escape(&session.conversation.model)
    )?;
    for message in &session.conversation.messages {
        writeln!(
            writer,
            "<div class=\"message {}\"><strong>{}</strong><p>{}</p></div>",
            message.role.as_str(),
            capitalize(message.role.as_str()),
            escape(&message.content)
        )?;
    }
    writeln!(writer, "</body></html>")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
