use crate::ida::model::{Event, CITY};
use itertools::Itertools;

/// Subject, HTML and plain text of a new events email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailContent {
    pub subject: String,
    pub html: String,
    pub text: String,
}

impl EmailContent {
    /// `sent_at` is shown in the footer
    pub fn for_events(events: &[Event], sent_at: &str) -> Self {
        Self {
            subject: subject(events),
            html: html_body(events, sent_at),
            text: text_body(events),
        }
    }
}

pub fn subject(events: &[Event]) -> String {
    let base = format!("IDA events ({CITY})");

    match events {
        [event] => format!("{base}: {}", event.title),
        _ => format!("{base}: {} fundet", events.len()),
    }
}

pub fn html_body(events: &[Event], sent_at: &str) -> String {
    let items = events.iter().map(html_item).join("");

    format!(
        r#"<div style="font-family:Segoe UI,Arial,sans-serif;font-size:14px;line-height:1.5;color:#1a1a1a;">
  <p>Der er fundet <strong>{count}</strong> IDA-event(s) i {CITY}:</p>
  <ul>
    {items}
  </ul>
  <p style="color:#666;margin-top:16px;">Automatisk besked – {sent_at}</p>
</div>"#,
        count = events.len(),
    )
}

fn html_item(event: &Event) -> String {
    let when = [event.date.as_str(), event.time.as_str()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .join(" ");
    let when = if when.is_empty() {
        String::new()
    } else {
        format!(" <span style=\"color:#666;\">({when})</span>")
    };

    format!(
        r#"<li><a href="{}">{}</a>{}</li>"#,
        escape_html(&event.link),
        escape_html(&event.title),
        when
    )
}

pub fn text_body(events: &[Event]) -> String {
    events
        .iter()
        .map(|event| format!("• {}\n{}", event.title, event.link))
        .join("\n\n")
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
