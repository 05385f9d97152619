//! HTML rendering
//!
//! Summary markdown becomes the body of a standalone, styled HTML page that
//! is written next to the PDF and used as the email's HTML part.

use chrono::{DateTime, Utc};
use pulldown_cmark::{html, Event, Options, Parser};

/// Convert summary markdown to an HTML fragment
///
/// Raw HTML in the input is escaped and shown as text. Model output goes
/// straight into an email body, so it never gets to inject markup.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(markdown, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });

    let mut fragment = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut fragment, parser);
    fragment
}

/// Full standalone document around the rendered summary
pub fn render_document(title: &str, summary: &str, generated_at: DateTime<Utc>) -> String {
    let body = markdown_to_html(summary);
    let stamp = generated_at.format("%Y-%m-%d %H:%M UTC");

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{title}</title>
    <style>
        body {{ font-family: Arial, Helvetica, sans-serif; margin: 0; padding: 24px; background: #f5f6f8; color: #222; }}
        .report {{ max-width: 860px; margin: 0 auto; background: #fff; padding: 32px; border-radius: 6px; box-shadow: 0 1px 3px rgba(0,0,0,0.12); }}
        h1 {{ color: #1f4e79; border-bottom: 2px solid #1f4e79; padding-bottom: 8px; }}
        h2 {{ color: #1f4e79; margin-top: 32px; }}
        h3 {{ color: #2e75b6; }}
        code {{ background: #f0f0f0; padding: 1px 4px; border-radius: 3px; }}
        table {{ border-collapse: collapse; }}
        th, td {{ border: 1px solid #ccc; padding: 4px 8px; }}
        .generated {{ color: #666; font-size: 0.9em; }}
    </style>
</head>
<body>
<div class="report">
    <h1>{title}</h1>
    <p class="generated">Generated {stamp}</p>
{body}</div>
</body>
</html>
"#
    )
}
