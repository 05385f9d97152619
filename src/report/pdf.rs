//! PDF rendering
//!
//! Layout is a pure step that turns sections into positioned lines, split
//! across pages. Drawing then hands those lines to `printpdf` using the
//! built-in Helvetica faces, so no font files are needed at runtime.

use printpdf::{BuiltinFont, Mm, PdfDocument};

use super::sections::Section;
use super::RenderError;

/// Page size and typography, all lengths in millimetres
#[derive(Debug, Clone, PartialEq)]
pub struct PageGeometry {
    pub width_mm: f32,
    pub height_mm: f32,
    pub margin_mm: f32,
    pub line_height_mm: f32,
    /// Characters per wrapped body line
    pub wrap_columns: usize,
    pub body_size: f32,
    pub heading_size: f32,
    pub title_size: f32,
}

impl Default for PageGeometry {
    /// A4 portrait
    fn default() -> Self {
        Self {
            width_mm: 210.0,
            height_mm: 297.0,
            margin_mm: 20.0,
            line_height_mm: 5.5,
            wrap_columns: 95,
            body_size: 10.0,
            heading_size: 14.0,
            title_size: 18.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Title,
    Heading,
    Body,
}

/// A line of text at a fixed position on a page
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub style: LineStyle,
    pub x_mm: f32,
    pub y_mm: f32,
}

/// Everything drawn on one page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLayout {
    pub lines: Vec<PlacedLine>,
}

struct Cursor<'a> {
    geometry: &'a PageGeometry,
    pages: Vec<PageLayout>,
    y: f32,
}

impl<'a> Cursor<'a> {
    fn new(geometry: &'a PageGeometry) -> Self {
        Self {
            geometry,
            pages: vec![PageLayout::default()],
            y: geometry.height_mm - geometry.margin_mm,
        }
    }

    /// Place a line `advance` line-heights below the previous one
    fn place(&mut self, text: String, style: LineStyle, advance: f32) {
        let step = self.geometry.line_height_mm * advance;
        if self.y - step < self.geometry.margin_mm {
            self.pages.push(PageLayout::default());
            self.y = self.geometry.height_mm - self.geometry.margin_mm;
        }
        self.y -= step;

        if let Some(page) = self.pages.last_mut() {
            page.lines.push(PlacedLine {
                text,
                style,
                x_mm: self.geometry.margin_mm,
                y_mm: self.y,
            });
        }
    }

    fn gap(&mut self, lines: f32) {
        self.y -= self.geometry.line_height_mm * lines;
    }
}

/// Position every line of the report, adding pages as the cursor runs out
pub fn layout(
    title: &str,
    subtitle: &str,
    sections: &[Section],
    geometry: &PageGeometry,
) -> Vec<PageLayout> {
    let mut cursor = Cursor::new(geometry);

    cursor.place(pdf_safe(title), LineStyle::Title, 1.5);
    cursor.place(pdf_safe(subtitle), LineStyle::Body, 1.0);

    for section in sections {
        cursor.gap(1.0);
        cursor.place(pdf_safe(&section.title), LineStyle::Heading, 1.5);

        for raw in section.body.lines() {
            let (style, text) = classify(raw);
            if text.is_empty() {
                cursor.gap(0.5);
                continue;
            }

            match style {
                LineStyle::Heading => cursor.place(text, LineStyle::Heading, 1.3),
                _ => {
                    for wrapped in wrap(&text, geometry.wrap_columns) {
                        cursor.place(wrapped, LineStyle::Body, 1.0);
                    }
                }
            }
        }
    }

    cursor.pages
}

/// Markdown headings become bold lines; everything else is plain body text
fn classify(line: &str) -> (LineStyle, String) {
    let trimmed = line.trim();
    let hashes = trimmed.chars().take_while(|&c| c == '#').count();

    if hashes > 0 && trimmed[hashes..].starts_with(' ') {
        return (LineStyle::Heading, pdf_safe(&strip_markup(&trimmed[hashes..])));
    }

    let indent = line.len() - line.trim_start().len();
    let mut text = strip_markup(trimmed);
    if let Some(rest) = text.strip_prefix("* ").or_else(|| text.strip_prefix("+ ")) {
        text = format!("- {rest}");
    }
    if indent > 0 && text.starts_with("- ") {
        text = format!("{}{text}", " ".repeat(indent.min(8)));
    }

    (LineStyle::Body, pdf_safe(&text))
}

/// Drop inline emphasis and code markers
fn strip_markup(text: &str) -> String {
    text.replace("**", "")
        .replace("__", "")
        .replace('`', "")
        .trim()
        .to_string()
}

/// Built-in PDF fonts only cover a Latin character set
pub fn pdf_safe(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\u{2018}' | '\u{2019}' => out.push('\''),
            '\u{201C}' | '\u{201D}' => out.push('"'),
            '\u{2013}' | '\u{2014}' | '\u{2022}' => out.push('-'),
            '\u{2026}' => out.push_str("..."),
            '\t' => out.push_str("    "),
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

/// Greedy word wrap; words longer than a line are split
pub fn wrap(text: &str, columns: usize) -> Vec<String> {
    let columns = columns.max(1);
    // leave room for at least one character after the indent
    let indent: String = text
        .chars()
        .take_while(|c| *c == ' ')
        .take(columns - 1)
        .collect();
    let room = columns - indent.len();
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();

        while word.len() > room {
            if !current.is_empty() {
                lines.push(format!("{indent}{}", std::mem::take(&mut current)));
            }
            let rest = word.split_off(room);
            lines.push(format!("{indent}{}", word.iter().collect::<String>()));
            word = rest;
        }

        let needed = if current.is_empty() {
            word.len()
        } else {
            current.chars().count() + 1 + word.len()
        };

        if needed > room && !current.is_empty() {
            lines.push(format!("{indent}{}", std::mem::take(&mut current)));
        }

        if !current.is_empty() {
            current.push(' ');
        }
        current.extend(word);
    }

    if !current.is_empty() {
        lines.push(format!("{indent}{current}"));
    }

    lines
}

/// Draw a laid-out report and serialize it
pub fn render_pdf(
    title: &str,
    pages: &[PageLayout],
    geometry: &PageGeometry,
) -> Result<Vec<u8>, RenderError> {
    let width = Mm(geometry.width_mm);
    let height = Mm(geometry.height_mm);

    let (doc, first_page, first_layer) = PdfDocument::new(title, width, height, "Layer 1");

    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| RenderError::Pdf(e.to_string()))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| RenderError::Pdf(e.to_string()))?;

    let total = pages.len();
    for (index, page) in pages.iter().enumerate() {
        let (page_index, layer_index) = if index == 0 {
            (first_page, first_layer)
        } else {
            doc.add_page(width, height, format!("Page {}, Layer 1", index + 1))
        };
        let layer = doc.get_page(page_index).get_layer(layer_index);

        for line in &page.lines {
            let (size, font) = match line.style {
                LineStyle::Title => (geometry.title_size, &bold),
                LineStyle::Heading => (geometry.heading_size, &bold),
                LineStyle::Body => (geometry.body_size, &regular),
            };
            layer.use_text(line.text.as_str(), size, Mm(line.x_mm), Mm(line.y_mm), font);
        }

        layer.use_text(
            format!("Page {} of {}", index + 1, total),
            8.0,
            Mm(geometry.width_mm - geometry.margin_mm - 20.0),
            Mm(geometry.margin_mm / 2.0),
            &regular,
        );
    }

    doc.save_to_bytes()
        .map_err(|e| RenderError::Pdf(e.to_string()))
}
