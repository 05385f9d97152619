//! Splitting summary text into per-host sections
//!
//! Summaries come back from a language model, so their shape is only loosely
//! predictable. Splitting is an ordered list of strategies; the first one that
//! produces any sections wins.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

/// Explicit `Host: name` markers, optionally as a markdown heading or in bold
static HOST_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^[ \t]*(?:#{1,6}[ \t]*)?(?:\*\*)?(?:host|server|hostname)[ \t]*:[ \t]*(?P<name>[A-Za-z0-9][A-Za-z0-9._-]*)(?:\*\*)?[ \t]*:?[ \t]*$")
        .expect("host marker pattern is valid")
});

/// A line that is nothing but something shaped like a hostname
static HOSTNAME_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:#{1,6}[ \t]*)?(?:\*\*)?(?P<name>[A-Za-z][A-Za-z0-9]*(?:[-.][A-Za-z0-9]+)+)(?:\*\*)?[ \t]*:?[ \t]*$")
        .expect("hostname line pattern is valid")
});

static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n").expect("blank line pattern is valid"));

/// Title given to text that precedes the first marker
pub const PREAMBLE_TITLE: &str = "Overview";

/// A titled piece of the summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub body: String,
}

impl Section {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// One way of cutting summary text into sections
pub trait SectionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Sections found in `text`, empty if this strategy doesn't apply
    fn split(&self, text: &str) -> Vec<Section>;
}

/// Split on `Host: name` lines
#[derive(Debug, Clone, Copy, Default)]
pub struct ExplicitMarkers;

impl SectionStrategy for ExplicitMarkers {
    fn name(&self) -> &'static str {
        "explicit-markers"
    }

    fn split(&self, text: &str) -> Vec<Section> {
        split_on(&HOST_MARKER, text, |_| true)
    }
}

/// Split on lines that look like bare hostnames (`web-01`, `db1.example.com`)
#[derive(Debug, Clone, Copy, Default)]
pub struct HostnameHeadings;

impl SectionStrategy for HostnameHeadings {
    fn name(&self) -> &'static str {
        "hostname-headings"
    }

    fn split(&self, text: &str) -> Vec<Section> {
        // headings like "Long-Term" are words, not hosts
        split_on(&HOSTNAME_LINE, text, |name| {
            name.chars().any(|c| c.is_ascii_digit())
        })
    }
}

/// Every blank-line separated paragraph becomes a section
#[derive(Debug, Clone, Copy, Default)]
pub struct Paragraphs;

impl SectionStrategy for Paragraphs {
    fn name(&self) -> &'static str {
        "paragraphs"
    }

    fn split(&self, text: &str) -> Vec<Section> {
        BLANK_LINES
            .split(text)
            .map(str::trim)
            .filter(|paragraph| !paragraph.is_empty())
            .enumerate()
            .map(|(i, paragraph)| Section::new(format!("Part {}", i + 1), paragraph))
            .collect()
    }
}

/// Cut `text` at every match of `marker` whose name passes `accept`
fn split_on(marker: &Regex, text: &str, accept: impl Fn(&str) -> bool) -> Vec<Section> {
    let markers: Vec<(usize, usize, &str)> = marker
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps.name("name")?.as_str();
            accept(name).then_some((whole.start(), whole.end(), name))
        })
        .collect();

    let Some(&(first_start, _, _)) = markers.first() else {
        return Vec::new();
    };

    let mut sections = Vec::with_capacity(markers.len() + 1);

    let preamble = text[..first_start].trim();
    if !preamble.is_empty() {
        sections.push(Section::new(PREAMBLE_TITLE, preamble));
    }

    for (i, &(_, end, name)) in markers.iter().enumerate() {
        let next = markers.get(i + 1).map_or(text.len(), |&(start, _, _)| start);
        sections.push(Section::new(name, text[end..next].trim()));
    }

    sections
}

/// Ordered list of strategies, first non-empty result wins
pub struct SectionPolicy {
    strategies: Vec<Box<dyn SectionStrategy>>,
}

impl Default for SectionPolicy {
    fn default() -> Self {
        Self::new(vec![
            Box::new(ExplicitMarkers),
            Box::new(HostnameHeadings),
            Box::new(Paragraphs),
        ])
    }
}

impl std::fmt::Debug for SectionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.strategies.iter().map(|s| s.name()))
            .finish()
    }
}

impl SectionPolicy {
    pub fn new(strategies: Vec<Box<dyn SectionStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn split(&self, text: &str) -> Vec<Section> {
        for strategy in &self.strategies {
            let sections = strategy.split(text);
            if !sections.is_empty() {
                debug!(
                    "split summary into {} sections using {}",
                    sections.len(),
                    strategy.name()
                );
                return sections;
            }
        }

        Vec::new()
    }
}
