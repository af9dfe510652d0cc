//! HTML to markdown-like text.

use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use super::ContentConverter;
use crate::error::ExtractResult;
use crate::models::PageContent;

const SKIPPED: &[&str] = &[
    "script", "style", "noscript", "template", "svg", "head", "iframe", "canvas",
];

const BLOCKS: &[&str] = &[
    "p", "div", "section", "article", "main", "header", "footer", "nav", "aside", "ul", "ol",
    "table", "tr", "form", "figure", "figcaption", "dl", "dt", "dd", "blockquote", "pre",
];

/// Markdown-ish rendering of headings, list items, links, images and text.
///
/// Links and image sources are resolved against the page URL so routines can
/// return absolute URLs without knowing where the text came from.
#[derive(Debug, Clone, Default)]
pub struct TextConverter;

impl TextConverter {
    pub fn new() -> Self {
        Self
    }

    fn render(&self, element: ElementRef<'_>, base: Option<&Url>, out: &mut String) {
        let name = element.value().name();
        if SKIPPED.contains(&name) {
            return;
        }

        match name {
            "br" => {
                out.push('\n');
                return;
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse::<usize>().unwrap_or(1);
                let text = inline_text(element);
                if !text.is_empty() {
                    out.push_str("\n\n");
                    out.push_str(&"#".repeat(level));
                    out.push(' ');
                    out.push_str(&text);
                    out.push_str("\n\n");
                }
                return;
            }
            "img" => {
                if let Some(src) = element
                    .value()
                    .attr("src")
                    .or_else(|| element.value().attr("data-src"))
                {
                    let alt = element.value().attr("alt").unwrap_or_default().trim();
                    out.push_str(&format!(" ![{}]({}) ", alt, resolve(base, src)));
                }
                return;
            }
            "a" => {
                let text = inline_text(element);
                match element.value().attr("href") {
                    Some(href) if !href.starts_with("javascript:") && !href.starts_with('#') => {
                        out.push_str(&format!(" [{}]({}) ", text, resolve(base, href)));
                        // Images inside links still need to be visible.
                        for child in element.children() {
                            if let Some(child_el) = ElementRef::wrap(child) {
                                if child_el.value().name() == "img" {
                                    self.render(child_el, base, out);
                                }
                            }
                        }
                    }
                    _ => {
                        out.push(' ');
                        out.push_str(&text);
                        out.push(' ');
                    }
                }
                return;
            }
            "li" => out.push_str("\n- "),
            "td" | "th" => out.push_str(" | "),
            _ if BLOCKS.contains(&name) => out.push('\n'),
            _ => {}
        }

        for child in element.children() {
            match child.value() {
                Node::Text(text) => push_collapsed(out, text),
                Node::Element(_) => {
                    if let Some(child_el) = ElementRef::wrap(child) {
                        self.render(child_el, base, out);
                    }
                }
                _ => {}
            }
        }

        if BLOCKS.contains(&name) || name == "li" {
            out.push('\n');
        }
    }
}

impl ContentConverter for TextConverter {
    fn convert(&self, page: &PageContent, page_url: &str) -> ExtractResult<String> {
        let document = Html::parse_document(&page.content);
        let base = Url::parse(page_url).ok();

        let mut out = String::new();
        if !page.title.trim().is_empty() {
            out.push_str(&format!("# {}\n\n", page.title.trim()));
        }
        for (key, value) in &page.metadata {
            if !value.trim().is_empty() {
                out.push_str(&format!("{}: {}\n", key, value.trim()));
            }
        }
        if !page.metadata.is_empty() {
            out.push('\n');
        }

        let mut body = String::new();
        let root = Selector::parse("body")
            .ok()
            .and_then(|selector| document.select(&selector).next())
            .unwrap_or_else(|| document.root_element());
        self.render(root, base.as_ref(), &mut body);

        out.push_str(&tidy(&body));
        Ok(out)
    }
}

fn resolve(base: Option<&Url>, href: &str) -> String {
    base.and_then(|b| b.join(href).ok())
        .map(|u| u.to_string())
        .unwrap_or_else(|| href.to_string())
}

fn inline_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn push_collapsed(out: &mut String, text: &str) {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return;
    }
    if text.starts_with(char::is_whitespace) && !out.ends_with([' ', '\n']) {
        out.push(' ');
    }
    out.push_str(&collapsed);
    if text.ends_with(char::is_whitespace) {
        out.push(' ');
    }
}

/// Trim lines and squeeze runs of blank lines to one.
fn tidy(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut blank = true;
    for line in text.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() || line == "|" {
            if !blank {
                lines.push(String::new());
                blank = true;
            }
            continue;
        }
        lines.push(line);
        blank = false;
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}
