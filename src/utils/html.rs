//! HTML fragment detection and HTML -> markdown conversion.
//!
//! Chat-platform messages and some model outputs arrive as HTML fragments.
//! They are parsed with `scraper` and rendered into the small markdown
//! dialect the chat platform displays.

use scraper::{ElementRef, Html, Node};

const HTML_TAGS: &[&str] = &[
    "p",
    "div",
    "span",
    "a",
    "img",
    "br",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "ul",
    "ol",
    "li",
    "strong",
    "b",
    "em",
    "i",
    "code",
    "pre",
    "blockquote",
];

/// Whether `content` carries one of the common HTML tags.
pub fn contains_html(content: &str) -> bool {
    let lower = content.to_ascii_lowercase();
    HTML_TAGS.iter().any(|tag| {
        lower.contains(&format!("<{tag}>"))
            || lower.contains(&format!("<{tag} "))
            || lower.contains(&format!("<{tag}/>"))
    })
}

/// Convert `content` to markdown when it looks like HTML, else return it as is.
pub fn process_html_content(content: &str) -> String {
    if contains_html(content) {
        html_to_markdown(content)
    } else {
        content.to_string()
    }
}

/// Render an HTML fragment as markdown.
pub fn html_to_markdown(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::new();
    render_children(fragment.root_element(), &mut out, 0);
    normalize(&out)
}

fn render_children(element: ElementRef<'_>, out: &mut String, depth: usize) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            render_element(child_element, out, depth);
        } else if let Node::Text(text) = child.value() {
            push_text(out, text);
        }
    }
}

fn render_element(element: ElementRef<'_>, out: &mut String, depth: usize) {
    let name = element.value().name();
    match name {
        "br" => out.push('\n'),
        "p" | "div" => {
            block_break(out);
            render_children(element, out, depth);
            block_break(out);
        }
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = name[1..].parse::<usize>().unwrap_or(1);
            block_break(out);
            out.push_str(&"#".repeat(level));
            out.push(' ');
            render_children(element, out, depth);
            block_break(out);
        }
        "strong" | "b" => wrap_inline(element, out, depth, "**"),
        "em" | "i" => wrap_inline(element, out, depth, "*"),
        "code" => {
            out.push('`');
            out.push_str(&element.text().collect::<String>());
            out.push('`');
        }
        "pre" => {
            block_break(out);
            out.push_str("```\n");
            out.push_str(element.text().collect::<String>().trim_end_matches('\n'));
            out.push_str("\n```");
            block_break(out);
        }
        "a" => {
            let href = element.value().attr("href").unwrap_or_default();
            out.push('[');
            render_children(element, out, depth);
            out.push_str("](");
            out.push_str(href);
            out.push(')');
        }
        "img" => {
            let alt = element.value().attr("alt").unwrap_or_default();
            let src = element.value().attr("src").unwrap_or_default();
            out.push_str(&format!("![{alt}]({src})"));
        }
        "ul" | "ol" => render_list(element, out, depth, name == "ol"),
        "blockquote" => {
            let mut inner = String::new();
            render_children(element, &mut inner, depth);
            block_break(out);
            for line in normalize(&inner).lines() {
                out.push_str("> ");
                out.push_str(line);
                out.push('\n');
            }
            block_break(out);
        }
        "script" | "style" => {}
        _ => render_children(element, out, depth),
    }
}

fn wrap_inline(element: ElementRef<'_>, out: &mut String, depth: usize, marker: &str) {
    out.push_str(marker);
    render_children(element, out, depth);
    out.push_str(marker);
}

fn render_list(element: ElementRef<'_>, out: &mut String, depth: usize, ordered: bool) {
    if depth == 0 {
        block_break(out);
    }
    let indent = "  ".repeat(depth);
    let mut position = 0usize;
    for item in element.child_elements() {
        if item.value().name() != "li" {
            continue;
        }
        position += 1;
        line_break(out);
        out.push_str(&indent);
        if ordered {
            out.push_str(&format!("{position}. "));
        } else {
            out.push_str("- ");
        }
        render_children(item, out, depth + 1);
    }
    if depth == 0 {
        block_break(out);
    } else {
        line_break(out);
    }
}

fn push_text(out: &mut String, text: &str) {
    for ch in text.chars() {
        if ch.is_whitespace() {
            let skip = out.is_empty() || out.ends_with(char::is_whitespace);
            if !skip {
                out.push(' ');
            }
        } else {
            out.push(ch);
        }
    }
}

fn line_break(out: &mut String) {
    trim_trailing_spaces(out);
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

fn block_break(out: &mut String) {
    trim_trailing_spaces(out);
    if out.is_empty() {
        return;
    }
    let trailing = out.len() - out.trim_end_matches('\n').len();
    for _ in trailing..2 {
        out.push('\n');
    }
}

fn trim_trailing_spaces(out: &mut String) {
    let trimmed = out.trim_end_matches([' ', '\t']).len();
    out.truncate(trimmed);
}

fn normalize(raw: &str) -> String {
    let mut result = String::with_capacity(raw.len());
    let mut blank_run = 0usize;
    for line in raw.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        result.push_str(line);
        result.push('\n');
    }
    result.trim().to_string()
}
