//! Indented HTML serializer.
//!
//! One node per line, one space of indent per nesting level. Text is
//! whitespace-collapsed and re-escaped; `<script>`/`<style>` bodies are
//! emitted verbatim (trimmed).

use scraper::{ElementRef, Html, Node};

const VOID: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

const RAW_TEXT: &[&str] = &["script", "style"];

/// Re-serialize a document with one node per line.
pub fn prettify(markup: &str) -> String {
    let document = Html::parse_document(markup);
    let mut out = String::with_capacity(markup.len() + markup.len() / 4);

    for child in document.tree.root().children() {
        match child.value() {
            Node::Doctype(doctype) => push_line(&mut out, 0, &format!("<!DOCTYPE {}>", doctype.name())),
            Node::Comment(comment) => push_line(&mut out, 0, &format!("<!--{}-->", &**comment)),
            Node::Element(_) => {
                if let Some(el) = ElementRef::wrap(child) {
                    write_element(el, 0, &mut out);
                }
            }
            _ => {}
        }
    }
    out
}

fn write_element(el: ElementRef<'_>, depth: usize, out: &mut String) {
    let name = el.value().name();
    let mut open = format!("<{name}");
    for (attr, value) in el.value().attrs() {
        open.push(' ');
        open.push_str(attr);
        open.push_str("=\"");
        open.push_str(&escape(value, true));
        open.push('"');
    }
    open.push('>');
    push_line(out, depth, &open);

    if VOID.contains(&name) {
        return;
    }

    let raw = RAW_TEXT.contains(&name);
    for child in el.children() {
        match child.value() {
            Node::Element(_) => {
                if let Some(c) = ElementRef::wrap(child) {
                    write_element(c, depth + 1, out);
                }
            }
            Node::Text(text) if raw => {
                let body = text.trim();
                if !body.is_empty() {
                    push_line(out, depth + 1, body);
                }
            }
            Node::Text(text) => {
                let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
                if !flat.is_empty() {
                    push_line(out, depth + 1, &escape(&flat, false));
                }
            }
            Node::Comment(comment) => {
                push_line(out, depth + 1, &format!("<!--{}-->", &**comment));
            }
            _ => {}
        }
    }

    push_line(out, depth, &format!("</{name}>"));
}

fn push_line(out: &mut String, depth: usize, line: &str) {
    for _ in 0..depth {
        out.push(' ');
    }
    out.push_str(line);
    out.push('\n');
}

fn escape(raw: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}
