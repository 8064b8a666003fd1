//! Output formats. Bodies are produced as markdown and converted last.
use cflow_core::ContentFormat;
use pulldown_cmark::{html, Event, Options, Parser, Tag, TagEnd};

pub fn to_format(markdown: &str, format: ContentFormat) -> String {
    match format {
        ContentFormat::Markdown => markdown.to_string(),
        ContentFormat::Plain => to_plain(markdown),
        ContentFormat::Html => to_html(markdown),
    }
}

fn options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options
}

/// Raw HTML in source text is rendered as escaped text, never passed through.
fn to_html(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, options()).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    finish(out)
}

/// Text projection: headings and paragraphs become blocks, list items keep
/// a dash, quotes are wrapped in double quotes.
fn to_plain(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len());
    let mut quote_depth = 0usize;

    for event in Parser::new_ext(markdown, options()) {
        match event {
            Event::Text(text) | Event::Code(text) | Event::Html(text) | Event::InlineHtml(text) => out.push_str(&text),
            Event::SoftBreak => out.push(' '),
            Event::HardBreak => out.push('\n'),
            Event::Start(Tag::BlockQuote { .. }) => {
                quote_depth += 1;
                out.push('"');
            }
            Event::End(TagEnd::BlockQuote { .. }) => {
                quote_depth = quote_depth.saturating_sub(1);
                trim_end(&mut out);
                out.push_str("\"\n\n");
            }
            Event::Start(Tag::Item) => out.push_str("- "),
            Event::End(TagEnd::Item) => out.push('\n'),
            Event::End(TagEnd::List(_)) => out.push('\n'),
            Event::End(TagEnd::Heading(_)) | Event::End(TagEnd::CodeBlock) => out.push_str("\n\n"),
            Event::End(TagEnd::Paragraph) if quote_depth == 0 => out.push_str("\n\n"),
            Event::End(TagEnd::Paragraph) => out.push(' '),
            Event::Rule => out.push_str("\n\n"),
            _ => {}
        }
    }
    finish(out)
}

fn trim_end(text: &mut String) {
    let len = text.trim_end().len();
    text.truncate(len);
}

fn finish(mut text: String) -> String {
    trim_end(&mut text);
    text.push('\n');
    text
}
