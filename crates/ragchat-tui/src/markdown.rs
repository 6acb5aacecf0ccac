//! Minimal markdown to ratatui conversion for assistant replies.
//!
//! Handles what answers actually contain: headings, bullet and numbered
//! lists, fenced code blocks, inline code, **bold**, *italic* and links.

use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

pub fn render_markdown(text: &str) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let mut in_code_block = false;
    let code_style = Style::default().fg(Color::Green);

    for raw in text.lines() {
        let trimmed = raw.trim_start();
        if trimmed.starts_with("```") {
            in_code_block = !in_code_block;
            continue;
        }
        if in_code_block {
            lines.push(Line::from(Span::styled(format!("  {}", raw), code_style)));
            continue;
        }

        if let Some((level, heading)) = heading(trimmed) {
            let style = if level == 1 {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
            } else {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            };
            lines.push(Line::from(Span::styled(heading.to_string(), style)));
        } else if let Some(item) = trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix("* ")) {
            let indent = " ".repeat(raw.len() - trimmed.len());
            let mut spans = vec![Span::raw(format!("{}  • ", indent))];
            spans.extend(parse_inline(item));
            lines.push(Line::from(spans));
        } else if let Some((number, item)) = numbered_item(trimmed) {
            let mut spans = vec![Span::raw(format!("  {}. ", number))];
            spans.extend(parse_inline(item));
            lines.push(Line::from(spans));
        } else if trimmed.starts_with('>') {
            let quote = trimmed.trim_start_matches('>').trim_start();
            let mut spans = vec![Span::styled("│ ", Style::default().fg(Color::DarkGray))];
            spans.extend(
                parse_inline(quote)
                    .into_iter()
                    .map(|span| span.patch_style(Style::default().add_modifier(Modifier::ITALIC))),
            );
            lines.push(Line::from(spans));
        } else {
            lines.push(parse_markdown_line(raw));
        }
    }

    lines
}

fn heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if (1..=6).contains(&level) {
        line[level..].strip_prefix(' ').map(|rest| (level, rest.trim()))
    } else {
        None
    }
}

fn numbered_item(line: &str) -> Option<(&str, &str)> {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let rest = line[digits..].strip_prefix(". ")?;
    Some((&line[..digits], rest))
}

/// Parse a single line of inline markdown into styled spans
pub fn parse_markdown_line(text: &str) -> Line<'static> {
    let spans = parse_inline(text);
    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

fn parse_inline(text: &str) -> Vec<Span<'static>> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                // Consume the second *
                chars.next();
                let (inner, closed) = take_until(&mut chars, "**");
                if closed && !inner.is_empty() {
                    flush(&mut spans, &mut current_text);
                    spans.push(Span::styled(inner, Style::default().add_modifier(Modifier::BOLD)));
                } else {
                    // No closing **, treat as literal
                    current_text.push_str("**");
                    current_text.push_str(&inner);
                }
            }
            '*' if chars.peek().is_some_and(|next| !next.is_whitespace()) => {
                let (inner, closed) = take_until(&mut chars, "*");
                if closed && !inner.is_empty() {
                    flush(&mut spans, &mut current_text);
                    spans.push(Span::styled(inner, Style::default().add_modifier(Modifier::ITALIC)));
                } else {
                    current_text.push(c);
                    current_text.push_str(&inner);
                }
            }
            '`' => {
                let (inner, closed) = take_until(&mut chars, "`");
                if closed {
                    flush(&mut spans, &mut current_text);
                    spans.push(Span::styled(
                        inner,
                        Style::default().fg(Color::Green).bg(Color::Black),
                    ));
                } else {
                    current_text.push('`');
                    current_text.push_str(&inner);
                }
            }
            '[' => {
                let (label, closed) = take_until(&mut chars, "]");
                if closed && chars.peek() == Some(&'(') {
                    chars.next();
                    let (url, url_closed) = take_until(&mut chars, ")");
                    if url_closed {
                        flush(&mut spans, &mut current_text);
                        spans.push(Span::styled(
                            label,
                            Style::default().fg(Color::Blue).add_modifier(Modifier::UNDERLINED),
                        ));
                        spans.push(Span::styled(format!(" ({})", url), Style::default().fg(Color::DarkGray)));
                    } else {
                        current_text.push_str(&format!("[{}]({}", label, url));
                    }
                } else {
                    current_text.push('[');
                    current_text.push_str(&label);
                    if closed {
                        current_text.push(']');
                    }
                }
            }
            _ => current_text.push(c),
        }
    }

    flush(&mut spans, &mut current_text);
    spans
}

/// Collect characters until `delimiter`. Returns the text and whether the
/// delimiter was found.
fn take_until(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, delimiter: &str) -> (String, bool) {
    let mut delim = delimiter.chars();
    let first = delim.next().unwrap_or_default();
    let second = delim.next();
    let mut collected = String::new();

    while let Some(c) = chars.next() {
        if c == first {
            match second {
                None => return (collected, true),
                Some(s) if chars.peek() == Some(&s) => {
                    chars.next();
                    return (collected, true);
                }
                Some(_) => {}
            }
        }
        collected.push(c);
    }
    (collected, false)
}

fn flush(spans: &mut Vec<Span<'static>>, current: &mut String) {
    if !current.is_empty() {
        spans.push(Span::raw(std::mem::take(current)));
    }
}
