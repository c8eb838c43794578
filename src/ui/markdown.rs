use std::sync::OnceLock;

use colored::*;
use regex::{Captures, Regex};

const RULE_WIDTH: usize = 40;

fn code_span() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"`[^`]+`").unwrap())
}

fn strong() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\*(.+?)\*\*|__(.+?)__").unwrap())
}

fn emphasis() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*([^*\s][^*]*?)\*|\b_([^_\s][^_]*?)_\b").unwrap())
}

fn bullet() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\s*)[-*+]\s+(.*)$").unwrap())
}

fn numbered() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\s*)(\d+)[.)]\s+(.*)$").unwrap())
}

/// Renders Markdown text as ANSI-styled terminal output.
pub fn render(text: &str) -> String {
    let mut lines = Vec::new();
    let mut in_code_block = false;

    for line in text.lines() {
        let trimmed = line.trim_start();

        if trimmed.starts_with("```") {
            in_code_block = !in_code_block;
            continue;
        }
        if in_code_block {
            lines.push(format!("    {}", line.cyan()));
            continue;
        }
        if is_rule(trimmed) {
            lines.push("─".repeat(RULE_WIDTH).dimmed().to_string());
            continue;
        }
        if let Some((level, title)) = heading(trimmed) {
            let title = inline(title);
            lines.push(if level == 1 {
                title.bold().underline().to_string()
            } else {
                title.bold().to_string()
            });
            continue;
        }
        if let Some(quoted) = trimmed.strip_prefix('>') {
            lines.push(format!("{} {}", "│".dimmed(), inline(quoted.trim_start()).italic()));
            continue;
        }
        if let Some(caps) = bullet().captures(line) {
            lines.push(format!("{}{} {}", &caps[1], "•".blue(), inline(&caps[2])));
            continue;
        }
        if let Some(caps) = numbered().captures(line) {
            lines.push(format!(
                "{}{} {}",
                &caps[1],
                format!("{}.", &caps[2]).blue(),
                inline(&caps[3])
            ));
            continue;
        }
        lines.push(inline(line));
    }

    lines.join("\n")
}

fn is_rule(line: &str) -> bool {
    let marks: Vec<char> = line.chars().filter(|c| !c.is_whitespace()).collect();
    marks.len() >= 3
        && matches!(marks[0], '*' | '-' | '_')
        && marks.iter().all(|c| *c == marks[0])
}

fn heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &line[level..];
    if rest.is_empty() {
        return Some((level, ""));
    }
    rest.strip_prefix(' ')
        .map(|title| (level, title.trim().trim_end_matches('#').trim_end()))
}

fn inline(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for span in code_span().find_iter(text) {
        out.push_str(&styled(&text[last..span.start()]));
        out.push_str(&text[span.start() + 1..span.end() - 1].yellow().to_string());
        last = span.end();
    }
    out.push_str(&styled(&text[last..]));
    out
}

fn styled(text: &str) -> String {
    let text = strong().replace_all(text, |caps: &Captures| {
        let inner = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
        inner.bold().to_string()
    });
    emphasis()
        .replace_all(&text, |caps: &Captures| {
            let inner = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
            inner.italic().to_string()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(text: &str) -> String {
        colored::control::set_override(false);
        render(text)
    }

    #[test]
    fn test_inline_markers_are_removed() {
        assert_eq!(
            plain("**Electron**: use `cargo` or *not*"),
            "Electron: use cargo or not"
        );
        assert_eq!(plain("__bold__ and _soft_"), "bold and soft");
    }

    #[test]
    fn test_code_span_is_not_styled_inside() {
        assert_eq!(plain("run `a ** b ** c` now"), "run a ** b ** c now");
    }

    #[test]
    fn test_snake_case_words_survive() {
        assert_eq!(plain("set api_key in settings"), "set api_key in settings");
    }

    #[test]
    fn test_headings_and_rules() {
        assert_eq!(plain("## Last 2 messages"), "Last 2 messages");
        assert_eq!(plain("# Title #"), "Title");
        assert_eq!(plain("***"), "─".repeat(RULE_WIDTH));
        assert_eq!(plain("#hashtag"), "#hashtag");
    }

    #[test]
    fn test_lists_and_quotes() {
        assert_eq!(
            plain("- one\n  * two\n3. three\n> quoted"),
            "• one\n  • two\n3. three\n│ quoted"
        );
    }

    #[test]
    fn test_code_block_is_indented_and_fences_dropped() {
        assert_eq!(
            plain("Try:\n```rust\nfn main() {}\n```\nDone"),
            "Try:\n    fn main() {}\nDone"
        );
    }
}
