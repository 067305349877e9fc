//! Host regex dialect.
//!
//! Filters are written in the host's delimited pattern syntax
//! (`/pattern/modifiers`) with `\1`, `$1` or `${1}` references in the
//! replacement. This module turns them into [`regex::Regex`] sources and
//! replacement templates.
//!
//! Modifiers:
//!
//! | Modifier | Effect |
//! |----------|--------|
//! | `i` `m` `s` `x` `U` | Inline flag of the same name |
//! | `A` | Match anchored at the start of the text |
//! | `D` | `$` matches only at the very end of the text |
//! | `u` | `\d` `\w` `\s` and `\b` follow Unicode |
//! | `S` `X` | Accepted, no effect |
//!
//! Without `m` or `D`, `$` also matches just before a final newline, and `\Z`
//! always does. The engine has no look-ahead, so such an anchor becomes a
//! hidden group that captures the newline; replacements put it back and group
//! references skip over it.
//!
//! Without `u`, `\d` `\w` `\s` and `\b` are ASCII-only. `\B` and
//! case-insensitive matching stay Unicode-aware in every mode.
//!
//! Look-around and backreferences inside the pattern are rejected by the
//! linear-time engine and surface as compilation errors. Inline flag groups
//! such as `(?m)` do not change how `$` is translated.

use std::borrow::Cow;
use std::fmt::Write as _;
use std::iter::Peekable;
use std::str::Chars;

use regex::{Captures, Regex};

use crate::models::Filter;
use crate::{Error, Result};

/// Characters the regex engine treats as meta when escaped.
const META: &str = r"\.+*?()|[]{}^$#&-~";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
struct Modifiers {
    case_insensitive: bool,
    multi_line: bool,
    dot_all: bool,
    extended: bool,
    ungreedy: bool,
    anchored: bool,
    dollar_end_only: bool,
    unicode: bool,
}

impl Modifiers {
    fn parse(modifiers: &str) -> std::result::Result<Self, String> {
        let mut parsed = Self::default();
        for m in modifiers.chars() {
            match m {
                'i' => parsed.case_insensitive = true,
                'm' => parsed.multi_line = true,
                's' => parsed.dot_all = true,
                'x' => parsed.extended = true,
                'U' => parsed.ungreedy = true,
                'A' => parsed.anchored = true,
                'D' => parsed.dollar_end_only = true,
                'u' => parsed.unicode = true,
                'S' | 'X' | ' ' | '\n' | '\r' => {},
                other => return Err(format!("unknown modifier '{other}'")),
            }
        }
        Ok(parsed)
    }

    fn inline_flags(self) -> String {
        [
            (self.case_insensitive, 'i'),
            (self.multi_line, 'm'),
            (self.dot_all, 's'),
            (self.extended, 'x'),
            (self.ungreedy, 'U'),
        ]
        .iter()
        .filter(|(on, _)| *on)
        .map(|(_, flag)| *flag)
        .collect()
    }
}

/// Splits `/body/mods` into body and modifiers.
fn split_delimited(pattern: &str) -> std::result::Result<(&str, &str), String> {
    let pattern = pattern.trim_start();
    let Some(open) = pattern.chars().next() else {
        return Err("empty regular expression".to_string());
    };
    if open.is_alphanumeric() || open == '\\' {
        return Err("delimiter must not be alphanumeric or backslash".to_string());
    }
    let close = match open {
        '(' => ')',
        '[' => ']',
        '{' => '}',
        '<' => '>',
        other => other,
    };

    let body_start = open.len_utf8();
    let mut depth = 1usize;
    let mut escaped = false;
    for (i, c) in pattern[body_start..].char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                let end = body_start + i;
                return Ok((&pattern[body_start..end], &pattern[end + close.len_utf8()..]));
            }
        } else if c == open && open != close {
            depth += 1;
        }
    }

    if open == close {
        Err(format!("no ending delimiter '{close}' found"))
    } else {
        Err(format!("no ending matching delimiter '{close}' found"))
    }
}

/// ASCII items of `\d` `\w` `\s` and their negations.
fn ascii_class(escaped: char) -> Option<(&'static str, bool)> {
    const DIGIT: &str = "0-9";
    const WORD: &str = "0-9A-Za-z_";
    const SPACE: &str = r"\t\n\x0B\x0C\r\x20";
    match escaped {
        'd' => Some((DIGIT, false)),
        'D' => Some((DIGIT, true)),
        'w' => Some((WORD, false)),
        'W' => Some((WORD, true)),
        's' => Some((SPACE, false)),
        'S' => Some((SPACE, true)),
        _ => None,
    }
}

fn translate_escape(
    escaped: char,
    in_class: bool,
    unicode: bool,
    chars: &mut Peekable<Chars<'_>>,
    out: &mut String,
) -> std::result::Result<(), String> {
    if let Some((items, negated)) = ascii_class(escaped).filter(|_| !unicode) {
        if in_class && !negated {
            out.push_str(items);
        } else {
            let _ = write!(out, "[{}{items}]", if negated { "^" } else { "" });
        }
        return Ok(());
    }

    match escaped {
        'b' if in_class => out.push_str(r"\x08"),
        'b' if !unicode => out.push_str(r"(?-u:\b)"),
        'h' if in_class => out.push_str(r"\t\p{Zs}"),
        'h' => out.push_str(r"[\t\p{Zs}]"),
        'H' if !in_class => out.push_str(r"[^\t\p{Zs}]"),
        'R' if !in_class => out.push_str(r"(?:\r\n|[\n\x0B\x0C\r\x{85}\x{2028}\x{2029}])"),
        'H' | 'R' => {
            return Err(format!(
                "\\{escaped} is not supported inside a character class"
            ));
        },
        'Z' => return Err("\\Z is not supported inside a character class".to_string()),
        'e' => out.push_str(r"\x1B"),
        'Q' => {
            let mut literal = String::new();
            while let Some(c) = chars.next() {
                if c == '\\' && chars.peek() == Some(&'E') {
                    chars.next();
                    break;
                }
                literal.push(c);
            }
            out.push_str(&regex::escape(&literal));
        },
        // stray \E ends nothing
        'E' => {},
        'G' | 'K' | 'C' | 'X' => return Err(format!("\\{escaped} is not supported")),
        c if c.is_ascii_punctuation() && !META.contains(c) => out.push(c),
        c => {
            out.push('\\');
            out.push(c);
        },
    }
    Ok(())
}

/// Translated pattern source with its group layout.
#[derive(Debug, Default)]
struct Translation {
    source: String,
    /// Engine index of each pattern group, by pattern group number minus one.
    groups: Vec<usize>,
    /// Hidden groups holding the newline an end anchor matched over.
    eol_groups: Vec<usize>,
}

impl Translation {
    fn next_index(&self) -> usize {
        self.groups.len() + self.eol_groups.len() + 1
    }

    fn open_group(&mut self) {
        let index = self.next_index();
        self.groups.push(index);
    }

    fn end_anchor(&mut self, out: &mut String) {
        let index = self.next_index();
        self.eol_groups.push(index);
        out.push_str(r"(\n?)\z");
    }

    /// Maps a group number written in the pattern to the engine's index.
    ///
    /// Numbers past the last pattern group land past the hidden groups too,
    /// so they still expand to nothing.
    fn group_index(&self, group: usize) -> usize {
        match group {
            0 => 0,
            n => self
                .groups
                .get(n - 1)
                .copied()
                .unwrap_or(n + self.eol_groups.len()),
        }
    }
}

/// Returns true if the `(` just consumed opens a capturing group.
fn opens_capture(rest: &Peekable<Chars<'_>>) -> bool {
    let mut ahead = rest.clone();
    match ahead.next() {
        Some('?') => match (ahead.next(), ahead.next()) {
            (Some('P'), Some('<')) | (Some('\''), _) => true,
            (Some('<'), Some(c)) => c != '=' && c != '!',
            _ => false,
        },
        Some('*') => false,
        _ => true,
    }
}

/// Rewrites escapes, anchors and character-class details that differ
/// between the dialects.
fn translate_body(body: &str, modifiers: Modifiers) -> std::result::Result<Translation, String> {
    let mut out = String::with_capacity(body.len() + 8);
    let mut translation = Translation::default();
    let mut chars = body.chars().peekable();
    let mut in_class = false;
    let mut class_start = false;

    while let Some(c) = chars.next() {
        let at_class_start = std::mem::take(&mut class_start);
        match c {
            '\\' => {
                let Some(escaped) = chars.next() else {
                    return Err("trailing backslash".to_string());
                };
                if escaped == 'Z' && !in_class {
                    translation.end_anchor(&mut out);
                } else {
                    let unicode = modifiers.unicode;
                    translate_escape(escaped, in_class, unicode, &mut chars, &mut out)?;
                }
            },
            '$' if !in_class => {
                if modifiers.multi_line {
                    out.push('$');
                } else if modifiers.dollar_end_only {
                    out.push_str(r"\z");
                } else {
                    translation.end_anchor(&mut out);
                }
            },
            '(' if !in_class => {
                out.push('(');
                if opens_capture(&chars) {
                    translation.open_group();
                }
            },
            '#' if !in_class && modifiers.extended => {
                out.push('#');
                for ch in chars.by_ref() {
                    out.push(ch);
                    if ch == '\n' {
                        break;
                    }
                }
            },
            '[' if !in_class => {
                out.push('[');
                in_class = true;
                if chars.peek() == Some(&'^') {
                    chars.next();
                    out.push('^');
                }
                class_start = true;
            },
            '[' if chars.peek() == Some(&':') => {
                // POSIX class, copied through ":]"
                out.push('[');
                let mut prev = '[';
                for ch in chars.by_ref() {
                    out.push(ch);
                    if ch == ']' && prev == ':' {
                        break;
                    }
                    prev = ch;
                }
            },
            '[' => out.push_str(r"\["),
            ']' if in_class && at_class_start => out.push_str(r"\]"),
            ']' if in_class => {
                out.push(']');
                in_class = false;
            },
            '&' | '~' if in_class => {
                out.push('\\');
                out.push(c);
            },
            '-' if in_class && chars.peek() == Some(&'-') => out.push_str(r"\-"),
            _ => out.push(c),
        }
    }

    if in_class {
        return Err("missing terminating ] for character class".to_string());
    }
    translation.source = out;
    Ok(translation)
}

fn translate(pattern: &str) -> std::result::Result<Translation, String> {
    let (body, modifiers) = split_delimited(pattern)?;
    let modifiers = Modifiers::parse(modifiers)?;
    let mut translation = translate_body(body, modifiers)?;

    let body = std::mem::take(&mut translation.source);
    let source = &mut translation.source;
    source.reserve(body.len() + 16);
    let flags = modifiers.inline_flags();
    if !flags.is_empty() {
        let _ = write!(source, "(?{flags})");
    }
    if modifiers.anchored {
        source.push_str(r"\A(?:");
        source.push_str(&body);
        // a trailing comment would swallow the closing parenthesis
        if modifiers.extended {
            source.push('\n');
        }
        source.push(')');
    } else {
        source.push_str(&body);
    }
    Ok(translation)
}

/// Translates a delimited host pattern into a [`regex`] source string.
///
/// # Errors
///
/// Returns a description of the problem when the delimiter is missing or
/// invalid, a modifier is unknown, or an escape has no equivalent.
pub fn translate_pattern(pattern: &str) -> std::result::Result<String, String> {
    translate(pattern).map(|translation| translation.source)
}

/// Parses a group reference at the start of `s` (`\N`, `$N` or `${N}`).
///
/// Returns the group number and the length consumed.
fn parse_group_reference(s: &str) -> Option<(u8, usize)> {
    let bytes = s.as_bytes();
    let braced = bytes.first() == Some(&b'$') && bytes.get(1) == Some(&b'{');
    let mut pos = if braced { 2 } else { 1 };

    let first = bytes.get(pos).filter(|b| b.is_ascii_digit())?;
    let mut group = first - b'0';
    pos += 1;
    if let Some(second) = bytes.get(pos).filter(|b| b.is_ascii_digit()) {
        group = group * 10 + (second - b'0');
        pos += 1;
    }
    if braced {
        if bytes.get(pos) != Some(&b'}') {
            return None;
        }
        pos += 1;
    }
    Some((group, pos))
}

/// Translates a host replacement string into a [`regex`] replacement template.
///
/// `\N`, `$N` and `${N}` (N up to 99) become group references. A backslash
/// escapes a following backslash or dollar sign. Every other character,
/// including a lone `$`, is literal.
#[must_use]
pub fn translate_replacement(replacement: &str) -> String {
    translate_replacement_with(replacement, |group| group)
}

/// Like [`translate_replacement`], renumbering each group reference through
/// `group_index`.
fn translate_replacement_with(replacement: &str, group_index: impl Fn(usize) -> usize) -> String {
    fn push_literal(out: &mut String, c: char) {
        if c == '$' {
            out.push_str("$$");
        } else {
            out.push(c);
        }
    }

    let mut out = String::with_capacity(replacement.len() + 4);
    let mut rest = replacement;
    let mut after_backslash = false;

    while let Some(c) = rest.chars().next() {
        if c == '\\' || c == '$' {
            if after_backslash {
                out.pop();
                push_literal(&mut out, c);
                rest = &rest[1..];
                after_backslash = false;
                continue;
            }
            if let Some((group, len)) = parse_group_reference(rest) {
                let _ = write!(out, "${{{}}}", group_index(usize::from(group)));
                rest = &rest[len..];
                continue;
            }
        }
        push_literal(&mut out, c);
        after_backslash = c == '\\';
        rest = &rest[c.len_utf8()..];
    }
    out
}

/// A filter ready to run.
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    id: i64,
    name: String,
    regex: Regex,
    replacement: String,
    eol_groups: Vec<usize>,
}

impl CompiledFilter {
    /// Compiles a stored filter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FilterCompilation`] naming the filter if its pattern
    /// cannot be translated or compiled.
    pub fn compile(filter: &Filter) -> Result<Self> {
        let compilation_error = |cause: String| Error::FilterCompilation {
            filter_id: filter.id,
            cause,
        };
        let translation = translate(&filter.regex).map_err(compilation_error)?;
        let regex =
            Regex::new(&translation.source).map_err(|e| compilation_error(e.to_string()))?;
        let replacement = translate_replacement_with(&filter.replacement, |group| {
            translation.group_index(group)
        });
        Ok(Self {
            id: filter.id,
            name: filter.name.clone(),
            regex,
            replacement,
            eol_groups: translation.eol_groups,
        })
    }

    /// Filter id.
    #[must_use]
    pub const fn id(&self) -> i64 {
        self.id
    }

    /// Filter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replaces every match in `text`.
    ///
    /// A final newline matched by an end anchor is kept after the
    /// replacement.
    #[must_use]
    pub fn replace_all<'t>(&self, text: &'t str) -> Cow<'t, str> {
        if self.eol_groups.is_empty() {
            return self.regex.replace_all(text, self.replacement.as_str());
        }
        self.regex.replace_all(text, |captures: &Captures<'_>| {
            let mut replaced = self.expand(captures);
            replaced.push_str(self.anchored_newline(captures));
            replaced
        })
    }

    /// The final newline an end anchor matched over, or `""`.
    fn anchored_newline<'t>(&self, captures: &Captures<'t>) -> &'t str {
        let whole_end = captures.get(0).map_or(0, |m| m.end());
        self.eol_groups
            .iter()
            .filter_map(|&index| captures.get(index))
            .find(|m| m.end() == whole_end && !m.is_empty())
            .map_or("", |m| m.as_str())
    }

    /// End of the match, not counting a final newline an end anchor matched
    /// over.
    #[must_use]
    pub fn match_end(&self, captures: &Captures<'_>) -> usize {
        let whole_end = captures.get(0).map_or(0, |m| m.end());
        whole_end - self.anchored_newline(captures).len()
    }

    /// First match starting at or after `start`, with its groups.
    #[must_use]
    pub fn captures_at<'t>(&self, text: &'t str, start: usize) -> Option<Captures<'t>> {
        self.regex.captures_at(text, start)
    }

    /// Expands the replacement against a match of this filter.
    #[must_use]
    pub fn expand(&self, captures: &Captures<'_>) -> String {
        let mut expanded = String::new();
        captures.expand(&self.replacement, &mut expanded);
        expanded
    }
}
