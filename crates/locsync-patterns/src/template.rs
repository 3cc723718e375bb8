//! Path template parsing.
//!
//! A template is split on `/` into segments. A segment is either a globstar
//! (`**`, matching any number of whole path components) or a single component
//! broken into literal runs, opaque glob fragments and placeholder
//! occurrences. Parsing never touches the filesystem and never fails.

use locsync_core::LOCALE_PLACEHOLDER;

/// One piece of a path component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Literal(String),
    Placeholder,
    /// Wildcards, character classes, brace groups and extglobs, kept verbatim.
    Glob(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Globstar,
    Component(Vec<Part>),
}

impl Segment {
    pub fn placeholder_count(&self) -> usize {
        match self {
            Segment::Globstar => 0,
            Segment::Component(parts) => parts
                .iter()
                .map(|p| match p {
                    Part::Placeholder => 1,
                    Part::Glob(g) => g.matches(LOCALE_PLACEHOLDER).count(),
                    Part::Literal(_) => 0,
                })
                .sum(),
        }
    }

    pub fn is_literal(&self) -> bool {
        match self {
            Segment::Globstar => false,
            Segment::Component(parts) => parts.iter().all(|p| matches!(p, Part::Literal(_))),
        }
    }
}

/// Parsed form of one configured path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl PatternTemplate {
    pub fn parse(raw: &str) -> Self {
        let normalized = normalize_separators(raw);
        let segments = normalized
            .split('/')
            .filter(|c| !c.is_empty() && *c != ".")
            .map(|c| {
                if c == "**" {
                    Segment::Globstar
                } else {
                    Segment::Component(parse_component(c))
                }
            })
            .collect();
        Self {
            raw: normalized,
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn placeholder_count(&self) -> usize {
        self.segments.iter().map(Segment::placeholder_count).sum()
    }

    pub fn has_placeholder(&self) -> bool {
        self.placeholder_count() > 0
    }

    pub fn has_globstar(&self) -> bool {
        self.segments.iter().any(|s| matches!(s, Segment::Globstar))
    }

    /// Leading components that are plain literals; a filesystem walk can start there.
    pub fn literal_prefix(&self) -> Vec<String> {
        self.segments
            .iter()
            .take_while(|s| s.is_literal())
            .map(|s| match s {
                Segment::Component(parts) => parts
                    .iter()
                    .map(|p| match p {
                        Part::Literal(l) => l.as_str(),
                        _ => "",
                    })
                    .collect::<String>(),
                Segment::Globstar => String::new(),
            })
            .collect()
    }
}

impl std::fmt::Display for PatternTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Substitute every placeholder occurrence with `locale`, leaving glob syntax untouched.
pub fn expand(template: &str, locale: &str) -> String {
    normalize_separators(template).replace(LOCALE_PLACEHOLDER, locale)
}

pub(crate) fn normalize_separators(raw: &str) -> String {
    if cfg!(windows) {
        raw.replace('\\', "/")
    } else {
        raw.to_string()
    }
}

fn parse_component(component: &str) -> Vec<Part> {
    let chars: Vec<char> = component.chars().collect();
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    let flush = |literal: &mut String, parts: &mut Vec<Part>| {
        if !literal.is_empty() {
            parts.push(Part::Literal(std::mem::take(literal)));
        }
    };

    while i < chars.len() {
        if starts_with_placeholder(&chars, i) {
            flush(&mut literal, &mut parts);
            parts.push(Part::Placeholder);
            i += LOCALE_PLACEHOLDER.len();
            continue;
        }
        if chars[i] == '\\' && i + 1 < chars.len() {
            literal.push(chars[i + 1]);
            i += 2;
            continue;
        }
        if let Some(end) = glob_construct_end(&chars, i) {
            flush(&mut literal, &mut parts);
            parts.push(Part::Glob(chars[i..end].iter().collect()));
            i = end;
            continue;
        }
        literal.push(chars[i]);
        i += 1;
    }
    flush(&mut literal, &mut parts);
    parts
}

pub(crate) fn starts_with_placeholder(chars: &[char], i: usize) -> bool {
    let token: Vec<char> = LOCALE_PLACEHOLDER.chars().collect();
    chars.len() >= i + token.len() && chars[i..i + token.len()] == token[..]
}

/// Exclusive end index of the glob construct starting at `i`, if any.
pub(crate) fn glob_construct_end(chars: &[char], i: usize) -> Option<usize> {
    let c = chars[i];
    if matches!(c, '@' | '!' | '+' | '*' | '?') && chars.get(i + 1) == Some(&'(') {
        if let Some(close) = find_close(chars, i + 1, '(', ')') {
            return Some(close + 1);
        }
    }
    match c {
        '*' => {
            let mut end = i + 1;
            while chars.get(end) == Some(&'*') {
                end += 1;
            }
            Some(end)
        }
        '?' => Some(i + 1),
        '[' => class_end(chars, i).map(|close| close + 1),
        '{' => find_close(chars, i, '{', '}').map(|close| close + 1),
        _ => None,
    }
}

/// Index of the bracket closing the one at `open`, honoring nesting of the same pair.
pub(crate) fn find_close(chars: &[char], open: usize, lhs: char, rhs: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' {
            i += 2;
            continue;
        }
        if c == lhs {
            depth += 1;
        } else if c == rhs {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

/// Index of the `]` closing a character class opened at `open`.
pub(crate) fn class_end(chars: &[char], open: usize) -> Option<usize> {
    let mut i = open + 1;
    if matches!(chars.get(i), Some('!') | Some('^')) {
        i += 1;
    }
    // a leading `]` is a member, not the terminator
    if chars.get(i) == Some(&']') {
        i += 1;
    }
    while i < chars.len() {
        if chars[i] == ']' {
            return Some(i);
        }
        i += 1;
    }
    None
}
