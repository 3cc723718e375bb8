//! Glob → regex translation and component-wise alignment.
//!
//! Each non-globstar segment compiles to one anchored regex over a single path
//! component. Every capture group in that regex is a placeholder occurrence;
//! all other grouping is non-capturing, so the capture spans tell exactly where
//! the locale sits inside a concrete component.

use regex::{Regex, RegexBuilder};

use crate::template::{class_end, find_close, starts_with_placeholder, Part, PatternTemplate, Segment};
use crate::PatternError;

/// Path matching folds case on platforms whose filesystems do.
pub fn case_insensitive_fs() -> bool {
    cfg!(any(windows, target_os = "macos"))
}

#[derive(Debug, Clone)]
pub enum CompiledSegment {
    Globstar,
    Component { regex: Regex, placeholders: usize },
}

/// A template compiled against one locale (or none), ready to match and align paths.
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    segments: Vec<CompiledSegment>,
}

impl CompiledTemplate {
    /// With `locale == None` a placeholder only matches the literal token text.
    pub fn compile(template: &PatternTemplate, locale: Option<&str>) -> Result<Self, PatternError> {
        let segments = template
            .segments()
            .iter()
            .map(|seg| match seg {
                Segment::Globstar => Ok(CompiledSegment::Globstar),
                Segment::Component(parts) => {
                    let regex = component_regex(parts, locale).map_err(|e| {
                        PatternError::InvalidPattern {
                            pattern: template.as_str().to_string(),
                            reason: e.to_string(),
                        }
                    })?;
                    Ok(CompiledSegment::Component {
                        regex,
                        placeholders: seg.placeholder_count(),
                    })
                }
            })
            .collect::<Result<Vec<_>, PatternError>>()?;
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[CompiledSegment] {
        &self.segments
    }

    pub fn matches(&self, components: &[&str]) -> bool {
        self.align(components).is_some()
    }

    pub fn matches_path(&self, rel_path: &str) -> bool {
        let comps = split_path(rel_path);
        self.matches(&comps)
    }

    /// Assign every segment a component index (`None` for globstars).
    ///
    /// Memoized search over `(segment, component)` states. A globstar tries to
    /// consume as few components as possible first, so when several alignments
    /// exist the earliest (shallowest) placement wins.
    pub fn align(&self, components: &[&str]) -> Option<Vec<Option<usize>>> {
        let rows = self.segments.len() + 1;
        let cols = components.len() + 1;
        let mut memo: Vec<Option<bool>> = vec![None; rows * cols];
        if !self.feasible(0, 0, components, &mut memo, cols) {
            return None;
        }

        let mut out = Vec::with_capacity(self.segments.len());
        let (mut si, mut pi) = (0usize, 0usize);
        while si < self.segments.len() {
            match &self.segments[si] {
                CompiledSegment::Globstar => {
                    let next = (pi..=components.len())
                        .find(|&p| self.feasible(si + 1, p, components, &mut memo, cols))?;
                    out.push(None);
                    pi = next;
                }
                CompiledSegment::Component { .. } => {
                    out.push(Some(pi));
                    pi += 1;
                }
            }
            si += 1;
        }
        Some(out)
    }

    fn feasible(
        &self,
        si: usize,
        pi: usize,
        comps: &[&str],
        memo: &mut [Option<bool>],
        cols: usize,
    ) -> bool {
        let key = si * cols + pi;
        if let Some(v) = memo[key] {
            return v;
        }
        let result = if si == self.segments.len() {
            pi == comps.len()
        } else {
            match &self.segments[si] {
                CompiledSegment::Globstar => {
                    (pi..=comps.len()).any(|p| self.feasible(si + 1, p, comps, memo, cols))
                }
                CompiledSegment::Component { regex, .. } => {
                    pi < comps.len()
                        && regex.is_match(comps[pi])
                        && self.feasible(si + 1, pi + 1, comps, memo, cols)
                }
            }
        };
        memo[key] = Some(result);
        result
    }
}

pub(crate) fn split_path(path: &str) -> Vec<&str> {
    path.split(['/', '\\'])
        .filter(|c| !c.is_empty() && *c != ".")
        .collect()
}

fn component_regex(parts: &[Part], locale: Option<&str>) -> Result<Regex, regex::Error> {
    let mut body = String::from("^(?:");
    for part in parts {
        match part {
            Part::Literal(l) => body.push_str(&regex::escape(l)),
            Part::Placeholder => push_placeholder(&mut body, locale),
            Part::Glob(g) => {
                let chars: Vec<char> = g.chars().collect();
                translate(&chars, locale, &mut body);
            }
        }
    }
    body.push_str(")$");
    RegexBuilder::new(&body)
        .case_insensitive(case_insensitive_fs())
        .build()
}

fn push_placeholder(out: &mut String, locale: Option<&str>) {
    out.push('(');
    match locale {
        Some(l) => out.push_str(&regex::escape(l)),
        None => out.push_str(&regex::escape(locsync_core::LOCALE_PLACEHOLDER)),
    }
    out.push(')');
}

/// Translate glob syntax into regex syntax scoped to one path component.
///
/// `!(...)` has no regex counterpart without look-around; it is approximated
/// as "any run of characters".
fn translate(src: &[char], locale: Option<&str>, out: &mut String) {
    let mut i = 0;
    while i < src.len() {
        if starts_with_placeholder(src, i) {
            push_placeholder(out, locale);
            i += locsync_core::LOCALE_PLACEHOLDER.len();
            continue;
        }
        let c = src[i];
        if matches!(c, '@' | '!' | '+' | '*' | '?') && src.get(i + 1) == Some(&'(') {
            if let Some(close) = find_close(src, i + 1, '(', ')') {
                let alts = split_top_level(&src[i + 2..close], '|');
                let body = alternatives(&alts, locale);
                match c {
                    '@' => out.push_str(&format!("(?:{body})")),
                    '?' => out.push_str(&format!("(?:{body})?")),
                    '*' => out.push_str(&format!("(?:{body})*")),
                    '+' => out.push_str(&format!("(?:{body})+")),
                    _ => out.push_str("[^/]*?"),
                }
                i = close + 1;
                continue;
            }
        }
        match c {
            '*' => {
                while src.get(i + 1) == Some(&'*') {
                    i += 1;
                }
                out.push_str("[^/]*?");
            }
            '?' => out.push_str("[^/]"),
            '[' => match class_end(src, i) {
                Some(close) => {
                    push_class(&src[i + 1..close], out);
                    i = close;
                }
                None => out.push_str(&regex::escape("[")),
            },
            '{' => match find_close(src, i, '{', '}') {
                Some(close) => {
                    let alts = split_top_level(&src[i + 1..close], ',');
                    if alts.len() > 1 {
                        out.push_str(&format!("(?:{})", alternatives(&alts, locale)));
                    } else {
                        // `{x}` without a comma is literal text in glob dialects
                        let text: String = src[i..=close].iter().collect();
                        out.push_str(&regex::escape(&text));
                    }
                    i = close;
                }
                None => out.push_str(&regex::escape("{")),
            },
            '\\' if i + 1 < src.len() => {
                i += 1;
                out.push_str(&regex::escape(&src[i].to_string()));
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
        i += 1;
    }
}

fn alternatives(alts: &[&[char]], locale: Option<&str>) -> String {
    alts.iter()
        .map(|alt| {
            let mut s = String::new();
            translate(alt, locale, &mut s);
            s
        })
        .collect::<Vec<_>>()
        .join("|")
}

fn push_class(inner: &[char], out: &mut String) {
    out.push('[');
    let mut rest = inner;
    if matches!(rest.first(), Some('!') | Some('^')) {
        out.push_str("^/");
        rest = &rest[1..];
    }
    for &ch in rest {
        if matches!(ch, '\\' | '[' | ']' | '^' | '&' | '~') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push(']');
}

/// Split on `sep` where it is not nested inside `()`, `{}` or `[]`.
fn split_top_level(src: &[char], sep: char) -> Vec<&[char]> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut i = 0;
    while i < src.len() {
        match src[i] {
            '\\' => {
                i += 2;
                continue;
            }
            '(' | '{' | '[' => depth += 1,
            ')' | '}' | ']' => depth -= 1,
            c if c == sep && depth == 0 => {
                out.push(&src[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    out.push(&src[start..]);
    out
}

/// Loose wildcard used for key and file filters: `*` spans any characters
/// (separators included), `?` is exactly one character, everything else is literal.
#[derive(Debug, Clone)]
pub struct WildcardGlob {
    raw: String,
    regex: Regex,
}

impl WildcardGlob {
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        let mut body = String::from("^");
        for ch in pattern.chars() {
            match ch {
                '*' => body.push_str(".*"),
                '?' => body.push('.'),
                other => body.push_str(&regex::escape(&other.to_string())),
            }
        }
        body.push('$');
        let regex = Regex::new(&body).map_err(|e| PatternError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            raw: pattern.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }

    /// Without wildcards a filter matches by substring.
    pub fn is_match_or_contains(&self, value: &str) -> bool {
        if self.raw.contains(['*', '?']) {
            self.is_match(value)
        } else {
            value.contains(self.raw.as_str())
        }
    }
}

pub fn any_match(globs: &[WildcardGlob], value: &str) -> bool {
    globs.iter().any(|g| g.is_match(value))
}
