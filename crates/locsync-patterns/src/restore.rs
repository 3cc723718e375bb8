use regex::Regex;

use locsync_core::LOCALE_PLACEHOLDER;

use crate::glob::{split_path, CompiledSegment, CompiledTemplate};
use crate::template::{normalize_separators, PatternTemplate};

/// Recover a placeholder-bearing path from a concrete file discovered for `locale`.
///
/// Only the locale-sized spans that line up with placeholder occurrences are
/// replaced; every other character of `concrete_path` is kept, so glob parts
/// of the template come back as the concrete names they matched.
pub fn restore(template: &str, concrete_path: &str, locale: &str) -> String {
    restore_parsed(&PatternTemplate::parse(template), concrete_path, locale)
}

pub fn restore_parsed(template: &PatternTemplate, concrete_path: &str, locale: &str) -> String {
    let normalized = normalize_separators(concrete_path);
    let anchor = leading_anchor(&normalized);
    let comps = split_path(&normalized);
    let mut out: Vec<String> = comps.iter().map(|c| c.to_string()).collect();

    let compiled = match CompiledTemplate::compile(template, Some(locale)) {
        Ok(c) => c,
        Err(err) => {
            tracing::warn!(event = "placeholder_restore_compile_failed", template = %template, error = %err);
            return format!("{anchor}{}", out.join("/"));
        }
    };

    match compiled.align(&comps) {
        Some(alignment) => {
            for (seg, idx) in compiled.segments().iter().zip(alignment) {
                let (CompiledSegment::Component { regex, placeholders }, Some(idx)) = (seg, idx) else {
                    continue;
                };
                if *placeholders > 0 {
                    if let Some(restored) = restore_component(regex, comps[idx]) {
                        out[idx] = restored;
                    }
                }
            }
        }
        None => {
            tracing::warn!(
                event = "placeholder_restore_fallback",
                template = %template,
                path = %normalized,
                "no alignment between template and path, mapping components one-to-one"
            );
            for (idx, seg) in compiled.segments().iter().enumerate().take(comps.len()) {
                let CompiledSegment::Component { regex, placeholders } = seg else {
                    continue;
                };
                if *placeholders == 0 {
                    continue;
                }
                if let Some(restored) = restore_component(regex, comps[idx]) {
                    out[idx] = restored;
                } else if comps[idx] == locale {
                    out[idx] = LOCALE_PLACEHOLDER.to_string();
                }
            }
        }
    }
    format!("{anchor}{}", out.join("/"))
}

/// Leading `/` and `./` runs that `split_path` drops.
fn leading_anchor(path: &str) -> &str {
    let mut end = 0;
    loop {
        let rest = &path[end..];
        if rest.starts_with("./") {
            end += 2;
        } else if rest.starts_with('/') {
            end += 1;
        } else {
            return &path[..end];
        }
    }
}

fn restore_component(regex: &Regex, component: &str) -> Option<String> {
    let caps = regex.captures(component)?;
    let mut spans: Vec<(usize, usize)> = caps
        .iter()
        .skip(1)
        .flatten()
        .map(|m| (m.start(), m.end()))
        .collect();
    spans.sort_unstable();

    let mut restored = String::with_capacity(component.len() + LOCALE_PLACEHOLDER.len());
    let mut last = 0;
    for (start, end) in spans {
        if start < last {
            continue;
        }
        restored.push_str(&component[last..start]);
        restored.push_str(LOCALE_PLACEHOLDER);
        last = end;
    }
    restored.push_str(&component[last..]);
    Some(restored)
}
