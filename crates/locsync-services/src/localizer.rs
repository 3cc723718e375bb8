use std::future::Future;

use locsync_core::KeyMap;

#[derive(Debug, Clone)]
pub struct LocalizeRequest {
    pub bucket_type: String,
    pub file: String,
    pub source_locale: String,
    pub target_locale: String,
    pub data: KeyMap,
}

#[derive(Debug, thiserror::Error)]
pub enum LocalizeError {
    #[error("localizer failed: {0}")]
    Backend(String),
    #[error("localizer returned no value for key `{0}`")]
    MissingKey(String),
}

/// Translation backend. Only success or failure of a call matters to the executor.
pub trait Localizer: Send + Sync + 'static {
    fn localize(&self, request: LocalizeRequest) -> impl Future<Output = Result<KeyMap, LocalizeError>> + Send;
}

/// Offline backend producing visibly transformed text, for trying a setup end to end.
#[derive(Debug, Clone, Copy, Default)]
pub struct PseudoLocalizer;

impl Localizer for PseudoLocalizer {
    async fn localize(&self, request: LocalizeRequest) -> Result<KeyMap, LocalizeError> {
        Ok(request
            .data
            .into_iter()
            .map(|(k, v)| (k, pseudo_localize(&v)))
            .collect())
    }
}

/// `Hello {name}` → `[Ĥéļļö {name}]`. Placeholders, printf specs and tags survive.
pub fn pseudo_localize(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut out = String::with_capacity(value.len() * 2 + 2);
    out.push('[');
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let protected_end = match c {
            '{' => chars[i..].iter().position(|&x| x == '}').map(|p| i + p + 1),
            '<' => chars[i..].iter().position(|&x| x == '>').map(|p| i + p + 1),
            '%' => printf_end(&chars, i),
            _ => None,
        };
        if let Some(end) = protected_end {
            out.extend(&chars[i..end]);
            i = end;
            continue;
        }
        out.push(accent(c));
        i += 1;
    }
    out.push(']');
    out
}

fn printf_end(chars: &[char], start: usize) -> Option<usize> {
    let mut i = start + 1;
    while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '$' || chars[i] == '.') {
        i += 1;
    }
    match chars.get(i) {
        Some('s' | 'd' | 'i' | 'f' | '@' | '%') => Some(i + 1),
        _ => None,
    }
}

fn accent(c: char) -> char {
    match c {
        'a' => 'á',
        'c' => 'ç',
        'e' => 'é',
        'g' => 'ĝ',
        'h' => 'ĥ',
        'i' => 'í',
        'l' => 'ļ',
        'n' => 'ñ',
        'o' => 'ö',
        's' => 'š',
        'u' => 'ü',
        'y' => 'ý',
        'z' => 'ž',
        'A' => 'Á',
        'C' => 'Ç',
        'E' => 'É',
        'G' => 'Ĝ',
        'H' => 'Ĥ',
        'I' => 'Í',
        'L' => 'Ļ',
        'N' => 'Ñ',
        'O' => 'Ö',
        'S' => 'Š',
        'U' => 'Ü',
        'Y' => 'Ý',
        'Z' => 'Ž',
        other => other,
    }
}
