//! Text normalizer (C1).
//!
//! Pure, restartable, and deterministic: lowercase, strip diacritics,
//! split on the separator class, drop empties, then augment with
//! currency/region tokens. No IO of any kind lives here.

/// Characters that split tokens. Alphanumerics, `+`, `$`, `£`, `€` are
/// deliberately NOT separators — this preserves tokens like `c++` and
/// currency glyphs.
fn is_separator(c: char) -> bool {
    if c.is_whitespace() {
        return true;
    }
    matches!(
        c,
        '/' | '\\'
            | '-'
            | '_'
            | '('
            | ')'
            | '['
            | ']'
            | '{'
            | '}'
            | ','
            | ';'
            | '.'
            | ':'
            | '!'
            | '?'
            | '\''
            | '"'
            | '\u{2018}' // left single quote
            | '\u{2019}' // right single quote
            | '\u{201C}' // left double quote
            | '\u{201D}' // right double quote
            | '|'
    )
}

/// Strip combining diacritical marks via a hand-rolled canonical
/// decomposition of the Latin-1 Supplement and Latin Extended-A letters
/// that realistically occur in job postings and catalog aliases
/// (accented Spanish/French/Portuguese/German letters). This keeps the
/// normalizer dependency-free rather than pulling in a full Unicode
/// normalization crate for a narrow, bounded alphabet.
fn strip_diacritics(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' => 'a',
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' => 'e',
        'ì' | 'í' | 'î' | 'ï' | 'ī' | 'į' => 'i',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' => 'o',
        'ù' | 'ú' | 'û' | 'ü' | 'ū' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        'ý' | 'ÿ' => 'y',
        'ß' => 's',
        other => other,
    }
}

/// Token augmentation performed after the base split, in the order
/// the spec lists. Returns any extra tokens that should be inserted
/// immediately after the token they were derived from.
fn augmented_for(token: &str) -> Vec<String> {
    let mut extra = Vec::new();
    if token.contains('$') {
        extra.push("usd".to_string());
    }
    if token.contains('£') {
        extra.push("gbp".to_string());
    }
    if token.contains('€') {
        extra.push("eur".to_string());
    }
    if token == "eeuu" {
        extra.push("us".to_string());
        extra.push("usa".to_string());
    }
    if token == "latinoamerica" {
        extra.push("latam".to_string());
    }
    extra
}

/// Normalize free text into an ordered token sequence. Pure function,
/// no allocation beyond the returned `Vec`, restartable (same input
/// always yields the same output).
pub fn normalize_to_tokens(input: &str) -> Vec<String> {
    let lowered: String = input
        .chars()
        .flat_map(|c| c.to_lowercase())
        .map(strip_diacritics)
        .collect();

    let base: Vec<String> = lowered
        .split(is_separator)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect();

    let mut out = Vec::with_capacity(base.len());
    let mut i = 0;
    while i < base.len() {
        let tok = &base[i];
        out.push(tok.clone());
        out.extend(augmented_for(tok));

        // Consecutive two-token patterns: "u,s" -> us/usa, "u,k" -> uk.
        if i + 1 < base.len() {
            let pair = (tok.as_str(), base[i + 1].as_str());
            if pair == ("u", "s") {
                out.push(base[i + 1].clone());
                out.push("us".to_string());
                out.push("usa".to_string());
                i += 2;
                continue;
            }
            if pair == ("u", "k") {
                out.push(base[i + 1].clone());
                out.push("uk".to_string());
                i += 2;
                continue;
            }
        }
        i += 1;
    }
    out
}
