//! Cell cleaning for the sales export.
//!
//! The export is written by a system that stores accented Portuguese letters
//! in a codepage the file does not declare. Read as Windows-1252, a handful
//! of letters come out as stray symbols; `clean_text` maps each of them back
//! to a plain letter.

/// Mis-decoded characters and their replacements, applied in order.
/// The targets are pairwise disjoint, so no rule re-touches an earlier one.
const MOJIBAKE_REPAIRS: &[(char, char)] = &[
    ('¢', 'o'),
    ('€', 'e'),
    ('å', 'a'),
    ('\u{fffd}', 'i'),
];

/// Trim and repair a text cell.
pub fn clean_text(value: &str) -> String {
    let trimmed = value.trim();
    MOJIBAKE_REPAIRS
        .iter()
        .fold(trimmed.to_string(), |acc, (from, to)| {
            if acc.contains(*from) {
                acc.replace(*from, &to.to_string())
            } else {
                acc
            }
        })
}

/// Parse a number written with `.` thousands separators and a `,` decimal
/// separator ("1.234,56" -> 1234.56).
///
/// Never fails: blank or unparseable input yields 0. Trailing text after the
/// number is ignored ("1.234,56 €" -> 1234.56).
pub fn parse_locale_number(value: &str) -> f64 {
    let normalized = value.trim().replace('.', "").replace(',', ".");
    if normalized.is_empty() {
        return 0.0;
    }

    match leading_float(&normalized) {
        Some(n) if n.is_finite() => n,
        _ => 0.0,
    }
}

/// Same as `parse_locale_number`, for cells that may be missing altogether.
pub fn parse_locale_cell(value: Option<&str>) -> f64 {
    value.map(parse_locale_number).unwrap_or(0.0)
}

/// Longest prefix of `s` that reads as a decimal float literal.
fn leading_float(s: &str) -> Option<f64> {
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        end = frac_end;
    }

    if digits == 0 {
        return None;
    }

    // Exponent only counts when at least one digit follows it.
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse().ok()
}

/// Lookup key for a header label: lower-case, diacritics folded, and any run
/// of other characters collapsed into a single `_`.
///
/// "Nº cliente", "No_Cliente" and "no cliente" all become "no_cliente".
pub fn header_key(label: &str) -> String {
    let mut key = String::with_capacity(label.len());
    let mut pending_sep = false;

    for c in clean_text(label).chars().flat_map(char::to_lowercase) {
        let c = fold_diacritic(c);
        if c.is_ascii_alphanumeric() {
            if pending_sep && !key.is_empty() {
                key.push('_');
            }
            pending_sep = false;
            key.push(c);
        } else {
            pending_sep = true;
        }
    }

    key
}

fn fold_diacritic(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' | 'å' | 'ª' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' | 'º' | '°' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        other => other,
    }
}

/// First letter upper-case, the rest lower-case ("JAN" -> "Jan").
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
