//! Text helpers for Portuguese labels: accent folding and collation.

use std::cmp::Ordering;

/// Lower-cases `s` and strips the diacritics used in Portuguese and the
/// other Latin-1 languages, so `"Área Urbanizada"` folds to `"area urbanizada"`.
pub fn fold(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars().flat_map(char::to_lowercase) {
        out.push(strip_diacritic(c));
    }
    out
}

fn strip_diacritic(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'ç' => 'c',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ñ' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        _ => c,
    }
}

/// Orders labels the way a pt-BR collator does for the label sets used here:
/// accents and case are ignored at the first level, and only break ties.
pub fn collate_pt_br(a: &str, b: &str) -> Ordering {
    fold(a).cmp(&fold(b)).then_with(|| a.cmp(b))
}

/// Sorts `items` in place with [`collate_pt_br`].
pub fn sort_pt_br<S: AsRef<str>>(items: &mut [S]) {
    items.sort_by(|a, b| collate_pt_br(a.as_ref(), b.as_ref()));
}
