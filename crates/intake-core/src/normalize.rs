//! Token normalization for checkbox option matching
//!
//! The mapping table may spell an option as a UI label ("Ch. 7") while
//! the stored answer carries a database token ("ch_7"), or vice versa.
//! Both sides are normalized before comparison so punctuation and
//! apostrophe drift never loses a checkbox.

/// Normalize a label or token for comparison:
/// trim, lowercase, drop apostrophes (straight and curly), turn
/// dashes into underscores, expand `&` to "and", drop periods, then
/// collapse any remaining non-alphanumeric run to a single underscore.
pub fn normalize_token(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_sep = false;

    for c in s.trim().chars() {
        match c {
            '\'' | '\u{2019}' => {} // apostrophes vanish: Decedent's == Decedents
            '.' => {}
            '-' | '\u{2013}' | '\u{2014}' => pending_sep = true,
            '&' => {
                if !out.is_empty() {
                    pending_sep = true;
                }
                flush_sep(&mut out, &mut pending_sep);
                out.push_str("and");
            }
            c if c.is_ascii_alphanumeric() => {
                flush_sep(&mut out, &mut pending_sep);
                out.push(c.to_ascii_lowercase());
            }
            _ => pending_sep = true,
        }
    }

    out
}

fn flush_sep(out: &mut String, pending: &mut bool) {
    if *pending && !out.is_empty() {
        out.push('_');
    }
    *pending = false;
}

/// Exact-or-normalized string match used by the checkbox pass.
pub fn matches_option(answer: &str, option: &str) -> bool {
    answer == option || normalize_token(answer) == normalize_token(option)
}

/// Yes/no heuristic for checkboxes with no constant option value.
pub fn is_truthy_yes(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "yes" | "true" | "1" | "on" | "checked"
    )
}
