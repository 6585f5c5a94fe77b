//! Canonicalization of policy expressions for drift comparison.
//!
//! PostgreSQL re-renders a stored USING expression from its parse tree, so
//! the catalog text never matches compiler output byte-for-byte: casts get
//! added to string literals, every comparison gains parentheses, schema
//! qualifications appear. Rather than parse the catalog's dialect, both
//! sides of a comparison are pushed through the same rewrite set until a
//! fixpoint. Each rewrite only removes characters, so the loop terminates.

use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// `'x'::text`, `'x'::character varying(32)` and friends.
static STRING_CAST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"('(?:[^']|'')*')::[a-zA-Z_][a-zA-Z0-9_]*(?:\s+varying)?(?:\([0-9, ]+\))?")
        .unwrap()
});

/// Canonicalize an expression for comparison. `schema` is the schema under
/// comparison; its qualifications are stripped from table references. The
/// trailing `;` some catalog representations carry is ignored.
pub fn normalize_expression(expr: &str, schema: &str) -> String {
    let qualification =
        Regex::new(&format!(r"\b{}\.", regex::escape(schema))).expect("schema name is literal");

    let mut current = expr.trim().trim_end_matches(';').trim().to_string();
    loop {
        let next = rewrite(&current, &qualification);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn rewrite(expr: &str, qualification: &Regex) -> String {
    let mut s = WHITESPACE.replace_all(expr, " ").trim().to_string();
    s = STRING_CAST.replace_all(&s, "$1").into_owned();
    s = qualification.replace_all(&s, "").into_owned();
    s = strip_grouping_parens(&s);
    WHITESPACE.replace_all(&s, " ").trim().to_string()
}

/// Remove every parenthesis pair that merely groups, keeping pairs that
/// form a call argument list (opening paren directly after a word
/// character). Both sides of a comparison lose their grouping the same
/// way, so this overmatches safely. Quotes are respected; unbalanced
/// parens are left alone.
fn strip_grouping_parens(expr: &str) -> String {
    let chars: Vec<char> = expr.chars().collect();
    let mut remove = vec![false; chars.len()];
    let mut stack: Vec<(usize, bool)> = Vec::new();
    let mut in_string = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            if c == '\'' {
                in_string = false;
            }
            continue;
        }
        match c {
            '\'' => in_string = true,
            '(' => {
                let is_call =
                    i > 0 && (chars[i - 1].is_ascii_alphanumeric() || chars[i - 1] == '_');
                stack.push((i, !is_call));
            }
            ')' => {
                if let Some((open, grouping)) = stack.pop() {
                    if grouping {
                        remove[open] = true;
                        remove[i] = true;
                    }
                }
            }
            _ => {}
        }
    }

    chars
        .iter()
        .enumerate()
        .filter(|(i, _)| !remove[*i])
        .map(|(_, c)| *c)
        .collect()
}
