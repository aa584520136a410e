//! A restricted regex-to-constraint translator.
//!
//! Full regular expression support would require compiling arbitrary ECMA-262
//! patterns into Z3's string/regex theory, which is both a large undertaking and an
//! explicit non-goal. Instead we recognize a small, hand-maintained table of
//! anchored and unanchored literal patterns — the overwhelming majority of
//! `pattern`/`patternProperties` values seen in real schemas (`"^v[0-9]"`-style
//! token prefixes excepted) — and reject everything else with
//! [`Error::UnsupportedFeature`] rather than silently over- or under-approximating.
use z3::ast::{Bool, String as Zstr};

use crate::error::Error;
use crate::theory::Theory;

/// A pattern that reduces to a literal string anchored at zero, one, or both ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RestrictedPattern {
    Exact(String),
    Prefix(String),
    Suffix(String),
    Contains(String),
}

const METACHARACTERS: &[char] = &['.', '*', '+', '?', '(', ')', '[', ']', '{', '}', '|'];

/// Parses `pattern` into a [`RestrictedPattern`], or reports it as unsupported.
pub(crate) fn parse(pattern: &str) -> Result<RestrictedPattern, Error> {
    let anchored_start = pattern.starts_with('^');
    let mut body = if anchored_start { &pattern[1..] } else { pattern };

    let anchored_end = body.ends_with('$') && !body.ends_with("\\$");
    if anchored_end {
        body = &body[..body.len() - 1];
    }

    let literal = unescape(body)?;

    Ok(match (anchored_start, anchored_end) {
        (true, true) => RestrictedPattern::Exact(literal),
        (true, false) => RestrictedPattern::Prefix(literal),
        (false, true) => RestrictedPattern::Suffix(literal),
        (false, false) => RestrictedPattern::Contains(literal),
    })
}

fn unescape(body: &str) -> Result<String, Error> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(escaped @ ('.' | '\\' | '-' | '/' | '^' | '$')) => out.push(escaped),
                Some(other) => {
                    return Err(Error::unsupported(format!(
                        "pattern escape '\\{other}' is outside the restricted literal subset"
                    )))
                }
                None => {
                    return Err(Error::unsupported(
                        "pattern ends with a dangling backslash",
                    ))
                }
            }
        } else if METACHARACTERS.contains(&c) {
            return Err(Error::unsupported(format!(
                "pattern metacharacter '{c}' is outside the restricted literal subset"
            )));
        } else {
            out.push(c);
        }
    }
    Ok(out)
}

/// Tests a concrete, known-at-compile-time candidate string against a restricted
/// pattern. Used to decide whether a universe key falls under a `patternProperties`
/// entry, where the key itself is a plain Rust string rather than a symbolic term.
pub(crate) fn matches(pattern: &RestrictedPattern, candidate: &str) -> bool {
    match pattern {
        RestrictedPattern::Exact(literal) => candidate == literal,
        RestrictedPattern::Prefix(literal) => candidate.starts_with(literal.as_str()),
        RestrictedPattern::Suffix(literal) => candidate.ends_with(literal.as_str()),
        RestrictedPattern::Contains(literal) => candidate.contains(literal.as_str()),
    }
}

/// Compiles a restricted pattern into a symbolic constraint over a Z3 string term.
pub(crate) fn to_constraint<'ctx>(
    pattern: &RestrictedPattern,
    term: &Zstr<'ctx>,
    theory: &Theory<'ctx>,
) -> Bool<'ctx> {
    match pattern {
        RestrictedPattern::Exact(literal) => term._eq(&theory.string_literal(literal)),
        RestrictedPattern::Prefix(literal) => theory.string_literal(literal).prefix(term),
        RestrictedPattern::Suffix(literal) => theory.string_literal(literal).suffix(term),
        RestrictedPattern::Contains(literal) => term.contains(&theory.string_literal(literal)),
    }
}
