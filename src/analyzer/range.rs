//! npm version-range matching on top of the `semver` crate.
//!
//! The `semver` crate follows Cargo's range syntax, which differs from npm
//! in a few places: bare versions mean `^` in Cargo but exact in npm,
//! comparators are comma-separated instead of space-separated, and npm has
//! `||` alternatives and hyphen ranges. Specs are rewritten into Cargo syntax
//! one alternative at a time.
//!
//! Specs that do not name a registry range (`file:`, `git+…`, `npm:`
//! aliases, `owner/repo`, dist-tags) cannot be checked against an installed
//! version and are treated as satisfied.

use semver::{Version, VersionReq};

/// Whether an installed `version` satisfies an npm range `spec`.
pub fn satisfies(spec: &str, version: &str) -> bool {
    let spec = spec.trim();
    if is_any(spec) || !is_registry_range(spec) {
        return true;
    }

    let Ok(version) = Version::parse(strip_v(version.trim())) else {
        return false;
    };

    let mut parsed_any = false;
    for alternative in spec.split("||") {
        if let Some(req) = parse_alternative(alternative) {
            parsed_any = true;
            if req.matches(&version) {
                return true;
            }
        }
    }
    // A range we cannot read says nothing about the installed version.
    !parsed_any
}

fn is_any(spec: &str) -> bool {
    matches!(spec, "" | "*" | "x" | "X" | "latest")
}

fn is_registry_range(spec: &str) -> bool {
    if spec.contains(':') || spec.contains('/') {
        return false;
    }
    // Dist-tags such as `next` or `beta` start with a letter that is not a
    // wildcard or a `v` prefix.
    match spec.chars().next() {
        Some(c) if c.is_ascii_alphabetic() => matches!(c, 'x' | 'X' | 'v' | 'V'),
        _ => true,
    }
}

fn strip_v(version: &str) -> &str {
    version.trim_start_matches('=').trim_start_matches(['v', 'V'])
}

fn parse_alternative(alternative: &str) -> Option<VersionReq> {
    let alternative = alternative.trim();
    if is_any(alternative) {
        return Some(VersionReq::STAR);
    }

    let comparators: Vec<String> = match alternative.split_once(" - ") {
        Some((low, high)) => vec![
            format!(">={}", strip_v(low.trim())),
            format!("<={}", strip_v(high.trim())),
        ],
        None => join_operators(alternative)
            .into_iter()
            .map(|comparator| normalize(&comparator))
            .collect(),
    };

    VersionReq::parse(&comparators.join(", ")).ok()
}

/// Split on whitespace, re-attaching operators written apart from their
/// version (`>= 1.2.0`).
fn join_operators(alternative: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    let mut pending_op = String::new();
    for token in alternative.split_whitespace() {
        if token.chars().all(|c| matches!(c, '<' | '>' | '=' | '~' | '^')) {
            pending_op.push_str(token);
            continue;
        }
        tokens.push(format!("{pending_op}{token}"));
        pending_op.clear();
    }
    tokens
}

/// Rewrite one npm comparator into Cargo syntax.
fn normalize(comparator: &str) -> String {
    let split = comparator
        .find(|c: char| !matches!(c, '<' | '>' | '=' | '~' | '^'))
        .unwrap_or(comparator.len());
    let (op, version) = comparator.split_at(split);
    let version = strip_v(version);

    if !op.is_empty() && op != "=" {
        return format!("{op}{version}");
    }

    let core = version.split(['-', '+']).next().unwrap_or(version);
    let parts: Vec<&str> = core.split('.').collect();
    let wildcard = parts.iter().any(|part| matches!(*part, "x" | "X" | "*"));
    if wildcard {
        version.to_string()
    } else if parts.len() >= 3 {
        format!("={version}")
    } else {
        // npm reads `1.2` as `1.2.x`
        format!("~{version}")
    }
}
