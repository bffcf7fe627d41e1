//! Path glob compilation and blacklist/whitelist evaluation.
//!
//! Dialect:
//! - `*` matches within a single path segment (never crosses `/`)
//! - `?` matches one non-separator character, `[...]` a character class
//! - `**` as a whole segment matches zero or more segments
//! - `{a,b}` alternation is expanded before compilation (nesting allowed)
//!
//! Matching is case-sensitive unless the filter is compiled otherwise.

use apigate_core::error::{ApiGateError, Result};
use glob::{MatchOptions, Pattern};

/// Upper bound on patterns produced by `{...}` expansion of one expression.
const MAX_EXPANSIONS: usize = 256;

/// Characters that make a path an expression rather than a literal.
const GLOB_METACHARS: [char; 4] = ['*', '?', '[', '{'];

/// Whether `path` uses glob metasyntax.
pub fn has_glob_metasyntax(path: &str) -> bool {
    path.contains(GLOB_METACHARS)
}

/// Outcome of evaluating one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobVerdict {
    Included,
    Blacklisted,
    NotWhitelisted,
}

/// One configured expression and the patterns it expanded into.
#[derive(Debug, Clone)]
struct CompiledGlob {
    source: String,
    patterns: Vec<Pattern>,
}

impl CompiledGlob {
    fn compile(expr: &str) -> Result<Self> {
        let mut patterns = Vec::new();
        for alt in expand_alternatives(expr)? {
            let p = Pattern::new(&alt).map_err(|e| {
                ApiGateError::InvalidConfig(format!("invalid path glob {expr}: {e}"))
            })?;
            patterns.push(p);
        }
        Ok(Self {
            source: expr.to_string(),
            patterns,
        })
    }

    fn matches(&self, path: &str, opts: MatchOptions) -> bool {
        self.patterns.iter().any(|p| p.matches_with(path, opts))
    }
}

/// Compiled blacklist + whitelist pair. Blacklist always wins.
#[derive(Debug, Clone)]
pub struct GlobFilter {
    blacklist: Vec<CompiledGlob>,
    whitelist: Vec<CompiledGlob>,
    opts: MatchOptions,
}

impl GlobFilter {
    pub fn compile(
        blacklist: &[String],
        whitelist: &[String],
        case_sensitive: bool,
    ) -> Result<Self> {
        let blacklist = blacklist
            .iter()
            .map(|g| CompiledGlob::compile(g))
            .collect::<Result<Vec<_>>>()?;
        let whitelist = whitelist
            .iter()
            .map(|g| CompiledGlob::compile(g))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            blacklist,
            whitelist,
            opts: MatchOptions {
                case_sensitive,
                require_literal_separator: true,
                require_literal_leading_dot: false,
            },
        })
    }

    pub fn evaluate(&self, path: &str) -> GlobVerdict {
        if let Some(g) = self.blacklist.iter().find(|g| g.matches(path, self.opts)) {
            tracing::debug!(path, glob = %g.source, "path blacklisted");
            return GlobVerdict::Blacklisted;
        }

        // Empty whitelist is a no-op.
        if self.whitelist.is_empty() || self.whitelist.iter().any(|g| g.matches(path, self.opts)) {
            GlobVerdict::Included
        } else {
            GlobVerdict::NotWhitelisted
        }
    }

    pub fn includes(&self, path: &str) -> bool {
        self.evaluate(path) == GlobVerdict::Included
    }

    pub fn is_noop(&self) -> bool {
        self.blacklist.is_empty() && self.whitelist.is_empty()
    }
}

/// Expand `{a,b}` groups into the full list of alternatives.
///
/// `/home/{alice,bob}/*.{txt,log}` yields four patterns. Braces inside a
/// `[...]` class are literal.
pub fn expand_alternatives(expr: &str) -> Result<Vec<String>> {
    let Some((open, close)) = find_group(expr)? else {
        return Ok(vec![expr.to_string()]);
    };

    let prefix = &expr[..open];
    let body = &expr[open + 1..close];
    let suffix = &expr[close + 1..];

    let mut out = Vec::new();
    for choice in split_top_level(body) {
        for tail in expand_alternatives(&format!("{choice}{suffix}"))? {
            out.push(format!("{prefix}{tail}"));
            if out.len() > MAX_EXPANSIONS {
                return Err(ApiGateError::InvalidConfig(format!(
                    "path glob {expr} expands to more than {MAX_EXPANSIONS} patterns"
                )));
            }
        }
    }
    Ok(out)
}

/// Locate the first top-level `{...}` group (byte offsets of both braces).
fn find_group(expr: &str) -> Result<Option<(usize, usize)>> {
    let mut in_class = false;
    let mut depth = 0usize;
    let mut open = None;

    for (i, c) in expr.char_indices() {
        match c {
            '[' if !in_class => in_class = true,
            ']' if in_class => in_class = false,
            '{' if !in_class => {
                if depth == 0 {
                    open = Some(i);
                }
                depth += 1;
            }
            '}' if !in_class => {
                if depth == 0 {
                    return Err(unbalanced(expr));
                }
                depth -= 1;
                if depth == 0 {
                    if let Some(o) = open {
                        return Ok(Some((o, i)));
                    }
                }
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err(unbalanced(expr));
    }
    Ok(None)
}

fn split_top_level(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in body.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&body[start..]);
    parts
}

fn unbalanced(expr: &str) -> ApiGateError {
    ApiGateError::InvalidConfig(format!("unbalanced braces in path glob: {expr}"))
}
