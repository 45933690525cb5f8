//! Ordered regex rewriting of text documents
//!
//! A [`TextPatcher`] holds an ordered list of [`RewriteRule`]s. Rules run
//! strictly in declaration order against one owned buffer, so a rule may
//! depend on text produced by an earlier one. A rule that matches nothing is
//! a no-op and is reported with a zero count in the [`PatchOutcome`].

use std::borrow::Cow;
use std::fmt;

use regex::{Captures, NoExpand, Regex};

use crate::error::PatchError;

/// Replacement function for rules that need to inspect the match
pub type RewriteFn = Box<dyn Fn(&Captures<'_>) -> String + Send + Sync>;

/// How a match is rewritten
pub enum Rewrite {
    /// Insert this text verbatim; `$` has no special meaning
    Literal(String),
    /// Expand `${0}`, `${1}`... group references in this template
    Template(String),
    /// Compute the replacement from the captures
    With(RewriteFn),
}

impl fmt::Debug for Rewrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rewrite::Literal(s) => f.debug_tuple("Literal").field(s).finish(),
            Rewrite::Template(s) => f.debug_tuple("Template").field(s).finish(),
            Rewrite::With(_) => f.write_str("With(<fn>)"),
        }
    }
}

/// One (pattern, rewrite) pair
#[derive(Debug)]
pub struct RewriteRule {
    name: String,
    pattern: Regex,
    rewrite: Rewrite,
}

impl RewriteRule {
    /// Compile a rule
    pub fn new(name: &str, pattern: &str, rewrite: Rewrite) -> Result<Self, PatchError> {
        let pattern = Regex::new(pattern).map_err(|e| PatchError::InvalidPattern {
            rule: name.to_string(),
            error: e.to_string(),
        })?;

        Ok(Self {
            name: name.to_string(),
            pattern,
            rewrite,
        })
    }

    /// Rule replacing every match with fixed text
    pub fn literal(name: &str, pattern: &str, replacement: &str) -> Result<Self, PatchError> {
        Self::new(name, pattern, Rewrite::Literal(replacement.to_string()))
    }

    /// Rule name used in logs and reports
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source text of the pattern
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Apply to `text`, returning the rewritten text and the match count
    pub fn apply<'t>(&self, text: &'t str) -> (Cow<'t, str>, usize) {
        let matches = self.pattern.find_iter(text).count();
        if matches == 0 {
            return (Cow::Borrowed(text), 0);
        }

        let rewritten = match &self.rewrite {
            Rewrite::Literal(s) => self.pattern.replace_all(text, NoExpand(s.as_str())),
            Rewrite::Template(s) => self.pattern.replace_all(text, s.as_str()),
            Rewrite::With(f) => self.pattern.replace_all(text, |caps: &Captures<'_>| f(caps)),
        };

        (rewritten, matches)
    }
}

/// Match count of one rule within a patch run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleReport {
    pub rule: String,
    pub matches: usize,
}

/// Result of running a [`TextPatcher`]
#[derive(Debug, Clone)]
pub struct PatchOutcome {
    /// Document before any rule ran
    pub original: String,
    /// Document after every rule ran
    pub patched: String,
    /// Per-rule match counts, in application order
    pub reports: Vec<RuleReport>,
}

impl PatchOutcome {
    /// Whether the document changed at all
    pub fn changed(&self) -> bool {
        self.original != self.patched
    }

    /// Rules that found nothing to rewrite
    pub fn unmatched_rules(&self) -> Vec<&str> {
        self.reports
            .iter()
            .filter(|r| r.matches == 0)
            .map(|r| r.rule.as_str())
            .collect()
    }

    /// Line diff between the original and patched document
    pub fn diff(&self) -> String {
        line_diff(&self.original, &self.patched)
    }
}

/// Ordered list of rewrite rules
#[derive(Debug, Default)]
pub struct TextPatcher {
    rules: Vec<RewriteRule>,
}

impl TextPatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule; it runs after every rule already present
    #[must_use]
    pub fn rule(mut self, rule: RewriteRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Rules in application order
    pub fn rules(&self) -> &[RewriteRule] {
        &self.rules
    }

    /// Run every rule in order over `text`
    pub fn apply(&self, text: &str) -> PatchOutcome {
        let mut buffer = text.to_string();
        let mut reports = Vec::with_capacity(self.rules.len());

        for rule in &self.rules {
            let (rewritten, matches) = rule.apply(&buffer);
            if let Cow::Owned(s) = rewritten {
                buffer = s;
            }
            tracing::debug!("Rule '{}' matched {} time(s)", rule.name(), matches);
            reports.push(RuleReport {
                rule: rule.name().to_string(),
                matches,
            });
        }

        PatchOutcome {
            original: text.to_string(),
            patched: buffer,
            reports,
        }
    }

    /// Run every rule, failing if any of them matched nothing
    pub fn apply_strict(&self, text: &str, document: &str) -> Result<PatchOutcome, PatchError> {
        let outcome = self.apply(text);
        if let Some(rule) = outcome.unmatched_rules().first() {
            return Err(PatchError::RuleNotMatched {
                rule: (*rule).to_string(),
                document: document.to_string(),
            });
        }
        Ok(outcome)
    }
}

/// Largest LCS table `line_diff` builds for the changed region of a document
pub const MAX_DIFF_CELLS: usize = 4_000_000;

/// Line-oriented diff in `difflib.Differ` style
///
/// Unchanged lines are prefixed with two spaces, removed lines with `- ` and
/// added lines with `+ `. Lines keep their own terminators; a final line
/// without one gets a newline so every entry stands on its own line.
///
/// Only the region between the common leading and trailing lines is aligned.
/// If that region exceeds [`MAX_DIFF_CELLS`], it is shown as a block of
/// removals followed by a block of additions.
pub fn line_diff(old: &str, new: &str) -> String {
    let a: Vec<&str> = old.split_inclusive('\n').collect();
    let b: Vec<&str> = new.split_inclusive('\n').collect();

    let prefix = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();

    let (head, a_mid, tail) = (&a[..prefix], &a[prefix..a.len() - suffix], &a[a.len() - suffix..]);
    let b_mid = &b[prefix..b.len() - suffix];

    let mut out = String::new();
    let mut push = |marker: &str, line: &str| {
        out.push_str(marker);
        out.push_str(line);
        if !line.ends_with('\n') {
            out.push('\n');
        }
    };

    for &line in head {
        push("  ", line);
    }

    let cells = (a_mid.len() + 1).saturating_mul(b_mid.len() + 1);
    if cells > MAX_DIFF_CELLS {
        for &line in a_mid {
            push("- ", line);
        }
        for &line in b_mid {
            push("+ ", line);
        }
    } else {
        for (marker, line) in align(a_mid, b_mid) {
            push(marker, line);
        }
    }

    for &line in tail {
        push("  ", line);
    }

    out
}

/// LCS alignment of two line slices as `(marker, line)` pairs
fn align<'t>(a: &[&'t str], b: &[&'t str]) -> Vec<(&'static str, &'t str)> {
    // lcs[i][j] = length of the longest common subsequence of a[i..] and b[j..]
    let mut lcs = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for i in (0..a.len()).rev() {
        for j in (0..b.len()).rev() {
            lcs[i][j] = if a[i] == b[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut lines = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i] == b[j] {
            lines.push(("  ", a[i]));
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            lines.push(("- ", a[i]));
            i += 1;
        } else {
            lines.push(("+ ", b[j]));
            j += 1;
        }
    }
    lines.extend(a[i..].iter().map(|&line| ("- ", line)));
    lines.extend(b[j..].iter().map(|&line| ("+ ", line)));
    lines
}
