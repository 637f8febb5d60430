//! Ordered "first success wins" evaluation.
//!
//! Selector lists, label lists and regex lists are all declared as data and
//! run through one of the two evaluators below.

use regex::Regex;
use std::future::Future;

/// Run `attempt` over `candidates` in order and return the first `Some`.
pub async fn first_success<C, T, F, Fut>(
    candidates: impl IntoIterator<Item = C>,
    mut attempt: F,
) -> Option<T>
where
    F: FnMut(C) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for candidate in candidates {
        if let Some(value) = attempt(candidate).await {
            return Some(value);
        }
    }
    None
}

/// One named regex and the capture group holding the value.
pub struct Pattern {
    pub name: &'static str,
    pub regex: Regex,
    pub group: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternHit {
    pub pattern: &'static str,
    pub value: String,
}

/// Regexes tried in priority order. Priority is by pattern, not by where in
/// the text a match occurs.
pub struct PatternChain {
    patterns: Vec<Pattern>,
}

impl PatternChain {
    /// Build from `(name, regex, group)` triples.
    ///
    /// # Panics
    /// On an invalid regex; chains are built from literals at startup.
    pub fn new(specs: &[(&'static str, &str, usize)]) -> Self {
        let patterns = specs
            .iter()
            .map(|&(name, source, group)| Pattern {
                name,
                regex: Regex::new(source)
                    .unwrap_or_else(|e| panic!("pattern {name} does not compile: {e}")),
                group,
            })
            .collect();
        Self { patterns }
    }

    pub fn find(&self, text: &str) -> Option<PatternHit> {
        self.hits(text).next()
    }

    /// First match of each pattern, in priority order. Lets callers reject a
    /// hit and fall through to the next pattern.
    pub fn hits<'a>(&'a self, text: &'a str) -> impl Iterator<Item = PatternHit> + 'a {
        self.patterns.iter().filter_map(move |p| {
            p.regex
                .captures(text)
                .and_then(|caps| caps.get(p.group))
                .map(|m| PatternHit {
                    pattern: p.name,
                    value: m.as_str().to_string(),
                })
        })
    }

    /// Like [`find`](Self::find), over several texts in order.
    pub fn find_in<'a>(&self, texts: impl IntoIterator<Item = &'a str>) -> Option<PatternHit> {
        texts.into_iter().find_map(|t| self.find(t))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
