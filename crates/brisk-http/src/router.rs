//! Path trie router.
//!
//! One trie per HTTP method, keyed by `/`-delimited segments. A pattern
//! segment is one of:
//!
//! - a literal (`users`), matched exactly against the percent-decoded
//!   request segment;
//! - a parameterized segment (`{id}`, `user-{id}`, `{name}.{ext}`), matched by
//!   scanning for its fixed substrings in order and capturing what lies in
//!   between;
//! - a catch-all (`{filepath:*}`), allowed only as the last segment, capturing
//!   the rest of the path.
//!
//! At each level literal children are tried first, then parameterized
//! children in registration order, then the catch-all. A parameterized child
//! whose subtree fails to match is abandoned and the next sibling is tried.
//! Identical segments registered at the same level share one node.

use std::collections::HashMap;
use std::fmt;

use brisk_model::PathParams;
use http::Method;
use percent_encoding::percent_decode_str;

/// Pattern registration failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    /// `{` without `}` or the reverse.
    #[error("pattern {pattern:?}: unbalanced braces")]
    Unbalanced {
        /// Offending pattern.
        pattern: String,
    },
    /// A parameter name is empty or contains characters other than
    /// alphanumerics and `_`.
    #[error("pattern {pattern:?}: invalid parameter name {name:?}")]
    InvalidParam {
        /// Offending pattern.
        pattern: String,
        /// Offending name.
        name: String,
    },
    /// Two parameters with nothing between them can not be told apart.
    #[error("pattern {pattern:?}: adjacent parameters in one segment")]
    AdjacentParams {
        /// Offending pattern.
        pattern: String,
    },
    /// The same parameter name twice in one pattern.
    #[error("pattern {pattern:?}: duplicate parameter {name:?}")]
    DuplicateParam {
        /// Offending pattern.
        pattern: String,
        /// Repeated name.
        name: String,
    },
    /// A catch-all that is not a whole, final segment.
    #[error("pattern {pattern:?}: catch-all must be the whole last segment")]
    MisplacedCatchAll {
        /// Offending pattern.
        pattern: String,
    },
    /// The method already has a handler for this pattern.
    #[error("{method} {pattern} is already registered")]
    Duplicate {
        /// HTTP method.
        method: Method,
        /// Normalized pattern.
        pattern: String,
    },
}

/// One piece of a parameterized segment.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Fixed(String),
    Param(String),
}

/// A compiled pattern segment.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Exact(String),
    Params(Vec<Piece>),
    CatchAll(String),
}

impl Segment {
    fn compile(raw: &str, last: bool, pattern: &str) -> Result<Self, RouteError> {
        if !raw.contains(['{', '}']) {
            return Ok(Self::Exact(raw.to_owned()));
        }

        let mut pieces = Vec::new();
        let mut rest = raw;
        while !rest.is_empty() {
            match rest.find(['{', '}']) {
                Some(0) if rest.starts_with('{') => {
                    let Some(close) = rest.find('}') else {
                        return Err(RouteError::Unbalanced {
                            pattern: pattern.to_owned(),
                        });
                    };
                    let name = &rest[1..close];
                    if name.contains('{') {
                        return Err(RouteError::Unbalanced {
                            pattern: pattern.to_owned(),
                        });
                    }
                    if let Some(name) = name.strip_suffix(":*") {
                        if !last || close + 1 != rest.len() || !pieces.is_empty() {
                            return Err(RouteError::MisplacedCatchAll {
                                pattern: pattern.to_owned(),
                            });
                        }
                        check_name(name, pattern)?;
                        return Ok(Self::CatchAll(name.to_owned()));
                    }
                    check_name(name, pattern)?;
                    if matches!(pieces.last(), Some(Piece::Param(_))) {
                        return Err(RouteError::AdjacentParams {
                            pattern: pattern.to_owned(),
                        });
                    }
                    pieces.push(Piece::Param(name.to_owned()));
                    rest = &rest[close + 1..];
                }
                Some(idx) if rest.as_bytes()[idx] == b'{' => {
                    pieces.push(Piece::Fixed(rest[..idx].to_owned()));
                    rest = &rest[idx..];
                }
                Some(_) => {
                    return Err(RouteError::Unbalanced {
                        pattern: pattern.to_owned(),
                    });
                }
                None => {
                    pieces.push(Piece::Fixed(rest.to_owned()));
                    rest = "";
                }
            }
        }
        Ok(Self::Params(pieces))
    }

    fn param_names(&self) -> Vec<&str> {
        match self {
            Self::Exact(_) => Vec::new(),
            Self::CatchAll(name) => vec![name.as_str()],
            Self::Params(pieces) => pieces
                .iter()
                .filter_map(|p| match p {
                    Piece::Param(name) => Some(name.as_str()),
                    Piece::Fixed(_) => None,
                })
                .collect(),
        }
    }
}

fn check_name(name: &str, pattern: &str) -> Result<(), RouteError> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(RouteError::InvalidParam {
            pattern: pattern.to_owned(),
            name: name.to_owned(),
        });
    }
    Ok(())
}

/// Capture the parameters of `pieces` from `segment`, pushing them onto
/// `params`. Returns `false` (leaving partial captures behind) on mismatch.
fn capture(pieces: &[Piece], segment: &str, params: &mut PathParams) -> bool {
    let mut rest = segment;
    for (idx, piece) in pieces.iter().enumerate() {
        match piece {
            Piece::Fixed(fixed) => {
                let Some(after) = rest.strip_prefix(fixed.as_str()) else {
                    return false;
                };
                rest = after;
            }
            Piece::Param(name) => {
                let end = match pieces.get(idx + 1) {
                    Some(Piece::Fixed(next)) => match rest.find(next.as_str()) {
                        Some(end) => end,
                        None => return false,
                    },
                    _ => rest.len(),
                };
                if end == 0 {
                    return false;
                }
                params.push(name.as_str(), decode(&rest[..end]));
                rest = &rest[end..];
            }
        }
    }
    rest.is_empty()
}

fn decode(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

/// Split a path into its non-empty segments.
fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// A parsed route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Parse and normalize a pattern: a leading `/` is added, repeated and
    /// trailing slashes are dropped.
    pub fn parse(pattern: &str) -> Result<Self, RouteError> {
        let parts = segments(pattern);
        let raw = format!("/{}", parts.join("/"));
        let last = parts.len().saturating_sub(1);
        let segments = parts
            .iter()
            .enumerate()
            .map(|(idx, part)| Segment::compile(part, idx == last, &raw))
            .collect::<Result<Vec<_>, _>>()?;

        let mut seen: Vec<&str> = Vec::new();
        for name in segments.iter().flat_map(Segment::param_names) {
            if seen.contains(&name) {
                return Err(RouteError::DuplicateParam {
                    pattern: raw.clone(),
                    name: name.to_owned(),
                });
            }
            seen.push(name);
        }

        Ok(Self { raw, segments })
    }

    /// Pattern for everything under `prefix`, captured as `filepath`.
    pub fn prefix(prefix: &str) -> Result<Self, RouteError> {
        Self::parse(&format!("{}/{{filepath:*}}", prefix.trim_end_matches('/')))
    }

    /// The normalized pattern text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parameter names in pattern order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().flat_map(Segment::param_names)
    }

    /// Whether the pattern ends in a catch-all.
    #[must_use]
    pub fn is_prefix(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::CatchAll(_)))
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[derive(Debug)]
struct Node<T> {
    segment: Option<Segment>,
    value: Option<(String, T)>,
    children: Vec<Node<T>>,
}

impl<T> Node<T> {
    fn new(segment: Option<Segment>) -> Self {
        Self {
            segment,
            value: None,
            children: Vec::new(),
        }
    }

    fn find<'n>(&'n self, path: &[&str], params: &mut PathParams) -> Option<&'n Node<T>> {
        let Some((first, rest)) = path.split_first() else {
            return self.value.is_some().then_some(self);
        };

        let decoded = percent_decode_str(first).decode_utf8_lossy();
        for child in &self.children {
            if let Some(Segment::Exact(literal)) = &child.segment {
                if *literal == *decoded {
                    if let Some(found) = child.find(rest, params) {
                        return Some(found);
                    }
                }
            }
        }

        for child in &self.children {
            if let Some(Segment::Params(pieces)) = &child.segment {
                let mark = params.len();
                if capture(pieces, first, params) {
                    if let Some(found) = child.find(rest, params) {
                        return Some(found);
                    }
                }
                params.truncate(mark);
            }
        }

        self.children.iter().find_map(|child| match &child.segment {
            Some(Segment::CatchAll(name)) if child.value.is_some() => {
                params.push(name.as_str(), decode(&path.join("/")));
                Some(child)
            }
            _ => None,
        })
    }
}

/// Result of a successful lookup.
#[derive(Debug)]
pub struct Match<'r, T> {
    /// The registered value.
    pub value: &'r T,
    /// The normalized pattern that matched.
    pub pattern: &'r str,
    /// Captured, percent-decoded parameters.
    pub params: PathParams,
}

/// Method-aware path router.
#[derive(Debug)]
pub struct Router<T> {
    trees: HashMap<Method, Node<T>>,
}

impl<T> Default for Router<T> {
    fn default() -> Self {
        Self {
            trees: HashMap::new(),
        }
    }
}

impl<T> Router<T> {
    /// Create an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `value` for `method` and `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::Duplicate`] if the pattern already has a value
    /// for this method.
    pub fn insert(&mut self, method: Method, pattern: &PathPattern, value: T) -> Result<(), RouteError> {
        let mut node = self
            .trees
            .entry(method.clone())
            .or_insert_with(|| Node::new(None));

        for segment in &pattern.segments {
            let idx = match node
                .children
                .iter()
                .position(|c| c.segment.as_ref() == Some(segment))
            {
                Some(idx) => idx,
                None => {
                    node.children.push(Node::new(Some(segment.clone())));
                    node.children.len() - 1
                }
            };
            node = &mut node.children[idx];
        }

        if node.value.is_some() {
            return Err(RouteError::Duplicate {
                method,
                pattern: pattern.raw.clone(),
            });
        }
        node.value = Some((pattern.raw.clone(), value));
        Ok(())
    }

    /// Resolve `path` for `method`.
    #[must_use]
    pub fn resolve(&self, method: &Method, path: &str) -> Option<Match<'_, T>> {
        let root = self.trees.get(method)?;
        let parts = segments(path);
        let mut params = PathParams::new();
        let node = root.find(&parts, &mut params)?;
        let (pattern, value) = node.value.as_ref()?;
        Some(Match {
            value,
            pattern,
            params,
        })
    }
}
