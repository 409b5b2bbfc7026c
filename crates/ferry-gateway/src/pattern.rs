//! URL path patterns
//!
//! A pattern is a small stack program compiled from a template such as
//! `/v1/auth-methods/{id}` or `/v1/auth-methods/{id}:change-state`.
//! Matching runs the program over the request's path segments; there is
//! no backtracking.

use percent_encoding::percent_decode_str;
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Opcode version understood by [`Pattern::new`]
pub const OPCODE_VERSION: i32 = 1;

/// Pattern opcodes. Each instruction is an `(opcode, operand)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum OpCode {
    /// Does nothing
    Nop = 0,
    /// Push the next segment, whatever it is
    Push = 1,
    /// Push the next segment if it equals the pool literal `operand`
    LitPush = 2,
    /// Push every remaining segment except the fixed tail, joined by `/`
    PushM = 3,
    /// Pop `operand` values, push them joined by `/`
    ConcatN = 4,
    /// Pop a value and capture it as pool variable `operand`
    Capture = 5,
}

impl OpCode {
    fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(OpCode::Nop),
            1 => Some(OpCode::Push),
            2 => Some(OpCode::LitPush),
            3 => Some(OpCode::PushM),
            4 => Some(OpCode::ConcatN),
            5 => Some(OpCode::Capture),
            _ => None,
        }
    }
}

/// Pattern construction errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("unsupported opcode version {0}")]
    InvalidVersion(i32),

    #[error("opcode list has odd length {0}")]
    OddOps(usize),

    #[error("unknown opcode {0}")]
    UnknownOpCode(i32),

    #[error("operand {operand} out of range for {op:?} (pool has {pool_len} entries)")]
    OperandOutOfRange {
        op: OpCode,
        operand: i32,
        pool_len: usize,
    },

    #[error("stack underflow at instruction {0}")]
    StackUnderflow(usize),

    #[error("more than one deep wildcard")]
    MultipleDeepWildcards,

    #[error("variable {0:?} appears more than once")]
    DuplicateVariable(String),

    #[error("malformed template {template:?}: {reason}")]
    MalformedTemplate { template: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Op {
    code: OpCode,
    operand: usize,
}

/// Captured path variables, in capture order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    params: Vec<(String, String)>,
}

impl PathParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// A compiled path pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    ops: Vec<Op>,
    pool: Vec<String>,
    vars: Vec<String>,
    /// Number of segments that must remain after a deep wildcard
    tail_len: usize,
    verb: String,
}

impl Pattern {
    /// Build a pattern from raw opcodes, validating the program.
    ///
    /// `ops` is a flat list of `(opcode, operand)` pairs; literal and
    /// variable operands index into `pool`.
    pub fn new(version: i32, ops: &[i32], pool: &[&str], verb: &str) -> Result<Self, PatternError> {
        if version != OPCODE_VERSION {
            return Err(PatternError::InvalidVersion(version));
        }
        if ops.len() % 2 != 0 {
            return Err(PatternError::OddOps(ops.len()));
        }

        let mut program = Vec::with_capacity(ops.len() / 2);
        let mut vars = Vec::new();
        let mut seen = HashSet::new();
        let mut depth = 0usize;
        let mut tail_len = 0usize;
        let mut deep_wildcard = false;

        for (i, pair) in ops.chunks_exact(2).enumerate() {
            let code = OpCode::from_i32(pair[0]).ok_or(PatternError::UnknownOpCode(pair[0]))?;
            let operand = pair[1];
            let pool_index = || -> Result<usize, PatternError> {
                usize::try_from(operand)
                    .ok()
                    .filter(|&idx| idx < pool.len())
                    .ok_or(PatternError::OperandOutOfRange {
                        op: code,
                        operand,
                        pool_len: pool.len(),
                    })
            };

            let operand = match code {
                OpCode::Nop => 0,
                OpCode::Push => {
                    if deep_wildcard {
                        tail_len += 1;
                    }
                    depth += 1;
                    0
                }
                OpCode::LitPush => {
                    if deep_wildcard {
                        tail_len += 1;
                    }
                    depth += 1;
                    pool_index()?
                }
                OpCode::PushM => {
                    if deep_wildcard {
                        return Err(PatternError::MultipleDeepWildcards);
                    }
                    deep_wildcard = true;
                    depth += 1;
                    0
                }
                OpCode::ConcatN => {
                    let n = usize::try_from(operand)
                        .ok()
                        .filter(|&n| n > 0)
                        .ok_or(PatternError::OperandOutOfRange {
                            op: code,
                            operand,
                            pool_len: pool.len(),
                        })?;
                    if depth < n {
                        return Err(PatternError::StackUnderflow(i));
                    }
                    depth = depth - n + 1;
                    n
                }
                OpCode::Capture => {
                    let idx = pool_index()?;
                    if depth == 0 {
                        return Err(PatternError::StackUnderflow(i));
                    }
                    depth -= 1;
                    let name = pool[idx].to_string();
                    if !seen.insert(name.clone()) {
                        return Err(PatternError::DuplicateVariable(name));
                    }
                    vars.push(name);
                    idx
                }
            };
            program.push(Op { code, operand });
        }

        Ok(Self {
            ops: program,
            pool: pool.iter().map(|s| s.to_string()).collect(),
            vars,
            tail_len,
            verb: verb.to_string(),
        })
    }

    /// Compile a path template.
    ///
    /// Supported syntax: literal segments, `*` (one segment), `**` (the
    /// rest of the path), `{var}`, `{var=sub/*/path}`, and an optional
    /// trailing `:verb`.
    pub fn parse(template: &str) -> Result<Self, PatternError> {
        let malformed = |reason: &str| PatternError::MalformedTemplate {
            template: template.to_string(),
            reason: reason.to_string(),
        };

        let path = template
            .strip_prefix('/')
            .ok_or_else(|| malformed("must start with '/'"))?;

        // A ':' outside braces in the last segment introduces the verb.
        let (path, verb) = match verb_split(path) {
            Some((_, "")) => return Err(malformed("empty verb")),
            Some((p, v)) => (p, v),
            None => (path, ""),
        };

        let mut compiler = Compiler::default();
        let mut rest = path;
        while !rest.is_empty() {
            if let Some(inner) = rest.strip_prefix('{') {
                let close = inner.find('}').ok_or_else(|| malformed("unclosed '{'"))?;
                let (name, sub) = match inner[..close].split_once('=') {
                    Some((name, sub)) => (name, sub),
                    None => (&inner[..close], "*"),
                };
                if !is_ident_path(name) {
                    return Err(malformed("invalid variable name"));
                }
                let pushed = sub
                    .split('/')
                    .map(|seg| compiler.segment(seg).map_err(|r| malformed(r)))
                    .collect::<Result<Vec<_>, _>>()?
                    .len();
                compiler.op(OpCode::ConcatN, pushed);
                let idx = compiler.intern(name);
                compiler.op(OpCode::Capture, idx);
                rest = &inner[close + 1..];
            } else {
                let end = rest.find('/').unwrap_or(rest.len());
                compiler.segment(&rest[..end]).map_err(|r| malformed(r))?;
                rest = &rest[end..];
            }

            rest = match rest.strip_prefix('/') {
                Some(next) if next.is_empty() => return Err(malformed("trailing '/'")),
                Some(next) => next,
                None if rest.is_empty() => rest,
                None => return Err(malformed("unexpected character after variable")),
            };
        }

        let pool: Vec<&str> = compiler.pool.iter().map(String::as_str).collect();
        Self::new(OPCODE_VERSION, &compiler.ops, &pool, verb)
    }

    /// The custom verb, or `""`
    pub fn verb(&self) -> &str {
        &self.verb
    }

    /// Variable names in capture order
    pub fn variables(&self) -> &[String] {
        &self.vars
    }

    /// The flat `(opcode, operand)` program
    pub fn ops(&self) -> Vec<i32> {
        self.ops
            .iter()
            .flat_map(|op| [op.code as i32, op.operand as i32])
            .collect()
    }

    pub fn pool(&self) -> &[String] {
        &self.pool
    }

    /// Match path segments (the path split on `/`, with the verb already
    /// split off the last segment).
    pub fn match_path(&self, components: &[&str], verb: &str) -> Option<PathParams> {
        if self.verb == verb {
            return self.run(components.to_vec());
        }
        if !self.verb.is_empty() {
            return None;
        }
        // A verb this pattern doesn't know is part of the last segment.
        let (last, head) = components.split_last()?;
        let joined = format!("{}:{}", last, verb);
        let mut segments = head.to_vec();
        segments.push(&joined);
        self.run(segments)
    }

    fn run(&self, components: Vec<&str>) -> Option<PathParams> {
        let total = components.len();
        let mut pos = 0usize;
        let mut stack: Vec<String> = Vec::new();
        let mut captured = Vec::with_capacity(self.vars.len());

        for op in &self.ops {
            match op.code {
                OpCode::Nop => {}
                OpCode::Push | OpCode::LitPush => {
                    let c = *components.get(pos)?;
                    if op.code == OpCode::LitPush {
                        if c != self.pool[op.operand] {
                            return None;
                        }
                        stack.push(c.to_string());
                    } else {
                        stack.push(unescape(c));
                    }
                    pos += 1;
                }
                OpCode::PushM => {
                    if total < pos + self.tail_len {
                        return None;
                    }
                    let end = total - self.tail_len;
                    let joined: Vec<String> = components[pos..end].iter().map(|c| unescape(c)).collect();
                    stack.push(joined.join("/"));
                    pos = end;
                }
                OpCode::ConcatN => {
                    let at = stack.len().checked_sub(op.operand)?;
                    let joined = stack.split_off(at).join("/");
                    stack.push(joined);
                }
                OpCode::Capture => {
                    let value = stack.pop()?;
                    captured.push((self.pool[op.operand].clone(), value));
                }
            }
        }

        if pos < total {
            return None;
        }
        Some(PathParams { params: captured })
    }
}

impl fmt::Display for Pattern {
    /// Renders the pattern back as a template
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut stack: Vec<String> = Vec::new();
        for op in &self.ops {
            match op.code {
                OpCode::Nop => {}
                OpCode::Push => stack.push("*".to_string()),
                OpCode::LitPush => stack.push(self.pool[op.operand].clone()),
                OpCode::PushM => stack.push("**".to_string()),
                OpCode::ConcatN => {
                    let at = stack.len().saturating_sub(op.operand);
                    let joined = stack.split_off(at).join("/");
                    stack.push(joined);
                }
                OpCode::Capture => {
                    let value = stack.pop().unwrap_or_default();
                    let name = &self.pool[op.operand];
                    if value == "*" {
                        stack.push(format!("{{{}}}", name));
                    } else {
                        stack.push(format!("{{{}={}}}", name, value));
                    }
                }
            }
        }
        write!(f, "/{}", stack.join("/"))?;
        if !self.verb.is_empty() {
            write!(f, ":{}", self.verb)?;
        }
        Ok(())
    }
}

#[derive(Default)]
struct Compiler {
    ops: Vec<i32>,
    pool: Vec<String>,
}

impl Compiler {
    fn op(&mut self, code: OpCode, operand: usize) {
        self.ops.push(code as i32);
        self.ops.push(operand as i32);
    }

    fn intern(&mut self, s: &str) -> usize {
        match self.pool.iter().position(|p| p == s) {
            Some(idx) => idx,
            None => {
                self.pool.push(s.to_string());
                self.pool.len() - 1
            }
        }
    }

    fn segment(&mut self, seg: &str) -> Result<(), &'static str> {
        match seg {
            "" => return Err("empty segment"),
            "*" => self.op(OpCode::Push, 0),
            "**" => self.op(OpCode::PushM, 0),
            lit if lit.contains(['{', '}', '*']) => return Err("wildcard or brace inside a literal"),
            lit => {
                let idx = self.intern(lit);
                self.op(OpCode::LitPush, idx);
            }
        }
        Ok(())
    }
}

/// Split `path` into (path, verb) at a ':' in the last segment that is
/// not inside braces.
fn verb_split(path: &str) -> Option<(&str, &str)> {
    let last_start = path.rfind('/').map_or(0, |i| i + 1);
    let close = path[last_start..].rfind('}').map_or(last_start, |i| last_start + i);
    let colon = path[close..].rfind(':')? + close;
    Some((&path[..colon], &path[colon + 1..]))
}

fn is_ident_path(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

fn unescape(segment: &str) -> String {
    percent_decode_str(segment).decode_utf8_lossy().into_owned()
}

/// Split a request path into segments and verb.
///
/// Returns `None` when the path is not absolute or its last segment begins
/// with ':'.
pub fn split_path(path: &str) -> Option<(Vec<&str>, &str)> {
    let path = path.strip_prefix('/')?;
    let mut components: Vec<&str> = path.split('/').collect();
    let last = components.len() - 1;
    let mut verb = "";
    if let Some(idx) = components[last].rfind(':') {
        if idx == 0 {
            return None;
        }
        let c = components[last];
        components[last] = &c[..idx];
        verb = &c[idx + 1..];
    }
    Some((components, verb))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &Pattern, path: &str) -> Option<PathParams> {
        let (components, verb) = split_path(path)?;
        pattern.match_path(&components, verb)
    }

    #[test]
    fn test_template_compiles_to_expected_program() {
        let p = Pattern::parse("/v1/auth-methods/{id}").unwrap();
        assert_eq!(p.ops(), vec![2, 0, 2, 1, 1, 0, 4, 1, 5, 2]);
        assert_eq!(p.pool(), &["v1", "auth-methods", "id"]);
        assert_eq!(p.verb(), "");

        let raw = Pattern::new(1, &[2, 0, 2, 1, 1, 0, 4, 1, 5, 2], &["v1", "auth-methods", "id"], "")
            .unwrap();
        assert_eq!(p, raw);
    }

    #[test]
    fn test_literal_segments_stay_on_the_stack() {
        let p = Pattern::new(1, &[2, 0, 2, 1], &["v1", "auth-methods"], "").unwrap();
        assert!(p.variables().is_empty());
        assert!(matches(&p, "/v1/auth-methods").unwrap().is_empty());

        let p = Pattern::parse("/v1/auth-methods/{id}:change-state").unwrap();
        assert_eq!(p.variables(), &["id".to_string()]);
        assert_eq!(p.verb(), "change-state");
    }

    #[test]
    fn test_capture_and_literals() {
        let p = Pattern::parse("/v1/auth-methods/{id}").unwrap();
        let params = matches(&p, "/v1/auth-methods/ampw_1234567890").unwrap();
        assert_eq!(params.get("id"), Some("ampw_1234567890"));

        assert!(matches(&p, "/v1/auth-methods").is_none());
        assert!(matches(&p, "/v1/auth-methods/a/b").is_none());
        assert!(matches(&p, "/v2/auth-methods/a").is_none());
    }

    #[test]
    fn test_capture_is_percent_decoded() {
        let p = Pattern::parse("/v1/auth-methods/{id}").unwrap();
        let params = matches(&p, "/v1/auth-methods/a%20b%2Fc").unwrap();
        assert_eq!(params.get("id"), Some("a b/c"));
    }

    #[test]
    fn test_verb() {
        let p = Pattern::parse("/v1/auth-methods/{id}:change-state").unwrap();
        assert_eq!(p.verb(), "change-state");
        assert_eq!(
            matches(&p, "/v1/auth-methods/amoidc_1:change-state")
                .unwrap()
                .get("id"),
            Some("amoidc_1")
        );
        assert!(matches(&p, "/v1/auth-methods/amoidc_1").is_none());
        assert!(matches(&p, "/v1/auth-methods/amoidc_1:authenticate").is_none());
    }

    #[test]
    fn test_unknown_verb_folds_into_last_segment() {
        let p = Pattern::parse("/v1/auth-methods/{id}").unwrap();
        let params = matches(&p, "/v1/auth-methods/a:b").unwrap();
        assert_eq!(params.get("id"), Some("a:b"));
    }

    #[test]
    fn test_deep_wildcard_keeps_tail() {
        let p = Pattern::parse("/v1/{name=files/**}/raw").unwrap();
        let params = matches(&p, "/v1/files/a/b/c/raw").unwrap();
        assert_eq!(params.get("name"), Some("files/a/b/c"));
        assert!(matches(&p, "/v1/files/a/b/c").is_none());
    }

    #[test]
    fn test_nested_resource() {
        let p = Pattern::parse("/v1/{parent=scopes/*}/auth-methods/{id}").unwrap();
        let params = matches(&p, "/v1/scopes/o_1/auth-methods/ampw_1").unwrap();
        assert_eq!(
            params.iter().collect::<Vec<_>>(),
            vec![("parent", "scopes/o_1"), ("id", "ampw_1")]
        );
    }

    #[test]
    fn test_display_round_trips_template() {
        for t in [
            "/v1/auth-methods",
            "/v1/auth-methods/{id}",
            "/v1/auth-methods/{id}:change-state",
            "/v1/{parent=scopes/*}/auth-methods",
        ] {
            assert_eq!(Pattern::parse(t).unwrap().to_string(), t);
        }
    }

    #[test]
    fn test_invalid_programs_rejected() {
        assert_eq!(Pattern::new(2, &[], &[], ""), Err(PatternError::InvalidVersion(2)));
        assert_eq!(Pattern::new(1, &[2], &["a"], ""), Err(PatternError::OddOps(1)));
        assert!(matches!(
            Pattern::new(1, &[2, 3], &["a"], ""),
            Err(PatternError::OperandOutOfRange { .. })
        ));
        assert_eq!(Pattern::new(1, &[5, 0], &["a"], ""), Err(PatternError::StackUnderflow(0)));
        assert_eq!(
            Pattern::new(1, &[3, 0, 3, 0, 4, 2], &[], ""),
            Err(PatternError::MultipleDeepWildcards)
        );
    }

    #[test]
    fn test_duplicate_variable_rejected() {
        assert_eq!(
            Pattern::parse("/v1/{id}/x/{id}"),
            Err(PatternError::DuplicateVariable("id".to_string()))
        );
    }

    #[test]
    fn test_malformed_templates() {
        for t in ["v1/x", "/v1//x", "/v1/x/", "/v1/{id", "/v1/a*b", "/v1/{}", "/v1/x:"] {
            assert!(
                matches!(Pattern::parse(t), Err(PatternError::MalformedTemplate { .. })),
                "{t}"
            );
        }
    }

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("/v1/a:verb"), Some((vec!["v1", "a"], "verb")));
        assert_eq!(split_path("/v1/:verb"), None);
        assert_eq!(split_path("v1"), None);
    }
}
