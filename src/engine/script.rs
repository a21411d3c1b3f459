//! Script binding - per-instance preprocessing of embedded `<script>` text.
//!
//! Templates are authored once and refer to props, state and refs by bare
//! name. Before a copy's script is handed to the [`ScriptHost`], every call to
//! one of [`BOUND_CALLS`] gets the instance id injected as its first argument:
//!
//! ```text
//! setState("count", getState("count") + 1)
//!   → setState("k3f2a9c01", "count", getState("k3f2a9c01", "count") + 1)
//! ref()   → ref("k3f2a9c01")
//! ```
//!
//! # Grammar
//!
//! A call site is an identifier from [`BOUND_CALLS`], not part of a longer
//! identifier, not preceded (ignoring whitespace) by `.`, followed by optional
//! whitespace and `(`. The id is inserted right after `(` as a double-quoted
//! string, followed by `, ` unless the argument list is empty. String
//! literals and comments are copied untouched, except that `${ ... }`
//! substitutions inside template literals are scanned as code.
//!
//! Declarations are not call sites: a name right after the `function`
//! keyword, and a method shorthand whose argument list is followed by `{`,
//! are left alone.

use super::Runtime;
use crate::dom::Document;
use crate::types::InstanceId;

/// Call forms bound to the current instance.
pub const BOUND_CALLS: &[&str] = &[
    "getProp", "setProp", "onProp", "getState", "setState", "onState", "ref",
];

// =============================================================================
// Script Host
// =============================================================================

/// Executes bound script text for an instance.
///
/// Called once per embedded `<script>`, in document order, after the
/// instance's content is in place. This is where a re-created script element
/// gets "run".
pub trait ScriptHost<D: Document> {
    fn execute(&self, runtime: &Runtime<D>, instance: &InstanceId, source: &str);
}

impl<D, F> ScriptHost<D> for F
where
    D: Document,
    F: Fn(&Runtime<D>, &InstanceId, &str),
{
    fn execute(&self, runtime: &Runtime<D>, instance: &InstanceId, source: &str) {
        self(runtime, instance, source)
    }
}

/// Default host: no interpreter, scripts are only logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingScriptHost;

impl<D: Document> ScriptHost<D> for TracingScriptHost {
    fn execute(&self, _runtime: &Runtime<D>, instance: &InstanceId, source: &str) {
        tracing::debug!(instance = %instance, bytes = source.len(), "script.skipped");
    }
}

// =============================================================================
// Rewrite
// =============================================================================

/// Bind every recognised call in `source` to `instance`.
pub fn bind_script(source: &str, instance: &InstanceId) -> String {
    let mut binder = Binder {
        src: source,
        pos: 0,
        out: String::with_capacity(source.len() + 64),
        id_literal: format!("\"{instance}\""),
        last_code: None,
    };
    binder.code(false);
    binder.out
}

struct Binder<'a> {
    src: &'a str,
    pos: usize,
    out: String,
    id_literal: String,
    /// Last non-whitespace character emitted as code.
    last_code: Option<char>,
}

impl<'a> Binder<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn copy(&mut self, len: usize) {
        let end = (self.pos + len).min(self.src.len());
        self.out.push_str(&self.src[self.pos..end]);
        self.pos = end;
    }

    /// Scan code. With `in_substitution`, stop after the `}` closing a
    /// template-literal substitution.
    fn code(&mut self, in_substitution: bool) {
        let mut depth = 0usize;

        while let Some(c) = self.rest().chars().next() {
            let rest = self.rest();
            if rest.starts_with("//") {
                let len = rest.find('\n').unwrap_or(rest.len());
                self.copy(len);
                continue;
            }
            if rest.starts_with("/*") {
                let len = rest.find("*/").map_or(rest.len(), |i| i + 2);
                self.copy(len);
                continue;
            }

            match c {
                '"' | '\'' => {
                    let len = quoted_len(rest, c);
                    self.copy(len);
                    self.last_code = Some(c);
                }
                '`' => {
                    self.template_literal();
                    self.last_code = Some('`');
                }
                '{' => {
                    depth += 1;
                    self.copy(1);
                    self.last_code = Some('{');
                }
                '}' => {
                    self.copy(1);
                    self.last_code = Some('}');
                    if depth == 0 {
                        if in_substitution {
                            return;
                        }
                    } else {
                        depth -= 1;
                    }
                }
                c if c.is_ascii_alphanumeric() || c == '_' || c == '$' => self.word(),
                c => {
                    self.copy(c.len_utf8());
                    if !c.is_whitespace() {
                        self.last_code = Some(c);
                    }
                }
            }
        }
    }

    fn word(&mut self) {
        let rest = self.rest();
        let len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '$'))
            .unwrap_or(rest.len());
        let word = &rest[..len];
        let member_access = self.last_code == Some('.');
        let bound = BOUND_CALLS.contains(&word) && !member_access && !self.after_function_keyword();

        self.copy(len);
        self.last_code = word.chars().last();
        if !bound {
            return;
        }

        let after = self.rest();
        let gap = after.len() - after.trim_start().len();
        if !after[gap..].starts_with('(') {
            return;
        }

        // Method shorthand `getProp(a) { ... }` is a declaration
        if opens_block_after_args(&after[gap + 1..]) {
            return;
        }

        // Keep the original spacing and the paren
        self.copy(gap + 1);
        let args = self.rest().trim_start();
        let literal = if args.starts_with(')') {
            self.id_literal.clone()
        } else {
            format!("{}, ", self.id_literal)
        };
        self.out.push_str(&literal);
        self.last_code = Some('(');
    }

    /// Was the last emitted code token the `function` keyword?
    fn after_function_keyword(&self) -> bool {
        let code = self.out.trim_end();
        code.strip_suffix("function").is_some_and(|before| {
            !before
                .chars()
                .next_back()
                .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        })
    }

    fn template_literal(&mut self) {
        self.copy(1);
        while let Some(c) = self.rest().chars().next() {
            let rest = self.rest();
            if rest.starts_with("${") {
                self.copy(2);
                self.code(true);
                continue;
            }
            match c {
                '\\' => {
                    let escaped = rest[1..].chars().next().map_or(0, char::len_utf8);
                    self.copy(1 + escaped);
                }
                '`' => {
                    self.copy(1);
                    return;
                }
                c => self.copy(c.len_utf8()),
            }
        }
    }
}

/// Given the text right after an opening `(`, does the matching `)` start a
/// `{` block?
fn opens_block_after_args(args: &str) -> bool {
    let mut depth = 1usize;
    let mut rest = args;
    while let Some(c) = rest.chars().next() {
        match c {
            '"' | '\'' | '`' => {
                rest = &rest[quoted_len(rest, c)..];
                continue;
            }
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return rest[1..].trim_start().starts_with('{');
                }
            }
            _ => {}
        }
        rest = &rest[c.len_utf8()..];
    }
    false
}

/// Byte length of the quoted literal at the start of `rest`, quotes included.
fn quoted_len(rest: &str, quote: char) -> usize {
    let mut escaped = false;
    for (i, c) in rest.char_indices().skip(1) {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote || c == '\n' {
            return i + c.len_utf8();
        }
    }
    rest.len()
}
