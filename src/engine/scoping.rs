//! Style scoping rewrite.
//!
//! Components that share the global style cascade would otherwise leak
//! reference-attribute selectors across kinds: two templates both styling
//! `[ref="title"]` would style each other's titles. For those components every
//! compound selector containing `[<ref-attr>=...]` is prefixed with the kind
//! name as a descendant combinator:
//!
//! ```text
//! [ref="title"] { color: red }         →  counter [ref="title"] { color: red }
//! .a, h1[ref=x] > b { }                →  .a, counter h1[ref=x] > b { }
//! ```
//!
//! The prefix goes at the start of the compound selector, i.e. right after
//! the previous whitespace, `,`, `{`, `}`, `;`, `>`, `+`, `~` or `(`.
//! CSS comments and quoted strings are copied untouched.

bitflags::bitflags! {
    /// Which embedded content is rewritten per instance.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ScopeRules: u8 {
        const NONE = 0;
        /// Prefix reference selectors in `<style>` with the kind name.
        const STYLES = 1 << 0;
        /// Inject the instance id into prop/state/ref calls in `<script>`.
        const SCRIPTS = 1 << 1;
    }
}

impl ScopeRules {
    /// Isolated components get their own cascade, so only scripts need binding.
    pub fn for_isolation(isolated: bool) -> Self {
        if isolated {
            Self::SCRIPTS
        } else {
            Self::SCRIPTS | Self::STYLES
        }
    }
}

fn is_selector_boundary(c: char) -> bool {
    c.is_whitespace() || matches!(c, ',' | '{' | '}' | ';' | '>' | '+' | '~' | '(')
}

/// Does `rest` (starting at `[`) open an equality selector on `attr`?
fn opens_ref_selector(rest: &str, attr: &str) -> bool {
    let inner = rest[1..].trim_start();
    let Some(after) = inner.strip_prefix(attr) else {
        return false;
    };
    after.trim_start().starts_with('=')
}

/// Prefix every `[attr=...]` compound selector in `css` with `kind`.
pub fn scope_styles(css: &str, kind: &str, attr: &str) -> String {
    let prefix = format!("{kind} ");
    let mut out = String::with_capacity(css.len() + 16);
    // Output offset where the current compound selector starts
    let mut compound_start = 0usize;
    let mut last_scoped: Option<usize> = None;
    let mut bracket_depth = 0usize;
    let mut rest = css;

    while let Some(c) = rest.chars().next() {
        if rest.starts_with("/*") {
            let end = rest.find("*/").map_or(rest.len(), |i| i + 2);
            out.push_str(&rest[..end]);
            rest = &rest[end..];
            if bracket_depth == 0 {
                compound_start = out.len();
            }
            continue;
        }

        if c == '"' || c == '\'' {
            let end = rest[1..].find(c).map_or(rest.len(), |i| i + 2);
            out.push_str(&rest[..end]);
            rest = &rest[end..];
            continue;
        }

        match c {
            '[' => {
                if bracket_depth == 0 && opens_ref_selector(rest, attr) && last_scoped != Some(compound_start) {
                    out.insert_str(compound_start, &prefix);
                    compound_start += prefix.len();
                    last_scoped = Some(compound_start);
                }
                bracket_depth += 1;
            }
            ']' => bracket_depth = bracket_depth.saturating_sub(1),
            _ => {}
        }

        out.push(c);
        rest = &rest[c.len_utf8()..];
        if bracket_depth == 0 && is_selector_boundary(c) {
            compound_start = out.len();
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_bare_ref_selector() {
        assert_eq!(
            scope_styles(r#"[ref="title"] { color: red }"#, "counter", "ref"),
            r#"counter [ref="title"] { color: red }"#
        );
    }

    #[test]
    fn test_compound_and_lists() {
        assert_eq!(
            scope_styles(".a, h1[ref=x] > b { }", "x-card", "ref"),
            ".a, x-card h1[ref=x] > b { }"
        );
        assert_eq!(
            scope_styles("[ref=a]{}\n[ref = 'b']:hover{}", "k", "ref"),
            "k [ref=a]{}\nk [ref = 'b']:hover{}"
        );
    }

    #[test]
    fn test_chained_ref_selectors_prefixed_once() {
        assert_eq!(scope_styles("p[ref=a][ref=b]{}", "k", "ref"), "k p[ref=a][ref=b]{}");
    }

    #[test]
    fn test_spaces_inside_attribute_values_are_not_boundaries() {
        assert_eq!(
            scope_styles(r#"p[title="a b"][ref=t]{}"#, "k", "ref"),
            r#"k p[title="a b"][ref=t]{}"#
        );
        assert_eq!(
            scope_styles("a[data-x = y][ref=t], b { }", "k", "ref"),
            "k a[data-x = y][ref=t], b { }"
        );
    }

    #[test]
    fn test_other_attributes_untouched() {
        let css = "[refx=a] [data-ref=b] [ref~=c] a[href] {}";
        assert_eq!(scope_styles(css, "k", "ref"), css);
    }

    #[test]
    fn test_comments_and_strings_untouched() {
        let css = "/* [ref=a] */ p::before { content: \"[ref=b]\" }";
        assert_eq!(scope_styles(css, "k", "ref"), css);
    }

    #[test]
    fn test_custom_attribute_name() {
        assert_eq!(scope_styles("[data-ref=a]{}", "k", "data-ref"), "k [data-ref=a]{}");
    }

    #[test]
    fn test_rules_for_isolation() {
        assert_eq!(ScopeRules::for_isolation(true), ScopeRules::SCRIPTS);
        assert!(ScopeRules::for_isolation(false).contains(ScopeRules::STYLES | ScopeRules::SCRIPTS));
    }
}
