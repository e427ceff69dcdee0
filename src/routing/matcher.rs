//! Path template compilation and matching.
//!
//! # Responsibilities
//! - Compile `{name}` templates into segment matchers
//! - Match full request paths (anchored, no partial or trailing matches)
//! - Extract path variables in declaration order
//!
//! # Design Decisions
//! - No regex: templates compile to literal/variable pieces per segment
//! - A variable captures one or more characters and never a `/`
//! - Within a segment, variables are greedy with backtracking, so
//!   `/files/{name}.{ext}` splits `a.b.json` into `a.b` and `json`
//! - Variables in one segment must be separated by a literal; `{a}{b}` is
//!   rejected at compile time so a variable can only end at a literal match
//! - Path matching is case-sensitive

use crate::error::RouteError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Variable(String),
}

/// A compiled path template.
#[derive(Debug, Clone)]
pub struct PathPattern {
    template: String,
    segments: Vec<Vec<Piece>>,
    names: Vec<String>,
}

impl PathPattern {
    /// Compile a template such as `/employees/{id}`.
    pub fn compile(template: &str) -> Result<Self, RouteError> {
        let invalid = |reason: &str| RouteError::InvalidTemplate {
            template: template.to_string(),
            reason: reason.to_string(),
        };

        let mut names: Vec<String> = Vec::new();
        let mut segments = Vec::new();

        for raw in template.split('/') {
            let mut pieces = Vec::new();
            let mut rest = raw;

            while !rest.is_empty() {
                match rest.find(['{', '}']) {
                    None => {
                        pieces.push(Piece::Literal(rest.to_string()));
                        rest = "";
                    }
                    Some(idx) if rest[idx..].starts_with('}') => {
                        return Err(invalid("unmatched '}'"));
                    }
                    Some(idx) => {
                        if idx > 0 {
                            pieces.push(Piece::Literal(rest[..idx].to_string()));
                        }
                        let after = &rest[idx + 1..];
                        let close = after.find('}').ok_or_else(|| invalid("unclosed '{'"))?;
                        let name = &after[..close];
                        if name.is_empty() {
                            return Err(invalid("empty variable name"));
                        }
                        if name.contains('{') {
                            return Err(invalid("nested '{'"));
                        }
                        if matches!(pieces.last(), Some(Piece::Variable(_))) {
                            return Err(invalid("adjacent variables need a literal between them"));
                        }
                        if names.iter().any(|existing| existing == name) {
                            return Err(invalid(&format!("duplicate variable '{name}'")));
                        }
                        names.push(name.to_string());
                        pieces.push(Piece::Variable(name.to_string()));
                        rest = &after[close + 1..];
                    }
                }
            }

            segments.push(pieces);
        }

        Ok(Self {
            template: template.to_string(),
            segments,
            names,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Variable names in declaration order.
    pub fn variable_names(&self) -> &[String] {
        &self.names
    }

    /// True iff the whole path matches the template.
    pub fn is_match(&self, path: &str) -> bool {
        self.captures(path).is_some()
    }

    /// Captured variables in declaration order, or `None` if the path does not match.
    pub fn captures(&self, path: &str) -> Option<Vec<(String, String)>> {
        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut captured = Vec::with_capacity(self.names.len());
        for (pieces, text) in self.segments.iter().zip(parts) {
            if !match_pieces(pieces, text, &mut captured) {
                return None;
            }
        }
        Some(captured)
    }
}

fn match_pieces(pieces: &[Piece], text: &str, captured: &mut Vec<(String, String)>) -> bool {
    let Some((first, rest)) = pieces.split_first() else {
        return text.is_empty();
    };

    match first {
        Piece::Literal(literal) => match text.strip_prefix(literal.as_str()) {
            Some(remaining) => match_pieces(rest, remaining, captured),
            None => false,
        },
        Piece::Variable(name) => {
            let mut ends: Vec<usize> = text
                .char_indices()
                .skip(1)
                .map(|(idx, _)| idx)
                .collect();
            if !text.is_empty() {
                ends.push(text.len());
            }

            for end in ends.into_iter().rev() {
                let mark = captured.len();
                captured.push((name.clone(), text[..end].to_string()));
                if match_pieces(rest, &text[end..], captured) {
                    return true;
                }
                captured.truncate(mark);
            }
            false
        }
    }
}

/// Ensure a leading `/` and collapse repeated slashes.
pub fn normalize(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len() + 1);
    normalized.push('/');
    for ch in path.chars() {
        if ch == '/' && normalized.ends_with('/') {
            continue;
        }
        normalized.push(ch);
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_single_variable() {
        let pattern = PathPattern::compile("/employees/{id}").unwrap();
        assert_eq!(
            pattern.captures("/employees/42"),
            Some(pairs(&[("id", "42")]))
        );
        assert!(!pattern.is_match("/employees"));
        assert!(!pattern.is_match("/employees/"));
        assert!(!pattern.is_match("/employees/42/"));
        assert!(!pattern.is_match("/employees/42/extra"));
    }

    #[test]
    fn test_variables_in_declaration_order() {
        let pattern = PathPattern::compile("/orgs/{org}/teams/{team}/members/{member}").unwrap();
        assert_eq!(pattern.variable_names(), ["org", "team", "member"]);
        assert_eq!(
            pattern.captures("/orgs/acme/teams/core/members/ada"),
            Some(pairs(&[("org", "acme"), ("team", "core"), ("member", "ada")]))
        );
    }

    #[test]
    fn test_literal_only_template_is_anchored() {
        let pattern = PathPattern::compile("/api/hello").unwrap();
        assert!(pattern.is_match("/api/hello"));
        assert!(!pattern.is_match("/api/hello2"));
        assert!(!pattern.is_match("/x/api/hello"));
    }

    #[test]
    fn test_mixed_segment_backtracks() {
        let pattern = PathPattern::compile("/files/{name}.{ext}").unwrap();
        assert_eq!(
            pattern.captures("/files/report.v2.json"),
            Some(pairs(&[("name", "report.v2"), ("ext", "json")]))
        );
        assert!(!pattern.is_match("/files/report"));
        assert!(!pattern.is_match("/files/.json"));
    }

    #[test]
    fn test_variable_requires_at_least_one_char() {
        let pattern = PathPattern::compile("/a/{x}/b").unwrap();
        assert!(!pattern.is_match("/a//b"));
        assert!(pattern.is_match("/a/é/b"));
    }

    #[test]
    fn test_invalid_templates() {
        for template in [
            "/a/{id",
            "/a/id}",
            "/a/{}",
            "/a/{id}/{id}",
            "/a/{{id}}",
            "/a/{x}{y}",
            "/a/{x}.{y}{z}",
        ] {
            assert!(
                matches!(
                    PathPattern::compile(template),
                    Err(RouteError::InvalidTemplate { .. })
                ),
                "{template} should be rejected"
            );
        }
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("api//employees/{id}"), "/api/employees/{id}");
        assert_eq!(normalize("/api/"), "/api/");
        assert_eq!(normalize(""), "/");
        assert_eq!(normalize("///"), "/");
    }
}
