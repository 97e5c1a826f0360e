//! Per-route role requirements

use super::roles::RoleSet;

/// Roles a route demands before it can be entered
///
/// An empty set means the route only requires an authenticated session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteAuthRequirement {
    pub required_roles: RoleSet,
}

impl RouteAuthRequirement {
    pub fn new(required_roles: impl Into<RoleSet>) -> Self {
        Self {
            required_roles: required_roles.into(),
        }
    }

    /// Requirement with no role restriction
    pub fn authenticated() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param,
    Rest,
}

#[derive(Debug, Clone)]
struct RoutePattern {
    segments: Vec<Segment>,
}

impl RoutePattern {
    fn parse(pattern: &str) -> Self {
        let segments = split_path(pattern)
            .map(|segment| match segment {
                "**" => Segment::Rest,
                s if s.starts_with(':') => Segment::Param,
                s => Segment::Literal(s.to_string()),
            })
            .collect();
        Self { segments }
    }

    fn matches(&self, path: &[&str]) -> bool {
        let mut remaining = path.iter();
        for segment in &self.segments {
            match segment {
                Segment::Rest => return true,
                Segment::Param => {
                    if remaining.next().is_none() {
                        return false;
                    }
                }
                Segment::Literal(expected) => match remaining.next() {
                    Some(actual) if *actual == expected.as_str() => {}
                    _ => return false,
                },
            }
        }
        remaining.next().is_none()
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

/// Strip scheme/authority, query string and fragment from a navigation URL
fn path_of(url: &str) -> &str {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let without_query = without_fragment.split('?').next().unwrap_or(without_fragment);
    match without_query.find("://") {
        Some(scheme_end) => {
            let after_scheme = &without_query[scheme_end + 3..];
            after_scheme.find('/').map(|i| &after_scheme[i..]).unwrap_or("")
        }
        None => without_query,
    }
}

/// Ordered route table; the first matching pattern decides
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<(RoutePattern, RouteAuthRequirement)>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pattern such as `users`, `users/edit/:id` or `**`
    pub fn add(&mut self, pattern: &str, requirement: RouteAuthRequirement) -> &mut Self {
        self.routes.push((RoutePattern::parse(pattern), requirement));
        self
    }

    pub fn with_route(mut self, pattern: &str, requirement: RouteAuthRequirement) -> Self {
        self.add(pattern, requirement);
        self
    }

    /// Requirement for a navigation URL; unmatched paths only need a session
    pub fn requirement_for(&self, url: &str) -> RouteAuthRequirement {
        let path: Vec<&str> = split_path(path_of(url)).collect();
        self.routes
            .iter()
            .find(|(pattern, _)| pattern.matches(&path))
            .map(|(_, requirement)| requirement.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
