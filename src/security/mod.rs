//! # Security Module
//!
//! Authorization for dispatched routes: who the caller is ([`Principal`]), what a
//! route demands ([`SecurityRequirement`]) and the decision between the two
//! ([`AuthorizationEvaluator`]).
//!
//! ## Requirements
//!
//! Every route carries exactly one requirement:
//!
//! - **`Public`** - always allowed, no principal needed
//! - **`RequiresAuthentication`** - allowed iff an active principal is present
//! - **`Expression`** - a boolean combination of `hasRole('x')` and
//!   `hasAuthority('y')`, parsed once when the route table is built
//!
//! A service-level requirement is the default for its routes; a route-level
//! requirement replaces it entirely (no merging between levels).
//!
//! ## Decisions
//!
//! | requirement | no principal | principal fails | principal passes |
//! |---|---|---|---|
//! | `Public` | allow | allow | allow |
//! | `RequiresAuthentication` | 401 | - | allow |
//! | `Expression` | 401 | 403 | allow |
//!
//! An inactive principal counts as no principal.
//!
//! ## Example
//!
//! ```rust
//! use brrtdispatch::security::{AuthorizationEvaluator, Principal, SecurityRequirement};
//!
//! let requirement = SecurityRequirement::expression("hasRole('admin') or hasAuthority('audit:read')")?;
//! let auditor = Principal::new("u-17").with_authority("audit:read");
//!
//! let decision = AuthorizationEvaluator::new().evaluate(&requirement, Some(&auditor));
//! assert!(decision.is_allowed());
//! # Ok::<(), brrtdispatch::security::ExpressionError>(())
//! ```

mod evaluator;
mod expression;

pub use evaluator::{AccessDecision, AuthorizationEvaluator};
pub use expression::{ExpressionError, Predicate, MAX_NESTING};

use std::collections::BTreeSet;
use std::fmt;

/// The authenticated identity attached to a request.
///
/// Constructed by whatever authenticates the request and passed in with it;
/// the dispatcher only reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub display_name: String,
    pub roles: BTreeSet<String>,
    pub authorities: BTreeSet<String>,
    pub active: bool,
}

impl Principal {
    /// An active principal without roles or authorities.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Principal {
            display_name: id.clone(),
            id,
            roles: BTreeSet::new(),
            authorities: BTreeSet::new(),
            active: true,
        }
    }

    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    #[must_use]
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authorities.insert(authority.into());
        self
    }

    #[must_use]
    pub fn with_authorities<I, S>(mut self, authorities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authorities
            .extend(authorities.into_iter().map(Into::into));
        self
    }

    /// Mark the principal as deactivated.
    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    #[must_use]
    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.contains(authority)
    }
}

/// A parsed security expression together with its source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityExpression {
    pub source: String,
    pub predicate: Predicate,
}

impl SecurityExpression {
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        Ok(SecurityExpression {
            source: source.trim().to_string(),
            predicate: Predicate::parse(source)?,
        })
    }
}

/// What a route demands of the caller.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SecurityRequirement {
    #[default]
    Public,
    RequiresAuthentication,
    Expression(SecurityExpression),
}

impl SecurityRequirement {
    pub fn expression(source: &str) -> Result<Self, ExpressionError> {
        SecurityExpression::parse(source).map(SecurityRequirement::Expression)
    }

    /// Interpret one declared attribute: `public`, `authenticated` (and their
    /// aliases) or an expression.
    pub fn from_attribute(attribute: &str) -> Result<Self, ExpressionError> {
        match attribute.trim().to_ascii_lowercase().as_str() {
            "public" | "anonymous" | "allow_anonymous" | "allowanonymous" => {
                Ok(SecurityRequirement::Public)
            }
            "authenticated" | "requires_auth" | "requiresauth" | "requires_authentication" => {
                Ok(SecurityRequirement::RequiresAuthentication)
            }
            _ => Self::expression(attribute),
        }
    }

    /// Combine several attributes declared on the same level.
    ///
    /// The most restrictive wins: any expression beats `RequiresAuthentication`,
    /// which beats `Public`; multiple expressions must all hold.
    pub fn from_attributes<S: AsRef<str>>(attributes: &[S]) -> Result<Self, ExpressionError> {
        let mut authenticated = false;
        let mut expressions = Vec::new();
        for attribute in attributes {
            match Self::from_attribute(attribute.as_ref())? {
                SecurityRequirement::Public => {}
                SecurityRequirement::RequiresAuthentication => authenticated = true,
                SecurityRequirement::Expression(expr) => expressions.push(expr),
            }
        }

        if expressions.len() > 1 {
            let source = expressions
                .iter()
                .map(|e| format!("({})", e.source))
                .collect::<Vec<_>>()
                .join(" and ");
            let predicate = Predicate::all(expressions.into_iter().map(|e| e.predicate).collect());
            return Ok(SecurityRequirement::Expression(SecurityExpression {
                source,
                predicate,
            }));
        }
        Ok(match expressions.pop() {
            Some(expr) => SecurityRequirement::Expression(expr),
            None if authenticated => SecurityRequirement::RequiresAuthentication,
            None => SecurityRequirement::Public,
        })
    }

    /// The requirement that applies to a route: the route's own if declared,
    /// otherwise the service's, otherwise `Public`.
    #[must_use]
    pub fn effective(service: Option<&Self>, route: Option<&Self>) -> Self {
        route.or(service).cloned().unwrap_or_default()
    }

    /// Short name used in snapshots and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            SecurityRequirement::Public => "public",
            SecurityRequirement::RequiresAuthentication => "authenticated",
            SecurityRequirement::Expression(_) => "expression",
        }
    }
}

impl fmt::Display for SecurityRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecurityRequirement::Expression(expr) => f.write_str(&expr.source),
            other => f.write_str(other.kind()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_keywords() {
        assert_eq!(
            SecurityRequirement::from_attribute("Public"),
            Ok(SecurityRequirement::Public)
        );
        assert_eq!(
            SecurityRequirement::from_attribute("requires_auth"),
            Ok(SecurityRequirement::RequiresAuthentication)
        );
        assert!(matches!(
            SecurityRequirement::from_attribute("hasRole('x')"),
            Ok(SecurityRequirement::Expression(_))
        ));
        assert!(SecurityRequirement::from_attribute("nobody").is_err());
    }

    #[test]
    fn most_restrictive_attribute_wins() {
        assert_eq!(
            SecurityRequirement::from_attributes(&["public", "authenticated"]),
            Ok(SecurityRequirement::RequiresAuthentication)
        );
        assert_eq!(
            SecurityRequirement::from_attributes(&["authenticated", "public"]),
            Ok(SecurityRequirement::RequiresAuthentication)
        );
        let combined =
            SecurityRequirement::from_attributes(&["hasRole('a')", "public", "hasAuthority('b')"])
                .unwrap();
        let SecurityRequirement::Expression(expr) = combined else {
            panic!("expected expression");
        };
        assert_eq!(expr.source, "(hasRole('a')) and (hasAuthority('b'))");
        assert_eq!(
            expr.predicate,
            Predicate::And(vec![
                Predicate::Role("a".into()),
                Predicate::Authority("b".into())
            ])
        );
    }

    #[test]
    fn route_level_overrides_service_level() {
        let public = SecurityRequirement::Public;
        let auth = SecurityRequirement::RequiresAuthentication;
        assert_eq!(
            SecurityRequirement::effective(Some(&auth), Some(&public)),
            public
        );
        assert_eq!(
            SecurityRequirement::effective(Some(&public), Some(&auth)),
            auth
        );
        assert_eq!(SecurityRequirement::effective(Some(&auth), None), auth);
        assert_eq!(
            SecurityRequirement::effective(None, None),
            SecurityRequirement::Public
        );
    }

    #[test]
    fn principal_builders() {
        let p = Principal::new("u1")
            .with_display_name("Ann")
            .with_roles(["a", "b"])
            .with_authorities(vec!["x".to_string()]);
        assert!(p.active);
        assert!(p.has_role("b"));
        assert!(p.has_authority("x"));
        assert_eq!(p.display_name, "Ann");
        assert!(!p.inactive().active);
    }
}
