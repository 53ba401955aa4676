use tracing::debug;

use super::{Principal, SecurityRequirement};

/// Outcome of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    /// No (active) principal, and one is required. Reported as 401.
    Unauthorized,
    /// A principal exists but does not satisfy the requirement. Reported as 403.
    Forbidden { reason: String },
}

impl AccessDecision {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow)
    }
}

/// Decides whether a principal may reach a route.
///
/// Stateless: expressions were parsed when the route table was built, so
/// evaluation is a walk over the predicate tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorizationEvaluator;

impl AuthorizationEvaluator {
    #[must_use]
    pub fn new() -> Self {
        AuthorizationEvaluator
    }

    /// Whether evaluating `requirement` needs a principal at all.
    #[must_use]
    pub fn requires_principal(requirement: &SecurityRequirement) -> bool {
        !matches!(requirement, SecurityRequirement::Public)
    }

    #[must_use]
    pub fn evaluate(
        &self,
        requirement: &SecurityRequirement,
        principal: Option<&Principal>,
    ) -> AccessDecision {
        let active = principal.filter(|p| p.active);
        let decision = match (requirement, active) {
            (SecurityRequirement::Public, _) => AccessDecision::Allow,
            (_, None) => AccessDecision::Unauthorized,
            (SecurityRequirement::RequiresAuthentication, Some(_)) => AccessDecision::Allow,
            (SecurityRequirement::Expression(expr), Some(p)) => {
                if expr.predicate.evaluate(&p.roles, &p.authorities) {
                    AccessDecision::Allow
                } else {
                    AccessDecision::Forbidden {
                        reason: format!("'{}' does not satisfy {}", p.id, expr.source),
                    }
                }
            }
        };
        debug!(
            requirement = %requirement,
            principal = principal.map(|p| p.id.as_str()).unwrap_or("<none>"),
            allowed = decision.is_allowed(),
            "Authorization decision"
        );
        decision
    }
}
