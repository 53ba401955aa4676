use http::Method;
use std::fmt;

use crate::error::{DispatchError, HandlerError, HttpException};
use crate::ids::RequestId;
use crate::security::{Principal, SecurityRequirement};
use crate::server::{parse_method, parse_params, HandlerOutput};
use crate::validator::{ParamValue, RawParams, ValidatedParams};

/// Result a handler returns.
pub type HandlerResult = Result<HandlerOutput, HandlerError>;

/// Business logic bound to a route by handler name.
///
/// Closures `Fn(&HandlerRequest<'_>) -> HandlerResult` implement it, so most
/// handlers never name the trait.
pub trait Handler: Send + Sync {
    fn handle(&self, req: &HandlerRequest<'_>) -> HandlerResult;
}

impl<F> Handler for F
where
    F: Fn(&HandlerRequest<'_>) -> HandlerResult + Send + Sync,
{
    fn handle(&self, req: &HandlerRequest<'_>) -> HandlerResult {
        self(req)
    }
}

/// Where the request's principal comes from.
///
/// A deferred resolver runs at most once, and only after validation passed on
/// a route that is not `Public`.
pub enum PrincipalSource {
    Absent,
    Resolved(Principal),
    Deferred(Box<dyn FnOnce() -> Option<Principal> + Send>),
}

impl fmt::Debug for PrincipalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrincipalSource::Absent => f.write_str("Absent"),
            PrincipalSource::Resolved(p) => f.debug_tuple("Resolved").field(&p.id).finish(),
            PrincipalSource::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// Everything the dispatcher needs for one request. Owned by that request
/// alone and dropped once its response exists.
#[derive(Debug)]
pub struct RequestContext {
    pub request_id: RequestId,
    pub verb: Method,
    pub service: String,
    pub params: RawParams,
    principal: PrincipalSource,
}

impl RequestContext {
    pub fn new(verb: Method, service: impl Into<String>, params: RawParams) -> Self {
        RequestContext {
            request_id: RequestId::new(),
            verb,
            service: service.into(),
            params,
            principal: PrincipalSource::Absent,
        }
    }

    /// A `GET` with parameters from a raw query string.
    pub fn get(service: impl Into<String>, query: &str) -> Self {
        Self::new(Method::GET, service, RawParams::from_query_string(query))
    }

    /// Build a context from HTTP parts; see [`crate::server::parse_params`]
    /// for how the parameter source is chosen.
    ///
    /// # Errors
    ///
    /// An unparseable method or malformed JSON body is a 400.
    pub fn from_http(
        method: &str,
        service: impl Into<String>,
        query: &str,
        content_type: Option<&str>,
        body: &[u8],
    ) -> Result<Self, DispatchError> {
        let verb = parse_method(method).map_err(DispatchError::Http)?;
        let params = parse_params(&verb, query, content_type, body).map_err(DispatchError::Http)?;
        Ok(Self::new(verb, service, params))
    }

    #[must_use]
    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = PrincipalSource::Resolved(principal);
        self
    }

    #[must_use]
    pub fn with_optional_principal(self, principal: Option<Principal>) -> Self {
        match principal {
            Some(p) => self.with_principal(p),
            None => self,
        }
    }

    /// Resolve the principal lazily, only if the matched route needs one.
    #[must_use]
    pub fn with_principal_resolver<F>(mut self, resolver: F) -> Self
    where
        F: FnOnce() -> Option<Principal> + Send + 'static,
    {
        self.principal = PrincipalSource::Deferred(Box::new(resolver));
        self
    }

    /// Keep a caller-supplied id (e.g. from an incoming `x-request-id`).
    #[must_use]
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }

    /// The principal for a route with `requirement`. Public routes only see a
    /// principal that was supplied up front; deferred resolvers are not run
    /// for them.
    pub(crate) fn principal_for(&mut self, requirement: &SecurityRequirement) -> Option<Principal> {
        let source = std::mem::replace(&mut self.principal, PrincipalSource::Absent);
        match source {
            PrincipalSource::Absent => None,
            PrincipalSource::Resolved(p) => Some(p),
            PrincipalSource::Deferred(resolve) => {
                if matches!(requirement, SecurityRequirement::Public) {
                    None
                } else {
                    resolve()
                }
            }
        }
    }
}

/// What a handler sees: validated parameters, the principal and request
/// metadata. Borrowed from the dispatcher for the duration of one call.
#[derive(Debug, Clone, Copy)]
pub struct HandlerRequest<'a> {
    pub request_id: RequestId,
    pub service: &'a str,
    pub verb: &'a Method,
    pub handler_name: &'a str,
    pub params: &'a ValidatedParams,
    pub principal: Option<&'a Principal>,
    pub raw: &'a RawParams,
}

impl<'a> HandlerRequest<'a> {
    #[inline]
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&'a ParamValue> {
        self.params.get(name)
    }

    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&'a str> {
        self.params.get_str(name)
    }

    #[must_use]
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.params.get_i64(name)
    }

    #[must_use]
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.params.get_f64(name)
    }

    #[must_use]
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.params.get_bool(name)
    }

    /// The principal, or a 401 for handlers that need one on a public route.
    pub fn require_principal(&self) -> Result<&'a Principal, HttpException> {
        self.principal
            .ok_or_else(|| HttpException::unauthorized("authentication required"))
    }
}
