#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **llmobs-auth** – Static API key gating and cached scope injection.
//!
//! The supported mode gates the whole service behind a single static API
//! key compared against a configurable header (default `X-API-Key`); there
//! is no JWT, no per-tenant key, no multi-tenant lookup. [`ScopeResolver`]
//! holds the deterministic default tenant/project ids as explicit
//! initialization state on a shared handle, computed once and reused —
//! the process-wide cache the spec's design notes call for, made explicit
//! rather than a process global.

use llmobs_types::Scope;
use uuid::Uuid;

/// Errors raised while checking the API key header.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ApiKeyError {
    /// The header was absent.
    #[error("API key required")]
    Missing,
    /// The header was present but did not match the configured key.
    #[error("invalid API key")]
    Invalid,
}

/// Compares a presented key against the configured static key in constant
/// time, so response latency does not leak a prefix match to an attacker
/// timing requests.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Gates ingest behind a single static API key, the way the original's
/// `get_api_key` dependency does for single-tenant mode.
#[derive(Debug, Clone)]
pub struct ApiKeyAuth {
    key: String,
    header_name: String,
}

impl ApiKeyAuth {
    /// Build a new gate for `key`, checked against the `header_name` header
    /// (e.g. `X-API-Key`).
    pub fn new(key: impl Into<String>, header_name: impl Into<String>) -> Self {
        Self { key: key.into(), header_name: header_name.into() }
    }

    /// The configured header name callers must present the key in.
    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    /// Validate a presented header value against the configured key.
    pub fn check(&self, presented: Option<&str>) -> Result<(), ApiKeyError> {
        match presented {
            None => Err(ApiKeyError::Missing),
            Some(value) if constant_time_eq(value.as_bytes(), self.key.as_bytes()) => Ok(()),
            Some(_) => Err(ApiKeyError::Invalid),
        }
    }
}

/// Holds the default scope as explicit initialization state, computed once
/// at construction and handed out by reference thereafter. A process
/// restart is the only way to pick up a changed `default_tenant_id` /
/// `default_project_id` configuration value.
#[derive(Debug, Clone, Copy)]
pub struct ScopeResolver {
    default_scope: Scope,
}

impl ScopeResolver {
    /// Build a resolver from explicit configuration values, falling back to
    /// the deterministic namespace-hashed defaults when either is absent —
    /// matching the original's `uuid.uuid5(NAMESPACE_DNS, ...)` seed so a
    /// fresh deployment agrees with it out of the box.
    pub fn new(default_tenant_id: Option<Uuid>, default_project_id: Option<Uuid>) -> Self {
        let deterministic = Scope::default_scope();
        Self {
            default_scope: Scope {
                tenant_id: default_tenant_id.unwrap_or(deterministic.tenant_id),
                project_id: default_project_id.unwrap_or(deterministic.project_id),
            },
        }
    }

    /// Return the cached default scope for the authenticated context. In
    /// the single static-key mode every ingest request resolves to this
    /// same scope.
    pub fn scope(&self) -> Scope {
        self.default_scope
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_header_is_rejected() {
        let auth = ApiKeyAuth::new("secret", "X-API-Key");
        assert_eq!(auth.check(None), Err(ApiKeyError::Missing));
    }

    #[test]
    fn mismatched_key_is_rejected() {
        let auth = ApiKeyAuth::new("secret", "X-API-Key");
        assert_eq!(auth.check(Some("wrong")), Err(ApiKeyError::Invalid));
    }

    #[test]
    fn matching_key_is_accepted() {
        let auth = ApiKeyAuth::new("secret", "X-API-Key");
        assert!(auth.check(Some("secret")).is_ok());
    }

    #[test]
    fn constant_time_eq_handles_length_mismatch() {
        assert!(!constant_time_eq(b"short", b"much longer string"));
    }

    #[test]
    fn resolver_is_deterministic_across_instances() {
        let a = ScopeResolver::new(None, None);
        let b = ScopeResolver::new(None, None);
        assert_eq!(a.scope().tenant_id, b.scope().tenant_id);
        assert_eq!(a.scope().project_id, b.scope().project_id);
    }

    #[test]
    fn resolver_honors_explicit_override() {
        let tenant = Uuid::new_v4();
        let resolver = ScopeResolver::new(Some(tenant), None);
        assert_eq!(resolver.scope().tenant_id, tenant);
    }

    #[test]
    fn resolver_caches_scope_on_shared_handle() {
        let resolver = ScopeResolver::new(None, None);
        let first = resolver.scope();
        let second = resolver.scope();
        assert_eq!(first.tenant_id, second.tenant_id);
        assert_eq!(first.project_id, second.project_id);
    }
}
