//! Request identity extraction. The OAuth sign-in dance is explicitly out of
//! scope, so there is no session to read a principal from — the gateway
//! instead trusts two headers once the deployment-level bearer token (same
//! shape as the reference architecture's `check_auth`/`extract_bearer` pair)
//! has gated the request:
//!
//! - `Authorization: Bearer <gateway.auth_token>` — required whenever
//!   `auth_token` is configured; absent config disables the gate entirely
//!   (single-tenant / local deployments).
//! - `X-User-Id: <uuid>` — the caller's `UserId`. Minted by whatever fronts
//!   this gateway (a reverse proxy terminating real auth, a CLI operator,
//!   ...); the gateway itself does not mint or verify identities.
//!
//! Role is never taken from a header — a caller can't self-promote by
//! setting one. `UserRole::Admin` is granted only to ids present in
//! `gateway.admin_user_ids`.

use axum::http::HeaderMap;

use labtrace_core::config::LabtraceConfig;
use labtrace_core::error::ErrorKind;
use labtrace_core::types::{UserId, UserRole};

use crate::error::ApiError;

#[derive(Debug, Clone, Copy)]
pub struct AuthContext {
    pub user_id: UserId,
    pub role: UserRole,
}

impl AuthContext {
    pub fn as_admin_caller(&self) -> labtrace_admin::AdminCaller {
        labtrace_admin::AdminCaller {
            id: self.user_id,
            role: self.role,
        }
    }
}

pub fn authenticate(config: &LabtraceConfig, headers: &HeaderMap) -> Result<AuthContext, ApiError> {
    if let Some(expected) = &config.gateway.auth_token {
        let supplied = extract_bearer(headers);
        if supplied != Some(expected.as_str()) {
            return Err(ErrorKind::ScopeViolation("missing or invalid bearer token".to_string()).into());
        }
    }

    let user_id = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<UserId>().ok())
        .ok_or_else(|| ErrorKind::ScopeViolation("missing or malformed X-User-Id header".to_string()))?;

    let role = if config.gateway.admin_user_ids.iter().any(|id| id == &user_id.to_string()) {
        UserRole::Admin
    } else {
        UserRole::User
    };

    Ok(AuthContext { user_id, role })
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers.get("authorization").and_then(|v| v.to_str().ok()).and_then(|v| v.strip_prefix("Bearer "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use labtrace_core::config::{
        ChatConfig, DatabaseConfig, GatewayConfig, JobsConfig, MappingConfig, ProvidersConfig, SessionConfig,
        StorageConfig, VisionProviderConfig,
    };

    fn config_with(token: Option<&str>, admins: Vec<String>) -> LabtraceConfig {
        LabtraceConfig {
            gateway: GatewayConfig {
                port: 8080,
                bind: "0.0.0.0".to_string(),
                auth_token: token.map(|t| t.to_string()),
                admin_user_ids: admins,
            },
            database: DatabaseConfig::default(),
            mapping: MappingConfig {
                auto_accept: 0.9,
                queue_lower: 0.65,
                backfill_threshold: 0.8,
            },
            providers: ProvidersConfig {
                vision_primary: VisionProviderConfig {
                    kind: "anthropic".into(),
                    api_key: "k".into(),
                    model: "m".into(),
                    max_payload_bytes: 1024,
                },
                vision_secondary: VisionProviderConfig {
                    kind: "openai".into(),
                    api_key: "k".into(),
                    model: "m".into(),
                    max_payload_bytes: 1024,
                },
                anthropic_api_key: "k".into(),
                chat_model: "m".into(),
                insight_model: "m".into(),
            },
            session: SessionConfig::default(),
            jobs: JobsConfig::default(),
            chat: ChatConfig::default(),
            storage: StorageConfig::default(),
        }
    }

    #[test]
    fn rejects_missing_user_header() {
        let cfg = config_with(None, vec![]);
        let headers = HeaderMap::new();
        assert!(authenticate(&cfg, &headers).is_err());
    }

    #[test]
    fn grants_admin_role_for_listed_id() {
        let user_id = UserId::new();
        let cfg = config_with(None, vec![user_id.to_string()]);
        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", HeaderValue::from_str(&user_id.to_string()).unwrap());
        let ctx = authenticate(&cfg, &headers).expect("should authenticate");
        assert_eq!(ctx.role, UserRole::Admin);
    }

    #[test]
    fn rejects_wrong_bearer_token() {
        let user_id = UserId::new();
        let cfg = config_with(Some("secret"), vec![]);
        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", HeaderValue::from_str(&user_id.to_string()).unwrap());
        headers.insert("authorization", HeaderValue::from_static("Bearer wrong"));
        assert!(authenticate(&cfg, &headers).is_err());
    }
}
