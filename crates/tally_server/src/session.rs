//! Server-side sessions and the per-request authentication middleware.
//!
//! A session only remembers who logged in, the scope they last worked in and
//! when they were last seen. Role and grant are reloaded from the store on
//! every request, so role changes apply without a fresh login.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Query, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use axum::Extension;
use serde::Deserialize;
use tally_core::types::Scope;
use tally_core::{LedgerService, Principal, TallyError};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::MaintenanceSource;
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Session {
    pub username: String,
    pub scope: Option<Scope>,
    pub last_active: Instant,
}

/// Live sessions keyed by bearer token.
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Session>>,
    idle_timeout: Duration,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_timeout,
        }
    }

    /// Start a session. Idle sessions nobody came back for are swept first.
    pub async fn create(&self, username: &str, scope: Scope) -> Uuid {
        let token = Uuid::new_v4();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.last_active.elapsed() <= self.idle_timeout);
        let swept = before - sessions.len();
        if swept > 0 {
            tracing::debug!(swept, live = sessions.len(), "idle sessions evicted");
        }
        sessions.insert(
            token,
            Session {
                username: username.to_string(),
                scope: Some(scope),
                last_active: Instant::now(),
            },
        );
        token
    }

    pub async fn remove(&self, token: &Uuid) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }

    /// Fetch a live session. Idle sessions are dropped and reported as expired.
    pub async fn lookup(&self, token: &Uuid) -> Result<Session, AppError> {
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get(token) else {
            return Err(AppError::SessionExpired);
        };
        if session.last_active.elapsed() > self.idle_timeout {
            sessions.remove(token);
            return Err(AppError::SessionExpired);
        }
        Ok(session.clone())
    }

    /// Record the recomputed scope and refresh the idle clock.
    pub async fn touch(&self, token: &Uuid, scope: Scope) {
        if let Some(session) = self.sessions.write().await.get_mut(token) {
            session.scope = Some(scope);
            session.last_active = Instant::now();
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// The authenticated caller, inserted into request extensions by [`session_auth`].
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub token: Uuid,
    pub principal: Principal,
    /// Effective scope for this request.
    pub scope: Scope,
}

#[derive(Debug, Deserialize)]
pub struct ScopeParam {
    pub scope: Option<String>,
}

pub fn bearer_token(headers: &HeaderMap) -> Option<Uuid> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?;
    Uuid::parse_str(token.trim()).ok()
}

/// Maintenance gate, idle timeout, user reload and scope recomputation.
pub async fn session_auth(
    Extension(service): Extension<Arc<dyn LedgerService>>,
    Extension(sessions): Extension<Arc<SessionStore>>,
    Extension(maintenance): Extension<MaintenanceSource>,
    Query(param): Query<ScopeParam>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers());

    if maintenance.current().await.update_mode {
        if let Some(token) = token {
            sessions.remove(&token).await;
        }
        return Err(AppError::Maintenance);
    }

    let token = token.ok_or_else(|| {
        AppError::Core(TallyError::Unauthenticated("missing bearer token".into()))
    })?;
    let session = sessions.lookup(&token).await?;

    let Some(principal) = service.load_principal(&session.username).await? else {
        sessions.remove(&token).await;
        tracing::warn!(user = %session.username, "session for removed account dropped");
        return Err(AppError::AccountRemoved);
    };

    let requested = param.scope.as_deref().and_then(Scope::parse);
    let scope = principal.effective_scope(requested, session.scope);
    sessions.touch(&token, scope).await;
    tracing::debug!(
        user = %principal.username,
        role = %principal.role,
        ?requested,
        scope = %scope,
        "session scope resolved"
    );

    req.extensions_mut().insert(CurrentUser {
        token,
        principal,
        scope,
    });
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[tokio::test]
    async fn idle_sessions_expire() {
        let store = SessionStore::new(Duration::from_millis(0));
        let token = store.create("ed", Scope::UnitA).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(matches!(store.lookup(&token).await, Err(AppError::SessionExpired)));
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn abandoned_sessions_are_evicted_on_login() {
        let store = SessionStore::new(Duration::from_millis(1));
        for i in 0..1000 {
            store.create(&format!("user{i}"), Scope::UnitA).await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        let store = SessionStore {
            idle_timeout: Duration::from_secs(60),
            ..store
        };
        let fresh = store.create("late", Scope::UnitB).await;
        assert_eq!(store.len().await, 1);
        assert_eq!(store.lookup(&fresh).await.unwrap().username, "late");
    }

    #[tokio::test]
    async fn touch_updates_scope() {
        let store = SessionStore::new(Duration::from_secs(60));
        let token = store.create("ed", Scope::UnitA).await;
        store.touch(&token, Scope::UnitB).await;
        assert_eq!(store.lookup(&token).await.unwrap().scope, Some(Scope::UnitB));
        assert!(store.remove(&token).await);
        assert!(!store.remove(&token).await);
    }

    #[test]
    fn bearer_parsing() {
        let token = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        assert_eq!(bearer_token(&headers), Some(token));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
    }
}
