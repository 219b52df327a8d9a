use log::{info, warn};
use shared::{Group, LoginResponse, Role, Session};

use crate::domain::models::find_user;
use crate::domain::state::SharedState;
use crate::storage::{keys, LocalStore};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Deliberately does not say which field was wrong
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("No active session")]
    NotAuthenticated,
    #[error("Not authorized for group {0}")]
    Unauthorized(Group),
    #[error("Only the administrator can do this")]
    AdminOnly,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Groups whose data a role may see
pub fn visible_groups(role: Role) -> Vec<Group> {
    match role.own_group() {
        Some(group) => vec![group],
        None => Group::ALL.to_vec(),
    }
}

/// Whether `session` may work with `group`'s roster and attendance
pub fn authorize(session: &Session, group: Group) -> bool {
    match session.role.own_group() {
        None => true,
        Some(own) => own == group,
    }
}

pub fn require_group(session: &Session, group: Group) -> Result<(), AuthError> {
    if authorize(session, group) {
        Ok(())
    } else {
        warn!("User {} denied access to group {}", session.username, group);
        Err(AuthError::Unauthorized(group))
    }
}

pub fn require_admin(session: &Session) -> Result<(), AuthError> {
    match session.role {
        Role::Admin => Ok(()),
        _ => Err(AuthError::AdminOnly),
    }
}

/// Session handling over the static credential table
#[derive(Clone)]
pub struct AuthService {
    state: SharedState,
    local: LocalStore,
}

impl AuthService {
    pub fn new(state: SharedState, local: LocalStore) -> Self {
        Self { state, local }
    }

    pub fn login(&self, username: &str, password: &str) -> Result<LoginResponse, AuthError> {
        let user = match find_user(username.trim()) {
            Some(user) if user.password == password => user,
            _ => {
                warn!("Rejected login attempt for {:?}", username);
                return Err(AuthError::InvalidCredentials);
            }
        };

        let session = user.session();
        self.state.write().session = Some(session.clone());

        // The session stays active even if it cannot be remembered
        if let Err(e) = self.local.save(keys::CURRENT_USER, &session) {
            warn!("Failed to persist session for {}: {}", session.username, e);
        }

        info!("User {} logged in as {:?}", session.username, session.role);
        Ok(LoginResponse {
            groups: visible_groups(session.role),
            success_message: format!("Bienvenido, {}", session.name),
            session,
        })
    }

    /// Reinstate the persisted session, if it names a known user
    pub fn restore_session(&self) -> Option<Session> {
        let stored: Session = match self.local.load(keys::CURRENT_USER) {
            Ok(Some(session)) => session,
            Ok(None) => return None,
            Err(e) => {
                warn!("Discarding unreadable stored session: {}", e);
                return None;
            }
        };

        let session = match find_user(&stored.username) {
            Some(user) if user.role == stored.role => user.session(),
            _ => {
                warn!("Stored session for unknown user {} ignored", stored.username);
                return None;
            }
        };

        info!("Restored session for {}", session.username);
        self.state.write().session = Some(session.clone());
        Some(session)
    }

    pub fn current_session(&self) -> Option<Session> {
        self.state.read().session.clone()
    }

    pub fn require_session(&self) -> Result<Session, AuthError> {
        self.current_session().ok_or(AuthError::NotAuthenticated)
    }

    pub fn logout(&self) -> Result<(), AuthError> {
        let previous = self.state.write().session.take();
        self.local.remove(keys::CURRENT_USER)?;

        if let Some(session) = previous {
            info!("User {} logged out", session.username);
        }
        Ok(())
    }
}
