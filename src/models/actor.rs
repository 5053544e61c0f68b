//! Modelo de Actor
//!
//! Identidad del llamante tal como la afirma el gateway upstream
//! (cabeceras `X-Actor-Role` / `X-Actor-Id`).

use serde::{Deserialize, Serialize};
use sqlx::Type;
use std::fmt;
use std::str::FromStr;

use crate::models::booking::RequesterRole;
use crate::utils::errors::{forbidden_error, AppResult};

/// Rol del actor - mapea al ENUM actor_role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "actor_role", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorRole {
    Admin,
    Doctor,
    Patient,
    Driver,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Admin => "ADMIN",
            ActorRole::Doctor => "DOCTOR",
            ActorRole::Patient => "PATIENT",
            ActorRole::Driver => "DRIVER",
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActorRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(ActorRole::Admin),
            "DOCTOR" => Ok(ActorRole::Doctor),
            "PATIENT" => Ok(ActorRole::Patient),
            "DRIVER" => Ok(ActorRole::Driver),
            other => Err(format!("unknown actor role '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub role: ActorRole,
    /// Id de la cuenta (user id) del llamante
    pub id: i64,
}

impl Actor {
    pub fn new(role: ActorRole, id: i64) -> Self {
        Self { role, id }
    }

    pub fn admin(id: i64) -> Self {
        Self::new(ActorRole::Admin, id)
    }

    pub fn is_admin(&self) -> bool {
        self.role == ActorRole::Admin
    }

    /// Falla con Forbidden si el rol del actor no está en la lista
    pub fn require(&self, operation: &str, roles: &[ActorRole]) -> AppResult<()> {
        if roles.contains(&self.role) {
            return Ok(());
        }
        Err(forbidden_error(
            operation,
            &format!("role {} is not allowed", self.role),
        ))
    }

    /// Rol con el que queda registrada una reserva creada por este actor
    pub fn requester_role(&self) -> Option<RequesterRole> {
        match self.role {
            ActorRole::Admin => Some(RequesterRole::Admin),
            ActorRole::Doctor => Some(RequesterRole::Doctor),
            ActorRole::Patient => Some(RequesterRole::Patient),
            ActorRole::Driver => None,
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.role, self.id)
    }
}
