//! Staff roles.
//!
//! Stored as the Postgres enum `user_role`; the lowercase names are also
//! what travels inside JWT claims.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
pub enum Role {
    Admin,
    Cleaning,
    Security,
    Medical,
    Logistics,
    Supervisor,
}

impl Role {
    pub const WORKER_ROLES: [Role; 5] = [
        Role::Cleaning,
        Role::Security,
        Role::Medical,
        Role::Logistics,
        Role::Supervisor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Cleaning => "cleaning",
            Role::Security => "security",
            Role::Medical => "medical",
            Role::Logistics => "logistics",
            Role::Supervisor => "supervisor",
        }
    }

    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }

    /// Admins and supervisors may resolve incidents they are not assigned to.
    pub fn is_elevated(self) -> bool {
        matches!(self, Role::Admin | Role::Supervisor)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "cleaning" => Ok(Role::Cleaning),
            "security" => Ok(Role::Security),
            "medical" => Ok(Role::Medical),
            "logistics" => Ok(Role::Logistics),
            "supervisor" => Ok(Role::Supervisor),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_str() {
        for role in Role::WORKER_ROLES.iter().copied().chain([Role::Admin]) {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert!("janitor".parse::<Role>().is_err());
    }

    #[test]
    fn only_admin_and_supervisor_are_elevated() {
        assert!(Role::Admin.is_elevated());
        assert!(Role::Supervisor.is_elevated());
        assert!(!Role::Security.is_elevated());
        assert!(!Role::Cleaning.is_elevated());
    }

    #[test]
    fn admin_is_not_a_worker_role() {
        assert!(!Role::WORKER_ROLES.contains(&Role::Admin));
    }
}
