//! The resolved caller identity.

use serde::{Deserialize, Serialize};

use opsgate_core::UserId;

use crate::matrix::Role;

/// A resolved (user id, role) pair.
///
/// This is the only identity information the kernel consumes; sessions,
/// tokens, and provider protocols stay outside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: impl Into<UserId>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_serde_shape() {
        let actor = Actor::new(UserId::new("u-7"), Role::Manager);
        let value = serde_json::to_value(&actor).unwrap();
        assert_eq!(value, serde_json::json!({"user_id": "u-7", "role": "manager"}));
    }
}
