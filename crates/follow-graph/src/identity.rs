//! User identity records

use crate::Mid;
use serde::{Deserialize, Serialize};

/// A user as seen in a follow list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub mid: Mid,
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    /// Paid membership flag, rendered as a node tier
    #[serde(default)]
    pub member: bool,
}

impl UserIdentity {
    pub fn new(mid: impl Into<Mid>, name: impl Into<String>) -> Self {
        Self {
            mid: mid.into(),
            name: name.into(),
            avatar: None,
            member: false,
        }
    }

    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }

    pub fn with_member(mut self, member: bool) -> Self {
        self.member = member;
        self
    }
}
