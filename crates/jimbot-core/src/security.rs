use crate::domain::{Role, UserId};

// ============== Authorization ==============

/// The only two identities allowed to talk to the bot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuthorizedPair {
    pub primary: UserId,
    pub secondary: UserId,
}

impl AuthorizedPair {
    pub fn role_of(&self, user_id: UserId) -> Option<Role> {
        if user_id == self.secondary {
            Some(Role::Secondary)
        } else if user_id == self.primary {
            Some(Role::Primary)
        } else {
            None
        }
    }
}
