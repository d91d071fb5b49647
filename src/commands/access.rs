use crate::settings::LiveSettings;

/// Ordered so that a higher role satisfies every lower requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Role {
    User,
    Admin,
    Owner,
}

/// The permission gate consulted before every command.
pub trait AccessPolicy: Send + Sync {
    fn is_ignored(&self, hash: &str) -> bool;

    fn role(&self, hash: &str) -> Role;
}

impl AccessPolicy for LiveSettings {
    fn is_ignored(&self, hash: &str) -> bool {
        LiveSettings::is_ignored(self, hash)
    }

    fn role(&self, hash: &str) -> Role {
        if self.is_owner(hash) {
            Role::Owner
        } else if self.is_admin(hash) {
            Role::Admin
        } else {
            Role::User
        }
    }
}
