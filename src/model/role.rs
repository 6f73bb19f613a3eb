#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Role {
    Admin = 1,
    Hr = 2,
    Employee = 3,
    System = 4,
    ApiUser = 5,
    Manager = 6,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Admin),
            2 => Some(Role::Hr),
            3 => Some(Role::Employee),
            4 => Some(Role::System),
            5 => Some(Role::ApiUser),
            6 => Some(Role::Manager),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    /// Roles allowed to see and decide on other people's requests.
    pub fn is_approver(self) -> bool {
        matches!(self, Role::Admin | Role::Hr | Role::Manager)
    }

    /// Roles allowed to push attendance terminal data.
    pub fn is_feed_writer(self) -> bool {
        matches!(self, Role::Admin | Role::System | Role::ApiUser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip() {
        for role in [
            Role::Admin,
            Role::Hr,
            Role::Employee,
            Role::System,
            Role::ApiUser,
            Role::Manager,
        ] {
            assert_eq!(Role::from_id(role.id()), Some(role));
        }
        assert_eq!(Role::from_id(0), None);
    }

    #[test]
    fn approvers() {
        assert!(Role::Manager.is_approver());
        assert!(!Role::Employee.is_approver());
        assert!(!Role::ApiUser.is_approver());
        assert!(Role::ApiUser.is_feed_writer());
    }
}
