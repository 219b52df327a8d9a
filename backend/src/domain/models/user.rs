use shared::{Role, Session};

/// Entry of the static credential table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserAccount {
    pub username: &'static str,
    pub password: &'static str,
    pub role: Role,
    pub name: &'static str,
}

impl UserAccount {
    pub fn session(&self) -> Session {
        Session {
            username: self.username.to_string(),
            role: self.role,
            name: self.name.to_string(),
        }
    }
}

pub const USERS: [UserAccount; 3] = [
    UserAccount {
        username: "pastor",
        password: "pastor123",
        role: Role::Admin,
        name: "Pastor",
    },
    UserAccount {
        username: "maestro_ninos",
        password: "ninos123",
        role: Role::ChildrenTeacher,
        name: "Maestro de Niños",
    },
    UserAccount {
        username: "maestro_adolescentes",
        password: "adolescentes123",
        role: Role::TeensTeacher,
        name: "Maestro de Adolescentes",
    },
];

pub fn find_user(username: &str) -> Option<&'static UserAccount> {
    USERS.iter().find(|user| user.username == username)
}
