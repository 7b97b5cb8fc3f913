#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Student,
    Admin,
}

impl Role {
    pub fn parse(raw: &str) -> Role {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" | "eighth_admin" => Role::Admin,
            _ => Role::Student,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UsersRow {
    pub id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub role: String,
    pub graduation_year: Option<i64>,
    pub grade: Option<i64>,
    pub is_placeholder: bool,
}

impl UsersRow {
    pub fn role(&self) -> Role {
        Role::parse(&self.role)
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Role::Admin
    }

    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.username)
    }
}
