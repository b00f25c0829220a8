use serde::{Deserialize, Serialize};

use super::{blank_as_none, optional_string_or_list, string_or_list};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Faculty,
    Student,
}

impl UserRole {
    /// "Admin", "Faculty", "Student"
    pub fn label(&self) -> &'static str {
        match self {
            UserRole::Admin => "Admin",
            UserRole::Faculty => "Faculty",
            UserRole::Student => "Student",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UserRole::Admin => "admin",
            UserRole::Faculty => "faculty",
            UserRole::Student => "student",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "faculty" => Ok(UserRole::Faculty),
            "student" => Ok(UserRole::Student),
            _ => Err(anyhow::anyhow!("Unknown role: {s}")),
        }
    }
}

/// A row of the credential store.
///
/// Passwords are stored and matched as given; this struct is never returned
/// to API clients directly, see [`UserProfile`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub username: String,
    pub password: String,
    pub role: UserRole,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub division: Option<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub subjects: Vec<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub divisions: Vec<String>,
}

impl User {
    pub fn faculty(username: &str, password: &str, subjects: Vec<String>, divisions: Vec<String>) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            role: UserRole::Faculty,
            division: None,
            subjects,
            divisions,
        }
    }

    pub fn student(username: &str, password: &str, division: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            role: UserRole::Student,
            division: Some(division.to_string()),
            subjects: Vec::new(),
            divisions: Vec::new(),
        }
    }

    pub fn admin(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            role: UserRole::Admin,
            division: None,
            subjects: Vec::new(),
            divisions: Vec::new(),
        }
    }
}

/// Partial update applied by the admin panel. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub password: Option<String>,
    pub subjects: Option<Vec<String>>,
    pub divisions: Option<Vec<String>>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.password.is_none() && self.subjects.is_none() && self.divisions.is_none()
    }

    pub fn apply(&self, user: &mut User) {
        if let Some(p) = &self.password {
            user.password = p.clone();
        }
        if let Some(s) = &self.subjects {
            user.subjects = s.clone();
        }
        if let Some(d) = &self.divisions {
            user.divisions = d.clone();
        }
    }
}

// Request/Response DTOs
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub message: String,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub username: String,
    pub role: UserRole,
    pub role_label: &'static str,
    pub division: Option<String>,
    pub subjects: Vec<String>,
    pub divisions: Vec<String>,
}

impl From<User> for UserProfile {
    fn from(u: User) -> Self {
        Self {
            username: u.username,
            role: u.role,
            role_label: u.role.label(),
            division: u.division,
            subjects: u.subjects,
            divisions: u.divisions,
        }
    }
}

/// Admin form for a new faculty account. `subjects`/`divisions` are the
/// comma-separated text fields of the form.
#[derive(Debug, Deserialize)]
pub struct CreateFacultyRequest {
    pub username: String,
    pub password: String,
    #[serde(default, deserialize_with = "string_or_list")]
    pub subjects: Vec<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub divisions: Vec<String>,
}

/// Partial edit of a faculty account; absent fields are left unchanged.
/// Lists take the same text or array shapes as [`CreateFacultyRequest`].
#[derive(Debug, Deserialize)]
pub struct UpdateFacultyRequest {
    pub password: Option<String>,
    #[serde(default, deserialize_with = "optional_string_or_list")]
    pub subjects: Option<Vec<String>>,
    #[serde(default, deserialize_with = "optional_string_or_list")]
    pub divisions: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_text() {
        for role in [UserRole::Admin, UserRole::Faculty, UserRole::Student] {
            assert_eq!(role.to_string().parse::<UserRole>().unwrap(), role);
        }
        assert_eq!(" Faculty ".parse::<UserRole>().unwrap(), UserRole::Faculty);
        assert!("teacher".parse::<UserRole>().is_err());
    }

    #[test]
    fn user_row_tolerates_nulls_and_text_lists() {
        let row = r#"{
            "username": "asha",
            "password": "pw",
            "role": "faculty",
            "division": null,
            "subjects": "DBMS, OS",
            "divisions": null
        }"#;
        let user: User = serde_json::from_str(row).unwrap();
        assert_eq!(user.division, None);
        assert_eq!(user.subjects, vec!["DBMS", "OS"]);
        assert!(user.divisions.is_empty());
    }

    #[test]
    fn profile_hides_password() {
        let profile = UserProfile::from(User::student("s1", "secret", "A"));
        let json = serde_json::to_value(&profile).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["role_label"], "Student");
    }
}
