//! Wire types for the auth and guest endpoints.

use serde::{Deserialize, Serialize};
use std::fmt;

/// User id as issued by the backend. Older endpoints send numbers, newer ones strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Number(i64),
    Text(String),
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserId::Number(n) => write!(f, "{}", n),
            UserId::Text(s) => f.write_str(s),
        }
    }
}

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Parent,
    Admin,
    #[default]
    #[serde(other)]
    Unknown,
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "teacher" => Ok(Role::Teacher),
            "parent" => Ok(Role::Parent),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Authenticated user profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Fields this client does not interpret.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl User {
    /// "First Last", falling back to whichever identifier is present.
    pub fn display_name(&self) -> String {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if !name.is_empty() {
            return name;
        }
        self.email
            .clone()
            .or_else(|| self.phone.clone())
            .unwrap_or_else(|| self.id.to_string())
    }
}

/// Access/refresh token pair as returned by the token endpoints.
#[derive(Clone, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair").finish_non_exhaustive()
    }
}

/// Login/register response.
#[derive(Debug, Deserialize)]
pub(crate) struct AuthResponse {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub user: User,
}

#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email_or_phone: &'a str,
    pub password: &'a str,
}

#[derive(Serialize)]
pub(crate) struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

fn non_blank(value: impl Into<String>) -> Option<String> {
    let value = value.into();
    (!value.trim().is_empty()).then_some(value)
}

/// Account creation payload.
///
/// Optional identity fields are only included when they have content, so an
/// unused email or phone channel is absent from the body rather than `""`.
#[derive(Clone, Serialize)]
pub struct RegistrationRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone: Option<String>,
    password: String,
    role: Role,
}

impl fmt::Debug for RegistrationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationRequest")
            .field("email", &self.email)
            .field("phone", &self.phone)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

impl RegistrationRequest {
    pub fn new(password: impl Into<String>, role: Role) -> Self {
        Self {
            first_name: None,
            last_name: None,
            email: None,
            phone: None,
            password: password.into(),
            role,
        }
    }

    pub fn first_name(mut self, value: impl Into<String>) -> Self {
        self.first_name = non_blank(value);
        self
    }

    pub fn last_name(mut self, value: impl Into<String>) -> Self {
        self.last_name = non_blank(value);
        self
    }

    pub fn email(mut self, value: impl Into<String>) -> Self {
        self.email = non_blank(value);
        self
    }

    pub fn phone(mut self, value: impl Into<String>) -> Self {
        self.phone = non_blank(value);
        self
    }

    /// Whether at least one contact channel is present.
    pub fn has_identifier(&self) -> bool {
        self.email.is_some() || self.phone.is_some()
    }
}

/// Partial profile update. Blank values are left out of the request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone: Option<String>,
}

impl ProfilePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn first_name(mut self, value: impl Into<String>) -> Self {
        self.first_name = non_blank(value);
        self
    }

    pub fn last_name(mut self, value: impl Into<String>) -> Self {
        self.last_name = non_blank(value);
        self
    }

    pub fn email(mut self, value: impl Into<String>) -> Self {
        self.email = non_blank(value);
        self
    }

    pub fn phone(mut self, value: impl Into<String>) -> Self {
        self.phone = non_blank(value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
    }
}

#[derive(Serialize)]
pub(crate) struct GuestSessionRequest<'a> {
    pub fingerprint: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GuestSessionResponse {
    pub session_token: String,
}

#[derive(Serialize)]
pub(crate) struct TrackRequest<'a> {
    pub session_token: &'a str,
    pub content_type: &'a str,
    pub content_id: &'a str,
}

/// Server verdict for one reported content view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackOutcome {
    pub requires_login: bool,
    pub content_accessed_count: u64,
}

/// Guest session as seen by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GuestStatus {
    #[serde(default)]
    pub exists: bool,
    #[serde(default)]
    pub requires_login: bool,
    #[serde(default)]
    pub content_accessed_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_id_accepts_number_and_string() {
        let numeric: User = serde_json::from_value(json!({"id": 42, "role": "teacher"})).unwrap();
        assert_eq!(numeric.id, UserId::Number(42));
        assert_eq!(numeric.id.to_string(), "42");

        let textual: User =
            serde_json::from_value(json!({"id": "u-7", "role": "student"})).unwrap();
        assert_eq!(textual.id, UserId::Text("u-7".into()));
    }

    #[test]
    fn test_unknown_or_missing_role() {
        let user: User = serde_json::from_value(json!({"id": 1, "role": "janitor"})).unwrap();
        assert_eq!(user.role, Role::Unknown);

        let user: User = serde_json::from_value(json!({"id": 1})).unwrap();
        assert_eq!(user.role, Role::Unknown);
    }

    #[test]
    fn test_user_keeps_extra_fields() {
        let user: User = serde_json::from_value(json!({
            "id": 3,
            "role": "parent",
            "first_name": "Ada",
            "school": "North"
        }))
        .unwrap();

        assert_eq!(user.extra.get("school"), Some(&json!("North")));
        assert_eq!(user.display_name(), "Ada");
    }

    #[test]
    fn test_registration_omits_blank_channels() {
        let request = RegistrationRequest::new("s3cret", Role::Student)
            .first_name("Ada")
            .last_name("  ")
            .email("")
            .phone("+15550100");

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            json!({
                "first_name": "Ada",
                "phone": "+15550100",
                "password": "s3cret",
                "role": "student"
            })
        );
        assert!(request.has_identifier());
    }

    #[test]
    fn test_registration_debug_hides_password() {
        let request = RegistrationRequest::new("hunter2", Role::Teacher).email("t@school.test");
        assert!(!format!("{:?}", request).contains("hunter2"));
    }

    #[test]
    fn test_profile_patch_skips_blank_fields() {
        let patch = ProfilePatch::new().first_name("Grace").email("   ");
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({"first_name": "Grace"}));
        assert!(!patch.is_empty());
        assert!(ProfilePatch::new().phone("").is_empty());
    }

    #[test]
    fn test_auth_response_flattens_tokens() {
        let response: AuthResponse = serde_json::from_value(json!({
            "access_token": "a",
            "refresh_token": "r",
            "user": {"id": 1, "role": "admin"}
        }))
        .unwrap();

        assert_eq!(response.tokens.access_token, "a");
        assert_eq!(response.user.role, Role::Admin);
    }
}
