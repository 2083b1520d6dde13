use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::store::Record;

/// Named remote execution host, unique by `name`.
///
/// The password is never written to disk; callers fill it in from the
/// credential lookup after loading.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    pub private_key_path: Option<String>,
    pub remote_base_path: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl ConnectionDescriptor {
    pub const DEFAULT_PORT: u16 = 22;

    #[must_use]
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        username: impl Into<String>,
        remote_base_path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port: Self::DEFAULT_PORT,
            username: username.into(),
            password: None,
            private_key_path: None,
            remote_base_path: remote_base_path.into(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    /// `<base>/<relative>` on the remote host
    #[must_use]
    pub fn remote_path(&self, relative: &str) -> String {
        format!("{}/{}", self.remote_base_path.trim_end_matches('/'), relative)
    }

    /// `user@host` target for ssh/scp
    #[must_use]
    pub fn destination(&self) -> String {
        format!("{}@{}", self.username, self.host)
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("private_key_path", &self.private_key_path)
            .field("remote_base_path", &self.remote_base_path)
            .field("is_active", &self.is_active)
            .finish_non_exhaustive()
    }
}

impl Record for ConnectionDescriptor {
    const COLLECTION: &'static str = "connections";

    fn key(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_never_serialized() {
        let mut conn = ConnectionDescriptor::new("ml_runner", "ml_runner", "root", "/app/workflows");
        conn.password = Some("hunter2".to_string());
        let json = serde_json::to_string(&conn).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(!format!("{conn:?}").contains("hunter2"));
        let back: ConnectionDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back.password, None);
        assert_eq!(back.port, 22);
    }

    #[test]
    fn test_remote_path_join() {
        let conn = ConnectionDescriptor::new("c", "h", "u", "/app/workflows/");
        assert_eq!(conn.remote_path("42/model.py"), "/app/workflows/42/model.py");
        assert_eq!(conn.destination(), "u@h");
    }
}
