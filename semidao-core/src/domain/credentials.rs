//! Portal credentials

use std::fmt;

use md5::{Digest, Md5};

/// Login credentials for one run
///
/// The password is only ever sent as its MD5 hex digest.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// MD5 hex digest of the password, as the login form expects it
    pub fn hashed_password(&self) -> String {
        hex::encode(Md5::digest(self.password.as_bytes()))
    }

    /// Form fields for the login POST
    ///
    /// `password` is a blank field the portal's form schema requires.
    pub fn login_form(&self) -> Vec<(String, String)> {
        vec![
            ("j_username".to_string(), self.email.clone()),
            ("password".to_string(), String::new()),
            ("j_password".to_string(), self.hashed_password()),
        ]
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashed_password_is_md5_hex() {
        let creds = Credentials::new("user@example.com", "password");
        assert_eq!(creds.hashed_password(), "5f4dcc3b5aa765d61d8327deb882cf99");
    }

    #[test]
    fn test_login_form_fields() {
        let creds = Credentials::new("user@example.com", "secret");
        let form = creds.login_form();

        assert_eq!(form.len(), 3);
        assert!(form.contains(&("j_username".to_string(), "user@example.com".to_string())));
        assert!(form.contains(&("password".to_string(), String::new())));
        assert!(form
            .iter()
            .any(|(k, v)| k == "j_password" && v.len() == 32 && v != "secret"));
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials::new("user@example.com", "hunter2");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("user@example.com"));
        assert!(!debug.contains("hunter2"));
    }
}
