//! Credential container with automatic memory zeroing.
//!
//! # Security
//! - Passwords are stored in `Zeroizing` containers
//! - Memory is cleared when credentials go out of scope
//! - Passwords never appear in debug output or logs

use zeroize::Zeroizing;

/// Username and password for a locally configured connection.
///
/// An empty password is kept as supplied; [`Credentials::connect_password`]
/// decides how it reaches the driver.
///
/// # Example
///
/// ```rust
/// use dbprobe_core::security::Credentials;
///
/// let creds = Credentials::new("admin", Some("secret".to_string()));
/// assert_eq!(creds.username(), Some("admin"));
/// assert!(creds.has_password());
/// assert!(!format!("{:?}", creds).contains("secret"));
/// ```
#[derive(Clone, Default)]
pub struct Credentials {
    username: Option<String>,
    password: Option<Zeroizing<String>>,
}

impl Credentials {
    /// Creates credentials; an empty username is stored as absent.
    pub fn new(username: impl Into<String>, password: Option<String>) -> Self {
        let username = username.into();
        Self {
            username: (!username.is_empty()).then_some(username),
            password: password.map(Zeroizing::new),
        }
    }

    /// Username, if one was supplied
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Password as supplied, including an empty one
    pub fn password(&self) -> Option<&str> {
        self.password.as_ref().map(|p| p.as_str())
    }

    /// Password handed to the driver.
    ///
    /// An empty password is treated as "no password" so password-less local
    /// accounts authenticate.
    pub fn connect_password(&self) -> Option<&str> {
        self.password().filter(|p| !p.is_empty())
    }

    /// Checks if a password field is present without exposing it
    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field(
                "password",
                &self.password.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}
