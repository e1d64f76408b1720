use crate::error::{Error, Result};
use csv::ReaderBuilder;
use log::{error, info, warn};
use serde::Deserialize;
use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct UserRecord {
    username: String,
    password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    Authorized,
    Unauthorized,
}

/// Request-scoped login state handed to anything that needs authorisation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    user: Option<String>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Check the credential and return a session bound to the user on success.
    pub fn login(users_path: &Path, username: &str, password: &str) -> Self {
        match check_login(users_path, username, password) {
            Ok(Authorization::Authorized) => Self {
                user: Some(username.to_string()),
            },
            Ok(Authorization::Unauthorized) => Self::anonymous(),
            Err(e) => {
                error!("System error during login: {}", e);
                Self::anonymous()
            }
        }
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn require_user(&self) -> Result<&str> {
        self.user().ok_or(Error::Unauthorized)
    }
}

/// Look `username` up in a `username,password` CSV and compare passwords.
/// The first row with a matching username decides.
pub fn check_login(users_path: &Path, username: &str, password: &str) -> Result<Authorization> {
    let file = match File::open(users_path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(Error::MissingUsers(users_path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    let mut reader = ReaderBuilder::new().from_reader(file);
    for row in reader.deserialize() {
        let user: UserRecord = row?;
        if user.username == username {
            return Ok(if user.password == password {
                info!("User {} logged in", username);
                Authorization::Authorized
            } else {
                warn!("Invalid credentials for {}", username);
                Authorization::Unauthorized
            });
        }
    }

    warn!("Unknown user {}", username);
    Ok(Authorization::Unauthorized)
}
