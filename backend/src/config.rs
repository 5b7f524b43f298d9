//! Practice identity used for document branding and the PRACTICE
//! placeholder source.

use std::env;

#[derive(Debug, Clone)]
pub struct PracticeDetails {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
}

impl PracticeDetails {
    /// Reads the practice identity from the environment, falling back to
    /// built-in defaults for any variable that is unset.
    pub fn from_env() -> Self {
        Self {
            name: env::var("PRACTICE_NAME").unwrap_or_else(|_| "Harrison & Co Accountants".into()),
            address: env::var("PRACTICE_ADDRESS")
                .unwrap_or_else(|_| "12 King Street, Manchester, M2 6AQ".into()),
            phone: env::var("PRACTICE_PHONE").unwrap_or_else(|_| "0161 496 0000".into()),
            email: env::var("PRACTICE_EMAIL").unwrap_or_else(|_| "office@harrisonco.example".into()),
        }
    }
}

impl Default for PracticeDetails {
    fn default() -> Self {
        Self::from_env()
    }
}
