use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Identity providers offered on the sign-in page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    Facebook,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Facebook => "facebook",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "Google",
            OAuthProvider::Facebook => "Facebook",
        }
    }

    /// Target name passed when opening the popup; reusing it focuses an existing popup.
    pub fn window_name(&self) -> String {
        format!("{}_oauth", self.as_str())
    }

    pub fn page_title(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "Sign in with Google",
            OAuthProvider::Facebook => "Continue with Facebook",
        }
    }

    pub fn accent_color(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "#4285f4",
            OAuthProvider::Facebook => "#4267B2",
        }
    }

    pub fn background_color(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "#f8f9fa",
            OAuthProvider::Facebook => "#4267B2",
        }
    }

    pub fn text_color(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "#333",
            OAuthProvider::Facebook => "#fff",
        }
    }

    /// Domain of the placeholder account shown by the simulated consent page.
    pub fn email_domain(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "gmail.com",
            OAuthProvider::Facebook => "facebook.com",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OAuthProvider {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "google" => Ok(OAuthProvider::Google),
            "facebook" => Ok(OAuthProvider::Facebook),
            other => Err(ValidationError::InvalidField(format!(
                "unsupported provider: {other}"
            ))),
        }
    }
}
