//! Self-contained consent page written into the sign-in popup.
//!
//! The page stands in for an identity provider: it shows a placeholder account
//! and posts a [`HandshakeMessage`](super::HandshakeMessage) back to its opener
//! when the user continues or cancels.

use std::time::Duration;

use crate::oauth::OAuthProvider;

/// Name on the placeholder account.
pub const SIMULATED_NAME: &str = "John Doe";

/// Avatar URL on the placeholder account.
pub const SIMULATED_PICTURE: &str = "https://via.placeholder.com/150";

/// Error posted when the user presses Cancel.
pub const USER_CANCELLED: &str = "User cancelled authorization";

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <title>{{title}}</title>
    <style>
      body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 0; padding: 20px; background: {{background}}; color: {{text}}; }
      .container { max-width: 400px; margin: 50px auto; background: white; padding: 30px; border-radius: 8px; box-shadow: 0 2px 10px rgba(0,0,0,0.1); text-align: center; }
      .logo { font-size: 24px; font-weight: bold; margin-bottom: 20px; color: {{accent}}; }
      h2 { color: #333; margin-bottom: 20px; }
      .user-info { background: #f8f9fa; padding: 20px; border-radius: 8px; margin: 20px 0; color: #333; }
      .avatar { width: 60px; height: 60px; border-radius: 50%; margin: 0 auto 10px; background: linear-gradient(45deg, #4285f4, #34a853); display: flex; align-items: center; justify-content: center; color: white; font-size: 24px; font-weight: bold; }
      button { background: {{accent}}; color: white; border: none; padding: 12px 24px; border-radius: 6px; cursor: pointer; font-size: 16px; margin: 10px; min-width: 120px; }
      button:hover { opacity: 0.9; }
      .cancel { background: #6c757d; }
      .loading { display: none; text-align: center; padding: 20px; color: #333; }
      .spinner { border: 4px solid #f3f3f3; border-top: 4px solid #4285f4; border-radius: 50%; width: 30px; height: 30px; animation: spin 1s linear infinite; margin: 0 auto 10px; }
      @keyframes spin { 0% { transform: rotate(0deg); } 100% { transform: rotate(360deg); } }
    </style>
  </head>
  <body>
    <div class="container">
      <div class="logo">{{provider_name}}</div>
      <h2>Sign in to continue to {{app_name}}</h2>
      <div class="user-info">
        <div class="avatar">{{initials}}</div>
        <div><strong>{{name}}</strong></div>
        <div>{{email}}</div>
      </div>
      <p>{{app_name}} wants to access your basic profile information.</p>
      <div id="buttons">
        <button onclick="allowAccess()">Continue</button>
        <button class="cancel" onclick="denyAccess()">Cancel</button>
      </div>
      <div class="loading" id="loading">
        <div class="spinner"></div>
        <p>Signing you in...</p>
      </div>
    </div>
    <script>
      function reply(message) {
        if (window.opener) {
          window.opener.postMessage(message, '*');
        }
        window.close();
      }
      function allowAccess() {
        document.getElementById('buttons').style.display = 'none';
        document.getElementById('loading').style.display = 'block';
        setTimeout(function () {
          reply({
            type: 'oauth_success',
            provider: '{{provider}}',
            data: { email: '{{email}}', name: '{{name}}', picture: '{{picture}}', id: String(Date.now()) }
          });
        }, {{delay_ms}});
      }
      function denyAccess() {
        reply({ type: 'oauth_error', error: '{{cancelled}}' });
      }
    </script>
  </body>
</html>
"#;

/// Email of the placeholder account for `provider`.
pub fn simulated_email(provider: OAuthProvider) -> String {
    format!("john.doe@{}", provider.email_domain())
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|part| part.chars().next())
        .flat_map(char::to_uppercase)
        .take(2)
        .collect()
}

/// Render the consent document for `provider`, naming `app_name` as the requester.
pub fn render_consent_page(provider: OAuthProvider, app_name: &str, consent_delay: Duration) -> String {
    let app_name = escape_html(app_name);
    let email = simulated_email(provider);

    TEMPLATE
        .replace("{{title}}", provider.page_title())
        .replace("{{background}}", provider.background_color())
        .replace("{{text}}", provider.text_color())
        .replace("{{accent}}", provider.accent_color())
        .replace("{{provider_name}}", provider.display_name())
        .replace("{{provider}}", provider.as_str())
        .replace("{{app_name}}", &app_name)
        .replace("{{initials}}", &initials(SIMULATED_NAME))
        .replace("{{name}}", SIMULATED_NAME)
        .replace("{{email}}", &email)
        .replace("{{picture}}", SIMULATED_PICTURE)
        .replace("{{cancelled}}", USER_CANCELLED)
        .replace("{{delay_ms}}", &consent_delay.as_millis().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_google_page() {
        let html = render_consent_page(OAuthProvider::Google, "Vigil", Duration::from_secs(2));
        assert!(html.contains("<title>Sign in with Google</title>"));
        assert!(html.contains("Sign in to continue to Vigil"));
        assert!(html.contains("john.doe@gmail.com"));
        assert!(html.contains("provider: 'google'"));
        assert!(html.contains("}, 2000);"));
        assert!(html.contains(r#"<div class="avatar">JD</div>"#));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn test_facebook_page_colors() {
        let html = render_consent_page(OAuthProvider::Facebook, "Vigil", Duration::from_secs(2));
        assert!(html.contains("Continue with Facebook"));
        assert!(html.contains("background: #4267B2"));
        assert!(html.contains("john.doe@facebook.com"));
    }

    #[test]
    fn test_app_name_is_escaped() {
        let html = render_consent_page(
            OAuthProvider::Google,
            "<script>alert(1)</script>",
            Duration::from_secs(2),
        );
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(!html.contains("<script>alert(1)"));
    }
}
