//! Credential redaction for connection strings that end up in logs.

use url::Url;

const MASK: &str = "***";

/// Masks the credentials in a connection string.
///
/// A password is replaced with `***`. A username without a password is
/// masked too, since Redis URLs are often written as `redis://secret@host`.
/// Strings without an `@` cannot carry credentials and are returned
/// unchanged. Anything else that does not parse, or that contains an `@`
/// the parser did not read as userinfo (an unencoded `/`, `?` or `#` in a
/// password), is reduced to `scheme://***`.
#[must_use]
pub fn redact_credentials(uri: &str) -> String {
    if !uri.contains('@') {
        return uri.to_string();
    }

    let Ok(mut parsed) = Url::parse(uri) else {
        return masked(uri);
    };
    let stray_at = parsed.path().contains('@')
        || parsed.query().is_some_and(|q| q.contains('@'))
        || parsed.fragment().is_some_and(|f| f.contains('@'));

    let redacted = if stray_at {
        Err(())
    } else if parsed.password().is_some() {
        parsed.set_password(Some(MASK))
    } else if parsed.username().is_empty() {
        Err(())
    } else {
        parsed.set_username(MASK)
    };

    match redacted {
        Ok(()) => parsed.to_string(),
        Err(()) => masked(uri),
    }
}

fn masked(uri: &str) -> String {
    uri.split_once("://")
        .map_or_else(|| MASK.to_string(), |(scheme, _)| format!("{scheme}://{MASK}"))
}
