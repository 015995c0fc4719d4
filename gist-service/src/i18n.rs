//! Localised user-facing messages.

use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource};
use std::collections::HashMap;
use tracing::warn;
use unic_langid::LanguageIdentifier;

/// Locale used when a message is missing from the requested one
const FALLBACK_LOCALE: &str = "en";

const EN_MESSAGES: &str = r#"
# Gist Service - English Translations

# Errors
error-not-found = The requested { $entity } was not found: { $id }
error-forbidden = You do not have access to this { $entity }
error-already-processed = Upload { $id } already has a summary
error-internal = An internal error occurred

# Uploads
upload-deleted = Upload and stored files deleted

# Accounts
account-logged-out = Logged out

# Health
health-status-healthy = Service is healthy
health-status-degraded = Service is degraded: { $reason }
"#;

/// Fluent message bundles keyed by locale, fixed at startup
pub struct I18n {
    bundles: HashMap<String, FluentBundle<FluentResource>>,
}

impl I18n {
    /// Bundles for the embedded locales
    pub fn new() -> Self {
        let mut bundles = HashMap::new();
        match build_bundle(FALLBACK_LOCALE, EN_MESSAGES) {
            Ok(bundle) => {
                bundles.insert(FALLBACK_LOCALE.to_string(), bundle);
            }
            Err(e) => warn!(locale = FALLBACK_LOCALE, error = %e, "Failed to load messages"),
        }
        Self { bundles }
    }

    /// Message for `key`, falling back to English and then to the key itself
    pub fn get(&self, locale: &str, key: &str, args: Option<&FluentArgs>) -> String {
        self.lookup(locale, key, args)
            .or_else(|| self.lookup(FALLBACK_LOCALE, key, args))
            .unwrap_or_else(|| key.to_string())
    }

    pub fn format(&self, locale: &str, key: &str, args: &[(&str, &str)]) -> String {
        let mut fluent_args = FluentArgs::new();
        for (name, value) in args {
            fluent_args.set(*name, *value);
        }
        self.get(locale, key, Some(&fluent_args))
    }

    fn lookup(&self, locale: &str, key: &str, args: Option<&FluentArgs>) -> Option<String> {
        let bundle = self.bundles.get(locale)?;
        let pattern = bundle.get_message(key)?.value()?;

        let mut errors = vec![];
        let message = bundle.format_pattern(pattern, args, &mut errors);
        if !errors.is_empty() {
            warn!(key = %key, errors = ?errors, "Fluent formatting errors");
        }
        Some(message.into_owned())
    }
}

fn build_bundle(locale: &str, source: &str) -> Result<FluentBundle<FluentResource>, String> {
    let lang_id: LanguageIdentifier = locale
        .parse()
        .map_err(|e| format!("invalid locale '{locale}': {e}"))?;
    let resource = FluentResource::try_new(source.to_string())
        .map_err(|(_, errors)| format!("unparseable messages: {errors:?}"))?;

    let mut bundle = FluentBundle::new_concurrent(vec![lang_id]);
    bundle
        .add_resource(resource)
        .map_err(|errors| format!("conflicting messages: {errors:?}"))?;
    Ok(bundle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_message() {
        let i18n = I18n::new();

        let msg = i18n.get("en", "account-logged-out", None);
        assert_eq!(msg, "Logged out");
    }

    #[test]
    fn test_format_message() {
        let i18n = I18n::new();

        let msg = i18n.format("en", "error-already-processed", &[("id", "u1")]);
        // Fluent adds Unicode bidi isolation characters around variables
        // U+2068 (First Strong Isolate) and U+2069 (Pop Directional Isolate)
        assert_eq!(msg, "Upload \u{2068}u1\u{2069} already has a summary");
    }

    #[test]
    fn test_fallback_to_key() {
        let i18n = I18n::new();

        let msg = i18n.get("en", "nonexistent-key", None);
        assert_eq!(msg, "nonexistent-key");
    }

    #[test]
    fn test_fallback_to_default_locale() {
        let i18n = I18n::new();

        // Request French (not loaded), should fall back to English
        let msg = i18n.get("fr", "upload-deleted", None);
        assert_eq!(msg, "Upload and stored files deleted");
    }
}
