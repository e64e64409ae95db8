//! Translation of user-facing labels.
//!
//! Only chart series labels pass through here; everything else the model
//! returns is data.

use ahash::AHashMap;

pub const TOTAL_SENT_KEY: &str = "notification.show.total.sent";

/// Resolves message keys to localized strings
pub trait Translator {
    fn translate(&self, key: &str) -> String;
}

/// Key/value translation catalog for one locale.
/// Unknown keys translate to themselves.
#[derive(Debug, Clone)]
pub struct Catalog {
    locale: String,
    messages: AHashMap<String, String>,
}

impl Catalog {
    pub fn new(locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            messages: AHashMap::new(),
        }
    }

    /// The built-in English catalog
    pub fn english() -> Self {
        Self::new("en").with(TOTAL_SENT_KEY, "Total sent")
    }

    pub fn with(mut self, key: impl Into<String>, message: impl Into<String>) -> Self {
        self.messages.insert(key.into(), message.into());
        self
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::english()
    }
}

impl Translator for Catalog {
    fn translate(&self, key: &str) -> String {
        match self.messages.get(key) {
            Some(message) => message.clone(),
            None => {
                log::debug!("No '{}' translation for {}", self.locale, key);
                key.to_string()
            }
        }
    }
}
