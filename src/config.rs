//! Process-wide defaults for template retrieval and attribute conventions.
//!
//! A [`ConfigPatch`] is what `configure({...})` receives: every field is
//! optional and only the present ones overwrite the current [`Config`].
//! Changes affect templates fetched afterwards; cached kinds are untouched.

use serde::{Deserialize, Serialize};

/// Current runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Prepended to the template kind when building a fetch URL.
    pub base_url: String,
    /// Appended to the template kind when building a fetch URL.
    pub extension: String,
    /// Attributes carrying this prefix seed props at assembly time.
    pub prop_prefix: String,
    /// Attribute used by `ref` lookups and by the style rewrite.
    pub ref_attribute: String,
    /// Attribute a projected child uses to name its target slot.
    pub slot_attribute: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "/components/".to_string(),
            extension: ".dynel.html".to_string(),
            prop_prefix: "prop-".to_string(),
            ref_attribute: "ref".to_string(),
            slot_attribute: "slot".to_string(),
        }
    }
}

impl Config {
    /// URL a template kind is fetched from under this configuration.
    pub fn template_url(&self, kind: &str) -> String {
        format!("{}{}{}", self.base_url, kind, self.extension)
    }

    /// Overwrite the fields present in `patch`.
    pub fn apply(&mut self, patch: ConfigPatch) {
        if let Some(base_url) = patch.base_url {
            self.base_url = base_url;
        }
        if let Some(extension) = patch.extension {
            self.extension = extension;
        }
        if let Some(prop_prefix) = patch.prop_prefix {
            self.prop_prefix = prop_prefix;
        }
        if let Some(ref_attribute) = patch.ref_attribute {
            self.ref_attribute = ref_attribute;
        }
        if let Some(slot_attribute) = patch.slot_attribute {
            self.slot_attribute = slot_attribute;
        }
    }
}

/// Partial update for [`Config`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfigPatch {
    pub base_url: Option<String>,
    pub extension: Option<String>,
    pub prop_prefix: Option<String>,
    pub ref_attribute: Option<String>,
    pub slot_attribute: Option<String>,
}

impl ConfigPatch {
    pub fn base_url(mut self, value: impl Into<String>) -> Self {
        self.base_url = Some(value.into());
        self
    }

    pub fn extension(mut self, value: impl Into<String>) -> Self {
        self.extension = Some(value.into());
        self
    }

    pub fn prop_prefix(mut self, value: impl Into<String>) -> Self {
        self.prop_prefix = Some(value.into());
        self
    }

    pub fn ref_attribute(mut self, value: impl Into<String>) -> Self {
        self.ref_attribute = Some(value.into());
        self
    }

    pub fn slot_attribute(mut self, value: impl Into<String>) -> Self {
        self.slot_attribute = Some(value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_url() {
        let config = Config::default();
        assert_eq!(config.template_url("counter"), "/components/counter.dynel.html");
    }

    #[test]
    fn test_patch_only_touches_present_fields() {
        let mut config = Config::default();
        config.apply(ConfigPatch::default().extension(".tmpl"));
        assert_eq!(config.extension, ".tmpl");
        assert_eq!(config.base_url, "/components/");
        assert_eq!(config.prop_prefix, "prop-");
    }

    #[test]
    fn test_patch_from_json() {
        let patch: ConfigPatch =
            serde_json::from_str(r#"{"baseUrl": "/ui/", "propPrefix": "data-"}"#).unwrap();
        let mut config = Config::default();
        config.apply(patch);
        assert_eq!(config.template_url("card"), "/ui/card.dynel.html");
        assert_eq!(config.prop_prefix, "data-");
    }
}
