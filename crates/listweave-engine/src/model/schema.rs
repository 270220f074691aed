use std::collections::BTreeSet;

use super::{ContentKind, ListAttr};

/// Tells the host which attributes are list-semantic and which content
/// kinds may carry list attributes at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSchema {
    extension_attributes: BTreeSet<String>,
    rejected_kinds: BTreeSet<String>,
}

impl Default for AttributeSchema {
    fn default() -> Self {
        Self {
            extension_attributes: BTreeSet::new(),
            rejected_kinds: BTreeSet::from([ContentKind::HorizontalRule.name().to_string()]),
        }
    }
}

impl AttributeSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the set of content kind names that cannot host list attributes.
    pub fn with_rejected_kinds<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rejected_kinds = kinds.into_iter().map(Into::into).collect();
        self
    }

    /// Declares an extension attribute (e.g. a marker payload) list-semantic.
    pub fn register_list_attribute(&mut self, name: impl Into<String>) {
        self.extension_attributes.insert(name.into());
    }

    pub fn is_list_attribute(&self, name: &str) -> bool {
        ListAttr::from_name(name).is_some() || self.extension_attributes.contains(name)
    }

    pub fn extension_attributes(&self) -> impl Iterator<Item = &str> {
        self.extension_attributes.iter().map(String::as_str)
    }

    pub fn can_host_list(&self, kind: &ContentKind) -> bool {
        !self.rejected_kinds.contains(kind.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schema_rejects_rules_only() {
        let schema = AttributeSchema::default();
        assert!(schema.can_host_list(&ContentKind::Paragraph));
        assert!(schema.can_host_list(&ContentKind::Table));
        assert!(!schema.can_host_list(&ContentKind::HorizontalRule));
    }

    #[test]
    fn test_list_attribute_names() {
        let mut schema = AttributeSchema::default();
        assert!(schema.is_list_attribute("listIndent"));
        assert!(!schema.is_list_attribute("todoChecked"));

        schema.register_list_attribute("todoChecked");
        assert!(schema.is_list_attribute("todoChecked"));
    }

    #[test]
    fn test_with_rejected_kinds_replaces_defaults() {
        let schema = AttributeSchema::default().with_rejected_kinds(["image"]);
        assert!(schema.can_host_list(&ContentKind::HorizontalRule));
        assert!(!schema.can_host_list(&ContentKind::Image));
    }
}
