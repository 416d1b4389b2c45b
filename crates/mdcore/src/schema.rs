//! Allow-list schema for the HTML sanitizer.
//!
//! A [`SanitizeSchema`] is a set of set-valued maps. Schemas only ever grow:
//! the extended overlay is merged into the baseline with [`SanitizeSchema::extend`],
//! which is a plain set union, so the baseline is always a subset of the result.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::highlight::HIGHLIGHT_TOKEN_CLASSES;

/// Extra URL schemes the extended overlay permits on `src`.
pub const EXTENDED_PROTOCOLS: &[&str] = &["data", "http", "https"];

/// Extra tags and their attributes enabled by the extended overlay.
pub const EXTENDED_ATTRIBUTES: &[(&str, &[&str])] = &[
    ("audio", &["src", "controls"]),
    ("video", &["src", "controls"]),
    ("img", &["src", "alt"]),
    ("source", &["src", "type"]),
    ("table", &["border", "style"]),
    ("thead", &[]),
    ("tbody", &[]),
    ("tr", &[]),
    ("th", &["style"]),
    ("td", &["style"]),
];

/// Prefix put in front of document-level names so user content cannot clobber
/// the host page's ids.
pub const CLOBBER_PREFIX: &str = "user-content-";

/// Tags footnote links and their targets are rendered on.
const ANCHOR_TAGS: &[&str] = &["a", "li", "sup"];

/// URL protocol policy of the baseline, per attribute.
const BASELINE_PROTOCOLS: &[(&str, &[&str])] = &[
    ("href", &["http", "https", "mailto", "xmpp", "irc", "ircs"]),
    ("cite", &["http", "https"]),
    ("src", &["http", "https"]),
    ("longdesc", &["http", "https"]),
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SanitizeSchema {
    pub tag_names: BTreeSet<&'static str>,
    pub attributes: BTreeMap<&'static str, BTreeSet<&'static str>>,
    pub generic_attributes: BTreeSet<&'static str>,
    pub attribute_values: BTreeMap<&'static str, BTreeMap<&'static str, BTreeSet<&'static str>>>,
    pub protocols: BTreeMap<&'static str, BTreeSet<&'static str>>,
    pub classes: BTreeMap<&'static str, BTreeSet<&'static str>>,
    /// Attributes whose values are prefixed with [`CLOBBER_PREFIX`].
    pub clobber: BTreeSet<&'static str>,
}

impl SanitizeSchema {
    /// Build the allow-list for the given feature flag.
    pub fn for_flag(extended: bool) -> Self {
        let mut schema = Self::baseline();
        if extended {
            schema.extend(&Self::extended_overlay());
        }
        schema
    }

    /// The secure default: ammonia's built-in allow-list, a per-attribute
    /// protocol policy, prefixed anchor ids and GFM task-list checkboxes.
    pub fn baseline() -> Self {
        let defaults = ammonia::Builder::default();
        let mut schema = Self {
            tag_names: defaults.clone_tags().into_iter().collect(),
            attributes: defaults
                .clone_tag_attributes()
                .into_iter()
                .map(|(tag, attrs)| (tag, attrs.into_iter().collect()))
                .collect(),
            generic_attributes: defaults.clone_generic_attributes().into_iter().collect(),
            ..Self::default()
        };

        for (attribute, schemes) in BASELINE_PROTOCOLS {
            schema.allow_protocols(*attribute, schemes);
        }

        for tag in ANCHOR_TAGS {
            schema.allow_tag(*tag, &["id"]);
        }
        schema.clobber.insert("id");

        // Task list items render as disabled checkboxes
        schema.allow_tag("input", &["checked", "disabled"]);
        schema.allow_attribute_values("input", "type", &["checkbox"]);

        schema
    }

    /// Multimedia and table tags, `data:` sources and highlight token classes.
    pub fn extended_overlay() -> Self {
        let mut overlay = Self::default();
        for (tag, attributes) in EXTENDED_ATTRIBUTES {
            overlay.allow_tag(*tag, attributes);
        }
        overlay.allow_protocols("src", EXTENDED_PROTOCOLS);
        overlay.allow_classes("span", HIGHLIGHT_TOKEN_CLASSES);
        overlay
    }

    pub fn allow_tag(&mut self, tag: &'static str, attributes: &[&'static str]) -> &mut Self {
        self.tag_names.insert(tag);
        self.attributes
            .entry(tag)
            .or_default()
            .extend(attributes.iter().copied());
        self
    }

    pub fn allow_protocols(&mut self, attribute: &'static str, schemes: &[&'static str]) -> &mut Self {
        self.protocols
            .entry(attribute)
            .or_default()
            .extend(schemes.iter().copied());
        self
    }

    pub fn allow_classes(&mut self, tag: &'static str, classes: &[&'static str]) -> &mut Self {
        self.classes
            .entry(tag)
            .or_default()
            .extend(classes.iter().copied());
        self
    }

    pub fn allow_attribute_values(
        &mut self,
        tag: &'static str,
        attribute: &'static str,
        values: &[&'static str],
    ) -> &mut Self {
        self.attribute_values
            .entry(tag)
            .or_default()
            .entry(attribute)
            .or_default()
            .extend(values.iter().copied());
        self
    }

    /// Merge `other` into `self` by set union. Nothing already permitted is removed.
    pub fn extend(&mut self, other: &SanitizeSchema) {
        self.tag_names.extend(other.tag_names.iter().copied());
        self.generic_attributes
            .extend(other.generic_attributes.iter().copied());
        self.clobber.extend(other.clobber.iter().copied());
        union_into(&mut self.attributes, &other.attributes);
        union_into(&mut self.protocols, &other.protocols);
        union_into(&mut self.classes, &other.classes);
        for (tag, values) in &other.attribute_values {
            union_into(self.attribute_values.entry(*tag).or_default(), values);
        }
    }

    pub fn is_superset_of(&self, other: &SanitizeSchema) -> bool {
        self.tag_names.is_superset(&other.tag_names)
            && self.generic_attributes.is_superset(&other.generic_attributes)
            && self.clobber.is_superset(&other.clobber)
            && contains_all(&self.attributes, &other.attributes)
            && contains_all(&self.protocols, &other.protocols)
            && contains_all(&self.classes, &other.classes)
            && other.attribute_values.iter().all(|(tag, values)| {
                self.attribute_values
                    .get(tag)
                    .is_some_and(|own| contains_all(own, values))
            })
    }

    pub fn permits_tag(&self, tag: &str) -> bool {
        self.tag_names.contains(tag)
    }

    pub fn permits_attribute(&self, tag: &str, attribute: &str) -> bool {
        self.generic_attributes.contains(attribute)
            || self
                .attributes
                .get(tag)
                .is_some_and(|attrs| attrs.contains(attribute))
            || self
                .attribute_values
                .get(tag)
                .is_some_and(|attrs| attrs.contains_key(attribute))
            || (attribute == "class" && self.classes.contains_key(tag))
    }

    /// Attributes without a protocol policy accept any scheme.
    pub fn permits_protocol(&self, attribute: &str, scheme: &str) -> bool {
        self.protocols
            .get(attribute)
            .map_or(true, |schemes| schemes.contains(scheme))
    }

    /// Every scheme permitted on at least one attribute.
    pub fn url_schemes(&self) -> BTreeSet<&'static str> {
        self.protocols.values().flatten().copied().collect()
    }
}

fn union_into(
    target: &mut BTreeMap<&'static str, BTreeSet<&'static str>>,
    source: &BTreeMap<&'static str, BTreeSet<&'static str>>,
) {
    for (key, values) in source {
        target.entry(*key).or_default().extend(values.iter().copied());
    }
}

fn contains_all(
    outer: &BTreeMap<&'static str, BTreeSet<&'static str>>,
    inner: &BTreeMap<&'static str, BTreeSet<&'static str>>,
) -> bool {
    inner.iter().all(|(key, values)| {
        outer
            .get(key)
            .is_some_and(|own| own.is_superset(values))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extended_schema_keeps_baseline() {
        let baseline = SanitizeSchema::baseline();
        let extended = SanitizeSchema::for_flag(true);
        assert!(extended.is_superset_of(&baseline));
        assert!(extended.is_superset_of(&SanitizeSchema::extended_overlay()));
        assert!(!baseline.is_superset_of(&extended));
    }

    #[test]
    fn test_flag_off_is_baseline() {
        assert_eq!(SanitizeSchema::for_flag(false), SanitizeSchema::baseline());
    }

    #[test]
    fn test_extended_tags_and_attributes() {
        let schema = SanitizeSchema::for_flag(true);
        for (tag, attributes) in EXTENDED_ATTRIBUTES {
            assert!(schema.permits_tag(tag), "missing tag {}", tag);
            for attribute in *attributes {
                assert!(
                    schema.permits_attribute(tag, attribute),
                    "missing {} on {}",
                    attribute,
                    tag
                );
            }
        }
        assert!(schema.permits_attribute("video", "controls"));
        assert!(schema.permits_attribute("td", "style"));
    }

    #[test]
    fn test_media_tags_only_when_extended() {
        let baseline = SanitizeSchema::for_flag(false);
        assert!(!baseline.permits_tag("video"));
        assert!(!baseline.permits_tag("audio"));
        assert!(!baseline.permits_tag("source"));
        assert!(!baseline.permits_attribute("td", "style"));
    }

    #[test]
    fn test_src_protocols() {
        let baseline = SanitizeSchema::for_flag(false);
        assert!(baseline.permits_protocol("src", "https"));
        assert!(!baseline.permits_protocol("src", "data"));

        let extended = SanitizeSchema::for_flag(true);
        assert!(extended.permits_protocol("src", "data"));
        assert!(extended.permits_protocol("src", "http"));
        assert!(!extended.permits_protocol("href", "data"));
        assert!(!extended.permits_protocol("href", "javascript"));
        assert!(extended.url_schemes().contains("data"));
    }

    #[test]
    fn test_token_classes_on_span() {
        let extended = SanitizeSchema::for_flag(true);
        let classes = extended.classes.get("span").expect("span classes");
        assert_eq!(classes.len(), HIGHLIGHT_TOKEN_CLASSES.len());
        assert!(classes.contains("hljs-keyword"));
        assert!(extended.permits_attribute("span", "class"));

        let baseline = SanitizeSchema::for_flag(false);
        assert!(!baseline.permits_attribute("span", "class"));
    }

    #[test]
    fn test_extend_is_union() {
        let mut schema = SanitizeSchema::default();
        schema.allow_tag("img", &["alt"]);
        let mut overlay = SanitizeSchema::default();
        overlay.allow_tag("img", &["src"]);
        schema.extend(&overlay);

        let attrs = &schema.attributes["img"];
        assert!(attrs.contains("alt"));
        assert!(attrs.contains("src"));
    }

    #[test]
    fn test_baseline_allows_task_list_checkbox() {
        let baseline = SanitizeSchema::baseline();
        assert!(baseline.permits_tag("input"));
        assert!(baseline.permits_attribute("input", "type"));
        assert!(baseline.permits_attribute("input", "disabled"));
        assert!(!baseline.permits_tag("script"));
    }

    #[test]
    fn test_baseline_allows_prefixed_anchor_ids() {
        for extended in [false, true] {
            let schema = SanitizeSchema::for_flag(extended);
            assert!(schema.permits_attribute("li", "id"));
            assert!(schema.permits_attribute("a", "id"));
            assert!(!schema.permits_attribute("div", "id"));
            assert!(schema.clobber.contains("id"));
        }
    }
}
