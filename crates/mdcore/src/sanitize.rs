use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use ammonia::Builder;
use url::Url;

use crate::schema::{SanitizeSchema, CLOBBER_PREFIX};

/// Allow-list HTML cleaner built from a [`SanitizeSchema`].
pub struct Sanitizer {
    cleaner: Builder<'static>,
}

impl Sanitizer {
    pub fn new(schema: &SanitizeSchema) -> Self {
        let mut cleaner = Builder::new();

        // ammonia rejects `class` as a plain attribute on tags with a class allow-list
        let tag_attributes: HashMap<&'static str, HashSet<&'static str>> = schema
            .attributes
            .iter()
            .map(|(tag, attrs)| {
                let mut attrs: HashSet<&'static str> = attrs.iter().copied().collect();
                if schema.classes.contains_key(tag) {
                    attrs.remove("class");
                }
                (*tag, attrs)
            })
            .collect();

        let mut generic_attributes: HashSet<&'static str> =
            schema.generic_attributes.iter().copied().collect();
        if !schema.classes.is_empty() {
            generic_attributes.remove("class");
        }

        let tag_attribute_values: HashMap<&'static str, HashMap<&'static str, HashSet<&'static str>>> = schema
            .attribute_values
            .iter()
            .map(|(tag, attrs)| {
                let attrs = attrs
                    .iter()
                    .map(|(attr, values)| (*attr, values.iter().copied().collect()))
                    .collect();
                (*tag, attrs)
            })
            .collect();

        let allowed_classes: HashMap<&'static str, HashSet<&'static str>> = schema
            .classes
            .iter()
            .map(|(tag, classes)| (*tag, classes.iter().copied().collect()))
            .collect();

        cleaner
            .tags(schema.tag_names.iter().copied().collect())
            .tag_attributes(tag_attributes)
            .generic_attributes(generic_attributes)
            .tag_attribute_values(tag_attribute_values)
            .allowed_classes(allowed_classes)
            .url_schemes(schema.url_schemes().into_iter().collect())
            .strip_comments(true);

        // ammonia only knows one global scheme list; narrow it per attribute
        let protocols = schema.protocols.clone();
        let clobber = schema.clobber.clone();
        cleaner.attribute_filter(move |element, attribute, value| {
            if !permits_url(&protocols, attribute, value) {
                log::debug!("Dropping {} on <{}>: protocol not allowed", attribute, element);
                return None;
            }
            if clobber.contains(attribute) {
                return Some(with_prefix(value));
            }
            match value.strip_prefix('#') {
                // in-page links follow the prefixed ids
                Some(fragment) if attribute == "href" && !fragment.is_empty() => {
                    Some(Cow::Owned(format!("#{}", with_prefix(fragment))))
                }
                _ => Some(Cow::Borrowed(value)),
            }
        });

        Self { cleaner }
    }

    pub fn for_flag(extended: bool) -> Self {
        Self::new(&SanitizeSchema::for_flag(extended))
    }

    pub fn clean(&self, html: &str) -> String {
        self.cleaner.clean(html).to_string()
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::for_flag(false)
    }
}

fn permits_url(
    protocols: &BTreeMap<&'static str, BTreeSet<&'static str>>,
    attribute: &str,
    value: &str,
) -> bool {
    let Some(schemes) = protocols.get(attribute) else {
        return true;
    };
    match Url::parse(value.trim()) {
        Ok(url) => schemes.contains(url.scheme()),
        Err(url::ParseError::RelativeUrlWithoutBase) => true,
        Err(_) => false,
    }
}

/// Prefix `value` with [`CLOBBER_PREFIX`] unless it already carries it.
fn with_prefix(value: &str) -> Cow<'_, str> {
    if value.starts_with(CLOBBER_PREFIX) {
        Cow::Borrowed(value)
    } else {
        Cow::Owned(format!("{}{}", CLOBBER_PREFIX, value))
    }
}

pub fn sanitize_html(html: &str) -> String {
    // Baseline allow-list only
    Sanitizer::default().clean(html)
}

pub fn sanitize_with_options(html: &str, extended: bool) -> String {
    Sanitizer::for_flag(extended).clean(html)
}
