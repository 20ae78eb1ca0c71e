use std::ops::ControlFlow;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref LANG_TAG_RE: Regex = Regex::new(r"^name:(.+)$").unwrap();
}

pub const DEFAULT_LANG: &str = "default";
pub const INT_LANG: &str = "int_name";

/// Backed by an insertion-ordered `Vec` rather than a sorted map: the
/// original `StringUtf8Multilang` indexes names by a small fixed language
/// code, and `for_each` must visit pairs in that code order, which for any
/// given feature coincides with the order its name tags were first set in,
/// not lexical order.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde_derive::Serialize, serde_derive::Deserialize)]
pub struct LangName(Vec<(String, String)>);

impl LangName {
    pub fn new() -> Self {
        LangName(Vec::new())
    }

    pub fn set(&mut self, lang: impl Into<String>, value: impl Into<String>) {
        let lang = lang.into();
        match self.0.iter_mut().find(|(l, _)| *l == lang) {
            Some((_, v)) => *v = value.into(),
            None => self.0.push((lang, value.into())),
        }
    }

    pub fn get(&self, lang: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(l, _)| l == lang)
            .map(|(_, v)| v.as_str())
    }

    pub fn default_name(&self) -> Option<&str> {
        self.get(DEFAULT_LANG)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn for_each<B>(&self, mut f: impl FnMut(&str, &str) -> ControlFlow<B>) -> ControlFlow<B> {
        for (lang, value) in &self.0 {
            f(lang, value)?;
        }
        ControlFlow::Continue(())
    }

    /// Builds a [`LangName`] from a raw OSM tag bag: the `name` tag becomes
    /// `default`, `int_name` becomes `int_name`, and every `name:<lang>`
    /// tag becomes `<lang>`, skipping any that duplicate the default value.
    pub fn from_tags<'a>(tags: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut out = LangName::new();
        let mut default_value: Option<&str> = None;
        let tags: Vec<_> = tags.into_iter().collect();

        for &(key, value) in &tags {
            if key == "name" {
                out.set(DEFAULT_LANG, value);
                default_value = Some(value);
            } else if key == "int_name" {
                out.set(INT_LANG, value);
            }
        }

        for &(key, value) in &tags {
            if let Some(captures) = LANG_TAG_RE.captures(key) {
                if Some(value) == default_value {
                    continue;
                }
                let lang = captures.get(1).unwrap().as_str();
                out.set(lang, value);
            }
        }

        out
    }

    /// Returns the first international name (any `name:<lang>` tag value)
    /// that differs from the default name, for use when a stricter English
    /// name lookup misses.
    pub fn international_names(&self) -> impl Iterator<Item = (&str, &str)> {
        let default = self.default_name();
        self.0
            .iter()
            .filter(move |(lang, value)| {
                lang.as_str() != DEFAULT_LANG
                    && lang.as_str() != INT_LANG
                    && Some(value.as_str()) != default
            })
            .map(|(lang, value)| (lang.as_str(), value.as_str()))
    }
}
