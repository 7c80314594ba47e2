//! Declarative locators
//!
//! A `LocatorSpec` is one way of finding an element; a `LocatorChain` is the
//! ranked list of specs for one logical target. Specs compile to Playwright
//! selector strings, which the driver evaluates.

use serde::{Deserialize, Serialize};

use super::error::{EngineError, EngineResult};

/// Text matching mode
///
/// Regex patterns use JavaScript syntax and are matched case-insensitively.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TextMatch {
    Exact(String),
    Contains(String),
    Regex(String),
}

impl TextMatch {
    fn validate(&self) -> EngineResult<()> {
        if let TextMatch::Regex(pattern) = self {
            regex::Regex::new(pattern).map_err(|e| {
                EngineError::InvalidProfile(format!("invalid regex '{}': {}", pattern, e))
            })?;
        }
        Ok(())
    }

    /// Whether a text satisfies this matcher, using the same rules as
    /// the compiled selector
    pub fn matches(&self, text: &str) -> bool {
        match self {
            TextMatch::Exact(s) => text.trim() == s,
            TextMatch::Contains(s) => text.to_lowercase().contains(&s.to_lowercase()),
            TextMatch::Regex(p) => regex::RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .map(|re| re.is_match(text))
                .unwrap_or(false),
        }
    }
}

/// Attribute comparison
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum AttrOp {
    #[default]
    Equals,
    Contains,
    Prefix,
    Present,
}

/// Attribute constraint appended to a structural path
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AttrConstraint {
    pub name: String,
    #[serde(default)]
    pub op: AttrOp,
    #[serde(default)]
    pub value: String,
}

/// One way of locating an element
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "by", rename_all = "camelCase")]
pub enum LocatorSpec {
    /// ARIA role with an optional accessible name
    Role {
        role: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<TextMatch>,
    },
    /// Visible text, optionally restricted to one tag
    Text {
        text: TextMatch,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tag: Option<String>,
    },
    /// CSS or XPath structure with attribute constraints
    #[serde(rename_all = "camelCase")]
    Path {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        css: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        xpath: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        attributes: Vec<AttrConstraint>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        has_text: Option<String>,
    },
}

impl LocatorSpec {
    pub fn css(css: &str) -> Self {
        LocatorSpec::Path {
            css: Some(css.to_string()),
            xpath: None,
            attributes: Vec::new(),
            has_text: None,
        }
    }

    pub fn text(text: TextMatch) -> Self {
        LocatorSpec::Text { text, tag: None }
    }

    pub fn role(role: &str, name: Option<TextMatch>) -> Self {
        LocatorSpec::Role {
            role: role.to_string(),
            name,
        }
    }

    pub fn validate(&self) -> EngineResult<()> {
        match self {
            LocatorSpec::Role { role, name } => {
                if role.trim().is_empty() {
                    return Err(EngineError::InvalidProfile("empty role".to_string()));
                }
                if let Some(name) = name {
                    name.validate()?;
                }
            }
            LocatorSpec::Text { text, .. } => text.validate()?,
            LocatorSpec::Path { css, xpath, .. } => match (css, xpath) {
                (Some(_), None) | (None, Some(_)) => {}
                _ => {
                    return Err(EngineError::InvalidProfile(
                        "path locator needs exactly one of css or xpath".to_string(),
                    ))
                }
            },
        }
        Ok(())
    }

    /// Compile to a Playwright selector
    pub fn to_selector(&self) -> String {
        match self {
            LocatorSpec::Role { role, name } => {
                let name = match name {
                    None => String::new(),
                    Some(TextMatch::Exact(s)) => format!("[name={} s]", quote(s)),
                    Some(TextMatch::Contains(s)) => format!("[name={} i]", quote(s)),
                    Some(TextMatch::Regex(p)) => format!("[name={}]", js_regex(p)),
                };
                format!("role={}{}", role, name)
            }
            LocatorSpec::Text { text, tag: None } => match text {
                TextMatch::Exact(s) => format!("text={}", quote(s)),
                TextMatch::Contains(s) => format!("text={}", s),
                TextMatch::Regex(p) => format!("text={}", js_regex(p)),
            },
            LocatorSpec::Text {
                text,
                tag: Some(tag),
            } => match text {
                TextMatch::Exact(s) => format!("css={}:text-is({})", tag, quote(s)),
                TextMatch::Contains(s) => format!("css={}:has-text({})", tag, quote(s)),
                TextMatch::Regex(p) => {
                    format!("css={}:text-matches({}, \"i\")", tag, quote(p))
                }
            },
            LocatorSpec::Path {
                css: Some(css),
                attributes,
                has_text,
                ..
            } => {
                let mut out = format!("css={}", css);
                for attr in attributes {
                    out.push_str(&css_attr(attr));
                }
                if let Some(text) = has_text {
                    out.push_str(&format!(":has-text({})", quote(text)));
                }
                out
            }
            LocatorSpec::Path {
                xpath,
                attributes,
                has_text,
                ..
            } => {
                let mut out = format!("xpath={}", xpath.as_deref().unwrap_or("//*"));
                for attr in attributes {
                    out.push_str(&xpath_attr(attr));
                }
                if let Some(text) = has_text {
                    out.push_str(&format!(
                        "[contains(normalize-space(.), {})]",
                        quote(text)
                    ));
                }
                out
            }
        }
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

fn js_regex(pattern: &str) -> String {
    format!("/{}/i", pattern.replace('/', "\\/"))
}

fn css_attr(attr: &AttrConstraint) -> String {
    match attr.op {
        AttrOp::Equals => format!("[{}={}]", attr.name, quote(&attr.value)),
        AttrOp::Contains => format!("[{}*={}]", attr.name, quote(&attr.value)),
        AttrOp::Prefix => format!("[{}^={}]", attr.name, quote(&attr.value)),
        AttrOp::Present => format!("[{}]", attr.name),
    }
}

fn xpath_attr(attr: &AttrConstraint) -> String {
    match attr.op {
        AttrOp::Equals => format!("[@{}={}]", attr.name, quote(&attr.value)),
        AttrOp::Contains => format!("[contains(@{}, {})]", attr.name, quote(&attr.value)),
        AttrOp::Prefix => format!("[starts-with(@{}, {})]", attr.name, quote(&attr.value)),
        AttrOp::Present => format!("[@{}]", attr.name),
    }
}

/// Serialized form of a chain
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainDef {
    pub name: String,
    pub specs: Vec<LocatorSpec>,
}

/// Ordered, non-empty list of specs for one logical target.
/// Earlier specs are preferred.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "ChainDef", into = "ChainDef")]
pub struct LocatorChain {
    name: String,
    specs: Vec<LocatorSpec>,
}

impl LocatorChain {
    pub fn new(name: &str, specs: Vec<LocatorSpec>) -> EngineResult<Self> {
        if specs.is_empty() {
            return Err(EngineError::InvalidProfile(format!(
                "locator chain '{}' is empty",
                name
            )));
        }
        for spec in &specs {
            spec.validate()?;
        }
        Ok(Self {
            name: name.to_string(),
            specs,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn specs(&self) -> &[LocatorSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl TryFrom<ChainDef> for LocatorChain {
    type Error = EngineError;

    fn try_from(def: ChainDef) -> EngineResult<Self> {
        LocatorChain::new(&def.name, def.specs)
    }
}

impl From<LocatorChain> for ChainDef {
    fn from(chain: LocatorChain) -> Self {
        ChainDef {
            name: chain.name,
            specs: chain.specs,
        }
    }
}
