//! Structured descriptors for HTML forms found while crawling.
//!
//! A [`Form`] is immutable once extracted. Detectors work from its
//! [`Form::base_inputs`] map and only ever change one field at a time.

use crate::error::{Result, ScanError};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use url::Url;

/// Input types that are never submitted with a probe value.
pub const CONTROL_TYPES: &[&str] = &["submit", "button", "reset", "file", "image"];

pub const DEFAULT_EMAIL: &str = "test@example.com";
pub const DEFAULT_PASSWORD: &str = "password123";
pub const DEFAULT_NUMBER: &str = "123";
pub const DEFAULT_TEXT: &str = "test_value";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    /// Anything other than `post` (case-insensitive) submits as GET, like a browser.
    pub fn from_attr(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_lowercase()) {
            Some(v) if v == "post" => HttpMethod::Post,
            _ => HttpMethod::Get,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub field_type: String,
    pub default_value: String,
}

impl Field {
    pub fn new(name: &str, field_type: &str) -> Self {
        let field_type = field_type.to_lowercase();
        let default_value = default_value_for(&field_type).to_string();
        Self {
            name: name.to_string(),
            field_type,
            default_value,
        }
    }
}

/// Safe value submitted for a field that is not currently under test.
pub fn default_value_for(field_type: &str) -> &'static str {
    match field_type {
        "email" => DEFAULT_EMAIL,
        "password" => DEFAULT_PASSWORD,
        "number" => DEFAULT_NUMBER,
        _ => DEFAULT_TEXT,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Form {
    /// Page the form was found on.
    pub source_url: String,
    /// Absolute submission target.
    pub action: String,
    pub method: HttpMethod,
    pub fields: Vec<Field>,
}

impl Form {
    pub fn new(source_url: &str, action: &str, method: HttpMethod, fields: Vec<Field>) -> Self {
        Self {
            source_url: source_url.to_string(),
            action: action.to_string(),
            method,
            fields,
        }
    }

    /// Build a descriptor from a `<form>` element on `page_url`.
    pub fn from_element(element: &ElementRef<'_>, page_url: &Url) -> Result<Self> {
        let action = match element.value().attr("action").map(str::trim) {
            Some(action) if !action.is_empty() => page_url
                .join(action)
                .map_err(|e| ScanError::InvalidUrl(format!("form action '{}': {}", action, e)))?,
            _ => page_url.clone(),
        };
        let method = HttpMethod::from_attr(element.value().attr("method"));

        let input_selector = selector("input, textarea, select")?;
        let mut fields: Vec<Field> = Vec::new();

        for input in element.select(&input_selector) {
            let Some(name) = input.value().attr("name").filter(|n| !n.is_empty()) else {
                continue;
            };

            let field_type = match input.value().name() {
                "input" => input.value().attr("type").unwrap_or("text"),
                _ => "text",
            }
            .to_lowercase();

            if CONTROL_TYPES.contains(&field_type.as_str()) {
                continue;
            }

            // Repeated names collapse into one field, first position wins.
            if fields.iter().any(|f| f.name == name) {
                continue;
            }
            fields.push(Field::new(name, &field_type));
        }

        Ok(Self {
            source_url: page_url.to_string(),
            action: action.to_string(),
            method,
            fields,
        })
    }

    pub fn has_inputs(&self) -> bool {
        !self.fields.is_empty()
    }

    /// Ordered (name, default) pairs submitted when nothing is under test.
    pub fn base_inputs(&self) -> Vec<(String, String)> {
        self.fields
            .iter()
            .map(|f| (f.name.clone(), f.default_value.clone()))
            .collect()
    }
}

/// Every form in a parsed document. A form whose action cannot be resolved is
/// dropped on its own without affecting the rest.
pub fn extract_forms(document: &Html, page_url: &Url) -> Result<Vec<Form>> {
    let form_selector = selector("form")?;
    let mut forms = Vec::new();

    for element in document.select(&form_selector) {
        match Form::from_element(&element, page_url) {
            Ok(form) => forms.push(form),
            Err(e) => debug!("Discarding form on {}: {}", page_url, e),
        }
    }

    Ok(forms)
}

pub(crate) fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ScanError::ParseError(format!("selector '{}': {}", css, e)))
}
