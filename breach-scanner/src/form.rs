use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    /// Anything that is not POST is submitted as GET, which is what browsers do.
    pub fn from_attr(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_uppercase()) {
            Some(ref m) if m == "POST" => HttpMethod::Post,
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
pub enum InputKind {
    Text,
    Password,
    Email,
    Search,
    Number,
    Hidden,
    Submit,
    Button,
    Checkbox,
    Radio,
    TextArea,
    Select,
    Other(String),
}

impl InputKind {
    /// Classify a control from its tag name and `type` attribute.
    pub fn from_element(tag: &str, type_attr: Option<&str>) -> Self {
        match tag {
            "textarea" => return InputKind::TextArea,
            "select" => return InputKind::Select,
            _ => {}
        }

        let kind = type_attr.map(|t| t.trim().to_lowercase()).unwrap_or_default();
        match kind.as_str() {
            "" | "text" => InputKind::Text,
            "password" => InputKind::Password,
            "email" => InputKind::Email,
            "search" => InputKind::Search,
            "number" => InputKind::Number,
            "hidden" => InputKind::Hidden,
            "submit" => InputKind::Submit,
            "button" => InputKind::Button,
            "checkbox" => InputKind::Checkbox,
            "radio" => InputKind::Radio,
            other => InputKind::Other(other.to_string()),
        }
    }

    /// Hidden, submit and button controls never carry user-typed data.
    pub fn is_interactive(&self) -> bool {
        !matches!(
            self,
            InputKind::Hidden | InputKind::Submit | InputKind::Button
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            InputKind::Text => "text",
            InputKind::Password => "password",
            InputKind::Email => "email",
            InputKind::Search => "search",
            InputKind::Number => "number",
            InputKind::Hidden => "hidden",
            InputKind::Submit => "submit",
            InputKind::Button => "button",
            InputKind::Checkbox => "checkbox",
            InputKind::Radio => "radio",
            InputKind::TextArea => "textarea",
            InputKind::Select => "select",
            InputKind::Other(kind) => kind,
        }
    }
}

/// A submission target discovered on a page, either declared with a `<form>`
/// tag or inferred from a cluster of loose controls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Form {
    pub url: String,
    pub method: HttpMethod,
    pub inputs: BTreeMap<String, InputKind>,
    pub origin_url: String,
    pub inferred: bool,
}

impl Form {
    pub fn key(&self) -> FormKey {
        if self.inferred {
            FormKey::Inferred {
                url: self.url.clone(),
                method: self.method,
                names: self.inputs.keys().cloned().collect(),
            }
        } else {
            FormKey::Declared {
                url: self.url.clone(),
                method: self.method,
            }
        }
    }

    pub fn input_names(&self) -> impl Iterator<Item = &str> {
        self.inputs.keys().map(String::as_str)
    }
}

/// Deduplication identity. Declared forms are unique per action and method;
/// several inferred clusters may share a page, so their input names join the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FormKey {
    Declared {
        url: String,
        method: HttpMethod,
    },
    Inferred {
        url: String,
        method: HttpMethod,
        names: Vec<String>,
    },
}
