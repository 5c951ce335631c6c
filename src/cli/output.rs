//! Output rendering shared by every command.

use console::style;
use serde::Serialize;

use crate::types::Result;

/// How a command prints its result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            _ => Err(format!("Invalid format: '{}'. Use: text, json, yaml", s)),
        }
    }
}

impl OutputFormat {
    /// Structured rendering of `value`; `None` for text, which commands lay out themselves
    pub fn render<T: Serialize>(&self, value: &T) -> Result<Option<String>> {
        match self {
            Self::Text => Ok(None),
            Self::Json => Ok(Some(serde_json::to_string_pretty(value)?)),
            Self::Yaml => Ok(Some(serde_yaml::to_string(value)?)),
        }
    }

    /// Print `value` verbatim in a structured format, else call `text`
    pub fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce(&T)) -> Result<()> {
        match self.render(value)? {
            Some(rendered) => println!("{}", rendered.trim_end()),
            None => text(value),
        }
        Ok(())
    }
}

/// Styled terminal helpers for the text format
pub struct Output;

impl Output {
    pub fn success(message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn warning(message: &str) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    pub fn header(message: &str) {
        println!("\n{}", style(message).bold().underlined());
    }

    pub fn field(label: &str, value: impl std::fmt::Display) {
        println!("  {:<14} {}", style(label).dim(), value);
    }

    /// Titled bullet list; prints nothing for an empty list
    pub fn bullets(title: &str, items: &[String]) {
        if items.is_empty() {
            return;
        }
        println!("\n{}", style(title).bold());
        for item in items {
            println!("  • {}", item);
        }
    }

    /// Confidence with a traffic-light colour
    pub fn confidence(value: f32) -> String {
        let text = format!("{:.2}", value);
        if value >= 0.8 {
            style(text).green().to_string()
        } else if value >= 0.5 {
            style(text).yellow().to_string()
        } else {
            style(text).red().to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parse() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("yml".parse::<OutputFormat>().unwrap(), OutputFormat::Yaml);
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_render_structured() {
        let value = serde_json::json!({"confidence": 0.5});
        assert!(OutputFormat::Text.render(&value).unwrap().is_none());
        let json = OutputFormat::Json.render(&value).unwrap().unwrap();
        assert!(json.contains("\"confidence\": 0.5"));
        let yaml = OutputFormat::Yaml.render(&value).unwrap().unwrap();
        assert!(yaml.contains("confidence: 0.5"));
    }
}
