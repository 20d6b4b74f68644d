//! User-facing transform configuration.
//!
//! [`Options`] is the whole configuration contract of the transform. It is
//! serde-deserializable so the CLI can load it from a JSON5 config file,
//! and its field names mirror what the mermaid ecosystem expects
//! (`renderDark`, `logLevel`, `__mermaid`, ...).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which half of a dual-theme configuration a render uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Light,
    Dark,
}

impl RenderMode {
    /// The mode name used in wire requests and CSS class suffixes.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    pub const fn is_dark(self) -> bool {
        matches!(self, Self::Dark)
    }
}

/// Mermaid's security posture for rendering untrusted diagram source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    Strict,
    Loose,
    Antiscript,
    Sandbox,
}

/// Minimum severity of mermaid's internal log output.
///
/// Serialized as mermaid's numeric levels (1 = debug ... 5 = fatal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum LogLevel {
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

impl From<LogLevel> for u8 {
    fn from(level: LogLevel) -> Self {
        level as Self
    }
}

impl TryFrom<u8> for LogLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, String> {
        match value {
            1 => Ok(Self::Debug),
            2 => Ok(Self::Info),
            3 => Ok(Self::Warn),
            4 => Ok(Self::Error),
            5 => Ok(Self::Fatal),
            other => Err(format!("invalid log level {other}, expected 1-5")),
        }
    }
}

/// A theme given either as a plain name or as a descriptor with custom CSS
/// and theme variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThemeSetting {
    Name(String),
    Custom(ThemeOptions),
}

/// Expanded theme descriptor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ThemeOptions {
    pub theme: Option<String>,
    pub custom_css: Option<String>,
    pub variables: Option<Value>,
}

/// Dark-mode rendering, as a plain toggle or a descriptor carrying its own
/// theme override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DarkSetting {
    Enabled(bool),
    Options(DarkOptions),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DarkOptions {
    pub enable: Option<bool>,
    pub theme: Option<ThemeSetting>,
}

/// Typography overrides forwarded to the renderer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StyleOptions {
    pub font_family: Option<String>,
    pub max_text_size: Option<u32>,
}

/// Configuration for one transform call.
///
/// Immutable for the duration of the call. Per-diagram-kind bags are passed
/// through to the renderer verbatim, without validation or defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
    pub security: Option<SecurityLevel>,
    pub theme: Option<ThemeSetting>,
    pub render_dark: Option<DarkSetting>,
    pub log_level: Option<LogLevel>,

    pub flowchart: Option<Map<String, Value>>,
    pub sequence: Option<Map<String, Value>>,
    pub gantt: Option<Map<String, Value>>,
    pub journey: Option<Map<String, Value>>,
    pub pie: Option<Map<String, Value>>,
    pub requirement: Option<Map<String, Value>>,
    pub er: Option<Map<String, Value>>,
    pub git: Option<Map<String, Value>>,
    pub state: Option<Map<String, Value>>,

    /// Option keys the renderer must refuse to mutate at runtime.
    pub freeze: Option<Vec<String>>,
    pub style: Option<StyleOptions>,

    /// Escape hatch: a raw mermaid config object shallow-merged on top of
    /// everything computed from the fields above. Its nested `__darkMode`
    /// object is merged on top of that, in dark mode only.
    #[serde(rename = "__mermaid")]
    pub overrides: Option<Map<String, Value>>,
}

impl Options {
    /// Whether each diagram gets a second, dark-mode render.
    ///
    /// Dark rendering is on unless switched off: an absent `renderDark` or
    /// a descriptor without `enable: false` both count as enabled.
    pub fn dark_enabled(&self) -> bool {
        match &self.render_dark {
            None => true,
            Some(DarkSetting::Enabled(enabled)) => *enabled,
            Some(DarkSetting::Options(dark)) => dark.enable != Some(false),
        }
    }

    /// The theme override carried by the dark-mode descriptor, if any.
    pub(crate) fn dark_theme(&self) -> Option<&ThemeSetting> {
        match &self.render_dark {
            Some(DarkSetting::Options(dark)) => dark.theme.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dark_rendering_defaults_to_enabled() {
        assert!(Options::default().dark_enabled());
    }

    #[test]
    fn dark_rendering_toggles() {
        let off = Options {
            render_dark: Some(DarkSetting::Enabled(false)),
            ..Options::default()
        };
        assert!(!off.dark_enabled());

        let on = Options {
            render_dark: Some(DarkSetting::Enabled(true)),
            ..Options::default()
        };
        assert!(on.dark_enabled());
    }

    #[test]
    fn dark_descriptor_enable_semantics() {
        let explicit_off = Options {
            render_dark: Some(DarkSetting::Options(DarkOptions {
                enable: Some(false),
                theme: None,
            })),
            ..Options::default()
        };
        assert!(!explicit_off.dark_enabled());

        // A descriptor that only sets a theme still counts as enabled.
        let theme_only = Options {
            render_dark: Some(DarkSetting::Options(DarkOptions {
                enable: None,
                theme: Some(ThemeSetting::Name("forest".into())),
            })),
            ..Options::default()
        };
        assert!(theme_only.dark_enabled());
    }

    #[test]
    fn options_parse_from_json5() {
        let text = r#"{
            // project config
            security: "loose",
            theme: { theme: "forest", customCss: "body{}" },
            renderDark: { theme: "dark" },
            logLevel: 2,
            flowchart: { curve: "basis" },
            freeze: ["theme"],
            style: { fontFamily: "Inter", maxTextSize: 90000 },
            __mermaid: { startOnLoad: false },
        }"#;
        let options: Options = json5::from_str(text).unwrap();

        assert_eq!(options.security, Some(SecurityLevel::Loose));
        assert_eq!(options.log_level, Some(LogLevel::Info));
        assert!(options.dark_enabled());
        assert_eq!(
            options.dark_theme(),
            Some(&ThemeSetting::Name("dark".into()))
        );
        assert_eq!(
            options.flowchart.as_ref().unwrap().get("curve"),
            Some(&Value::String("basis".into()))
        );
        assert_eq!(options.freeze.as_deref(), Some(&["theme".to_string()][..]));
        assert_eq!(
            options.overrides.as_ref().unwrap().get("startOnLoad"),
            Some(&Value::Bool(false))
        );
    }

    #[test]
    fn log_level_rejects_out_of_range() {
        assert!(serde_json::from_str::<LogLevel>("0").is_err());
        assert!(serde_json::from_str::<LogLevel>("6").is_err());
        assert_eq!(
            serde_json::from_str::<LogLevel>("4").unwrap(),
            LogLevel::Error
        );
    }
}
