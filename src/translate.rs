//! Translation of user [`Options`] into a renderer-native configuration.
//!
//! One translation happens per (options, mode) pair and is deterministic:
//! the same inputs always produce the same JSON object. The result is built
//! as an ordered overlay of object layers — the typed base config, then the
//! raw `__mermaid` escape hatch, then (dark mode only) its nested
//! `__darkMode` object — with last-write-wins per key.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::TransformError;
use crate::options::{LogLevel, Options, RenderMode, SecurityLevel, ThemeSetting};

/// The typed base layer, in mermaid's own field names.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BaseConfig<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    security_level: Option<SecurityLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    theme: Option<&'a str>,
    #[serde(rename = "themeCSS", skip_serializing_if = "Option::is_none")]
    theme_css: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    theme_variables: Option<&'a Value>,
    dark_mode: bool,
    log_level: LogLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    flowchart: Option<&'a Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sequence: Option<&'a Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gantt: Option<&'a Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    journey: Option<&'a Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pie: Option<&'a Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    requirement: Option<&'a Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    er: Option<&'a Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    git: Option<&'a Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    secure: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    font_family: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_text_size: Option<u32>,
}

/// Build the renderer configuration for one render mode.
///
/// Pure: the input options are never mutated.
pub fn translate(options: &Options, mode: RenderMode) -> Result<Value, TransformError> {
    // In dark mode only the dark descriptor's theme applies; there is no
    // fallthrough to the top-level theme.
    let theme_setting = match mode {
        RenderMode::Dark => options.dark_theme(),
        RenderMode::Light => options.theme.as_ref(),
    };

    let theme_name = match theme_setting {
        Some(ThemeSetting::Name(name)) => Some(name.as_str()),
        Some(ThemeSetting::Custom(custom)) => custom.theme.as_deref(),
        None => None,
    }
    .or_else(|| mode.is_dark().then_some("dark"));

    let (theme_css, theme_variables) = match theme_setting {
        Some(ThemeSetting::Custom(custom)) => {
            (custom.custom_css.as_deref(), custom.variables.as_ref())
        }
        _ => (None, None),
    };

    let style = options.style.as_ref();
    let base = BaseConfig {
        security_level: options.security,
        theme: theme_name,
        theme_css,
        theme_variables,
        dark_mode: mode.is_dark(),
        log_level: options.log_level.unwrap_or(LogLevel::Error),
        flowchart: options.flowchart.as_ref(),
        sequence: options.sequence.as_ref(),
        gantt: options.gantt.as_ref(),
        journey: options.journey.as_ref(),
        pie: options.pie.as_ref(),
        requirement: options.requirement.as_ref(),
        er: options.er.as_ref(),
        git: options.git.as_ref(),
        state: options.state.as_ref(),
        secure: options.freeze.as_deref(),
        font_family: style.and_then(|s| s.font_family.as_deref()),
        max_text_size: style.and_then(|s| s.max_text_size),
    };

    let mut config = to_layer(&base)?;
    if let Some(raw) = &options.overrides {
        overlay(&mut config, raw);
        if mode.is_dark() {
            if let Some(Value::Object(dark_raw)) = raw.get("__darkMode") {
                overlay(&mut config, dark_raw);
            }
        }
    }
    Ok(Value::Object(config))
}

/// Serialize a typed layer into a key/value map.
fn to_layer<T: Serialize>(layer: &T) -> Result<Map<String, Value>, TransformError> {
    match serde_json::to_value(layer)? {
        Value::Object(map) => Ok(map),
        other => Err(TransformError::Config(serde::ser::Error::custom(format!(
            "config layer serialized to {other} instead of an object"
        )))),
    }
}

/// Apply one overlay layer, last write wins per key.
fn overlay(base: &mut Map<String, Value>, layer: &Map<String, Value>) {
    for (key, value) in layer {
        base.insert(key.clone(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{DarkOptions, DarkSetting, StyleOptions, ThemeOptions};
    use serde_json::json;

    fn translate_ok(options: &Options, mode: RenderMode) -> Value {
        translate(options, mode).unwrap()
    }

    #[test]
    fn empty_options_fall_back_to_dark_theme_in_dark_mode() {
        let options = Options::default();

        let dark = translate_ok(&options, RenderMode::Dark);
        assert_eq!(dark["theme"], json!("dark"));
        assert_eq!(dark["darkMode"], json!(true));

        let light = translate_ok(&options, RenderMode::Light);
        assert_eq!(light.get("theme"), None);
        assert_eq!(light["darkMode"], json!(false));
    }

    #[test]
    fn log_level_defaults_to_error() {
        let config = translate_ok(&Options::default(), RenderMode::Light);
        assert_eq!(config["logLevel"], json!(4));

        let verbose = Options {
            log_level: Some(LogLevel::Debug),
            ..Options::default()
        };
        let config = translate_ok(&verbose, RenderMode::Light);
        assert_eq!(config["logLevel"], json!(1));
    }

    #[test]
    fn descriptor_theme_extraction() {
        let options = Options {
            theme: Some(ThemeSetting::Custom(ThemeOptions {
                theme: Some("forest".into()),
                custom_css: Some("body{}".into()),
                variables: Some(json!({ "a": 1 })),
            })),
            ..Options::default()
        };

        let config = translate_ok(&options, RenderMode::Light);
        assert_eq!(config["theme"], json!("forest"));
        assert_eq!(config["themeCSS"], json!("body{}"));
        assert_eq!(config["themeVariables"], json!({ "a": 1 }));
    }

    #[test]
    fn plain_theme_name_carries_no_css_or_variables() {
        let options = Options {
            theme: Some(ThemeSetting::Name("neutral".into())),
            ..Options::default()
        };
        let config = translate_ok(&options, RenderMode::Light);
        assert_eq!(config["theme"], json!("neutral"));
        assert_eq!(config.get("themeCSS"), None);
        assert_eq!(config.get("themeVariables"), None);
    }

    #[test]
    fn dark_mode_reads_only_the_dark_descriptor_theme() {
        let options = Options {
            theme: Some(ThemeSetting::Name("forest".into())),
            render_dark: Some(DarkSetting::Options(DarkOptions {
                enable: Some(true),
                theme: Some(ThemeSetting::Name("midnight".into())),
            })),
            ..Options::default()
        };

        assert_eq!(
            translate_ok(&options, RenderMode::Dark)["theme"],
            json!("midnight")
        );
        assert_eq!(
            translate_ok(&options, RenderMode::Light)["theme"],
            json!("forest")
        );

        // Dark descriptor without a theme falls back to "dark", not to the
        // top-level theme.
        let bare = Options {
            theme: Some(ThemeSetting::Name("forest".into())),
            render_dark: Some(DarkSetting::Enabled(true)),
            ..Options::default()
        };
        assert_eq!(translate_ok(&bare, RenderMode::Dark)["theme"], json!("dark"));
    }

    #[test]
    fn passthrough_bags_and_freeze_and_style() {
        let options = Options {
            flowchart: Some(
                json!({ "curve": "basis", "htmlLabels": true })
                    .as_object()
                    .unwrap()
                    .clone(),
            ),
            freeze: Some(vec!["theme".into(), "logLevel".into()]),
            style: Some(StyleOptions {
                font_family: Some("Inter".into()),
                max_text_size: Some(90_000),
            }),
            ..Options::default()
        };

        let config = translate_ok(&options, RenderMode::Light);
        assert_eq!(config["flowchart"], json!({ "curve": "basis", "htmlLabels": true }));
        assert_eq!(config["secure"], json!(["theme", "logLevel"]));
        assert_eq!(config["fontFamily"], json!("Inter"));
        assert_eq!(config["maxTextSize"], json!(90_000));
    }

    #[test]
    fn escape_hatch_precedence() {
        let options = Options {
            log_level: Some(LogLevel::Warn),
            overrides: Some(
                json!({
                    "logLevel": 9,
                    "__darkMode": { "logLevel": 1 }
                })
                .as_object()
                .unwrap()
                .clone(),
            ),
            ..Options::default()
        };

        let light = translate_ok(&options, RenderMode::Light);
        assert_eq!(light["logLevel"], json!(9));

        let dark = translate_ok(&options, RenderMode::Dark);
        assert_eq!(dark["logLevel"], json!(1));
    }

    #[test]
    fn translation_is_deterministic() {
        let options = Options {
            security: Some(crate::options::SecurityLevel::Antiscript),
            theme: Some(ThemeSetting::Custom(ThemeOptions {
                theme: Some("base".into()),
                custom_css: Some(".node{fill:#fff}".into()),
                variables: Some(json!({ "primaryColor": "#ff0000" })),
            })),
            render_dark: Some(DarkSetting::Options(DarkOptions {
                enable: Some(true),
                theme: Some(ThemeSetting::Name("dark".into())),
            })),
            overrides: Some(json!({ "startOnLoad": false }).as_object().unwrap().clone()),
            ..Options::default()
        };

        for mode in [RenderMode::Light, RenderMode::Dark] {
            assert_eq!(translate_ok(&options, mode), translate_ok(&options, mode));
        }
    }
}
