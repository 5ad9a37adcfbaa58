//! Handlebars rendering of notification title and body
//!
//! Templates see `title`, `body`, `icon`, `timestamp` and every entry of
//! `[notifier.templates.variables]`.

use super::Notification;
use crate::errors::{AppError, AppResult};
use crate::shared::config::TemplateConfig;
use chrono::Local;
use handlebars::Handlebars;
use serde_json::{json, Value};
use std::collections::HashMap;

const TITLE_TEMPLATE: &str = "title";
const BODY_TEMPLATE: &str = "body";

#[derive(Debug, Clone)]
pub struct TemplateEngine {
    handlebars: Handlebars<'static>,
    variables: HashMap<String, String>,
}

impl TemplateEngine {
    pub fn new(config: &TemplateConfig) -> AppResult<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        // Notifications are plain text
        handlebars.register_escape_fn(handlebars::no_escape);

        for (name, template) in [(TITLE_TEMPLATE, &config.title), (BODY_TEMPLATE, &config.body)] {
            handlebars
                .register_template_string(name, template)
                .map_err(|e| {
                    AppError::config_with_source(format!("Invalid {name} template"), e)
                })?;
        }

        Ok(Self {
            handlebars,
            variables: config.variables.clone(),
        })
    }

    fn context(&self, notification: &Notification) -> Value {
        let mut context = json!({
            "title": notification.title,
            "body": notification.body,
            "icon": notification.icon_path.as_ref().map(|p| p.display().to_string()),
            "timestamp": Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        });
        if let Some(map) = context.as_object_mut() {
            for (key, value) in &self.variables {
                map.entry(key.clone()).or_insert_with(|| json!(value));
            }
        }
        context
    }

    /// Render `(title, body)`, falling back to the raw text when a template
    /// fails at render time
    pub fn render(&self, notification: &Notification) -> (String, String) {
        let context = self.context(notification);
        let title = self
            .handlebars
            .render(TITLE_TEMPLATE, &context)
            .unwrap_or_else(|_| notification.title.clone());
        let body = self
            .handlebars
            .render(BODY_TEMPLATE, &context)
            .unwrap_or_else(|_| notification.body.clone());
        (title, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_templates_pass_through() {
        let engine = TemplateEngine::new(&TemplateConfig::default()).unwrap();
        let notification = Notification::new("Ferris & co", "<hello>", Duration::from_secs(5));
        assert_eq!(
            engine.render(&notification),
            ("Ferris & co".to_string(), "<hello>".to_string())
        );
    }

    #[test]
    fn test_custom_templates_and_variables() {
        let mut config = TemplateConfig {
            title: "[{{host}}] {{title}}".to_string(),
            body: "{{body}}{{#if icon}} ({{icon}}){{/if}}".to_string(),
            ..Default::default()
        };
        config.variables.insert("host".to_string(), "laptop".to_string());

        let engine = TemplateEngine::new(&config).unwrap();
        let notification = Notification::new("RSS", "new post", Duration::from_secs(5));
        assert_eq!(
            engine.render(&notification),
            ("[laptop] RSS".to_string(), "new post".to_string())
        );
    }

    #[test]
    fn test_variables_do_not_shadow_fields() {
        let mut config = TemplateConfig::default();
        config.variables.insert("title".to_string(), "shadowed".to_string());

        let engine = TemplateEngine::new(&config).unwrap();
        let (title, _) = engine.render(&Notification::new("real", "b", Duration::ZERO));
        assert_eq!(title, "real");
    }

    #[test]
    fn test_invalid_template_is_config_error() {
        let config = TemplateConfig {
            title: "{{#if title}}unterminated".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            TemplateEngine::new(&config),
            Err(AppError::Config { .. })
        ));
    }
}
