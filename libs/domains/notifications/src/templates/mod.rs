//! Email template rendering engine.
//!
//! One subject and a text/HTML body pair per [`Operation`], rendered with
//! Handlebars. The plain-text body is the canonical message; the HTML part is
//! an alternative rendering of the same sentence.

use crate::error::{NotificationError, NotificationResult};
use domain_user_events::Operation;
use handlebars::Handlebars;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Rendered email content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    /// HTML body content.
    pub html: String,
    /// Plain text body content.
    pub text: String,
    /// Email subject line.
    pub subject: String,
}

struct Template {
    operation: Operation,
    subject: &'static str,
    text: &'static str,
    html: &'static str,
}

const TEMPLATES: [Template; 2] = [
    Template {
        operation: Operation::Create,
        subject: "Account created",
        text: CREATE_TEXT_TEMPLATE,
        html: CREATE_HTML_TEMPLATE,
    },
    Template {
        operation: Operation::Delete,
        subject: "Account deleted",
        text: DELETE_TEXT_TEMPLATE,
        html: DELETE_HTML_TEMPLATE,
    },
];

#[derive(Serialize)]
struct TemplateData<'a> {
    email: &'a str,
}

/// Template engine for rendering email templates.
#[derive(Clone)]
pub struct TemplateEngine {
    handlebars: Arc<Handlebars<'static>>,
}

impl TemplateEngine {
    /// Create a new template engine with every operation's templates registered.
    pub fn new() -> NotificationResult<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);

        for template in &TEMPLATES {
            let (text_name, html_name) = template_names(template.operation);
            handlebars
                .register_template_string(&text_name, template.text)
                .map_err(|e| {
                    NotificationError::TemplateError(format!("Failed to register {text_name}: {e}"))
                })?;
            handlebars
                .register_template_string(&html_name, template.html)
                .map_err(|e| {
                    NotificationError::TemplateError(format!("Failed to register {html_name}: {e}"))
                })?;
        }

        Ok(Self {
            handlebars: Arc::new(handlebars),
        })
    }

    /// Render the email for `operation`, addressed to `email`.
    pub fn render(&self, operation: Operation, email: &str) -> NotificationResult<RenderedEmail> {
        debug!(operation = %operation, to = %email, "Rendering notification email");

        let template = TEMPLATES
            .iter()
            .find(|t| t.operation == operation)
            .ok_or_else(|| NotificationError::UnknownOperation(operation.to_string()))?;

        let (text_name, html_name) = template_names(operation);
        let data = TemplateData { email };

        Ok(RenderedEmail {
            html: self.handlebars.render(&html_name, &data)?,
            text: self.handlebars.render(&text_name, &data)?,
            subject: template.subject.to_string(),
        })
    }
}

fn template_names(operation: Operation) -> (String, String) {
    let key = operation.as_ref().to_ascii_lowercase();
    (format!("{key}_text"), format!("{key}_html"))
}

const CREATE_TEXT_TEMPLATE: &str = "Hello! Your account has been successfully created.";

const CREATE_HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<body style="font-family: sans-serif;">
  <p>Hello! Your account has been successfully created.</p>
  <p style="color: #666; font-size: 12px;">This message was sent to {{email}}.</p>
</body>
</html>"#;

const DELETE_TEXT_TEMPLATE: &str = "Hello! Your account has been deleted.";

const DELETE_HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<body style="font-family: sans-serif;">
  <p>Hello! Your account has been deleted.</p>
  <p style="color: #666; font-size: 12px;">This message was sent to {{email}}.</p>
</body>
</html>"#;
