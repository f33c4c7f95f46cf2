//! EMAIL tool executor — SMTP sends via lettre.
//!
//! SMTP settings start from the tool's `config` map and are overridden by
//! `SMTP_*` environment variables. Besides free-form messages, three
//! built-in templates (`welcome`, `reminder`, `report`) are rendered with
//! `{var}` substitution from `template_data`.

use std::collections::HashMap;

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::error::ToolError;
use crate::models::ToolDefinition;
use crate::tools::{ParamMap, ToolExecutor};

/// SMTP connection settings resolved from env + tool config.
#[derive(Debug, Clone, Default)]
struct SmtpSettings {
    server: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    from_email: Option<String>,
    use_tls: Option<bool>,
}

pub struct EmailExecutor {
    env: SmtpSettings,
}

impl EmailExecutor {
    pub fn from_env() -> Self {
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            env: SmtpSettings {
                server: read("SMTP_SERVER"),
                port: read("SMTP_PORT").and_then(|p| p.parse().ok()),
                username: read("SMTP_USERNAME"),
                password: read("SMTP_PASSWORD"),
                from_email: read("SMTP_FROM_EMAIL"),
                use_tls: read("SMTP_USE_TLS").map(|v| v.to_lowercase() == "true"),
            },
        }
    }

    /// Merge tool config under the environment settings (env wins).
    fn resolve_settings(&self, tool: &ToolDefinition) -> SmtpSettings {
        let cfg_str = |key: &str| {
            tool.config
                .get(key)
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(String::from)
        };
        SmtpSettings {
            server: self.env.server.clone().or_else(|| cfg_str("smtp_server")),
            port: self.env.port.or_else(|| {
                tool.config
                    .get("smtp_port")
                    .and_then(|v| v.as_u64())
                    .map(|p| p as u16)
            }),
            username: self.env.username.clone().or_else(|| cfg_str("username")),
            password: self.env.password.clone().or_else(|| cfg_str("password")),
            from_email: self.env.from_email.clone().or_else(|| cfg_str("from_email")),
            use_tls: self
                .env
                .use_tls
                .or_else(|| tool.config.get("use_tls").and_then(|v| v.as_bool())),
        }
    }
}

#[async_trait]
impl ToolExecutor for EmailExecutor {
    async fn execute(
        &self,
        tool: &ToolDefinition,
        params: &ParamMap,
    ) -> Result<serde_json::Value, ToolError> {
        let settings = self.resolve_settings(tool);
        let (Some(server), Some(username), Some(password)) = (
            settings.server.clone(),
            settings.username.clone(),
            settings.password.clone(),
        ) else {
            return Err(ToolError::Execution(
                "Missing required SMTP configuration: smtp_server, username, password".to_string(),
            ));
        };
        let port = settings.port.unwrap_or(587);
        let use_tls = settings.use_tls.unwrap_or(true);
        let from_email = settings.from_email.unwrap_or_else(|| username.clone());

        let recipients = recipients_from(params)?;

        let (subject, body, html_body) = match params.get("template").and_then(|v| v.as_str()) {
            Some(name) => {
                let data = params
                    .get("template_data")
                    .and_then(|v| v.as_object())
                    .cloned()
                    .unwrap_or_default();
                render_builtin_template(name, &data)?
            }
            None => {
                let subject = params
                    .get("subject")
                    .and_then(|v| v.as_str())
                    .unwrap_or("Message")
                    .to_string();
                let body = params
                    .get("body")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let html = params
                    .get("html_body")
                    .and_then(|v| v.as_str())
                    .map(String::from);
                (subject, body, html)
            }
        };

        let from: Mailbox = from_email
            .parse()
            .map_err(|e| ToolError::Validation(format!("Invalid from address: {}", e)))?;
        let mut builder = Message::builder().from(from).subject(subject.clone());
        for to in &recipients {
            let mailbox: Mailbox = to
                .parse()
                .map_err(|e| ToolError::Validation(format!("Invalid recipient '{}': {}", to, e)))?;
            builder = builder.to(mailbox);
        }

        let email = match html_body {
            Some(html) => builder.multipart(MultiPart::alternative_plain_html(body, html)),
            None => builder.body(body),
        }
        .map_err(|e| ToolError::Execution(format!("Failed to build email: {}", e)))?;

        let relay = if use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&server)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&server)
        }
        .map_err(|e| ToolError::Execution(format!("Invalid SMTP relay {}: {}", server, e)))?;

        let mailer = relay
            .port(port)
            .credentials(Credentials::new(username, password))
            .build();

        mailer
            .send(email)
            .await
            .map_err(|e| ToolError::Execution(format!("Error sending email: {}", e)))?;

        tracing::info!("Email sent to {} recipient(s)", recipients.len());
        Ok(serde_json::json!({
            "success": true,
            "message": format!("Email sent to {} recipient(s)", recipients.len()),
            "recipients": recipients,
        }))
    }
}

/// `to` accepts a single address or a list.
fn recipients_from(params: &ParamMap) -> Result<Vec<String>, ToolError> {
    let recipients = match params.get("to") {
        Some(serde_json::Value::String(s)) if !s.is_empty() => vec![s.clone()],
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    };
    if recipients.is_empty() {
        return Err(ToolError::Validation("No recipients specified".to_string()));
    }
    Ok(recipients)
}

/// Substitute `{key}` placeholders from the data map; unknown placeholders
/// are left as-is.
fn fill(template: &str, data: &serde_json::Map<String, serde_json::Value>) -> String {
    let mut out = template.to_string();
    for (key, value) in data {
        let rendered = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        out = out.replace(&format!("{{{}}}", key), &rendered);
    }
    out
}

fn render_builtin_template(
    name: &str,
    data: &serde_json::Map<String, serde_json::Value>,
) -> Result<(String, String, Option<String>), ToolError> {
    let (subject, body, html) = match name {
        "welcome" => (
            "Welcome! - {agent_name}",
            "Hello {user_name},\n\nWelcome to the {agent_name} assistant!\n\n\
             This email confirms that your scheduled tasks were created successfully.\n\n\
             Regards,\n{agent_name}",
            "<html><body><h2>Hello {user_name},</h2>\
             <p>Welcome to the <strong>{agent_name}</strong> assistant!</p>\
             <p>This email confirms that your scheduled tasks were created successfully.</p>\
             <p>Regards,<br><strong>{agent_name}</strong></p></body></html>",
        ),
        "reminder" => (
            "Reminder - {subject}",
            "Hello {user_name},\n\nThis is a reminder:\n\n{message}\n\nDate: {date}\n\n\
             Regards,\n{agent_name}",
            "<html><body><h2>Reminder</h2><p>Hello <strong>{user_name}</strong>,</p>\
             <p>This is a reminder:</p><blockquote>{message}</blockquote>\
             <p><strong>Date:</strong> {date}</p>\
             <p>Regards,<br><strong>{agent_name}</strong></p></body></html>",
        ),
        "report" => (
            "Report - {report_title}",
            "Hello {user_name},\n\nYour report {report_title} is ready:\n\n{report_content}\n\n\
             Generated on {date}.\n\nRegards,\n{agent_name}",
            "<html><body><h2>{report_title}</h2><p>Hello <strong>{user_name}</strong>,</p>\
             <div>{report_content}</div><p><small>Generated on {date}.</small></p>\
             <p>Regards,<br><strong>{agent_name}</strong></p></body></html>",
        ),
        other => {
            return Err(ToolError::Validation(format!(
                "Template '{}' not found",
                other
            )));
        }
    };

    Ok((
        fill(subject, data),
        fill(body, data),
        Some(fill(html, data)),
    ))
}
