//! HTML email templates with `{{key}}` placeholders.
//!
//! Values are HTML-escaped on substitution. A placeholder with no value in
//! the context is an error rather than silently rendering empty.

use std::collections::HashMap;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown template: {0}")]
    UnknownTemplate(String),

    #[error("template {template} references missing value {key:?}")]
    MissingValue { template: String, key: String },

    #[error("template {0} has an unterminated placeholder")]
    Unterminated(String),
}

/// A named template: subject line plus HTML body.
#[derive(Debug, Clone, Copy)]
pub struct Template {
    pub name: &'static str,
    pub subject: &'static str,
    pub body: &'static str,
}

pub const WELCOME: Template = Template {
    name: "welcome",
    subject: "Welcome to {{app_name}}!",
    body: "<html><body>\
<h1>Welcome, {{user_name}}!</h1>\
<p>Your account is ready. Create a project, answer the onboarding questions and we will \
draft a complete business plan for you.</p>\
<p>The {{app_name}} team</p>\
</body></html>",
};

pub const PASSWORD_RESET: Template = Template {
    name: "password_reset",
    subject: "Password reset",
    body: "<html><body>\
<h1>Reset your password</h1>\
<p>We received a request to reset your password. The link below is valid for one hour.</p>\
<p><a href=\"{{link}}\">{{link}}</a></p>\
<p>If you did not request this, you can ignore this email.</p>\
</body></html>",
};

pub const PROJECT_READY: Template = Template {
    name: "project_ready",
    subject: "Plan ready: {{project_name}}",
    body: "<html><body>\
<h1>Your business plan is ready</h1>\
<p>The plan for <strong>{{project_name}}</strong> has been generated.</p>\
<p><a href=\"{{plan_link}}\">View the plan</a></p>\
</body></html>",
};

pub const CONSULTING_CONFIRMATION: Template = Template {
    name: "consulting_confirmation",
    subject: "Consulting session scheduled",
    body: "<html><body>\
<h1>Your consulting session is confirmed</h1>\
<p>Objective: {{objective}}</p>\
<p>Meeting link: <a href=\"{{meeting_link}}\">{{meeting_link}}</a></p>\
</body></html>",
};

const ALL: [Template; 4] = [WELCOME, PASSWORD_RESET, PROJECT_READY, CONSULTING_CONFIRMATION];

/// Look up a template by name.
pub fn template(name: &str) -> Result<Template, TemplateError> {
    ALL.iter()
        .find(|t| t.name == name)
        .copied()
        .ok_or_else(|| TemplateError::UnknownTemplate(name.to_string()))
}

/// A rendered subject and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub subject: String,
    pub html_body: String,
}

impl Template {
    pub fn render(&self, context: &HashMap<&str, String>) -> Result<Rendered, TemplateError> {
        Ok(Rendered {
            subject: substitute(self.name, self.subject, context, false)?,
            html_body: substitute(self.name, self.body, context, true)?,
        })
    }
}

fn substitute(
    template: &str,
    text: &str,
    context: &HashMap<&str, String>,
    escape: bool,
) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| TemplateError::Unterminated(template.to_string()))?;
        let key = after[..end].trim();
        let value = context.get(key).ok_or_else(|| TemplateError::MissingValue {
            template: template.to_string(),
            key: key.to_string(),
        })?;
        if escape {
            push_escaped(&mut out, value);
        } else {
            out.push_str(value);
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);

    Ok(out)
}

fn push_escaped(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(pairs: &[(&'static str, &str)]) -> HashMap<&'static str, String> {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    #[test]
    fn renders_subject_and_body() {
        let rendered = PROJECT_READY
            .render(&ctx(&[
                ("project_name", "Acme"),
                ("plan_link", "http://localhost:8000/projects/1/plan"),
            ]))
            .unwrap();
        assert_eq!(rendered.subject, "Plan ready: Acme");
        assert!(rendered.html_body.contains("<strong>Acme</strong>"));
        assert!(rendered.html_body.contains("href=\"http://localhost:8000/projects/1/plan\""));
    }

    #[test]
    fn body_values_are_escaped_but_subject_is_not() {
        let rendered = PROJECT_READY
            .render(&ctx(&[("project_name", "<b>A&B</b>"), ("plan_link", "x")]))
            .unwrap();
        assert_eq!(rendered.subject, "Plan ready: <b>A&B</b>");
        assert!(rendered.html_body.contains("&lt;b&gt;A&amp;B&lt;/b&gt;"));
    }

    #[test]
    fn missing_value_is_an_error() {
        let err = WELCOME.render(&ctx(&[("user_name", "Ada")])).unwrap_err();
        assert_eq!(
            err,
            TemplateError::MissingValue {
                template: "welcome".into(),
                key: "app_name".into(),
            }
        );
    }

    #[test]
    fn unterminated_placeholder_is_an_error() {
        let broken = Template {
            name: "broken",
            subject: "hi {{name",
            body: "",
        };
        let err = broken.render(&ctx(&[("name", "x")])).unwrap_err();
        assert_eq!(err, TemplateError::Unterminated("broken".into()));
    }

    #[test]
    fn templates_are_found_by_name() {
        for name in ["welcome", "password_reset", "project_ready", "consulting_confirmation"] {
            assert_eq!(template(name).unwrap().name, name);
        }
        assert!(matches!(template("nope"), Err(TemplateError::UnknownTemplate(_))));
    }
}
