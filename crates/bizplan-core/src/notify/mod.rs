//! Fire-and-forget email notifications.
//!
//! Callers enqueue a typed [`Notification`] on a [`NotificationDispatcher`];
//! a single worker task drains the channel, renders the matching template
//! and hands the result to a [`Mailer`]. Enqueueing never blocks and never
//! fails the caller.

pub mod templates;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use templates::{Rendered, Template, TemplateError};

/// Product name used in email copy.
pub const APP_NAME: &str = "Business Plan Pipeline";

/// A notification to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Welcome {
        email: String,
        name: String,
    },
    PasswordReset {
        email: String,
        reset_token: String,
    },
    PlanReady {
        email: String,
        project_id: Uuid,
        project_name: String,
    },
    ConsultingScheduled {
        email: String,
        objective: String,
        meeting_link: String,
    },
}

impl Notification {
    pub fn recipient(&self) -> &str {
        match self {
            Self::Welcome { email, .. }
            | Self::PasswordReset { email, .. }
            | Self::PlanReady { email, .. }
            | Self::ConsultingScheduled { email, .. } => email,
        }
    }

    fn template(&self) -> Template {
        match self {
            Self::Welcome { .. } => templates::WELCOME,
            Self::PasswordReset { .. } => templates::PASSWORD_RESET,
            Self::PlanReady { .. } => templates::PROJECT_READY,
            Self::ConsultingScheduled { .. } => templates::CONSULTING_CONFIRMATION,
        }
    }

    fn context(&self, settings: &MailSettings) -> HashMap<&'static str, String> {
        let base = settings.public_base_url.trim_end_matches('/');
        let mut ctx = HashMap::from([("app_name", settings.from_name.clone())]);
        match self {
            Self::Welcome { name, .. } => {
                ctx.insert("user_name", name.clone());
            }
            Self::PasswordReset { reset_token, .. } => {
                ctx.insert("link", format!("{base}/reset-password?token={reset_token}"));
            }
            Self::PlanReady {
                project_id,
                project_name,
                ..
            } => {
                ctx.insert("project_name", project_name.clone());
                ctx.insert("plan_link", format!("{base}/projects/{project_id}/plan"));
            }
            Self::ConsultingScheduled {
                objective,
                meeting_link,
                ..
            } => {
                ctx.insert("objective", objective.clone());
                ctx.insert("meeting_link", meeting_link.clone());
            }
        }
        ctx
    }

    /// Render this notification into a deliverable email.
    pub fn render(&self, settings: &MailSettings) -> Result<OutgoingEmail, TemplateError> {
        let Rendered { subject, html_body } = self.template().render(&self.context(settings))?;
        Ok(OutgoingEmail {
            from: format!("{} <{}>", settings.from_name, settings.from_address),
            to: self.recipient().to_string(),
            subject,
            html_body,
        })
    }

    fn kind(&self) -> &'static str {
        self.template().name
    }
}

/// Sender identity and link base used when rendering emails.
#[derive(Debug, Clone)]
pub struct MailSettings {
    pub from_address: String,
    pub from_name: String,
    /// Base URL that links in emails point at.
    pub public_base_url: String,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            from_address: "no-reply@localhost".to_string(),
            from_name: APP_NAME.to_string(),
            public_base_url: "http://localhost:8000".to_string(),
        }
    }
}

/// A fully rendered email ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

/// Delivery capability for rendered emails.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> anyhow::Result<()>;
}

/// Mailer that records deliveries in the log instead of sending them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutgoingEmail) -> anyhow::Result<()> {
        tracing::info!(
            subject = %email.subject,
            body_len = email.html_body.len(),
            "email delivered to log"
        );
        tracing::debug!(to = %email.to, "logged email recipient");
        Ok(())
    }
}

/// Cloneable handle for enqueueing notifications.
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::UnboundedSender<Notification>,
}

impl NotificationDispatcher {
    /// Create a dispatcher and the receiver its worker should drain.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueue a notification. A closed channel is logged and otherwise
    /// ignored.
    pub fn dispatch(&self, notification: Notification) {
        let kind = notification.kind();
        if self.tx.send(notification).is_err() {
            tracing::warn!(kind, "notification worker is gone, dropping notification");
        }
    }
}

/// Spawn the worker that renders and delivers notifications until every
/// dispatcher has been dropped.
pub fn spawn_notification_worker(
    mut rx: mpsc::UnboundedReceiver<Notification>,
    mailer: Arc<dyn Mailer>,
    settings: MailSettings,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(notification) = rx.recv().await {
            let kind = notification.kind();
            let email = match notification.render(&settings) {
                Ok(email) => email,
                Err(e) => {
                    tracing::error!(kind, error = %e, "failed to render notification");
                    continue;
                }
            };
            if let Err(e) = mailer.send(&email).await {
                tracing::error!(kind, error = %e, "failed to send notification");
            }
        }
        tracing::debug!("notification worker stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<OutgoingEmail>>,
        fail: bool,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: &OutgoingEmail) -> anyhow::Result<()> {
            self.sent.lock().await.push(email.clone());
            if self.fail {
                anyhow::bail!("smtp unavailable");
            }
            Ok(())
        }
    }

    fn settings() -> MailSettings {
        MailSettings {
            from_address: "plans@example.com".into(),
            from_name: APP_NAME.into(),
            public_base_url: "https://plans.example.com/".into(),
        }
    }

    #[test]
    fn plan_ready_links_to_plan() {
        let id = Uuid::nil();
        let email = Notification::PlanReady {
            email: "ada@example.com".into(),
            project_id: id,
            project_name: "Acme".into(),
        }
        .render(&settings())
        .unwrap();

        assert_eq!(email.to, "ada@example.com");
        assert_eq!(email.from, "Business Plan Pipeline <plans@example.com>");
        assert_eq!(email.subject, "Plan ready: Acme");
        assert!(
            email
                .html_body
                .contains(&format!("https://plans.example.com/projects/{id}/plan"))
        );
    }

    #[test]
    fn every_notification_renders() {
        let all = [
            Notification::Welcome {
                email: "a@x".into(),
                name: "Ada".into(),
            },
            Notification::PasswordReset {
                email: "a@x".into(),
                reset_token: "bp_rt_tok".into(),
            },
            Notification::PlanReady {
                email: "a@x".into(),
                project_id: Uuid::new_v4(),
                project_name: "Acme".into(),
            },
            Notification::ConsultingScheduled {
                email: "a@x".into(),
                objective: "Funding".into(),
                meeting_link: "https://meet.google.com/xxx-xxx-xxx".into(),
            },
        ];
        for n in all {
            assert!(n.render(&settings()).is_ok(), "{} failed to render", n.kind());
        }
    }

    #[test]
    fn reset_link_carries_token() {
        let email = Notification::PasswordReset {
            email: "a@x".into(),
            reset_token: "bp_rt_abc".into(),
        }
        .render(&settings())
        .unwrap();
        assert!(
            email
                .html_body
                .contains("https://plans.example.com/reset-password?token=bp_rt_abc")
        );
    }

    #[tokio::test]
    async fn worker_delivers_in_order_and_stops_when_dispatchers_drop() {
        let mailer = Arc::new(RecordingMailer::default());
        let (dispatcher, rx) = NotificationDispatcher::channel();
        let worker = spawn_notification_worker(rx, mailer.clone(), settings());

        dispatcher.dispatch(Notification::Welcome {
            email: "first@x".into(),
            name: "First".into(),
        });
        dispatcher.dispatch(Notification::Welcome {
            email: "second@x".into(),
            name: "Second".into(),
        });
        drop(dispatcher);
        worker.await.unwrap();

        let sent = mailer.sent.lock().await;
        let to: Vec<&str> = sent.iter().map(|e| e.to.as_str()).collect();
        assert_eq!(to, ["first@x", "second@x"]);
    }

    #[tokio::test]
    async fn mailer_failures_do_not_stop_worker() {
        let mailer = Arc::new(RecordingMailer {
            fail: true,
            ..Default::default()
        });
        let (dispatcher, rx) = NotificationDispatcher::channel();
        let worker = spawn_notification_worker(rx, mailer.clone(), settings());

        for i in 0..3 {
            dispatcher.dispatch(Notification::Welcome {
                email: format!("{i}@x"),
                name: "N".into(),
            });
        }
        drop(dispatcher);
        worker.await.unwrap();

        assert_eq!(mailer.sent.lock().await.len(), 3);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn dropped_notification_is_logged_without_address() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();

        let (dispatcher, rx) = NotificationDispatcher::channel();
        drop(rx);
        tracing::subscriber::with_default(subscriber, || {
            dispatcher.dispatch(Notification::Welcome {
                email: "private@example.com".into(),
                name: "A".into(),
            });
        });

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("dropping notification"), "{output}");
        assert!(output.contains("welcome"), "{output}");
        assert!(!output.contains("private@example.com"), "{output}");
    }
}
