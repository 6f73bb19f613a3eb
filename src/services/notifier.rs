use async_trait::async_trait;
use sqlx::MySqlPool;
use tracing::{error, info};

/// A message for one recipient. `path` is joined onto the configured
/// application base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub path: Option<String>,
}

impl Notification {
    pub fn link(&self, base_url: &str) -> Option<String> {
        self.path.as_deref().map(|p| {
            format!(
                "{}/{}",
                base_url.trim_end_matches('/'),
                p.trim_start_matches('/')
            )
        })
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: Notification) -> anyhow::Result<()>;
}

/// Sends and logs, never failing the caller.
pub async fn notify(notifier: &dyn Notifier, notification: Notification) {
    let recipient = notification.recipient.clone();
    if let Err(e) = notifier.send(notification).await {
        error!(error = %e, recipient = %recipient, "Failed to send notification");
    }
}

/// Writes notifications to the log only.
pub struct LogNotifier {
    pub base_url: String,
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, n: Notification) -> anyhow::Result<()> {
        info!(
            recipient = %n.recipient,
            subject = %n.subject,
            link = ?n.link(&self.base_url),
            "Notification"
        );
        Ok(())
    }
}

/// Queues notifications in the `notifications` table for the mailer.
pub struct OutboxNotifier {
    pub pool: MySqlPool,
    pub base_url: String,
}

#[async_trait]
impl Notifier for OutboxNotifier {
    async fn send(&self, n: Notification) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (recipient, subject, body, link)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&n.recipient)
        .bind(&n.subject)
        .bind(&n.body)
        .bind(n.link(&self.base_url))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingNotifier;
    use super::*;

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn send(&self, _: Notification) -> anyhow::Result<()> {
            anyhow::bail!("smtp down")
        }
    }

    fn note(path: Option<&str>) -> Notification {
        Notification {
            recipient: "jane@company.com".into(),
            subject: "Leave approved".into(),
            body: "Your leave was approved".into(),
            path: path.map(str::to_string),
        }
    }

    #[test]
    fn links_join_base_url() {
        let n = note(Some("/leave/4"));
        assert_eq!(
            n.link("https://hr.example.com/").as_deref(),
            Some("https://hr.example.com/leave/4")
        );
        assert_eq!(note(None).link("https://hr.example.com"), None);
    }

    #[actix_web::test]
    async fn notify_swallows_failures() {
        notify(&FailingNotifier, note(None)).await;
    }

    #[actix_web::test]
    async fn notify_delivers() {
        let recorder = RecordingNotifier::default();
        notify(&recorder, note(Some("leave/1"))).await;

        assert_eq!(recorder.sent.lock().unwrap().len(), 1);
    }
}
