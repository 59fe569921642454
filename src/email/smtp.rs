use super::message::EmailContent;
use super::notifier::{Notifier, NotifyError};
use crate::config::model::{MailConfig, SmtpConfig};
use crate::ida::model::Event;
use async_trait::async_trait;
use chrono::Local;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, instrument};
use uuid::Uuid;

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl SmtpNotifier {
    /// Fails on invalid addresses, so misconfiguration shows at startup
    pub fn new(smtp: &SmtpConfig, mail: &MailConfig) -> Result<Self, NotifyError> {
        let builder = if smtp.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)?
        };
        let transport = builder
            .port(smtp.port)
            .credentials(Credentials::new(smtp.user.clone(), smtp.password.clone()))
            .build();

        Ok(Self {
            transport,
            from: parse_mailbox(&mail.from)?,
            to: mail
                .to
                .iter()
                .map(|address| parse_mailbox(address))
                .collect::<Result<_, _>>()?,
        })
    }

    fn build_message(
        &self,
        content: EmailContent,
        message_id: &str,
    ) -> Result<Message, NotifyError> {
        let builder = self
            .to
            .iter()
            .cloned()
            .fold(Message::builder().from(self.from.clone()), |builder, to| {
                builder.to(to)
            });

        Ok(builder
            .subject(content.subject)
            .message_id(Some(message_id.to_string()))
            .multipart(MultiPart::alternative_plain_html(content.text, content.html))?)
    }

    fn new_message_id(&self) -> String {
        format!("<{}@{}>", Uuid::new_v4(), self.from.email.domain())
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    #[instrument(skip(self, events), fields(event_count = events.len()))]
    async fn notify(&self, events: &[Event]) -> Result<String, NotifyError> {
        let sent_at = Local::now().format("%d.%m.%Y %H:%M:%S").to_string();
        let content = EmailContent::for_events(events, &sent_at);
        let message_id = self.new_message_id();
        let message = self.build_message(content, &message_id)?;

        self.transport.send(message).await?;

        info!(
            "E-mail sent: {} to {}",
            message_id,
            self.to.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
        );

        Ok(message_id)
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address
        .parse()
        .map_err(|source| NotifyError::InvalidAddress {
            address: address.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smtp_config() -> SmtpConfig {
        SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            secure: false,
            user: "watcher@example.com".to_string(),
            password: "secret".to_string(),
        }
    }

    fn mail_config(to: &[&str]) -> MailConfig {
        MailConfig {
            from: "IDA Watch <watcher@example.com>".to_string(),
            to: to.iter().map(|address| address.to_string()).collect(),
        }
    }

    #[test_log::test(tokio::test)]
    async fn should_accept_every_recipient() {
        let mail = mail_config(&["a@example.com", "B <b@example.com>"]);
        let notifier = SmtpNotifier::new(&smtp_config(), &mail).unwrap();

        assert_eq!(notifier.to.len(), 2);
        assert_eq!(notifier.from.email.to_string(), "watcher@example.com");
    }

    #[test_log::test(tokio::test)]
    async fn when_a_recipient_is_invalid_should_fail_to_build() {
        let result = SmtpNotifier::new(&smtp_config(), &mail_config(&["not an address"]));

        assert!(matches!(
            result,
            Err(NotifyError::InvalidAddress { address, .. }) if address == "not an address"
        ));
    }

    #[test_log::test(tokio::test)]
    async fn should_build_a_multipart_message_with_the_message_id() {
        let notifier =
            SmtpNotifier::new(&smtp_config(), &mail_config(&["a@example.com"])).unwrap();
        let events = [Event::new(
            "Rust workshop".to_string(),
            String::new(),
            String::new(),
            "https://ida.dk/event/rust".to_string(),
        )];
        let message_id = notifier.new_message_id();

        let message = notifier
            .build_message(EmailContent::for_events(&events, "now"), &message_id)
            .unwrap();
        let formatted = String::from_utf8(message.formatted()).unwrap();

        assert!(message_id.ends_with("@example.com>"));
        assert!(formatted.contains(&format!("Message-ID: {message_id}")));
        assert!(formatted.contains("multipart/alternative"));
        assert!(formatted.contains("To: a@example.com"));
    }
}
