use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

use crate::config::SmtpConfig;

const OTP_SUBJECT: &str = "Your verification code";

/// Outbound email seam. Delivery is fire-and-forget from the caller's point
/// of view: failures are logged by the registration flow, never surfaced.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_otp(&self, to: &str, code: &str) -> anyhow::Result<()>;
}

/// Real SMTP delivery via STARTTLS relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    otp_ttl_minutes: i64,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig, otp_ttl_minutes: i64) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();
        Ok(Self {
            transport,
            from: config.from.parse()?,
            otp_ttl_minutes,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_otp(&self, to: &str, code: &str) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse()?)
            .subject(OTP_SUBJECT)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(format!(
                                "Your verification code is {code}. It is valid for {} minutes.",
                                self.otp_ttl_minutes
                            )),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(render_otp_html(code, self.otp_ttl_minutes)),
                    ),
            )?;

        self.transport.send(message).await?;
        info!(to = %to, "otp email sent");
        Ok(())
    }
}

/// Fallback used when SMTP is not configured: the code is logged so local
/// runs and test harnesses can pick it up.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_otp(&self, to: &str, code: &str) -> anyhow::Result<()> {
        info!(to = %to, code = %code, "smtp not configured, logging otp instead");
        Ok(())
    }
}

fn render_otp_html(code: &str, ttl_minutes: i64) -> String {
    format!(
        r#"<html>
<body style="font-family: Arial, sans-serif; background-color: #f4f4f4; padding: 20px;">
  <div style="max-width: 600px; margin: auto; background: white; padding: 30px; border-radius: 10px; text-align: center;">
    <h2>Confirm your registration</h2>
    <p>Use the code below to complete your registration:</p>
    <h1>{code}</h1>
    <p style="font-size: 14px; color: #555;">This code is valid for {ttl_minutes} minutes.</p>
    <p style="font-size: 12px; color: #999;">If you did not register, please ignore this email.</p>
  </div>
</body>
</html>"#
    )
}
