//! Outbound email: username recovery messages and transport diagnostics.

use lettre::{
    Address, AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
};
use std::path::Path;
use tracing::{debug, instrument};

use crate::{
    config::{Branding, Config, EmailTransportConfig},
    errors::Error,
    types::mask_email,
};

pub struct EmailService {
    transport: EmailTransport,
    from_email: String,
    from_name: String,
    reply_to: Option<String>,
    branding: Branding,
}

enum EmailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

/// A rendered message: HTML with a plain-text alternative
struct EmailBody {
    html: String,
    text: String,
}

impl EmailService {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let email_config = &config.email;

        let transport = match &email_config.transport {
            EmailTransportConfig::Smtp {
                host,
                port,
                username,
                password,
                use_tls,
            } => {
                if !use_tls {
                    tracing::warn!("SMTP TLS is disabled - this is not recommended for production");
                }

                let mut smtp_builder = if *use_tls {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                } else {
                    Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host))
                }
                .map_err(|e| Error::Internal {
                    operation: format!("create SMTP transport: {e}"),
                })?
                .port(*port);

                if let (Some(username), Some(password)) = (username, password) {
                    smtp_builder = smtp_builder.credentials(Credentials::new(username.clone(), password.clone()));
                }

                EmailTransport::Smtp(smtp_builder.build())
            }
            EmailTransportConfig::File { path } => {
                let emails_dir = Path::new(path);
                if !emails_dir.exists() {
                    std::fs::create_dir_all(emails_dir).map_err(|e| Error::Internal {
                        operation: format!("create emails directory: {e}"),
                    })?;
                }
                EmailTransport::File(AsyncFileTransport::<Tokio1Executor>::new(emails_dir))
            }
        };

        Ok(Self {
            transport,
            from_email: email_config.from_email.clone(),
            from_name: email_config.from_name.clone(),
            reply_to: email_config.reply_to.clone(),
            branding: config.branding.clone(),
        })
    }

    /// Tell the account holder which username belongs to their email address
    #[instrument(skip_all, fields(to = %mask_email(to_email)), err)]
    pub async fn send_username_recovery_email(&self, to_email: &str, to_name: Option<&str>, username: &str) -> Result<(), Error> {
        let subject = format!("Your {} username", self.branding.app_name);
        let body = self.create_username_recovery_body(to_name, username);

        self.send_email(to_email, to_name, &subject, body).await
    }

    /// A short message proving the configured transport works end to end
    #[instrument(skip_all, fields(to = %mask_email(to_email)), err)]
    pub async fn send_diagnostic_email(&self, to_email: &str) -> Result<(), Error> {
        let app_name = &self.branding.app_name;
        let subject = format!("{app_name} email delivery test");
        let body = EmailBody {
            html: format!(
                "<p>This is a test message from {}. If you can read it, outbound email is configured correctly.</p>",
                escape_html(app_name)
            ),
            text: format!("This is a test message from {app_name}. If you can read it, outbound email is configured correctly.\n"),
        };

        self.send_email(to_email, None, &subject, body).await
    }

    async fn send_email(&self, to_email: &str, to_name: Option<&str>, subject: &str, body: EmailBody) -> Result<(), Error> {
        let from_address = self.from_email.parse::<Address>().map_err(|e| Error::Internal {
            operation: format!("parse from email: {e}"),
        })?;
        let from = Mailbox::new(Some(self.from_name.clone()), from_address);

        let to_address = to_email.parse::<Address>().map_err(|e| Error::Internal {
            operation: format!("parse to email: {e}"),
        })?;
        let to = Mailbox::new(to_name.map(str::to_string), to_address);

        let mut builder = Message::builder().from(from).to(to).subject(subject);
        if let Some(reply_to) = &self.reply_to {
            let reply_to = reply_to.parse::<Mailbox>().map_err(|e| Error::Internal {
                operation: format!("parse reply-to email: {e}"),
            })?;
            builder = builder.reply_to(reply_to);
        }

        let message = builder
            .multipart(MultiPart::alternative_plain_html(body.text, body.html))
            .map_err(|e| Error::Internal {
                operation: format!("build email message: {e}"),
            })?;

        match &self.transport {
            EmailTransport::Smtp(smtp) => {
                smtp.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send SMTP email: {e}"),
                })?;
            }
            EmailTransport::File(file) => {
                file.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send file email: {e}"),
                })?;
            }
        }

        debug!("Email sent");
        Ok(())
    }

    fn create_username_recovery_body(&self, to_name: Option<&str>, username: &str) -> EmailBody {
        let app_name = &self.branding.app_name;
        let greeting = match to_name {
            Some(name) => format!("Hello {name},"),
            None => "Hello,".to_string(),
        };
        let support_text = match &self.branding.support_email {
            Some(support) => format!("If you didn't ask for this, you can ignore this email or contact us at {support}."),
            None => "If you didn't ask for this, you can safely ignore this email.".to_string(),
        };

        let text = format!(
            "{greeting}\n\n\
             Someone asked for the username linked to this email address on {app_name}.\n\n\
             Your username is: {username}\n\n\
             {support_text}\n\n\
             This is an automated message, please do not reply to this email.\n"
        );

        let support_html = match &self.branding.support_email {
            Some(support) => {
                let support = escape_html(support);
                format!(
                    "If you didn't ask for this, you can ignore this email or contact us at <a href=\"mailto:{support}\">{support}</a>."
                )
            }
            None => escape_html(&support_text),
        };

        let html = format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Your {app_name} username</title>
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
        .username {{ font-size: 18px; font-weight: bold; padding: 12px; background: #f4f4f4; border-radius: 4px; }}
        .footer {{ margin-top: 30px; font-size: 12px; color: #666; }}
    </style>
</head>
<body>
    <div class="container">
        <h2>{app_name}</h2>

        <p>{greeting}</p>

        <p>Someone asked for the username linked to this email address. Your username is:</p>

        <p class="username">{username}</p>

        <p>{support_html}</p>

        <div class="footer">
            <p>This is an automated message, please do not reply to this email.</p>
        </div>
    </div>
</body>
</html>"#,
            app_name = escape_html(app_name),
            greeting = escape_html(&greeting),
            username = escape_html(username),
        );

        EmailBody { html, text }
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
