//! Infrastructure services wired into the core.

pub mod email;

pub use email::{mailer_from_config, SmtpMailer};
