pub mod mailer;
pub mod verification;
