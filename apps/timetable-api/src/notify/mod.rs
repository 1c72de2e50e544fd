pub mod directory;
pub mod fanout;
pub mod mailer;
