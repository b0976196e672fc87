pub mod cli;
pub mod console_notifier;
