//! Built-in handlers shipped with the engine (`spec.md` §6 "reference
//! handler set"). None of these are mandatory — a deployment supplies its
//! own [`crate::handlers::HandlerDescriptor`] → factory table via
//! [`crate::handlers::HandlerRegistry::with_factories`] if it wants
//! different behavior.

pub mod data;
pub mod data_file;
pub mod domain_validator;
pub mod greeting;
pub mod hello;
pub mod mail;
pub mod post_data_reset;
pub mod quit;
pub mod recipient;
pub mod reject_all;
pub mod reset;
pub mod spf_validator;
pub mod starttls;
pub mod transaction_log;
pub mod unknown_command;

use std::collections::HashMap;
use std::sync::Arc;

use super::{Factory, HandlerInstance};
use transaction_log::TransactionLogHandler;

fn command_only<H>(handler: H) -> HandlerInstance
where
    H: super::CommandHandler + 'static,
{
    HandlerInstance {
        command: Some(Arc::new(handler)),
        data: None,
    }
}

fn data_only<H>(handler: H) -> HandlerInstance
where
    H: super::DataCommandHandler + 'static,
{
    HandlerInstance {
        command: None,
        data: Some(Arc::new(handler)),
    }
}

/// The factory table every [`crate::handlers::HandlerRegistry::with_builtins`]
/// starts from, keyed the same way `HandlerDescriptor::key` formats a
/// descriptor (`"module::class"`), so the chain configuration file can name
/// these directly. `spool_dir`/`log_dir` come from [`crate::config::EngineConfig`]
/// and are captured by the closures that need them.
pub fn factory_table(spool_dir: &str, log_dir: &str) -> HashMap<String, Factory> {
    let mut table: HashMap<String, Factory> = HashMap::new();

    table.insert(
        "handlers.greeting::GreetingHandler".into(),
        Arc::new(|| command_only(greeting::GreetingHandler)),
    );
    table.insert(
        "handlers.hello::HelloHandler".into(),
        Arc::new(|| command_only(hello::HelloHandler::default())),
    );
    table.insert("handlers.mail::MailHandler".into(), Arc::new(|| command_only(mail::MailHandler)));
    table.insert(
        "handlers.recipient::RecipientHandler".into(),
        Arc::new(|| command_only(recipient::RecipientHandler)),
    );
    table.insert(
        "handlers.reset::ResetHandler".into(),
        Arc::new(|| command_only(reset::ResetHandler)),
    );
    table.insert(
        "handlers.quit::QuitHandler".into(),
        Arc::new(|| command_only(quit::QuitHandler)),
    );
    table.insert(
        "handlers.starttls::StartTlsHandler".into(),
        Arc::new(|| command_only(starttls::StartTlsHandler)),
    );
    table.insert(
        "handlers.reject_all::RejectAllHandler".into(),
        Arc::new(|| {
            let handler = Arc::new(reject_all::RejectAllHandler::default());
            HandlerInstance {
                command: Some(handler.clone()),
                data: Some(handler),
            }
        }),
    );
    table.insert(
        "handlers.unknown_command::UnknownCommandHandler".into(),
        Arc::new(|| command_only(unknown_command::UnknownCommandHandler)),
    );
    table.insert(
        "handlers.domain_validator::DomainValidatorHandler".into(),
        Arc::new(|| command_only(domain_validator::DomainValidatorHandler::default())),
    );
    table.insert(
        "handlers.data::DataHandler".into(),
        Arc::new(|| command_only(data::DataHandler)),
    );

    let spool_dir = spool_dir.to_string();
    table.insert(
        "handlers.data_file::DataFileHandler".into(),
        Arc::new(move || data_only(data_file::DataFileHandler::new(spool_dir.as_str()))),
    );

    table.insert(
        "handlers.post_data_reset::PostDataResetHandler".into(),
        Arc::new(|| data_only(post_data_reset::PostDataResetHandler::default())),
    );

    let log_dir = log_dir.to_string();
    table.insert(
        "handlers.transaction_log::TransactionLogHandler".into(),
        Arc::new(move || command_only(TransactionLogHandler::new(log_dir.as_str()))),
    );

    table
}

/// `spf_validator::SpfValidatorHandler` is deliberately not in
/// [`factory_table`]: it needs a live `mail_auth::Resolver`, whose
/// construction is fallible and depends on the host's DNS configuration.
/// A deployment that wants SPF checking constructs one explicitly and adds
/// it to its own factory table under whatever descriptor key its chain
/// configuration uses.
