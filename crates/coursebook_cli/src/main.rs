//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `coursebook_core` linkage, configuration and schema bootstrap.
//! - Keep output deterministic for quick local sanity checks.

use coursebook_core::db::migrations::latest_version;
use coursebook_core::{
    init_logging_from_config, open_configured_db, CoreConfig, EntityType, RecordQuery,
    RecordService,
};
use log::info;
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("coursebook error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = CoreConfig::from_env()?;
    init_logging_from_config(&config)?;

    println!("coursebook_core ping={}", coursebook_core::ping());
    println!("coursebook_core version={}", coursebook_core::core_version());

    let conn = open_configured_db(&config)?;
    let service = RecordService::try_new(&conn)?;
    println!("schema version={}", latest_version());

    let registry = service.registry();
    for entity in EntityType::ALL {
        let Some(schema) = registry.schema(entity) else {
            continue;
        };
        let count = service.list(&RecordQuery::new(entity))?.len();
        println!(
            "entity={} fields={} rules={} edges={} records={count}",
            entity,
            schema.fields.len(),
            schema.rules.len(),
            registry.outgoing(entity).len()
        );
    }
    for edge in registry.associations() {
        println!("association {edge}");
    }

    info!("event=cli_probe module=cli status=ok");
    Ok(())
}
