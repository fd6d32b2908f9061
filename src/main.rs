use std::sync::Arc;

use relaykit::{init_logging, EventBus, RegistrationTable, Settings};

#[derive(Debug)]
struct Started {
    version: &'static str,
}

#[derive(Debug)]
struct Stopping;

fn announce(event: &Started) {
    tracing::info!("relaykit {} started", event.version);
}

fn farewell(_: &Stopping) {
    tracing::info!("Shutting down");
}

fn main() -> anyhow::Result<()> {
    let settings = Settings::load_or_default(&Settings::default_path())?;
    init_logging(&settings.logging)?;

    let root = EventBus::with_config(settings.bus.clone());
    let audit = Arc::new(EventBus::named("audit", -1));
    audit.listen_named::<Started, _>("audit", 0, |e| {
        tracing::info!(event = ?e, "Audited");
    });
    root.subscribe(&audit)?;

    let installation = RegistrationTable::new()
        .function::<Started>("announce", 0, announce)
        .function::<Stopping>("farewell", 0, farewell)
        .install(&root);
    root.log_subscribers();

    root.send(&Started {
        version: relaykit::VERSION,
    })?;
    root.send(&Stopping)?;

    installation.uninstall(&root);
    root.dispose();
    Ok(())
}
