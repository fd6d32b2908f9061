//! Explicit startup registration.
//!
//! A [`RegistrationTable`] lists the plain functions and subscriber
//! constructors an application wants on a bus at startup. Installing the
//! table subscribes every active entry; entries that fail are logged and
//! skipped so one bad entry does not block the rest.

use std::any::Any;
use std::sync::Arc;

use crate::bus::{EventBus, SubscriptionId};
use crate::error::Result;
use crate::subscriber::Subscriber;

type Uninstall = Box<dyn Fn(&EventBus) -> bool + Send + Sync>;
type Installer = Box<dyn Fn(&EventBus) -> Result<Installed> + Send + Sync>;

enum Installed {
    Function(SubscriptionId),
    /// Owns the constructed subscriber, which keeps it alive.
    Subscriber(Uninstall),
}

struct TableEntry {
    name: String,
    active: bool,
    installer: Installer,
}

/// Startup list of functions and subscriber constructors
///
/// ```rust,ignore
/// let table = RegistrationTable::new()
///     .function::<Connected>("log_connect", -10, log_connect)
///     .subscriber("status_panel", StatusPanel::create)
///     .set_active("status_panel", cfg!(feature = "ui"));
///
/// let installation = table.install(&bus);
/// ```
#[derive(Default)]
pub struct RegistrationTable {
    entries: Vec<TableEntry>,
}

impl RegistrationTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plain function handling events of type `E`
    pub fn function<E: Any>(mut self, name: &str, order: i32, handler: fn(&E)) -> Self {
        let listener_name: Arc<str> = Arc::from(name);
        self.entries.push(TableEntry {
            name: name.to_string(),
            active: true,
            installer: Box::new(move |bus| {
                let id = bus.listen_named::<E, _>(listener_name.clone(), order, handler);
                Ok(Installed::Function(id))
            }),
        });
        self
    }

    /// Add a subscriber built by `create` at install time
    pub fn subscriber<S: Subscriber>(mut self, name: &str, create: fn() -> Arc<S>) -> Self {
        self.entries.push(TableEntry {
            name: name.to_string(),
            active: true,
            installer: Box::new(move |bus| {
                let instance = create();
                bus.subscribe(&instance)?;
                Ok(Installed::Subscriber(Box::new(move |bus| {
                    bus.unsubscribe(&instance)
                })))
            }),
        });
        self
    }

    /// Enable or disable every entry called `name`
    pub fn set_active(mut self, name: &str, active: bool) -> Self {
        for entry in self.entries.iter_mut().filter(|e| e.name == name) {
            entry.active = active;
        }
        self
    }

    /// Entry names in table order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Number of entries, active or not
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Subscribe every active entry to `bus`
    pub fn install(&self, bus: &EventBus) -> Installation {
        let mut installed = Vec::new();

        for entry in &self.entries {
            if !entry.active {
                tracing::debug!(bus = bus.name(), entry = %entry.name, "Skipping inactive entry");
                continue;
            }

            match (entry.installer)(bus) {
                Ok(item) => installed.push((entry.name.clone(), item)),
                Err(err) => {
                    tracing::warn!(bus = bus.name(), entry = %entry.name, "Failed to install: {}", err);
                }
            }
        }

        tracing::debug!(
            bus = bus.name(),
            "Installed {} of {} table entries",
            installed.len(),
            self.entries.len()
        );
        Installation { installed }
    }
}

impl std::fmt::Debug for RegistrationTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| (&e.name, e.active)))
            .finish()
    }
}

/// Result of installing a [`RegistrationTable`]
///
/// Keeps constructed subscribers alive; their registrations only hold weak
/// references. Dropping the installation therefore deactivates them.
pub struct Installation {
    installed: Vec<(String, Installed)>,
}

impl Installation {
    /// Names of the installed entries
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.installed.iter().map(|(name, _)| name.as_str())
    }

    /// Number of installed entries
    pub fn len(&self) -> usize {
        self.installed.len()
    }

    /// Whether nothing was installed
    pub fn is_empty(&self) -> bool {
        self.installed.is_empty()
    }

    /// Unsubscribe everything this installation added. Returns the number
    /// of entries that were still subscribed.
    pub fn uninstall(self, bus: &EventBus) -> usize {
        self.installed
            .into_iter()
            .filter(|(_, item)| match item {
                Installed::Function(id) => bus.unlisten(*id),
                Installed::Subscriber(uninstall) => uninstall(bus),
            })
            .count()
    }
}

impl std::fmt::Debug for Installation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Installation")
            .field("entries", &self.names().collect::<Vec<_>>())
            .finish()
    }
}
