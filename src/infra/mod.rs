//! Runtime bootstrap: settings, telemetry and the store registry.

pub mod error;
pub mod telemetry;

use std::path::Path;

use tracing::{info, warn};

use crate::cache::StoreRegistry;
use crate::config::{self, Settings};

use self::error::InfraError;

/// Load settings, install telemetry and build the default store registry.
///
/// A subscriber installed earlier by the host is kept; the failed install is
/// logged through it and bootstrap continues. Intended for binaries embedding the cache; libraries should build a
/// [`StoreRegistry`] directly and leave subscriber setup to the host.
pub fn bootstrap(config_file: Option<&Path>) -> Result<(Settings, StoreRegistry), InfraError> {
    let settings = config::load(config_file)?;
    if let Err(err) = telemetry::init(&settings.logging) {
        warn!(error = %err, "Keeping the already installed tracing subscriber");
    }

    let registry = StoreRegistry::from_settings(&settings.cache);
    info!(
        store = registry.default_name(),
        length = %settings.cache.length,
        capacity = settings.cache.capacity.get(),
        tagging = settings.cache.tagging,
        single_flight = settings.cache.single_flight,
        on_store_error = ?settings.cache.on_store_error,
        "Query cache ready"
    );
    Ok((settings, registry))
}
