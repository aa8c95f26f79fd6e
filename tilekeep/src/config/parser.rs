//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names are mapped to settings.

use ini::Ini;
use std::path::PathBuf;

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use crate::store::{validate_partition_name, PartitionRole, PartitionSpec, RefreshPolicy};

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();
    let mut interceptor = config.interceptor.clone();

    // [partitions] section
    if let Some(section) = ini.section(Some("partitions")) {
        let app = interceptor.partition(PartitionRole::App).clone();
        let tile = interceptor.partition(PartitionRole::Tile).clone();

        let app = PartitionSpec::new(
            section.get("app_name").map(str::trim).unwrap_or(app.base.as_str()),
            section.get("app_version").map(str::trim).unwrap_or(app.version.as_str()),
        );
        let tile = PartitionSpec::new(
            section.get("tile_name").map(str::trim).unwrap_or(tile.base.as_str()),
            section.get("tile_version").map(str::trim).unwrap_or(tile.version.as_str()),
        );

        for (key, spec) in [("app_name", &app), ("tile_name", &tile)] {
            let name = spec.name();
            if validate_partition_name(&name).is_err() {
                return Err(invalid(
                    "partitions",
                    key,
                    &name,
                    "partition names may only contain letters, digits, '-', '_' and '.'",
                ));
            }
        }
        if app.name() == tile.name() {
            return Err(invalid(
                "partitions",
                "tile_name",
                &tile.name(),
                "app and tile partitions must have different names",
            ));
        }

        interceptor = interceptor.with_app_partition(app).with_tile_partition(tile);
    }

    // [app] section
    if let Some(section) = ini.section(Some("app")) {
        if let Some(v) = section.get("origin") {
            let v = v.trim();
            if !v.starts_with("http://") && !v.starts_with("https://") {
                return Err(invalid("app", "origin", v, "must start with http:// or https://"));
            }
            interceptor = interceptor.with_app_origin(v);
        }
        if let Some(v) = section.get("precache") {
            let paths = parse_list(v);
            if let Some(bad) = paths.iter().find(|p| !p.starts_with('/')) {
                return Err(invalid("app", "precache", bad, "paths must start with '/'"));
            }
            interceptor = interceptor.with_precache_manifest(paths);
        }
    }

    // [tiles] section
    if let Some(section) = ini.section(Some("tiles")) {
        if let Some(v) = section.get("origins") {
            interceptor = interceptor.with_tile_origins(parse_list(v));
        }
        if let Some(v) = section.get("max_entries") {
            let max = v.trim().parse().map_err(|_| {
                invalid("tiles", "max_entries", v, "must be a non-negative integer")
            })?;
            interceptor = interceptor.with_max_tile_entries(max);
        }
        if let Some(v) = section.get("refresh_policy") {
            let policy: RefreshPolicy = v.parse().map_err(|_| {
                invalid("tiles", "refresh_policy", v, "must be 'reset_age' or 'preserve_age'")
            })?;
            interceptor = interceptor.with_refresh_policy(policy);
        }
        if let Some(v) = section.get("coalesce_refreshes") {
            interceptor = interceptor.with_coalesce_refreshes(parse_bool(v));
        }
    }

    config.interceptor = interceptor;

    // [store] section
    if let Some(section) = ini.section(Some("store")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.store.directory = expand_tilde(v);
            }
        }
    }

    // [network] section
    if let Some(section) = ini.section(Some("network")) {
        if let Some(v) = section.get("connect_timeout") {
            let v = v.trim();
            config.network.connect_timeout = match v {
                "" | "0" | "none" => None,
                _ => Some(v.parse().map_err(|_| {
                    invalid(
                        "network",
                        "connect_timeout",
                        v,
                        "must be a positive integer (seconds) or empty",
                    )
                })?),
            };
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = v.to_string();
            }
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Split a comma separated list, dropping blanks.
pub(super) fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a boolean value from a string.
pub(super) fn parse_bool(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v == "true" || v == "1" || v == "yes" || v == "on"
}

/// Expand ~ to home directory in paths.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
