//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! Produces the commented INI representation written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;
use crate::store::PartitionRole;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let interceptor = &config.interceptor;
    let app = interceptor.partition(PartitionRole::App);
    let tile = interceptor.partition(PartitionRole::Tile);
    let connect_timeout = config
        .network
        .connect_timeout
        .map(|t| t.to_string())
        .unwrap_or_default();

    format!(
        r#"[partitions]
; Partition names are <name>-<version>. Changing a version retires the
; previous partition of that role the next time the layer activates.
app_name = {}
app_version = {}
tile_name = {}
tile_version = {}

[app]
; Origin the application shell is served from. Responses from this origin
; are cached when fetched.
origin = {}
; Comma separated paths stored into the app partition at install
precache = {}

[tiles]
; Comma separated URL prefixes identifying map tile requests
origins = {}
; Tile entries kept after CLEAN_MAP_CACHE (default: 100)
max_entries = {}
; What a refresh does to an entry's age:
;   reset_age    - a refreshed tile counts as newest (default)
;   preserve_age - a tile keeps the age of its first download
refresh_policy = {}
; Share one network fetch between concurrent requests for the same tile
coalesce_refreshes = {}

[store]
; Root directory of the on-disk partition store
directory = {}

[network]
; Connect timeout in seconds. Empty means no timeout.
connect_timeout = {}

[logging]
directory = {}
file = {}
"#,
        app.base,
        app.version,
        tile.base,
        tile.version,
        interceptor.app_origin(),
        interceptor.precache_manifest().join(", "),
        interceptor.tile_origins().join(", "),
        interceptor.max_tile_entries(),
        interceptor.refresh_policy(),
        interceptor.coalesce_refreshes(),
        path_to_string(&config.store.directory),
        connect_timeout,
        path_to_string(&config.logging.directory),
        config.logging.file,
    )
}

/// Render a path, abbreviating the home directory to `~`.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}
