//! Host metadata advertised in the `init` handshake frame.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

/// Subdirectory of each XDG data dir that holds package manifests.
const PACKAGE_DIR: &str = "muxbridge";

/// Manifest names that are reserved words, never package names.
const RESERVED_NAMES: [&str; 2] = ["incompatible", "requires"];

/// Parse the OS release identification file into a string map.
///
/// Returns an empty map when no os-release file is readable; the handshake
/// still goes out, just without release metadata.
pub fn os_release() -> Map<String, Value> {
    for path in ["/usr/lib/os-release", "/etc/os-release"] {
        if let Ok(content) = std::fs::read_to_string(path) {
            return parse_os_release(&content);
        }
    }
    debug!("no os-release file found");
    Map::new()
}

fn parse_os_release(content: &str) -> Map<String, Value> {
    let mut fields = Map::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            fields.insert(key.to_string(), Value::String(unquote(value)));
        }
    }
    fields
}

fn unquote(value: &str) -> String {
    let value = value.trim();
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return value[1..value.len() - 1].to_string();
        }
    }
    value.to_string()
}

/// Discover installed package manifests from the XDG data directories.
///
/// Earlier directories take precedence over later ones, so the scan walks
/// the list back to front and lets later inserts overwrite.
pub fn discover_packages() -> Map<String, Value> {
    discover_packages_in(&xdg_data_dirs())
}

fn xdg_data_dirs() -> Vec<PathBuf> {
    let home = std::env::var("XDG_DATA_HOME")
        .ok()
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::var("HOME").ok().map(|h| Path::new(&h).join(".local/share")));

    let system = std::env::var("XDG_DATA_DIRS")
        .ok()
        .filter(|dirs| !dirs.is_empty())
        .unwrap_or_else(|| "/usr/local/share:/usr/share".to_string());

    home.into_iter()
        .chain(system.split(':').map(PathBuf::from))
        .collect()
}

fn discover_packages_in(dirs: &[PathBuf]) -> Map<String, Value> {
    let mut packages = Map::new();

    for dir in dirs.iter().rev() {
        let root = dir.join(PACKAGE_DIR);
        let entries = match std::fs::read_dir(&root) {
            Ok(entries) => entries,
            Err(_) => continue,
        };

        for entry in entries.flatten() {
            if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let manifest_path = entry.path().join("manifest.json");
            let content = match std::fs::read(&manifest_path) {
                Ok(bytes) => bytes,
                Err(_) => continue,
            };
            let manifest: Value = match serde_json::from_slice(&content) {
                Ok(manifest) => manifest,
                Err(err) => {
                    debug!(?manifest_path, "skipping unparsable manifest: {err}");
                    continue;
                }
            };

            let name = manifest
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| entry.file_name().to_string_lossy().into_owned());

            if RESERVED_NAMES.contains(&name.as_str()) {
                continue;
            }

            packages.insert(name, manifest);
        }
    }

    packages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_release_lines_parse_with_quotes_stripped() {
        let fields = parse_os_release(
            "NAME=\"Example Linux\"\nID=example\nVERSION_ID='42'\n\n# comment\nBAD_LINE\n",
        );

        assert_eq!(fields["NAME"], "Example Linux");
        assert_eq!(fields["ID"], "example");
        assert_eq!(fields["VERSION_ID"], "42");
        assert_eq!(fields.len(), 3);
    }

    #[test]
    fn packages_scan_prefers_earlier_dirs_and_name_overrides() {
        let base = std::env::temp_dir().join(format!("muxbridge-pkg-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&base);
        let first = base.join("first");
        let second = base.join("second");
        for (dir, version) in [(&first, "new"), (&second, "old")] {
            let pkg = dir.join(PACKAGE_DIR).join("shell");
            std::fs::create_dir_all(&pkg).unwrap();
            std::fs::write(
                pkg.join("manifest.json"),
                format!("{{\"version\": \"{version}\"}}"),
            )
            .unwrap();
        }
        let renamed = first.join(PACKAGE_DIR).join("dir-name");
        std::fs::create_dir_all(&renamed).unwrap();
        std::fs::write(renamed.join("manifest.json"), br#"{"name": "actual"}"#).unwrap();

        let packages = discover_packages_in(&[first, second]);

        assert_eq!(packages["shell"]["version"], "new");
        assert!(packages.contains_key("actual"));
        assert!(!packages.contains_key("dir-name"));

        let _ = std::fs::remove_dir_all(&base);
    }

    #[test]
    fn reserved_manifest_names_are_skipped() {
        let base = std::env::temp_dir().join(format!("muxbridge-pkg-rsv-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&base);
        let pkg = base.join(PACKAGE_DIR).join("whatever");
        std::fs::create_dir_all(&pkg).unwrap();
        std::fs::write(pkg.join("manifest.json"), br#"{"name": "requires"}"#).unwrap();

        let packages = discover_packages_in(&[base.clone()]);
        assert!(packages.is_empty());

        let _ = std::fs::remove_dir_all(&base);
    }
}
