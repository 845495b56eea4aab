use std::io;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

/// Resolves logical resource paths to bytes for `http-stream1` channels.
pub trait ResourceLoader: Send + Sync {
    /// Load the resource at `path`, or fail with `NotFound`.
    fn load(&self, path: &str) -> io::Result<Vec<u8>>;
}

/// Loader that knows no resources. Used when no asset directory is
/// configured.
pub struct NullLoader;

impl ResourceLoader for NullLoader {
    fn load(&self, path: &str) -> io::Result<Vec<u8>> {
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no resource directory configured: {path}"),
        ))
    }
}

/// Serves web assets out of `<base>/dist`.
///
/// The special path `/manifests.js` returns a generated script aggregating
/// every package manifest under the dist tree. Paths containing `*` resolve
/// to empty content.
pub struct DistLoader {
    base: PathBuf,
}

impl DistLoader {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn manifest_script(&self) -> io::Result<Vec<u8>> {
        let mut manifests = Map::new();
        let dist = self.base.join("dist");

        for entry in std::fs::read_dir(&dist)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let manifest_path = entry.path().join("manifest.json");
            let content = match std::fs::read(&manifest_path) {
                Ok(bytes) => bytes,
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err),
            };
            let mut manifest: Value = serde_json::from_slice(&content)
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

            // A manifest may override its package name; the directory name
            // is the fallback.
            let name = match manifest.as_object_mut().and_then(|m| m.remove("name")) {
                Some(Value::String(name)) => name,
                _ => entry.file_name().to_string_lossy().into_owned(),
            };
            manifests.insert(name, manifest);
        }

        let blob = serde_json::to_string(&Value::Object(manifests))
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        let script = format!(
            r#"(function (root, data) {{
    if (typeof define === 'function' && define.amd) {{
        define(data);
    }}

    if (typeof cockpit === 'object') {{
        cockpit.manifests = data;
    }} else {{
        root.manifests = data;
    }}
}}(this, {blob}))"#
        );
        Ok(script.into_bytes())
    }
}

impl ResourceLoader for DistLoader {
    fn load(&self, path: &str) -> io::Result<Vec<u8>> {
        if path == "/manifests.js" {
            return self.manifest_script();
        }

        if path.contains('*') {
            return Ok(Vec::new());
        }

        let relative = path.trim_start_matches('/');
        let full: &Path = &self.base.join("dist").join(relative);
        debug!(?full, "loading resource");
        std::fs::read(full)
    }
}
