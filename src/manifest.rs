use std::path::{Path, PathBuf};

use serde::Serialize;

/// Host name the extension passes to `runtime.connectNative`.
pub const HOST_NAME: &str = "watch_dir";

/// Native-messaging host manifest, as installed under the browser's
/// `native-messaging-hosts` directory.
#[derive(Debug, Serialize)]
pub struct HostManifest {
    pub name: &'static str,
    pub description: &'static str,
    pub path: PathBuf,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub allowed_extensions: Vec<String>,
}

impl HostManifest {
    pub fn new(executable: &Path, extension_id: &str) -> Self {
        Self {
            name: HOST_NAME,
            description: "Reports user style sheet changes to the browser",
            path: executable.to_path_buf(),
            kind: "stdio",
            allowed_extensions: vec![extension_id.to_string()],
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
