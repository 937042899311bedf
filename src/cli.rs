use clap::Parser;

/// Native-messaging host that reports user style sheet changes to a browser extension.
///
/// Watches `~/.local/share/userstyles` (the platform data directory) and writes
/// length-prefixed JSON messages to stdout. The watched directory cannot be
/// changed: the extension must not be able to point the host at arbitrary paths.
#[derive(Parser, Debug)]
#[command(name = "watch-dir", version, about, long_about = None)]
pub struct Cli {
    /// Log filter for stderr diagnostics (overrides the config file and RUST_LOG).
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Print a native-messaging host manifest allowing EXTENSION_ID, then exit.
    #[arg(long, value_name = "EXTENSION_ID")]
    pub print_manifest: Option<String>,

    /// Arguments appended by the browser (manifest path, extension id or origin). Ignored.
    #[arg(hide = true, num_args = 0.., allow_hyphen_values = true, trailing_var_arg = true)]
    pub browser_args: Vec<String>,
}
