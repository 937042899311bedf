use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::classify::WatchRoot;
use crate::error::{HostError, Result};
use crate::message::Message;
use crate::scanner;
use crate::watcher::event::{RawNotification, WatchEvent};
use crate::wire::MessageSink;

/// Maps filesystem notifications to protocol messages and writes them out.
///
/// The translator is the only writer to the sink. It remembers which names it
/// has reported so that directories leaving the tree and resyncs can retract
/// names no file backs any more.
pub struct Translator<W: Write> {
    root: WatchRoot,
    sink: MessageSink<W>,
    known: BTreeSet<String>,
}

impl<W: Write> Translator<W> {
    pub fn new(root: WatchRoot, sink: MessageSink<W>) -> Self {
        Self {
            root,
            sink,
            known: BTreeSet::new(),
        }
    }

    pub fn root(&self) -> &WatchRoot {
        &self.root
    }

    /// Names the extension currently knows about, as far as this host can tell.
    pub fn known(&self) -> impl Iterator<Item = &str> {
        self.known.iter().map(String::as_str)
    }

    pub fn handle(&mut self, event: &WatchEvent) -> Result<()> {
        match event {
            WatchEvent::Notification(notification) => {
                let messages = self.translate(notification)?;
                self.emit_all(messages)
            }
            WatchEvent::Rescan => self.resync(),
        }
    }

    /// Scan the whole tree: `created` for every interesting file, then
    /// `deleted` for every reported name with no file behind it. With nothing
    /// reported yet this is the startup scan.
    pub fn resync(&mut self) -> Result<()> {
        let files = scanner::interesting_files(&self.root, self.root.path());
        let mut present = BTreeSet::new();
        let mut messages = Vec::with_capacity(files.len());
        for path in &files {
            present.insert(self.root.name(path)?);
            messages.extend(self.created(path)?);
        }
        let stale: Vec<Message> = self
            .known
            .difference(&present)
            .map(|name| Message::Deleted { name: name.clone() })
            .collect();

        info!(
            "scan: {} style sheet(s), {} stale name(s)",
            files.len(),
            stale.len()
        );
        messages.extend(stale);
        self.emit_all(messages)
    }

    /// Messages for one notification, in emission order.
    pub fn translate(&self, notification: &RawNotification) -> Result<Vec<Message>> {
        let root = &self.root;
        match notification {
            RawNotification::Created(path) => {
                if path.is_dir() {
                    return self.created_below(path);
                }
                if root.interesting(path) {
                    Ok(self.created(path)?.into_iter().collect())
                } else {
                    Ok(Vec::new())
                }
            }
            RawNotification::Deleted(path) => {
                let mut out = Vec::new();
                if root.interesting(path) {
                    out.push(Message::Deleted {
                        name: root.name(path)?,
                    });
                }
                out.extend(self.known_below(path)?);
                Ok(out)
            }
            RawNotification::Modified(path) => {
                if root.boring(path) || path.is_dir() {
                    return Ok(Vec::new());
                }
                Ok(self
                    .with_content(path, |name, content| Message::Modified { name, content })?
                    .into_iter()
                    .collect())
            }
            RawNotification::Moved { src, dest } => {
                if dest.is_dir() {
                    self.moved_dir(src, dest)
                } else {
                    Ok(self.moved(src, dest)?.into_iter().collect())
                }
            }
        }
    }

    fn moved(&self, src: &Path, dest: &Path) -> Result<Option<Message>> {
        let root = &self.root;
        match (root.interesting(src), root.interesting(dest)) {
            (true, true) => {
                let old_name = root.name(src)?;
                let new_name = root.name(dest)?;
                // Same logical name: identity unchanged, nothing to say.
                if old_name == new_name {
                    return Ok(None);
                }
                Ok(Some(Message::Renamed { old_name, new_name }))
            }
            (true, false) => Ok(Some(Message::Deleted {
                name: root.name(src)?,
            })),
            (false, true) => self.created(dest),
            (false, false) => Ok(None),
        }
    }

    /// A directory moved within the tree: apply the move table to every file
    /// below `dest` paired with its old location below `src`, then retract
    /// names under `src` that have no counterpart any more.
    fn moved_dir(&self, src: &Path, dest: &Path) -> Result<Vec<Message>> {
        let mut vanished: BTreeSet<String> = self
            .known_below(src)?
            .into_iter()
            .map(|m| m.name().to_string())
            .collect();

        let mut out = Vec::new();
        for file in scanner::interesting_files(&self.root, dest) {
            let Ok(relative) = file.strip_prefix(dest) else {
                continue;
            };
            let old = src.join(relative);
            if self.root.interesting(&old) {
                vanished.remove(&self.root.name(&old)?);
            }
            out.extend(self.moved(&old, &file)?);
        }
        out.extend(
            vanished
                .into_iter()
                .map(|name| Message::Deleted { name }),
        );
        Ok(out)
    }

    fn created_below(&self, dir: &Path) -> Result<Vec<Message>> {
        let mut out = Vec::new();
        for file in scanner::interesting_files(&self.root, dir) {
            out.extend(self.created(&file)?);
        }
        Ok(out)
    }

    /// `deleted` for every reported name below `path`, treating it as a directory.
    fn known_below(&self, path: &Path) -> Result<Vec<Message>> {
        if !path.starts_with(self.root.path()) {
            return Ok(Vec::new());
        }
        let relative = self.root.relative_name(path)?;
        let prefix = format!("{relative}/");
        Ok(self
            .known
            .iter()
            .filter(|name| relative.is_empty() || name.starts_with(&prefix))
            .map(|name| Message::Deleted { name: name.clone() })
            .collect())
    }

    fn created(&self, path: &Path) -> Result<Option<Message>> {
        self.with_content(path, |name, content| Message::Created { name, content })
    }

    /// Build a message carrying the file's current text. A file that cannot
    /// be read (typically gone again already) yields no message.
    fn with_content(
        &self,
        path: &Path,
        build: impl FnOnce(String, String) -> Message,
    ) -> Result<Option<Message>> {
        let name = self.root.name(path)?;
        match read_content(path) {
            Ok(content) => Ok(Some(build(name, content))),
            Err(err) if err.is_recoverable() => {
                warn!("skipping {name}: {err}");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn emit_all(&mut self, messages: Vec<Message>) -> Result<()> {
        for message in messages {
            match self.sink.send(&message) {
                Ok(()) => {
                    debug!("sent {} {}", message.kind(), message.name());
                    self.record(message);
                }
                Err(err) if err.is_recoverable() => {
                    warn!("dropped {} {}: {err}", message.kind(), message.name());
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    fn record(&mut self, message: Message) {
        match message {
            Message::Created { name, .. } | Message::Modified { name, .. } => {
                self.known.insert(name);
            }
            Message::Deleted { name } => {
                self.known.remove(&name);
            }
            Message::Renamed { old_name, new_name } => {
                self.known.remove(&old_name);
                self.known.insert(new_name);
            }
        }
    }
}

fn read_content(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| HostError::Content {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::read_frame;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::io::{self, Cursor};
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        translator: Translator<Vec<u8>>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().expect("tempdir");
            let root = WatchRoot::prepare(dir.path()).expect("root");
            Self {
                _dir: dir,
                translator: Translator::new(root, MessageSink::new(Vec::new())),
            }
        }

        fn path(&self, rel: &str) -> PathBuf {
            self.translator.root().path().join(rel)
        }

        fn write(&self, rel: &str, content: &str) -> PathBuf {
            let path = self.path(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(&path, content).unwrap();
            path
        }

        fn handle(&mut self, notification: RawNotification) {
            self.translator
                .handle(&WatchEvent::Notification(notification))
                .unwrap();
        }

        /// Decode and clear everything written so far.
        fn sent(&mut self) -> Vec<Message> {
            let bytes = std::mem::take(self.translator.sink.get_mut());
            let mut input = Cursor::new(bytes);
            let mut messages = Vec::new();
            while let Some(frame) = read_frame(&mut input).unwrap() {
                messages.push(serde_json::from_slice(&frame).unwrap());
            }
            messages
        }
    }

    fn created(name: &str, content: &str) -> Message {
        Message::Created {
            name: name.into(),
            content: content.into(),
        }
    }

    fn deleted(name: &str) -> Message {
        Message::Deleted { name: name.into() }
    }

    fn renamed(old: &str, new: &str) -> Message {
        Message::Renamed {
            old_name: old.into(),
            new_name: new.into(),
        }
    }

    #[test]
    fn test_created_and_modified() {
        let mut fx = Fixture::new();
        let a = fx.write("a.css", "a { color: red }");
        fx.handle(RawNotification::Created(a.clone()));
        fs::write(&a, "a { color: blue }").unwrap();
        fx.handle(RawNotification::Modified(a));

        assert_eq!(
            fx.sent(),
            vec![
                created("a", "a { color: red }"),
                Message::Modified {
                    name: "a".into(),
                    content: "a { color: blue }".into(),
                },
            ]
        );
    }

    #[test]
    fn test_boring_files_are_silent() {
        let mut fx = Fixture::new();
        let hidden = fx.write(".a.css", "x");
        let disabled = fx.write("a.css.disabled", "x");
        let git = fx.write(".git/a.css", "x");
        for path in [hidden, disabled, git] {
            fx.handle(RawNotification::Created(path.clone()));
            fx.handle(RawNotification::Modified(path.clone()));
            fx.handle(RawNotification::Deleted(path));
        }
        assert_eq!(fx.sent(), Vec::<Message>::new());
    }

    #[test]
    fn test_deleted() {
        let mut fx = Fixture::new();
        fx.handle(RawNotification::Deleted(fx.path("sub/a.css")));
        assert_eq!(fx.sent(), vec![deleted("sub/a")]);
    }

    #[test]
    fn test_move_to_boring_is_delete() {
        let mut fx = Fixture::new();
        let dest = fx.write("a.css.disabled", "a {}");
        fx.handle(RawNotification::Moved {
            src: fx.path("a.css"),
            dest,
        });
        assert_eq!(fx.sent(), vec![deleted("a")]);
    }

    #[test]
    fn test_move_from_boring_is_create() {
        let mut fx = Fixture::new();
        let dest = fx.write("a.css", "a {}");
        fx.handle(RawNotification::Moved {
            src: fx.path("a.css.disabled"),
            dest,
        });
        assert_eq!(fx.sent(), vec![created("a", "a {}")]);
    }

    #[test]
    fn test_rename_between_interesting_names() {
        let mut fx = Fixture::new();
        let dest = fx.write("b.css", "b {}");
        fx.handle(RawNotification::Moved {
            src: fx.path("a.css"),
            dest,
        });
        assert_eq!(fx.sent(), vec![renamed("a", "b")]);
    }

    #[test]
    fn test_move_with_same_name_is_silent() {
        let mut fx = Fixture::new();
        let same = fx.write("a.css", "a {}");
        fx.handle(RawNotification::Moved {
            src: same.clone(),
            dest: same,
        });
        assert_eq!(fx.sent(), Vec::<Message>::new());
    }

    #[test]
    fn test_move_between_boring_names_is_silent() {
        let mut fx = Fixture::new();
        let dest = fx.write(".b.css", "b {}");
        fx.handle(RawNotification::Moved {
            src: fx.path("a.txt"),
            dest,
        });
        assert_eq!(fx.sent(), Vec::<Message>::new());
    }

    #[test]
    fn test_file_gone_before_read_is_skipped() {
        let mut fx = Fixture::new();
        let ghost = fx.path("ghost.css");
        fx.handle(RawNotification::Created(ghost.clone()));
        fx.handle(RawNotification::Modified(ghost.clone()));
        fx.handle(RawNotification::Moved {
            src: fx.path("ghost.css.off"),
            dest: ghost.clone(),
        });
        assert_eq!(fx.sent(), Vec::<Message>::new());

        // Processing carries on afterwards.
        fx.handle(RawNotification::Deleted(ghost));
        assert_eq!(fx.sent(), vec![deleted("ghost")]);
    }

    #[test]
    fn test_startup_scan() {
        let mut fx = Fixture::new();
        fx.write("a.css", "a {}");
        fx.write(".tmp.css", "tmp");
        fx.write("notes.txt", "notes");
        fx.write(".git/leak.css", "leak");

        fx.translator.resync().unwrap();
        assert_eq!(fx.sent(), vec![created("a", "a {}")]);
    }

    #[test]
    fn test_resync_retracts_stale_names() {
        let mut fx = Fixture::new();
        let a = fx.write("a.css", "a {}");
        fx.write("b.css", "b {}");
        fx.translator.resync().unwrap();
        fx.sent();

        fs::remove_file(a).unwrap();
        fx.translator.handle(&WatchEvent::Rescan).unwrap();
        assert_eq!(fx.sent(), vec![created("b", "b {}"), deleted("a")]);
        assert_eq!(fx.translator.known().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn test_created_directory_reports_contents() {
        let mut fx = Fixture::new();
        fx.write("site/one.css", "1");
        fx.write("site/.swap.css", "x");
        fx.handle(RawNotification::Created(fx.path("site")));
        assert_eq!(fx.sent(), vec![created("site/one", "1")]);
    }

    #[test]
    fn test_directory_rename_renames_contents() {
        let mut fx = Fixture::new();
        fx.write("old/a.css", "a");
        fx.write("old/deep/b.css", "b");
        fx.translator.resync().unwrap();
        fx.sent();

        fs::rename(fx.path("old"), fx.path("new")).unwrap();
        fx.handle(RawNotification::Moved {
            src: fx.path("old"),
            dest: fx.path("new"),
        });

        let mut sent = fx.sent();
        sent.sort_by(|a, b| a.name().cmp(b.name()));
        assert_eq!(sent, vec![renamed("old/a", "new/a"), renamed("old/deep/b", "new/deep/b")]);
    }

    #[test]
    fn test_directory_moved_into_git_is_deleted() {
        let mut fx = Fixture::new();
        fx.write("site/a.css", "a");
        fx.translator.resync().unwrap();
        fx.sent();

        fs::create_dir_all(fx.path(".git")).unwrap();
        fs::rename(fx.path("site"), fx.path(".git/site")).unwrap();
        fx.handle(RawNotification::Moved {
            src: fx.path("site"),
            dest: fx.path(".git/site"),
        });
        assert_eq!(fx.sent(), vec![deleted("site/a")]);
    }

    #[test]
    fn test_directory_leaving_tree_retracts_contents() {
        let mut fx = Fixture::new();
        fx.write("site/a.css", "a");
        fx.write("site/b.css", "b");
        fx.write("other.css", "o");
        fx.translator.resync().unwrap();
        fx.sent();

        fx.handle(RawNotification::Deleted(fx.path("site")));
        assert_eq!(fx.sent(), vec![deleted("site/a"), deleted("site/b")]);
        assert_eq!(fx.translator.known().collect::<Vec<_>>(), vec!["other"]);
    }

    #[test]
    fn test_oversized_file_is_dropped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = WatchRoot::prepare(dir.path()).expect("root");
        fs::write(root.path().join("big.css"), "x".repeat(200)).unwrap();
        fs::write(root.path().join("small.css"), "s").unwrap();

        let sink = MessageSink::new(Vec::new()).with_frame_limit(100);
        let mut translator = Translator::new(root, sink);
        translator.resync().unwrap();

        assert_eq!(translator.known().collect::<Vec<_>>(), vec!["small"]);
    }

    #[test]
    fn test_broken_output_is_fatal() {
        struct ClosedPipe;
        impl Write for ClosedPipe {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::Error::from(io::ErrorKind::BrokenPipe))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let dir = tempfile::tempdir().expect("tempdir");
        let root = WatchRoot::prepare(dir.path()).expect("root");
        let path = root.path().join("a.css");
        let mut translator = Translator::new(root, MessageSink::new(ClosedPipe));
        let err = translator
            .handle(&WatchEvent::Notification(RawNotification::Deleted(path)))
            .unwrap_err();
        assert!(!err.is_recoverable());
    }
}
