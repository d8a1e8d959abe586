use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::diagnostics::FaultKind;

/// Handle to a folder in the world. Folders are unique per normalized
/// path, so handle equality is folder equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FolderId(usize);

/// Handle to a file (plain or audio) in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(usize);

/// Audio metadata and the opaque backing blob. Mutations to the blob are
/// observable only through re-reading metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioMeta {
    pub length_ms: i64,
    pub bitrate: i64,
    pub title: String,
    pub bytes: Vec<u8>,
}

impl AudioMeta {
    fn probed(filename: &str) -> Self {
        Self {
            length_ms: 0,
            bitrate: 0,
            title: file_stem(filename).to_string(),
            bytes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FileKind {
    Plain,
    Audio(AudioMeta),
}

#[derive(Debug)]
pub struct FileObject {
    pub filename: String,
    pub parent: Option<FolderId>,
    pub alive: bool,
    pub kind: FileKind,
}

#[derive(Debug)]
pub struct FolderObject {
    pub path: String,
    pub parent: Option<FolderId>,
    pub files: Vec<FileId>,
    pub subfolders: Vec<FolderId>,
    pub is_root: bool,
}

/// In-memory mirror of the folder/file/audio object graph.
///
/// The real filesystem is read once, when a `Folder(path)` construction
/// adopts an existing directory tree; every later mutation stays in the
/// mirror. Cross-references (a file's `parent`, a folder's `files`) are
/// kept consistent by funneling every reparenting through
/// `attach`/`detach`.
pub struct DomainWorld {
    folders: Vec<FolderObject>,
    files: Vec<FileObject>,
    folders_by_path: HashMap<String, FolderId>,
}

impl DomainWorld {
    pub fn new() -> Self {
        Self {
            folders: Vec::new(),
            files: Vec::new(),
            folders_by_path: HashMap::new(),
        }
    }

    // --- Folder lifecycle ---

    /// Returns the existing folder for `path`, or creates one. A newly
    /// created folder adopts the real directory tree underneath it, up to
    /// `max_depth` levels; deeper levels are silently omitted.
    pub fn open_folder(&mut self, path: &str, max_depth: usize) -> FolderId {
        let normalized = normalize_path(path);
        if let Some(&id) = self.folders_by_path.get(&normalized) {
            return id;
        }
        let id = self.insert_folder(normalized.clone(), None, true);
        if Path::new(&normalized).is_dir() {
            self.adopt_tree(id, &normalized, 0, max_depth);
        }
        id
    }

    fn insert_folder(&mut self, path: String, parent: Option<FolderId>, is_root: bool) -> FolderId {
        let id = FolderId(self.folders.len());
        self.folders.push(FolderObject {
            path: path.clone(),
            parent,
            files: Vec::new(),
            subfolders: Vec::new(),
            is_root,
        });
        self.folders_by_path.insert(path, id);
        id
    }

    fn adopt_tree(&mut self, folder: FolderId, path: &str, depth: usize, max_depth: usize) {
        let Ok(entries) = fs::read_dir(path) else {
            return;
        };
        let mut names: Vec<(String, bool)> = entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                let is_dir = entry.file_type().ok()?.is_dir();
                Some((name, is_dir))
            })
            .collect();
        names.sort();

        for (name, is_dir) in names {
            let child_path = join_path(path, &name);
            if is_dir {
                if depth + 1 >= max_depth {
                    continue;
                }
                if self.folders_by_path.contains_key(&child_path) {
                    continue;
                }
                let child = self.insert_folder(child_path.clone(), Some(folder), false);
                self.folders[folder.0].subfolders.push(child);
                self.adopt_tree(child, &child_path, depth + 1, max_depth);
            } else {
                let file = FileId(self.files.len());
                self.files.push(FileObject {
                    filename: name,
                    parent: Some(folder),
                    alive: true,
                    kind: FileKind::Plain,
                });
                self.folders[folder.0].files.push(file);
            }
        }
    }

    pub fn folder(&self, id: FolderId) -> &FolderObject {
        &self.folders[id.0]
    }

    pub fn folder_name(&self, id: FolderId) -> String {
        let path = &self.folders[id.0].path;
        path.rsplit('/')
            .find(|part| !part.is_empty())
            .unwrap_or(path.as_str())
            .to_string()
    }

    pub fn subfolder_by_name(&self, id: FolderId, name: &str) -> Option<FolderId> {
        self.folders[id.0]
            .subfolders
            .iter()
            .copied()
            .find(|&child| self.folder_name(child) == name)
    }

    // --- File lifecycle ---

    /// Creates a detached plain file.
    pub fn create_file(&mut self, name: &str) -> FileId {
        self.insert_file(name, FileKind::Plain)
    }

    /// Creates a detached audio file with probe-filled metadata.
    pub fn create_audio(&mut self, name: &str) -> FileId {
        self.insert_file(name, FileKind::Audio(AudioMeta::probed(name)))
    }

    fn insert_file(&mut self, name: &str, kind: FileKind) -> FileId {
        let id = FileId(self.files.len());
        self.files.push(FileObject {
            filename: name.to_string(),
            parent: None,
            alive: true,
            kind,
        });
        id
    }

    pub fn file(&self, id: FileId) -> &FileObject {
        &self.files[id.0]
    }

    fn ensure_alive(&self, id: FileId) -> Result<(), FaultKind> {
        if self.files[id.0].alive {
            Ok(())
        } else {
            Err(FaultKind::FileNotFound)
        }
    }

    pub fn filename(&self, id: FileId) -> Result<String, FaultKind> {
        self.ensure_alive(id)?;
        Ok(self.files[id.0].filename.clone())
    }

    pub fn file_parent(&self, id: FileId) -> Result<Option<FolderId>, FaultKind> {
        self.ensure_alive(id)?;
        Ok(self.files[id.0].parent)
    }

    /// Full path of a file: its parent's path plus the basename, or just
    /// the basename while detached.
    pub fn file_path(&self, id: FileId) -> String {
        let file = &self.files[id.0];
        match file.parent {
            Some(parent) => join_path(&self.folders[parent.0].path, &file.filename),
            None => file.filename.clone(),
        }
    }

    fn detach(&mut self, id: FileId) {
        if let Some(parent) = self.files[id.0].parent.take() {
            self.folders[parent.0].files.retain(|&file| file != id);
        }
    }

    fn attach(&mut self, id: FileId, folder: FolderId) {
        self.detach(id);
        self.files[id.0].parent = Some(folder);
        self.folders[folder.0].files.push(id);
    }

    /// Reparents a file; the old parent no longer lists it, the new one
    /// does.
    pub fn move_file(&mut self, id: FileId, folder: FolderId) -> Result<(), FaultKind> {
        self.ensure_alive(id)?;
        self.attach(id, folder);
        Ok(())
    }

    /// Marks the file non-live and detaches it. Every later operation on
    /// the handle reports `File not found`.
    pub fn delete_file(&mut self, id: FileId) -> Result<(), FaultKind> {
        self.ensure_alive(id)?;
        self.detach(id);
        self.files[id.0].alive = false;
        Ok(())
    }

    pub fn change_filename(&mut self, id: FileId, name: &str) -> Result<(), FaultKind> {
        self.ensure_alive(id)?;
        self.files[id.0].filename = name.to_string();
        Ok(())
    }

    pub fn folder_files(&self, id: FolderId) -> Vec<FileId> {
        self.folders[id.0].files.clone()
    }

    pub fn folder_subfolders(&self, id: FolderId) -> Vec<FolderId> {
        self.folders[id.0].subfolders.clone()
    }

    pub fn file_by_name(&self, folder: FolderId, name: &str) -> Option<FileId> {
        self.folders[folder.0]
            .files
            .iter()
            .copied()
            .find(|&file| self.files[file.0].filename == name)
    }

    /// Adopts a (possibly foreign or detached) file into `folder`.
    pub fn add_file(&mut self, folder: FolderId, file: FileId) -> Result<(), FaultKind> {
        self.move_file(file, folder)
    }

    /// Detaches the named child; the file stays live but parentless.
    pub fn remove_file(&mut self, folder: FolderId, name: &str) -> Result<(), FaultKind> {
        let file = self
            .file_by_name(folder, name)
            .ok_or(FaultKind::FileNotFound)?;
        self.detach(file);
        Ok(())
    }

    pub fn list_audio(&self, folder: FolderId) -> Vec<FileId> {
        self.folders[folder.0]
            .files
            .iter()
            .copied()
            .filter(|&file| matches!(self.files[file.0].kind, FileKind::Audio(_)))
            .collect()
    }

    // --- Equality ---

    /// Files are equal when both their path and their parent match.
    pub fn files_equal(&self, left: FileId, right: FileId) -> bool {
        self.file_path(left) == self.file_path(right)
            && self.files[left.0].parent == self.files[right.0].parent
    }

    // --- Audio ---

    /// Probes a file as audio by extension. Success tags the entity as
    /// audio (keeping existing metadata); failure leaves it untouched.
    pub fn probe_audio(&mut self, id: FileId) -> Result<bool, FaultKind> {
        self.ensure_alive(id)?;
        let file = &mut self.files[id.0];
        if matches!(file.kind, FileKind::Audio(_)) {
            return Ok(true);
        }
        if !has_audio_extension(&file.filename) {
            return Ok(false);
        }
        file.kind = FileKind::Audio(AudioMeta::probed(&file.filename));
        Ok(true)
    }

    /// Strips the audio tag; the metadata is lost.
    pub fn strip_audio(&mut self, id: FileId) -> Result<(), FaultKind> {
        self.ensure_alive(id)?;
        self.files[id.0].kind = FileKind::Plain;
        Ok(())
    }

    /// Metadata of an audio handle. A handle whose entity lost its tag
    /// (through `atof`) is re-probed with default metadata.
    pub fn audio_meta(&mut self, id: FileId) -> Result<&AudioMeta, FaultKind> {
        Ok(self.audio_meta_mut(id)?)
    }

    fn audio_meta_mut(&mut self, id: FileId) -> Result<&mut AudioMeta, FaultKind> {
        self.ensure_alive(id)?;
        let file = &mut self.files[id.0];
        if matches!(file.kind, FileKind::Plain) {
            file.kind = FileKind::Audio(AudioMeta::probed(&file.filename));
        }
        match &mut file.kind {
            FileKind::Audio(meta) => Ok(meta),
            FileKind::Plain => unreachable!("tag was just set"),
        }
    }

    /// Keeps `[start, end]` of the clip: requires
    /// `0 <= start <= end <= length`.
    pub fn cut_audio(&mut self, id: FileId, start: i64, end: i64) -> Result<(), FaultKind> {
        let meta = self.audio_meta_mut(id)?;
        if start < 0 || start > end || end > meta.length_ms {
            return Err(FaultKind::InvalidValue);
        }
        meta.length_ms = end - start;
        Ok(())
    }

    /// Appends `other` to `id`; `other` is unchanged.
    pub fn concat_audio(&mut self, id: FileId, other: FileId) -> Result<(), FaultKind> {
        let other_meta = self.audio_meta_mut(other)?.clone();
        let meta = self.audio_meta_mut(id)?;
        meta.length_ms += other_meta.length_ms;
        meta.bytes.extend_from_slice(&other_meta.bytes);
        Ok(())
    }

    pub fn change_title(&mut self, id: FileId, title: &str) -> Result<(), FaultKind> {
        self.audio_meta_mut(id)?.title = title.to_string();
        Ok(())
    }

    /// Rewrites the filename extension and re-encodes the blob (opaque).
    pub fn change_format(&mut self, id: FileId, format: &str) -> Result<(), FaultKind> {
        self.audio_meta_mut(id)?;
        let file = &mut self.files[id.0];
        let stem = file_stem(&file.filename).to_string();
        file.filename = format!("{stem}.{}", format.trim_start_matches('.'));
        Ok(())
    }

    /// Seeds a clip length directly. Real decoding is out of scope, so
    /// embedders (and tests) use this to give probed audio a duration.
    pub fn set_audio_length(&mut self, id: FileId, length_ms: i64) -> Result<(), FaultKind> {
        self.audio_meta_mut(id)?.length_ms = length_ms;
        Ok(())
    }

    /// Rescales the blob (opaque); metadata is unchanged.
    pub fn change_volume(&mut self, id: FileId, factor: f64) -> Result<(), FaultKind> {
        let meta = self.audio_meta_mut(id)?;
        for byte in &mut meta.bytes {
            *byte = ((f64::from(*byte) * factor).clamp(0.0, 255.0)) as u8;
        }
        Ok(())
    }
}

impl Default for DomainWorld {
    fn default() -> Self {
        Self::new()
    }
}

fn has_audio_extension(filename: &str) -> bool {
    let extension = filename.rsplit('.').next().unwrap_or("");
    matches!(
        extension.to_ascii_lowercase().as_str(),
        "mp3" | "wav" | "flac" | "ogg"
    )
}

fn file_stem(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(0) | None => filename,
        Some(index) => &filename[..index],
    }
}

fn join_path(base: &str, name: &str) -> String {
    if base.ends_with('/') {
        format!("{base}{name}")
    } else {
        format!("{base}/{name}")
    }
}

/// Lexical path normalization: collapses separators and resolves `.` and
/// `..` segments without touching the filesystem.
pub fn normalize_path(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    if absolute {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_paths_lexically() {
        assert_eq!(normalize_path("/a//b/./c"), "/a/b/c");
        assert_eq!(normalize_path("/a/b/../c"), "/a/c");
        assert_eq!(normalize_path("a/./b"), "a/b");
        assert_eq!(normalize_path("/.."), "/");
        assert_eq!(normalize_path("x/.."), ".");
    }

    #[test]
    fn open_folder_is_idempotent_per_path() {
        let mut world = DomainWorld::new();
        let first = world.open_folder("/music", 16);
        let second = world.open_folder("/music/", 16);
        assert_eq!(first, second);
        assert!(world.folder(first).is_root);
    }

    #[test]
    fn move_reparents_and_keeps_references_consistent() {
        let mut world = DomainWorld::new();
        let src = world.open_folder("/src", 16);
        let dst = world.open_folder("/dst", 16);
        let file = world.create_file("a.txt");

        world.move_file(file, src).expect("move failed");
        assert_eq!(world.folder_files(src), vec![file]);

        world.move_file(file, dst).expect("move failed");
        assert!(world.folder_files(src).is_empty());
        assert_eq!(world.folder_files(dst), vec![file]);
        assert_eq!(world.file_parent(file).expect("parent"), Some(dst));
        assert_eq!(world.file_path(file), "/dst/a.txt");
    }

    #[test]
    fn deleted_file_reports_file_not_found() {
        let mut world = DomainWorld::new();
        let folder = world.open_folder("/d", 16);
        let file = world.create_file("a.txt");
        world.move_file(file, folder).expect("move failed");

        world.delete_file(file).expect("delete failed");
        assert!(world.folder_files(folder).is_empty());
        assert_eq!(world.filename(file), Err(FaultKind::FileNotFound));
        assert_eq!(world.delete_file(file), Err(FaultKind::FileNotFound));
    }

    #[test]
    fn file_equality_is_path_and_parent() {
        let mut world = DomainWorld::new();
        let folder = world.open_folder("/d", 16);
        let a = world.create_file("same.txt");
        let b = world.create_file("same.txt");
        // Both detached with the same name: equal.
        assert!(world.files_equal(a, b));
        world.move_file(a, folder).expect("move failed");
        assert!(!world.files_equal(a, b));
    }

    #[test]
    fn probe_by_extension_and_strip() {
        let mut world = DomainWorld::new();
        let song = world.create_file("tune.mp3");
        let note = world.create_file("notes.txt");

        assert_eq!(world.probe_audio(song), Ok(true));
        assert_eq!(world.probe_audio(note), Ok(false));

        world.change_title(song, "Tune").expect("title failed");
        world.strip_audio(song).expect("strip failed");
        // Metadata was dropped; the next read re-probes defaults.
        let meta = world.audio_meta(song).expect("meta failed");
        assert_eq!(meta.title, "tune");
    }

    #[test]
    fn cut_checks_bounds_and_updates_length() {
        let mut world = DomainWorld::new();
        let song = world.create_audio("a.mp3");
        world.set_audio_length(song, 10).expect("length failed");

        assert_eq!(world.cut_audio(song, -1, 0), Err(FaultKind::InvalidValue));
        assert_eq!(world.cut_audio(song, 5, 1), Err(FaultKind::InvalidValue));
        assert_eq!(world.cut_audio(song, 0, 11), Err(FaultKind::InvalidValue));

        world.cut_audio(song, 2, 8).expect("cut failed");
        assert_eq!(world.audio_meta(song).expect("meta").length_ms, 6);
    }

    #[test]
    fn concat_extends_length_and_leaves_other_alone() {
        let mut world = DomainWorld::new();
        let a = world.create_audio("a.wav");
        let b = world.create_audio("b.wav");
        world.set_audio_length(a, 3).expect("length failed");
        world.set_audio_length(b, 4).expect("length failed");

        world.concat_audio(a, b).expect("concat failed");
        assert_eq!(world.audio_meta(a).expect("meta").length_ms, 7);
        assert_eq!(world.audio_meta(b).expect("meta").length_ms, 4);
    }

    #[test]
    fn change_format_rewrites_extension() {
        let mut world = DomainWorld::new();
        let song = world.create_audio("tune.mp3");
        world.change_format(song, "wav").expect("format failed");
        assert_eq!(world.filename(song).expect("filename"), "tune.wav");
    }

    #[test]
    fn remove_file_detaches_but_keeps_alive() {
        let mut world = DomainWorld::new();
        let folder = world.open_folder("/d", 16);
        let file = world.create_file("a.txt");
        world.move_file(file, folder).expect("move failed");

        world.remove_file(folder, "a.txt").expect("remove failed");
        assert!(world.folder_files(folder).is_empty());
        assert_eq!(world.file_parent(file).expect("parent"), None);
        assert_eq!(
            world.remove_file(folder, "a.txt"),
            Err(FaultKind::FileNotFound)
        );
    }

    #[test]
    fn adopts_directory_tree_up_to_depth_limit() {
        let temp = tempfile::tempdir().expect("tempdir failed");
        let root = temp.path();
        fs::create_dir_all(root.join("inner/deeper")).expect("mkdir failed");
        fs::write(root.join("top.txt"), b"x").expect("write failed");
        fs::write(root.join("inner/song.mp3"), b"x").expect("write failed");

        let mut world = DomainWorld::new();
        let folder = world.open_folder(root.to_str().expect("utf-8 path"), 2);

        assert!(world.folder(folder).is_root);
        assert_eq!(world.folder_files(folder).len(), 1);
        let subfolders = world.folder_subfolders(folder);
        assert_eq!(subfolders.len(), 1);
        let inner = subfolders[0];
        assert_eq!(world.folder_name(inner), "inner");
        assert!(!world.folder(inner).is_root);
        assert_eq!(world.folder_files(inner).len(), 1);
        // Depth 2 cuts off "deeper".
        assert!(world.folder_subfolders(inner).is_empty());
    }

    #[test]
    fn get_file_and_subfolder_by_name() {
        let mut world = DomainWorld::new();
        let folder = world.open_folder("/d", 16);
        let file = world.create_file("a.txt");
        world.move_file(file, folder).expect("move failed");

        assert_eq!(world.file_by_name(folder, "a.txt"), Some(file));
        assert_eq!(world.file_by_name(folder, "b.txt"), None);
        assert_eq!(world.subfolder_by_name(folder, "x"), None);
    }
}
