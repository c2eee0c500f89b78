//! Top-level MIME database resolver
//!
//! [`MimeDb`] owns every loaded table and merges results across an XDG-style
//! search path of data directories. Per directory, a valid `mime.cache`
//! supersedes all of that directory's text files; directories without one
//! contribute parsed text tables instead. Caches are queried preferentially,
//! the text tables serve the remaining directories.
//!
//! The database is lazily loaded and lazily invalidated: every public entry
//! point calls `ensure_initialized`, which re-stats the tracked source files
//! at most once per five seconds and rebuilds everything from scratch when
//! any of them changed. There is no internal locking; callers that share a
//! `MimeDb` across threads wrap it in a `Mutex`.

use crate::alias::AliasTable;
use crate::cache::Cache;
use crate::globs::GlobMap;
use crate::icon::IconTable;
use crate::magic::MagicSet;
use crate::parent::ParentTable;
use crate::text::{base_name, binary_or_text_fallback, TEXT_SCAN_WINDOW};
use crate::{EMPTY_TYPE, TEXT_PLAIN, UNKNOWN_TYPE};
use log::{debug, trace};
use std::env;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

/// Minimum interval between directory re-stat sweeps.
const STAT_INTERVAL: Duration = Duration::from_secs(5);

/// Candidate-list size for the filename pass of [`MimeDb::mime_type_for_file`].
const GLOB_CANDIDATE_LIMIT: usize = 10;

/// Source files tracked per `<dir>/mime/` directory, in load order.
const TRACKED_FILES: &[&str] = &[
    "mime.cache",
    "globs2",
    "globs",
    "magic",
    "aliases",
    "subclasses",
    "icons",
    "generic-icons",
];

type ReloadCallback = Box<dyn FnMut()>;

/// MIME database resolved over a search path of data directories.
///
/// Construct with [`MimeDb::new`] to honor `$XDG_DATA_HOME` and
/// `$XDG_DATA_DIRS`, or [`MimeDb::new_with_dirs`] for an explicit path list
/// (tests use the latter). All lookups take `&mut self` because any of them
/// may trigger a reload.
pub struct MimeDb {
    /// `<data_dir>/mime` directories, highest precedence first.
    dirs: Vec<PathBuf>,
    caches: Vec<Cache>,
    aliases: AliasTable,
    parents: ParentTable,
    icons: IconTable,
    generic_icons: IconTable,
    globs: GlobMap,
    magic: MagicSet,
    /// Snapshot of every tracked file's mtime at load time. Missing files
    /// are recorded as `None` so both appearance and removal are detected.
    file_times: Vec<(PathBuf, Option<SystemTime>)>,
    need_reread: bool,
    last_stat_time: Option<Instant>,
    callbacks: Vec<(u64, ReloadCallback)>,
    next_callback_id: u64,
}

impl MimeDb {
    /// Create a database over the standard XDG search path:
    /// `$XDG_DATA_HOME` (or `$HOME/.local/share`) followed by each entry of
    /// `$XDG_DATA_DIRS` (default `/usr/local/share/:/usr/share/`).
    ///
    /// No files are read until the first lookup.
    pub fn new() -> Self {
        let mut data_dirs = Vec::new();
        match env::var_os("XDG_DATA_HOME") {
            Some(home) if !home.is_empty() => data_dirs.push(PathBuf::from(home)),
            _ => {
                if let Some(home) = env::var_os("HOME") {
                    data_dirs.push(PathBuf::from(home).join(".local/share"));
                }
            }
        }
        let dirs_var = env::var("XDG_DATA_DIRS").unwrap_or_default();
        let dirs_var = if dirs_var.is_empty() {
            "/usr/local/share/:/usr/share/".to_string()
        } else {
            dirs_var
        };
        for dir in dirs_var.split(':').filter(|d| !d.is_empty()) {
            data_dirs.push(PathBuf::from(dir));
        }
        Self::new_with_dirs(data_dirs)
    }

    /// Create a database over an explicit list of data directories
    /// (`mime/` is appended to each), highest precedence first.
    pub fn new_with_dirs<I>(data_dirs: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<PathBuf>,
    {
        Self {
            dirs: data_dirs
                .into_iter()
                .map(|d| d.into().join("mime"))
                .collect(),
            caches: Vec::new(),
            aliases: AliasTable::new(),
            parents: ParentTable::new(),
            icons: IconTable::new(),
            generic_icons: IconTable::new(),
            globs: GlobMap::new(),
            magic: MagicSet::new(),
            file_times: Vec::new(),
            need_reread: true,
            last_stat_time: None,
            callbacks: Vec::new(),
            next_callback_id: 0,
        }
    }

    // ----- lifecycle -----

    fn ensure_initialized(&mut self) {
        let now = Instant::now();
        let stat_due = match self.last_stat_time {
            Some(last) => now.duration_since(last) >= STAT_INTERVAL,
            None => true,
        };
        if stat_due {
            self.last_stat_time = Some(now);
            if !self.need_reread && self.snapshot_file_times() != self.file_times {
                debug!("mime source files changed, discarding tables");
                self.shutdown();
            }
        }
        if self.need_reread {
            self.reload();
        }
    }

    fn snapshot_file_times(&self) -> Vec<(PathBuf, Option<SystemTime>)> {
        let mut times = Vec::with_capacity(self.dirs.len() * TRACKED_FILES.len());
        for dir in &self.dirs {
            for name in TRACKED_FILES {
                let path = dir.join(name);
                let mtime = fs::metadata(&path).ok().and_then(|m| m.modified().ok());
                times.push((path, mtime));
            }
        }
        times
    }

    fn reload(&mut self) {
        self.caches.clear();
        self.aliases = AliasTable::new();
        self.parents = ParentTable::new();
        self.icons = IconTable::new();
        self.generic_icons = IconTable::new();
        self.globs = GlobMap::new();
        self.magic = MagicSet::new();

        for dir in self.dirs.clone() {
            match Cache::open(&dir.join("mime.cache")) {
                Ok(cache) => {
                    trace!("using cache {:?}", cache.path());
                    self.caches.push(cache);
                    continue;
                }
                Err(err) => {
                    trace!("no cache in {}: {err}", dir.display());
                }
            }
            let globs2 = dir.join("globs2");
            if globs2.is_file() {
                self.globs.load_globs2(&globs2);
            } else {
                self.globs.load_globs(&dir.join("globs"));
            }
            self.magic.load_from(&dir.join("magic"));
            self.aliases.load_from(&dir.join("aliases"));
            self.parents.load_from(&dir.join("subclasses"));
            self.icons.load_from(&dir.join("icons"));
            self.generic_icons.load_from(&dir.join("generic-icons"));
        }
        self.aliases.finish();
        self.parents.finish();
        self.icons.finish();
        self.generic_icons.finish();

        self.file_times = self.snapshot_file_times();
        self.need_reread = false;
        debug!(
            "loaded {} caches, {} globs, {} magic rules across {} dirs",
            self.caches.len(),
            self.globs.len(),
            self.magic.len(),
            self.dirs.len()
        );
    }

    /// Tear down every table and invoke the registered reload callbacks,
    /// most recently registered first. The next lookup rebuilds from disk.
    pub fn shutdown(&mut self) {
        self.caches.clear();
        self.aliases = AliasTable::new();
        self.parents = ParentTable::new();
        self.icons = IconTable::new();
        self.generic_icons = IconTable::new();
        self.globs = GlobMap::new();
        self.magic = MagicSet::new();
        self.file_times.clear();
        self.need_reread = true;
        let mut callbacks = std::mem::take(&mut self.callbacks);
        for (_, callback) in callbacks.iter_mut().rev() {
            callback();
        }
        self.callbacks = callbacks;
    }

    /// Register a closure invoked whenever the loaded tables are torn down
    /// (explicit [`shutdown`](Self::shutdown) or a detected file change).
    /// Returns an id for [`remove_callback`](Self::remove_callback).
    pub fn register_reload_callback<F>(&mut self, callback: F) -> u64
    where
        F: FnMut() + 'static,
    {
        let id = self.next_callback_id;
        self.next_callback_id += 1;
        self.callbacks.push((id, Box::new(callback)));
        id
    }

    /// Unregister a reload callback. Returns false for an unknown id.
    pub fn remove_callback(&mut self, id: u64) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(cb_id, _)| *cb_id != id);
        self.callbacks.len() != before
    }

    // ----- name lookups -----

    /// Ranked MIME candidates for a bare file name, best first.
    pub fn mime_types_from_file_name(&mut self, name: &str, max_count: usize) -> Vec<String> {
        self.ensure_initialized();
        self.glob_candidates(name, max_count)
            .into_iter()
            .map(|mw| mw.mime)
            .collect()
    }

    /// Best MIME type for a bare file name; no file I/O is performed.
    /// Falls back to `application/octet-stream` when no glob matches.
    pub fn mime_type_from_file_name(&mut self, name: &str) -> String {
        self.ensure_initialized();
        self.glob_candidates(name, 1)
            .into_iter()
            .next()
            .map(|mw| mw.mime)
            .unwrap_or_else(|| UNKNOWN_TYPE.to_string())
    }

    /// Glob results drawn from the first cache producing any, else the
    /// text tables. Magic merging deliberately differs (all sources).
    /// Accepts a path-like string; only the base name is matched.
    fn glob_candidates(&self, name: &str, max_count: usize) -> Vec<crate::globs::MimeWeight> {
        let name = base_name(name);
        for cache in &self.caches {
            let results = cache.glob_lookup_file_name(name, max_count);
            if !results.is_empty() {
                return results;
            }
        }
        self.globs.lookup_file_name(name, max_count)
    }

    // ----- content lookups -----

    /// Sniff a MIME type from raw bytes. Returns the matched type with its
    /// rule priority, or the binary-or-text heuristic answer at priority 0.
    pub fn mime_type_for_data(&mut self, data: &[u8]) -> (String, u32) {
        self.ensure_initialized();
        let mut no_filter = Vec::new();
        match self.sniff(data, &mut no_filter) {
            Some((mime, priority)) => (mime, priority),
            None => (binary_or_text_fallback(data).to_string(), 0),
        }
    }

    /// Highest-priority magic match across every cache and the text rules.
    /// Non-matching rules veto their type out of `filter` in every source.
    fn sniff(&self, data: &[u8], filter: &mut Vec<String>) -> Option<(String, u32)> {
        let mut best: Option<(String, u32)> = None;
        for cache in &self.caches {
            if let Some((mime, priority)) = cache.magic_lookup_data(data, Some(&mut *filter)) {
                if best.as_ref().map_or(true, |(_, p)| priority > *p) {
                    best = Some((mime, priority));
                }
            }
        }
        if let Some((mime, priority)) = self.magic.lookup_data(data, Some(&mut *filter)) {
            if best.as_ref().map_or(true, |(_, p)| priority > *p) {
                best = Some((mime, priority));
            }
        }
        best
    }

    /// Resolve the MIME type of an on-disk file, fusing the filename glob
    /// pass with content sniffing:
    ///
    /// 1. a single glob candidate wins outright, no file access
    /// 2. otherwise the file is read (up to [`max_buffer_extents`](Self::max_buffer_extents)
    ///    bytes) and sniffed, with glob candidates acting as a veto filter
    /// 3. a surviving glob candidate that is a subclass of the sniffed type
    ///    beats it; else the sniffed type wins; else the first survivor
    /// 4. with nothing left, the binary-or-text heuristic decides
    ///
    /// A missing or non-regular file yields `application/octet-stream`,
    /// an empty regular file the `application/x-zerosize` sentinel.
    /// Returns `None` only when the file name is not valid UTF-8. A
    /// metadata handle already held by the caller can be passed to skip the
    /// extra `stat`.
    pub fn mime_type_for_file(
        &mut self,
        path: &Path,
        metadata: Option<&fs::Metadata>,
    ) -> Option<String> {
        self.ensure_initialized();
        let name = path.file_name()?.to_str()?;

        let candidates = self.glob_candidates(name, GLOB_CANDIDATE_LIMIT);
        if candidates.len() == 1 {
            return Some(candidates.into_iter().next().unwrap().mime);
        }

        let owned_meta;
        let meta = match metadata {
            Some(m) => m,
            None => match fs::metadata(path) {
                Ok(m) => {
                    owned_meta = m;
                    &owned_meta
                }
                Err(_) => return Some(UNKNOWN_TYPE.to_string()),
            },
        };
        if !meta.is_file() {
            return Some(UNKNOWN_TYPE.to_string());
        }
        if meta.len() == 0 {
            return Some(EMPTY_TYPE.to_string());
        }

        let extent = self.buffer_extent().max(TEXT_SCAN_WINDOW);
        let data = match read_prefix(path, extent) {
            Ok(data) => data,
            Err(_) => return Some(UNKNOWN_TYPE.to_string()),
        };

        let mut survivors: Vec<String> = candidates.iter().map(|mw| mw.mime.clone()).collect();
        if let Some((sniffed, _)) = self.sniff(&data, &mut survivors) {
            // A more specific surviving glob candidate beats a generic
            // content match
            for candidate in &survivors {
                if self.is_subclass(candidate, &sniffed, &mut Vec::new()) {
                    return Some(candidate.clone());
                }
            }
            return Some(sniffed);
        }
        if let Some(first) = survivors.into_iter().next() {
            return Some(first);
        }
        Some(binary_or_text_fallback(&data).to_string())
    }

    /// Largest byte count content sniffing will ever read, across every
    /// loaded magic source.
    pub fn max_buffer_extents(&mut self) -> usize {
        self.ensure_initialized();
        self.buffer_extent()
    }

    fn buffer_extent(&self) -> usize {
        self.caches
            .iter()
            .map(|c| c.max_extent())
            .chain(std::iter::once(self.magic.max_extent()))
            .max()
            .unwrap_or(0)
    }

    // ----- alias / hierarchy lookups -----

    /// Canonical form of `mime`; the input comes back unchanged when no
    /// alias maps it.
    pub fn unalias(&mut self, mime: &str) -> String {
        self.ensure_initialized();
        self.unalias_owned(mime)
    }

    fn unalias_owned(&self, mime: &str) -> String {
        for cache in &self.caches {
            if let Some(canonical) = cache.alias_lookup(mime) {
                return canonical;
            }
        }
        self.aliases.unalias(mime).to_string()
    }

    /// Two MIME strings name the same type after unaliasing.
    pub fn mime_type_equal(&mut self, a: &str, b: &str) -> bool {
        self.ensure_initialized();
        self.unalias_owned(a) == self.unalias_owned(b)
    }

    /// Two MIME strings share a media part (text before the `/`).
    /// No unaliasing is applied.
    pub fn media_type_equal(&self, a: &str, b: &str) -> bool {
        match (a.split('/').next(), b.split('/').next()) {
            (Some(ma), Some(mb)) => ma == mb,
            _ => false,
        }
    }

    /// Whether `mime` is `base` or inherits from it, directly or through
    /// the subclass hierarchy. Supertype bases (`media/*`) match on the
    /// media part, every `text/*` type is a subclass of `text/plain`, and
    /// every type is a subclass of `application/octet-stream`.
    pub fn mime_type_subclass(&mut self, mime: &str, base: &str) -> bool {
        self.ensure_initialized();
        self.is_subclass(mime, base, &mut Vec::new())
    }

    fn is_subclass(&self, mime: &str, base: &str, visited: &mut Vec<String>) -> bool {
        let umime = self.unalias_owned(mime);
        let ubase = self.unalias_owned(base);

        if umime == ubase {
            return true;
        }
        if let Some(media) = ubase.strip_suffix("/*") {
            if umime.split('/').next() == Some(media) {
                return true;
            }
        }
        if ubase == TEXT_PLAIN && umime.starts_with("text/") {
            return true;
        }
        if ubase == UNKNOWN_TYPE {
            return true;
        }
        // Cyclic subclass data resolves to "no" instead of recursing forever
        for parent in self.direct_parents(&umime) {
            if visited.iter().any(|seen| *seen == parent) {
                continue;
            }
            visited.push(parent.clone());
            if self.is_subclass(&parent, &ubase, visited) {
                return true;
            }
        }
        false
    }

    fn direct_parents(&self, mime: &str) -> Vec<String> {
        let mut parents = Vec::new();
        for cache in &self.caches {
            for parent in cache.parent_lookup(mime) {
                if !parents.contains(&parent) {
                    parents.push(parent);
                }
            }
        }
        for parent in self.parents.direct_parents(mime) {
            if !parents.contains(parent) {
                parents.push(parent.clone());
            }
        }
        parents
    }

    /// Direct parents of `mime` (after unaliasing), deduplicated, in
    /// source order across all directories.
    pub fn parents(&mut self, mime: &str) -> Vec<String> {
        self.ensure_initialized();
        let canonical = self.unalias_owned(mime);
        self.direct_parents(&canonical)
    }

    /// Deprecated name for [`parents`](Self::parents).
    #[deprecated(note = "use `parents`")]
    pub fn mime_parents(&mut self, mime: &str) -> Vec<String> {
        self.parents(mime)
    }

    // ----- icons -----

    /// Icon name registered for `mime`, if any.
    pub fn icon(&mut self, mime: &str) -> Option<String> {
        self.ensure_initialized();
        for cache in &self.caches {
            if let Some(icon) = cache.icon_lookup(mime) {
                return Some(icon);
            }
        }
        self.icons.lookup(mime).map(str::to_string)
    }

    /// Generic (category) icon name registered for `mime`, if any.
    pub fn generic_icon(&mut self, mime: &str) -> Option<String> {
        self.ensure_initialized();
        for cache in &self.caches {
            if let Some(icon) = cache.generic_icon_lookup(mime) {
                return Some(icon);
            }
        }
        self.generic_icons.lookup(mime).map(str::to_string)
    }

    // ----- debug dump -----

    /// Write a textual dump of every loaded table, for debugging.
    pub fn dump_to<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        self.ensure_initialized();
        for cache in &self.caches {
            let (aliases, parents, literals, globs, magic, icons, generic) = cache.stats();
            writeln!(
                out,
                "cache {:?} v1.{}: {} aliases, {} parents, {} literals, {} globs, \
                 {} magic, {} icons, {} generic icons",
                cache.path(),
                cache.minor_version(),
                aliases,
                parents,
                literals,
                globs,
                magic,
                icons,
                generic
            )?;
        }
        writeln!(out, "aliases:")?;
        for (alias, canonical) in self.aliases.iter() {
            writeln!(out, "  {alias} -> {canonical}")?;
        }
        writeln!(out, "subclasses:")?;
        for (mime, parents) in self.parents.iter() {
            writeln!(out, "  {mime} <- {}", parents.join(" "))?;
        }
        writeln!(out, "globs:")?;
        for (glob, mime, weight, case_sensitive) in self.globs.entries() {
            let cs = if case_sensitive { " cs" } else { "" };
            writeln!(out, "  {weight}:{mime}:{glob}{cs}")?;
        }
        writeln!(out, "magic: (max extent {})", self.magic.max_extent())?;
        for (mime, priority) in self.magic.iter() {
            writeln!(out, "  [{priority}:{mime}]")?;
        }
        writeln!(out, "icons:")?;
        for (mime, icon) in self.icons.iter() {
            writeln!(out, "  {mime}:{icon}")?;
        }
        writeln!(out, "generic-icons:")?;
        for (mime, icon) in self.generic_icons.iter() {
            writeln!(out, "  {mime}:{icon}")?;
        }
        Ok(())
    }

    /// [`dump_to`](Self::dump_to) aimed at standard output.
    pub fn dump(&mut self) {
        let stdout = io::stdout();
        let _ = self.dump_to(&mut stdout.lock());
    }
}

impl Default for MimeDb {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MimeDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MimeDb")
            .field("dirs", &self.dirs)
            .field("caches", &self.caches.len())
            .field("need_reread", &self.need_reread)
            .finish()
    }
}

/// Read up to `limit` bytes from the start of a file.
fn read_prefix(path: &Path, limit: usize) -> io::Result<Vec<u8>> {
    let file = fs::File::open(path)?;
    let mut data = Vec::with_capacity(limit.min(64 * 1024));
    file.take(limit as u64).read_to_end(&mut data)?;
    Ok(data)
}
