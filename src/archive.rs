//! Locates vehicle definition records and their companion textures, whether
//! they live in the base-game content tree, an unpacked mod folder, or a
//! zipped mod archive.
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::ListingError;

const MODDIR_PREFIX: &str = "$moddir$";
const DATA_PREFIX: &str = "data/";
const DATA_VAR_PREFIX: &str = "$data/";
const MODS_PREFIX: &str = "Mods/";

/// A parsed reference string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// `$moddir$<archive>/<inner>`
    Mod { archive: String, inner: String },
    /// `data/<path>` or `$data/<path>`, relative to the content root.
    Content(String),
    /// `Mods/<path>`, relative to the mods root.
    ModsTree(String),
}

impl Reference {
    pub fn parse(raw: &str) -> Result<Self, ListingError> {
        let raw = raw.trim().replace('\\', "/");
        if let Some(rest) = raw.strip_prefix(MODDIR_PREFIX) {
            let (archive, inner) = rest
                .split_once('/')
                .filter(|(a, i)| !a.is_empty() && !i.is_empty())
                .ok_or_else(|| ListingError::NotFound(format!("{raw}: missing inner file")))?;
            return Ok(Reference::Mod {
                archive: archive.to_string(),
                inner: inner.to_string(),
            });
        }
        if let Some(rest) = raw
            .strip_prefix(DATA_VAR_PREFIX)
            .or_else(|| raw.strip_prefix(DATA_PREFIX))
        {
            return Ok(Reference::Content(rest.to_string()));
        }
        if let Some(rest) = raw.strip_prefix(MODS_PREFIX) {
            return Ok(Reference::ModsTree(rest.to_string()));
        }
        Err(ListingError::UnknownReference(raw))
    }
}

/// Where a resolved definition record came from. Relative image references
/// are looked up against this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordSource {
    File(PathBuf),
    /// A file inside an unpacked mod folder rooted at `root`.
    ModFolder {
        root: PathBuf,
        path: PathBuf,
    },
    Archive {
        archive_name: String,
        archive_path: PathBuf,
        inner: String,
    },
}

impl RecordSource {
    pub fn display_name(&self) -> String {
        match self {
            RecordSource::File(path) | RecordSource::ModFolder { path, .. } => {
                path.display().to_string()
            }
            RecordSource::Archive {
                archive_path,
                inner,
                ..
            } => format!("{}!{}", archive_path.display(), inner),
        }
    }
}

/// Raw text of a definition record plus its origin.
#[derive(Debug, Clone)]
pub struct ResolvedRecord {
    pub source: RecordSource,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct ArchiveResolver {
    content_root: PathBuf,
    mods_root: PathBuf,
    extract_dir: PathBuf,
}

impl ArchiveResolver {
    /// `extract_dir` receives textures pulled out of archives, under `<extract_dir>/<archive>/`.
    pub fn new(
        content_root: impl Into<PathBuf>,
        mods_root: impl Into<PathBuf>,
        extract_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            content_root: content_root.into(),
            mods_root: mods_root.into(),
            extract_dir: extract_dir.into(),
        }
    }

    /// Locate and read the definition record named by a sale item reference.
    pub fn resolve_record(&self, raw: &str) -> Result<ResolvedRecord, ListingError> {
        match Reference::parse(raw)? {
            Reference::Mod { archive, inner } => {
                let inner = normalize_inner(&inner)
                    .ok_or_else(|| ListingError::NotFound(format!("{raw}: invalid inner path")))?;
                let archive_path = self.archive_path(&archive);
                if archive_path.is_file() {
                    info!(archive = %archive_path.display(), %inner, "reading record from mod archive");
                    let bytes = read_from_archive(&archive_path, &inner)?;
                    return Ok(ResolvedRecord {
                        source: RecordSource::Archive {
                            archive_name: archive,
                            archive_path,
                            inner,
                        },
                        text: decode_text(&bytes),
                    });
                }
                let root = self.mods_root.join(&archive);
                let unpacked = root.join(&inner);
                if unpacked.is_file() {
                    debug!(path = %unpacked.display(), "reading record from unpacked mod");
                    return Ok(ResolvedRecord {
                        text: read_plain(&unpacked)?,
                        source: RecordSource::ModFolder {
                            root,
                            path: unpacked,
                        },
                    });
                }
                Err(ListingError::NotFound(format!(
                    "mod archive {} not found",
                    archive_path.display()
                )))
            }
            Reference::Content(rel) => {
                let path = join_relative(&self.content_root, &rel)?;
                Ok(ResolvedRecord {
                    text: read_plain(&path)?,
                    source: RecordSource::File(path),
                })
            }
            Reference::ModsTree(rel) => {
                let path = join_relative(&self.mods_root, &rel)?;
                let text = read_plain(&path)?;
                let source = match rel.split_once('/') {
                    Some((folder, _)) => RecordSource::ModFolder {
                        root: self.mods_root.join(folder),
                        path,
                    },
                    None => RecordSource::File(path),
                };
                Ok(ResolvedRecord { text, source })
            }
        }
    }

    /// Resolve an image reference found in a record to a file on disk.
    ///
    /// Prefixed references resolve like record references. Bare ones inside a
    /// mod are tried against the mod root first, then against the record's
    /// own directory; elsewhere they are relative to the record. Archive
    /// members are extracted under the extract dir, overwriting earlier
    /// extractions. A missing `.png` falls back to its `.dds` sibling and
    /// vice versa.
    pub fn resolve_image(&self, raw: &str, origin: &RecordSource) -> Result<PathBuf, ListingError> {
        match Reference::parse(raw) {
            Ok(Reference::Mod { archive, inner }) => {
                let inner = normalize_inner(&inner)
                    .ok_or_else(|| ListingError::NotFound(format!("{raw}: invalid inner path")))?;
                let archive_path = self.archive_path(&archive);
                if archive_path.is_file() {
                    self.extract_texture(&archive, &archive_path, &inner)
                } else {
                    existing_variant(&self.mods_root.join(&archive).join(&inner))
                }
            }
            Ok(Reference::Content(rel)) => {
                existing_variant(&join_relative(&self.content_root, &rel)?)
            }
            Ok(Reference::ModsTree(rel)) => {
                existing_variant(&join_relative(&self.mods_root, &rel)?)
            }
            Err(ListingError::UnknownReference(rel)) => match origin {
                RecordSource::File(record_path) => {
                    existing_variant(&parent_dir(record_path).join(&rel))
                }
                RecordSource::ModFolder { root, path } => {
                    if let Some(found) = normalize_inner(&rel)
                        .and_then(|member| existing_variant(&root.join(member)).ok())
                    {
                        return Ok(found);
                    }
                    existing_variant(&parent_dir(path).join(&rel))
                }
                RecordSource::Archive {
                    archive_name,
                    archive_path,
                    inner,
                } => {
                    if let Some(member) = normalize_inner(&rel) {
                        match self.extract_texture(archive_name, archive_path, &member) {
                            Err(ListingError::NotFound(_)) => {}
                            found => return found,
                        }
                    }
                    let base = inner.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
                    let joined = if base.is_empty() {
                        rel.clone()
                    } else {
                        format!("{base}/{rel}")
                    };
                    let member = normalize_inner(&joined).ok_or_else(|| {
                        ListingError::NotFound(format!("{rel}: escapes archive root"))
                    })?;
                    self.extract_texture(archive_name, archive_path, &member)
                }
            },
            Err(err) => Err(err),
        }
    }

    fn archive_path(&self, archive: &str) -> PathBuf {
        self.mods_root.join(format!("{archive}.zip"))
    }

    /// Extract an image member (or its png/dds sibling) to a deterministic path.
    fn extract_texture(
        &self,
        archive_name: &str,
        archive_path: &Path,
        member: &str,
    ) -> Result<PathBuf, ListingError> {
        let mut zip = open_archive(archive_path)?;
        let candidates = extension_variants(member);
        let found = candidates
            .iter()
            .find(|c| zip.index_for_name(c.as_str()).is_some())
            .ok_or_else(|| {
                ListingError::NotFound(format!("{} not in {}", member, archive_path.display()))
            })?;

        let dest = self.extract_dir.join(archive_name).join(found);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut entry = zip.by_name(found).map_err(|e| zip_error(archive_path, found, e))?;
        let mut out = File::create(&dest)?;
        io::copy(&mut entry, &mut out)?;
        debug!(archive = %archive_path.display(), member = %found, dest = %dest.display(), "extracted texture");
        Ok(dest)
    }
}

fn read_plain(path: &Path) -> Result<String, ListingError> {
    match fs::read(path) {
        Ok(bytes) => Ok(decode_text(&bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(ListingError::NotFound(path.display().to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

fn open_archive(path: &Path) -> Result<ZipArchive<File>, ListingError> {
    let file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ListingError::NotFound(path.display().to_string()),
        _ => e.into(),
    })?;
    ZipArchive::new(file).map_err(|e| {
        ListingError::malformed(
            path.display().to_string(),
            format!("invalid or corrupt ZIP: {e}"),
        )
    })
}

fn read_from_archive(archive_path: &Path, inner: &str) -> Result<Vec<u8>, ListingError> {
    let mut zip = open_archive(archive_path)?;
    let mut entry = zip
        .by_name(inner)
        .map_err(|e| zip_error(archive_path, inner, e))?;
    // Declared sizes come from the archive header and are not trusted.
    let mut buf = Vec::new();
    entry.read_to_end(&mut buf)?;
    Ok(buf)
}

fn zip_error(archive_path: &Path, member: &str, err: ZipError) -> ListingError {
    match err {
        ZipError::FileNotFound => {
            ListingError::NotFound(format!("{} not in {}", member, archive_path.display()))
        }
        ZipError::Io(e) => ListingError::Io(e),
        other => ListingError::malformed(format!("{}!{}", archive_path.display(), member), other),
    }
}

fn parent_dir(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new(""))
}

/// Records are XML; tolerate a BOM and stray non-UTF-8 bytes.
fn decode_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_start_matches('\u{feff}')
        .to_string()
}

/// Collapse `.` and `..` segments of an archive member path. `None` if it
/// climbs above the archive root or is empty.
fn normalize_inner(inner: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for seg in inner.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            s => parts.push(s),
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Join a relative reference under a root, refusing to escape it.
fn join_relative(root: &Path, rel: &str) -> Result<PathBuf, ListingError> {
    let rel_path = Path::new(rel);
    if rel_path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(ListingError::NotFound(format!(
            "{rel}: escapes {}",
            root.display()
        )));
    }
    Ok(root.join(rel_path))
}

/// The member itself, then its `.png`/`.dds` counterpart.
fn extension_variants(name: &str) -> Vec<String> {
    let mut out = vec![name.to_string()];
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".png") {
        out.push(format!("{}.dds", &name[..name.len() - 4]));
    } else if lower.ends_with(".dds") {
        out.push(format!("{}.png", &name[..name.len() - 4]));
    }
    out
}

fn existing_variant(path: &Path) -> Result<PathBuf, ListingError> {
    let name = path.to_string_lossy();
    extension_variants(&name)
        .into_iter()
        .map(PathBuf::from)
        .find(|p| p.is_file())
        .ok_or_else(|| ListingError::NotFound(path.display().to_string()))
}
