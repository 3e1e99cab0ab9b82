//! Tracepoint format-file parsing (spec.md §4.7, component C9).
//! Discovers the tracefs mount, reads `events/<cat>/<name>/format`, and
//! falls back to a static table in sandboxes without tracefs.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TracefsError {
    #[error("tracefs is not mounted at any known path")]
    Unavailable,
    #[error("tracepoint format not found for {category}/{name}")]
    TracepointNotFound { category: String, name: String },
}

const TRACEFS_CANDIDATES: &[&str] = &["/sys/kernel/debug/tracing", "/sys/kernel/tracing"];

pub fn tracefs_mount() -> Option<&'static Path> {
    TRACEFS_CANDIDATES.iter().map(Path::new).find(|p| p.is_dir())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TracepointField {
    pub name: String,
    pub ty: String,
    pub offset: u32,
    pub size: u32,
    pub signed: bool,
    /// `Some(n)` when the field name carried an `[n]` array suffix.
    pub array_len: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TracepointDescriptor {
    pub category: String,
    pub name: String,
    pub id: u32,
    pub common_fields: Vec<TracepointField>,
    pub fields: Vec<TracepointField>,
}

impl TracepointDescriptor {
    pub fn field(&self, name: &str) -> Option<&TracepointField> {
        self.fields.iter().chain(self.common_fields.iter()).find(|f| f.name == name)
    }
}

/// Parses one `field:<type> <name>;\toffset:<n>;\tsize:<n>;\tsigned:<0|1>;`
/// line. Returns `None` for lines that don't start with `field:`
/// (the format file's header lines: `name:`, `ID:`, etc).
fn parse_field_line(line: &str) -> Option<TracepointField> {
    let rest = line.trim().strip_prefix("field:")?;
    let mut parts = rest.split(';').filter(|s| !s.trim().is_empty());
    let decl = parts.next()?.trim();
    let (ty_and_name, offset) = (decl, parts.next()?.trim());
    let offset: u32 = offset.strip_prefix("offset:")?.parse().ok()?;
    let size: u32 = parts.next()?.trim().strip_prefix("size:")?.parse().ok()?;
    let signed: u8 = parts.next()?.trim().strip_prefix("signed:")?.parse().ok()?;

    // The declarator is "<type...> <name>[<array>]"; the name is the
    // last whitespace-separated token.
    let last_space = ty_and_name.rfind(char::is_whitespace)?;
    let ty = ty_and_name[..last_space].trim().to_string();
    let mut name = ty_and_name[last_space + 1..].trim().to_string();

    let array_len = if let Some(open) = name.find('[') {
        let close = name.find(']')?;
        let n = name[open + 1..close].parse::<u32>().ok();
        name.truncate(open);
        n
    } else {
        None
    };

    Some(TracepointField { name, ty, offset, size, signed: signed != 0, array_len })
}

fn parse_format_text(category: &str, name: &str, text: &str, id: u32) -> TracepointDescriptor {
    let mut common_fields = Vec::new();
    let mut fields = Vec::new();
    for line in text.lines() {
        if let Some(field) = parse_field_line(line) {
            if field.name.starts_with("common_") {
                common_fields.push(field);
            } else {
                fields.push(field);
            }
        }
    }
    TracepointDescriptor {
        category: category.to_string(),
        name: name.to_string(),
        id,
        common_fields,
        fields,
    }
}

fn read_descriptor_from_tracefs(mount: &Path, category: &str, name: &str) -> Option<TracepointDescriptor> {
    let dir = mount.join("events").join(category).join(name);
    let format = fs::read_to_string(dir.join("format")).ok()?;
    let id: u32 = fs::read_to_string(dir.join("id")).ok()?.trim().parse().ok()?;
    Some(parse_format_text(category, name, &format, id))
}

/// Process-wide memoizing cache for parsed descriptors, keyed by
/// `(category, name)` (spec.md §4.7, §5 "Tracepoint format cache").
pub struct TracepointCache {
    entries: Mutex<HashMap<(String, String), TracepointDescriptor>>,
    tracefs_root: Option<PathBuf>,
}

impl Default for TracepointCache {
    fn default() -> Self {
        Self { entries: Mutex::new(HashMap::new()), tracefs_root: tracefs_mount().map(Path::to_path_buf) }
    }
}

impl TracepointCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the tracefs root, mainly for tests.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { entries: Mutex::new(HashMap::new()), tracefs_root: Some(root.into()) }
    }

    pub fn get(&self, category: &str, name: &str) -> Result<TracepointDescriptor, TracefsError> {
        let key = (category.to_string(), name.to_string());
        if let Some(hit) = self.entries.lock().unwrap().get(&key) {
            return Ok(hit.clone());
        }
        let descriptor = self
            .tracefs_root
            .as_deref()
            .and_then(|root| read_descriptor_from_tracefs(root, category, name))
            .or_else(|| static_fallback(category, name));
        match descriptor {
            Some(d) => {
                self.entries.lock().unwrap().insert(key, d.clone());
                Ok(d)
            }
            None => Err(TracefsError::TracepointNotFound { category: category.to_string(), name: name.to_string() }),
        }
    }

    pub fn flush(&self) {
        self.entries.lock().unwrap().clear();
    }
}

fn common_pid_fields() -> Vec<TracepointField> {
    vec![
        TracepointField { name: "common_type".into(), ty: "unsigned short".into(), offset: 0, size: 2, signed: false, array_len: None },
        TracepointField { name: "common_flags".into(), ty: "unsigned char".into(), offset: 2, size: 1, signed: false, array_len: None },
        TracepointField { name: "common_preempt_count".into(), ty: "unsigned char".into(), offset: 3, size: 1, signed: false, array_len: None },
        TracepointField { name: "common_pid".into(), ty: "int".into(), offset: 4, size: 4, signed: true, array_len: None },
    ]
}

/// Descriptors for the environments-without-tracefs fallback (spec.md
/// §4.7): the handful of tracepoints most tooling attaches to.
fn static_fallback(category: &str, name: &str) -> Option<TracepointDescriptor> {
    let common = common_pid_fields();
    let field = |n: &str, off: u32, size: u32, signed: bool| TracepointField {
        name: n.into(),
        ty: if size == 8 { "long".into() } else { "int".into() },
        offset: off,
        size,
        signed,
        array_len: None,
    };
    let (id, fields): (u32, Vec<TracepointField>) = match (category, name) {
        ("sched", "sched_switch") => (
            301,
            vec![field("prev_pid", 8, 4, true), field("next_pid", 8 + 4 + 8 + 4, 4, true)],
        ),
        ("sched", "sched_process_exec") => (302, vec![field("pid", 8, 4, true)]),
        ("sched", "sched_process_exit") => (303, vec![field("pid", 8, 4, true)]),
        ("syscalls", "sys_enter_execve") => (304, vec![field("nr", 8, 8, true)]),
        ("syscalls", "sys_exit_execve") => (305, vec![field("ret", 16, 8, true)]),
        ("raw_syscalls", "sys_enter") => (306, vec![field("id", 8, 8, true)]),
        ("raw_syscalls", "sys_exit") => (307, vec![field("ret", 16, 8, true)]),
        _ => return None,
    };
    Some(TracepointDescriptor { category: category.to_string(), name: name.to_string(), id, common_fields: common, fields })
}
