//! A hand-rolled 64-bit ELF reader, just deep enough to resolve a
//! symbol's address for uprobe attachment (spec.md §4.6). Kept
//! panic-free on malformed input per testable property 8: every field
//! read is bounds-checked before use.

use std::fs;
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ElfError {
    #[error("cannot resolve symbol in `{path}`: {reason}")]
    Parse { path: String, reason: &'static str },
    #[error("io error reading `{path}`: {source}")]
    Io { path: String, #[source] source: std::io::Error },
}

const SHT_SYMTAB: u32 = 2;
const SHT_DYNSYM: u32 = 11;
const STT_FUNC: u8 = 2;

struct SectionHeader {
    name_offset: u32,
    sh_type: u32,
    offset: u64,
    size: u64,
    link: u32,
    entsize: u64,
}

struct Symbol {
    name_idx: u32,
    info: u8,
    value: u64,
}

/// A parsed (but not fully materialized) ELF file, holding just the raw
/// bytes and enough header state to resolve symbols on demand.
pub struct ElfFile {
    path: String,
    data: Vec<u8>,
    little_endian: bool,
    sections: Vec<SectionHeader>,
    shstrtab_idx: usize,
}

fn read_err(path: &str, reason: &'static str) -> ElfError {
    ElfError::Parse { path: path.to_string(), reason }
}

impl ElfFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ElfError> {
        let path_str = path.as_ref().display().to_string();
        let data = fs::read(path.as_ref())
            .map_err(|source| ElfError::Io { path: path_str.clone(), source })?;
        Self::parse(path_str, data)
    }

    fn parse(path: String, data: Vec<u8>) -> Result<Self, ElfError> {
        if data.len() < 64 {
            return Err(read_err(&path, "file shorter than an ELF64 header"));
        }
        if &data[0..4] != b"\x7FELF" {
            return Err(read_err(&path, "bad magic"));
        }
        if data[4] != 2 {
            return Err(read_err(&path, "not a 64-bit ELF object"));
        }
        let little_endian = match data[5] {
            1 => true,
            2 => false,
            _ => return Err(read_err(&path, "unrecognized endianness marker")),
        };

        let e_shoff = read_u64(&data, 40, little_endian).ok_or_else(|| read_err(&path, "truncated header"))?;
        let e_shentsize = read_u16(&data, 58, little_endian).ok_or_else(|| read_err(&path, "truncated header"))?;
        let e_shnum = read_u16(&data, 60, little_endian).ok_or_else(|| read_err(&path, "truncated header"))?;
        let e_shstrndx = read_u16(&data, 62, little_endian).ok_or_else(|| read_err(&path, "truncated header"))?;

        let mut sections = Vec::with_capacity(e_shnum as usize);
        for i in 0..e_shnum as u64 {
            let base = e_shoff + i * e_shentsize as u64;
            let base = usize::try_from(base).map_err(|_| read_err(&path, "section offset overflow"))?;
            let name_offset = read_u32(&data, base, little_endian).ok_or_else(|| read_err(&path, "truncated section header"))?;
            let sh_type = read_u32(&data, base + 4, little_endian).ok_or_else(|| read_err(&path, "truncated section header"))?;
            let offset = read_u64(&data, base + 24, little_endian).ok_or_else(|| read_err(&path, "truncated section header"))?;
            let size = read_u64(&data, base + 32, little_endian).ok_or_else(|| read_err(&path, "truncated section header"))?;
            let link = read_u32(&data, base + 40, little_endian).ok_or_else(|| read_err(&path, "truncated section header"))?;
            let entsize = read_u64(&data, base + 56, little_endian).ok_or_else(|| read_err(&path, "truncated section header"))?;
            sections.push(SectionHeader { name_offset, sh_type, offset, size, link, entsize });
        }

        Ok(Self { path, data, little_endian, sections, shstrtab_idx: e_shstrndx as usize })
    }

    fn section_name(&self, sh: &SectionHeader) -> Option<&str> {
        let strtab = self.sections.get(self.shstrtab_idx)?;
        read_cstr(&self.data, strtab.offset as usize + sh.name_offset as usize)
    }

    fn symbols_in(&self, sh: &SectionHeader) -> Vec<Symbol> {
        let mut out = Vec::new();
        if sh.entsize == 0 {
            return out;
        }
        let count = sh.size / sh.entsize;
        for i in 0..count {
            let base = sh.offset as usize + (i * sh.entsize) as usize;
            let (Some(name_idx), Some(info), Some(value)) = (
                read_u32(&self.data, base, self.little_endian),
                self.data.get(base + 4).copied(),
                read_u64(&self.data, base + 8, self.little_endian),
            ) else {
                break;
            };
            out.push(Symbol { name_idx, info, value });
        }
        out
    }

    /// Returns the address of the first matching symbol across both the
    /// dynamic and static symbol tables, or `None` if absent.
    pub fn resolve_symbol(&self, name: &str) -> Option<u64> {
        for sh in &self.sections {
            if sh.sh_type != SHT_SYMTAB && sh.sh_type != SHT_DYNSYM {
                continue;
            }
            let strtab = self.sections.get(sh.link as usize)?;
            for sym in self.symbols_in(sh) {
                let Some(sym_name) = read_cstr(&self.data, strtab.offset as usize + sym.name_idx as usize) else {
                    continue;
                };
                if sym_name == name {
                    return Some(sym.value);
                }
            }
        }
        None
    }

    /// Symbol type 2 (`STT_FUNC`) entries only, useful for uprobe
    /// callers that want to reject data symbols.
    pub fn resolve_function_symbol(&self, name: &str) -> Option<u64> {
        for sh in &self.sections {
            if sh.sh_type != SHT_SYMTAB && sh.sh_type != SHT_DYNSYM {
                continue;
            }
            let Some(strtab) = self.sections.get(sh.link as usize) else { continue };
            for sym in self.symbols_in(sh) {
                if sym.info & 0x0F != STT_FUNC {
                    continue;
                }
                let Some(sym_name) = read_cstr(&self.data, strtab.offset as usize + sym.name_idx as usize) else {
                    continue;
                };
                if sym_name == name {
                    return Some(sym.value);
                }
            }
        }
        None
    }

    pub fn section_names(&self) -> Vec<&str> {
        self.sections.iter().filter_map(|sh| self.section_name(sh)).collect()
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

fn read_u16(data: &[u8], off: usize, le: bool) -> Option<u16> {
    let b: [u8; 2] = data.get(off..off + 2)?.try_into().ok()?;
    Some(if le { u16::from_le_bytes(b) } else { u16::from_be_bytes(b) })
}

fn read_u32(data: &[u8], off: usize, le: bool) -> Option<u32> {
    let b: [u8; 4] = data.get(off..off + 4)?.try_into().ok()?;
    Some(if le { u32::from_le_bytes(b) } else { u32::from_be_bytes(b) })
}

fn read_u64(data: &[u8], off: usize, le: bool) -> Option<u64> {
    let b: [u8; 8] = data.get(off..off + 8)?.try_into().ok()?;
    Some(if le { u64::from_le_bytes(b) } else { u64::from_be_bytes(b) })
}

fn read_cstr(data: &[u8], off: usize) -> Option<&str> {
    let slice = data.get(off..)?;
    let end = slice.iter().position(|&b| b == 0)?;
    std::str::from_utf8(&slice[..end]).ok()
}

/// Resolves `resolve_symbol(path, name)` in one call, the common case
/// for a one-shot uprobe attach.
pub fn resolve_symbol(path: impl AsRef<Path>, name: &str) -> Result<Option<u64>, ElfError> {
    Ok(ElfFile::open(path)?.resolve_symbol(name))
}

/// Library search paths the uprobe DSL scans when given a bare library
/// name instead of a full path (spec.md §4.6).
pub const LIBRARY_SEARCH_PATHS: &[&str] = &[
    "/lib/x86_64-linux-gnu",
    "/lib64",
    "/usr/lib/x86_64-linux-gnu",
    "/usr/lib64",
    "/lib/aarch64-linux-gnu",
    "/usr/lib/aarch64-linux-gnu",
];

/// Scans [`LIBRARY_SEARCH_PATHS`] for `name`, `name.so.6`, `name.so`,
/// `libname.so.6`, `libname.so`, in that order, returning the first hit.
pub fn find_library(name: &str) -> Option<std::path::PathBuf> {
    let candidates = [
        name.to_string(),
        format!("{name}.so.6"),
        format!("{name}.so"),
        format!("lib{name}.so.6"),
        format!("lib{name}.so"),
    ];
    for dir in LIBRARY_SEARCH_PATHS {
        for candidate in &candidates {
            let p = Path::new(dir).join(candidate);
            if p.is_file() {
                return Some(p);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_minimal_elf(little_endian: bool, symbol_value: u64) -> Vec<u8> {
        // One symtab section with one symbol "target", one strtab, one
        // shstrtab -- just enough for resolve_symbol to walk end to end.
        let mut data = vec![0u8; 64];
        data[0..4].copy_from_slice(b"\x7FELF");
        data[4] = 2;
        data[5] = if little_endian { 1 } else { 2 };

        let w16 = |buf: &mut Vec<u8>, off: usize, v: u16| {
            let b = if little_endian { v.to_le_bytes() } else { v.to_be_bytes() };
            buf[off..off + 2].copy_from_slice(&b);
        };
        let w32 = |buf: &mut Vec<u8>, off: usize, v: u32| {
            let b = if little_endian { v.to_le_bytes() } else { v.to_be_bytes() };
            buf[off..off + 4].copy_from_slice(&b);
        };
        let w64 = |buf: &mut Vec<u8>, off: usize, v: u64| {
            let b = if little_endian { v.to_le_bytes() } else { v.to_be_bytes() };
            buf[off..off + 8].copy_from_slice(&b);
        };

        // shstrtab content: "\0.shstrtab\0.strtab\0.symtab\0"
        let shstrtab: Vec<u8> = b"\0.shstrtab\0.strtab\0.symtab\0".to_vec();
        // strtab content: "\0target\0"
        let strtab: Vec<u8> = b"\0target\0".to_vec();

        let shstrtab_off = 64u64;
        let strtab_off = shstrtab_off + shstrtab.len() as u64;
        let symtab_off = strtab_off + strtab.len() as u64;

        // One symbol entry: name_idx=1 ("target"), info=STT_FUNC(2), other=0, shndx=1, value, size
        let mut symtab = vec![0u8; 24];
        w32(&mut symtab, 0, 1);
        symtab[4] = 2; // STT_FUNC
        w64(&mut symtab, 8, symbol_value);

        let sh_off = symtab_off + symtab.len() as u64;

        data.extend_from_slice(&shstrtab);
        data.extend_from_slice(&strtab);
        data.extend_from_slice(&symtab);

        // 4 section headers, 64 bytes each: [null, shstrtab, strtab, symtab]
        let mut sh = vec![0u8; 64 * 4];
        // section 1: .shstrtab, name offset 1
        w32(&mut sh, 64 + 0, 1);
        w64(&mut sh, 64 + 24, shstrtab_off);
        w64(&mut sh, 64 + 32, shstrtab.len() as u64);
        // section 2: .strtab, name offset 11
        w32(&mut sh, 128 + 0, 11);
        w64(&mut sh, 128 + 24, strtab_off);
        w64(&mut sh, 128 + 32, strtab.len() as u64);
        // section 3: .symtab, name offset 19, type SHT_SYMTAB, link=2 (.strtab), entsize 24
        w32(&mut sh, 192 + 0, 19);
        w32(&mut sh, 192 + 4, SHT_SYMTAB);
        w64(&mut sh, 192 + 24, symtab_off);
        w64(&mut sh, 192 + 32, symtab.len() as u64);
        w32(&mut sh, 192 + 40, 2);
        w64(&mut sh, 192 + 56, 24);

        data.extend_from_slice(&sh);

        w64(&mut data, 40, sh_off); // e_shoff
        w16(&mut data, 58, 64); // e_shentsize
        w16(&mut data, 60, 4); // e_shnum
        w16(&mut data, 62, 1); // e_shstrndx

        data
    }

    #[test]
    fn resolves_a_known_symbol_to_its_address() {
        let data = build_minimal_elf(true, 0xdead_beef);
        let elf = ElfFile::parse("test".to_string(), data).unwrap();
        assert_eq!(elf.resolve_symbol("target"), Some(0xdead_beef));
    }

    #[test]
    fn absent_symbol_resolves_to_none() {
        let data = build_minimal_elf(true, 0x1000);
        let elf = ElfFile::parse("test".to_string(), data).unwrap();
        assert_eq!(elf.resolve_symbol("nonexistent"), None);
    }

    #[test]
    fn big_endian_header_is_honored() {
        let data = build_minimal_elf(false, 0x2000);
        let elf = ElfFile::parse("test".to_string(), data).unwrap();
        assert_eq!(elf.resolve_symbol("target"), Some(0x2000));
    }

    #[test]
    fn bad_magic_is_an_error_not_a_panic() {
        let mut data = vec![0u8; 64];
        data[0..4].copy_from_slice(b"\x00\x00\x00\x00");
        assert!(ElfFile::parse("bad".to_string(), data).is_err());
    }

    #[test]
    fn thirty_two_bit_class_is_rejected() {
        let mut data = vec![0u8; 64];
        data[0..4].copy_from_slice(b"\x7FELF");
        data[4] = 1; // ELFCLASS32
        data[5] = 1;
        assert!(ElfFile::parse("bad".to_string(), data).is_err());
    }

    #[test]
    fn truncated_file_does_not_panic() {
        let data = vec![0x7F, b'E', b'L', b'F', 2, 1];
        assert!(ElfFile::parse("short".to_string(), data).is_err());
    }
}
