use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::memory::{DEFAULT_STACK_TOP, Mmu, Segment};

const ELF_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];
const CLASS_32: u8 = 1;
const LITTLE_ENDIAN: u8 = 1;

const SHF_WRITE: u32 = 0x1;
const SHF_ALLOC: u32 = 0x2;
const SHF_EXECINSTR: u32 = 0x4;

const EHDR_ENTRY: usize = 24;
const EHDR_PHOFF: usize = 28;
const EHDR_SHOFF: usize = 32;
const EHDR_PHNUM: usize = 44;
const EHDR_SHNUM: usize = 48;
const EHDR_SHSTRNDX: usize = 50;

const PHDR_SIZE: usize = 32;
const SHDR_SIZE: usize = 40;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("image truncated")]
    Truncated,

    #[error("not an ELF image")]
    BadMagic,

    #[error("only 32-bit images are supported")]
    UnsupportedClass,

    #[error("only little-endian images are supported")]
    UnsupportedEndianness,

    #[error("no executable section found")]
    NoText,
}

pub fn load<P: AsRef<Path>>(path: P) -> Result<Mmu, LoadError> {
    let data = fs::read(path)?;
    parse(&data)
}

/// Builds the guest address space out of an ELF32 image: the allocated
/// sections become the text/rodata/data/bss segments, the stack window is
/// pinned below `DEFAULT_STACK_TOP`.
pub fn parse(data: &[u8]) -> Result<Mmu, LoadError> {
    if data.len() < 52 {
        return Err(LoadError::Truncated);
    }
    if data[..4] != ELF_MAGIC {
        return Err(LoadError::BadMagic);
    }
    if data[4] != CLASS_32 {
        return Err(LoadError::UnsupportedClass);
    }
    if data[5] != LITTLE_ENDIAN {
        return Err(LoadError::UnsupportedEndianness);
    }

    let entry = read_u32(data, EHDR_ENTRY)?;
    let ph_offset = read_u32(data, EHDR_PHOFF)? as usize;
    let sh_offset = read_u32(data, EHDR_SHOFF)? as usize;
    let ph_count = read_u16(data, EHDR_PHNUM)? as usize;
    let sh_count = read_u16(data, EHDR_SHNUM)? as usize;
    let shstrndx = read_u16(data, EHDR_SHSTRNDX)? as usize;

    let program_headers = (0..ph_count)
        .map(|i| ProgramHeader::parse(data, ph_offset + i * PHDR_SIZE))
        .collect::<Result<Vec<_>, _>>()?;
    let section_headers = (0..sh_count)
        .map(|i| SectionHeader::parse(data, sh_offset + i * SHDR_SIZE))
        .collect::<Result<Vec<_>, _>>()?;

    let strtab = section_headers
        .get(shstrndx)
        .map(|shstrtab| {
            slice(data, shstrtab.offset as usize, shstrtab.size as usize)
        })
        .transpose()?
        .unwrap_or(&[]);

    let mut text = Segment::default();
    let mut rodata = Segment::default();
    let mut data_segment = Segment::default();
    let mut bss = Segment::default();

    for section in &section_headers {
        let name = section_name(strtab, section.name_offset as usize);

        // .bss occupies no file bytes, so its load address is taken
        // straight from the header.
        if name == ".bss" {
            debug!(".bss at {:#010X}, {} bytes", section.addr, section.size);
            bss = Segment::zeroed(section.addr, section.size);
            continue;
        }

        // Flags are compared exactly: a section carrying anything beyond
        // the recognized combinations is skipped.
        let target = match section.flags {
            flags if flags == SHF_ALLOC | SHF_EXECINSTR => &mut text,
            flags if flags == SHF_ALLOC | SHF_WRITE => &mut data_segment,
            flags if flags == SHF_ALLOC => &mut rodata,
            _ => continue,
        };

        let vma = section.vma(&program_headers);
        let bytes = slice(data, section.offset as usize, section.size as usize)?;
        debug!("{name} at {vma:#010X}, {} bytes", section.size);
        *target = Segment::new(vma, bytes.to_vec());
    }

    if text.bytes.is_empty() {
        return Err(LoadError::NoText);
    }

    Ok(Mmu::new(
        entry,
        text,
        rodata,
        data_segment,
        bss,
        DEFAULT_STACK_TOP,
    ))
}

struct ProgramHeader {
    offset: u32,
    vaddr: u32,
    memsz: u32,
}

impl ProgramHeader {
    fn parse(data: &[u8], at: usize) -> Result<Self, LoadError> {
        Ok(Self {
            offset: read_u32(data, at + 4)?,
            vaddr: read_u32(data, at + 8)?,
            memsz: read_u32(data, at + 20)?,
        })
    }
}

struct SectionHeader {
    name_offset: u32,
    flags: u32,
    addr: u32,
    offset: u32,
    size: u32,
}

impl SectionHeader {
    fn parse(data: &[u8], at: usize) -> Result<Self, LoadError> {
        Ok(Self {
            name_offset: read_u32(data, at)?,
            flags: read_u32(data, at + 8)?,
            addr: read_u32(data, at + 12)?,
            offset: read_u32(data, at + 16)?,
            size: read_u32(data, at + 20)?,
        })
    }

    /// Recovers the load address by mapping the section's file offset
    /// through the program header table, falling back to the header's own
    /// address field.
    fn vma(&self, program_headers: &[ProgramHeader]) -> u32 {
        for header in program_headers {
            let span = header.offset..header.offset.saturating_add(header.memsz);
            if span.contains(&self.offset) {
                return header.vaddr + (self.offset - header.offset);
            }
        }
        self.addr
    }
}

fn read_u16(data: &[u8], at: usize) -> Result<u16, LoadError> {
    let bytes = slice(data, at, 2)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_u32(data: &[u8], at: usize) -> Result<u32, LoadError> {
    let bytes = slice(data, at, 4)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn slice(data: &[u8], at: usize, length: usize) -> Result<&[u8], LoadError> {
    data.get(at..at + length).ok_or(LoadError::Truncated)
}

fn section_name(strtab: &[u8], offset: usize) -> &str {
    let Some(tail) = strtab.get(offset..) else {
        return "";
    };
    let end = tail.iter().position(|b| *b == 0).unwrap_or(tail.len());
    std::str::from_utf8(&tail[..end]).unwrap_or("")
}
