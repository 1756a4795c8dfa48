//! ELF32 executable images for the HV2 machine (`e_machine = 0x1332`).
//!
//! The assembler produces section records and a flat text stream;
//! [`Image::link`](struct.Image.html#method.link) lays those out as a
//! minimal executable: ELF header, three `PT_LOAD` program headers (text,
//! rodata, and a fixed stack segment), the assembled bytes, a synthesized
//! `.shstrtab`, and the section header table. Everything is written
//! little-endian.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};

pub const ET_EXEC: u16 = 2;
pub const EM_HV2: u16 = 0x1332;

pub const PT_LOAD: u32 = 0x1;

pub const PF_X: u32 = 0x1;
pub const PF_W: u32 = 0x2;
pub const PF_R: u32 = 0x4;

pub const SHT_NULL: u32 = 0x0;
pub const SHT_PROGBITS: u32 = 0x1;
pub const SHT_SYMTAB: u32 = 0x2;
pub const SHT_STRTAB: u32 = 0x3;
pub const SHT_RELA: u32 = 0x4;
pub const SHT_HASH: u32 = 0x5;
pub const SHT_DYNAMIC: u32 = 0x6;
pub const SHT_NOTE: u32 = 0x7;
pub const SHT_NOBITS: u32 = 0x8;
pub const SHT_REL: u32 = 0x9;
pub const SHT_SHLIB: u32 = 0xa;
pub const SHT_DYNSYM: u32 = 0xb;
pub const SHT_INIT_ARRAY: u32 = 0xe;
pub const SHT_FINI_ARRAY: u32 = 0xf;
pub const SHT_PREINIT_ARRAY: u32 = 0x10;
pub const SHT_GROUP: u32 = 0x11;
pub const SHT_SYMTAB_SHNDX: u32 = 0x12;
pub const SHT_NUM: u32 = 0x13;
pub const SHT_LOOS: u32 = 0x6000_0000;

pub const SHF_NONE: u32 = 0x0;
pub const SHF_WRITE: u32 = 0x1;
pub const SHF_ALLOC: u32 = 0x2;
pub const SHF_EXECINSTR: u32 = 0x4;
pub const SHF_MERGE: u32 = 0x10;
pub const SHF_STRINGS: u32 = 0x20;
pub const SHF_TLS: u32 = 0x400;

pub const HEADER_SIZE: u32 = 52;
pub const PHDR_SIZE: u32 = 32;
pub const SHDR_SIZE: u32 = 40;
pub const PHDR_COUNT: u32 = 3;

/// Combined size of the ELF header and the program header table; named
/// sections' file offsets shift by this amount during linking.
pub const LOAD_OFFSET: u32 = HEADER_SIZE + PHDR_COUNT * PHDR_SIZE;

pub const STACK_BASE: u32 = 0xc000_0000;
pub const STACK_SIZE: u32 = 0x80000;

/// Section flags for the standard section names.
pub fn section_flags(name: &str) -> Option<u32> {
    let flags = match name {
        ".bss" => SHF_ALLOC | SHF_WRITE,
        ".comment" => SHF_NONE,
        ".data" => SHF_ALLOC | SHF_WRITE,
        ".data1" => SHF_ALLOC | SHF_WRITE,
        ".debug" => SHF_NONE,
        ".dynamic" => SHF_ALLOC | SHF_WRITE,
        ".dynstr" => SHF_ALLOC,
        ".dynsym" => SHF_ALLOC,
        ".fini" => SHF_ALLOC | SHF_EXECINSTR,
        ".fini_array" => SHF_ALLOC | SHF_WRITE,
        ".got" => SHF_ALLOC,
        ".hash" => SHF_ALLOC,
        ".init" => SHF_ALLOC | SHF_EXECINSTR,
        ".init_array" => SHF_ALLOC | SHF_WRITE,
        ".interp" => SHF_ALLOC,
        ".line" => SHF_NONE,
        ".note" => SHF_NONE,
        ".plt" => SHF_ALLOC,
        ".preinit_array" => SHF_ALLOC | SHF_WRITE,
        ".relname" => SHF_ALLOC,
        ".relaname" => SHF_ALLOC,
        ".rodata" => SHF_ALLOC,
        ".rodata1" => SHF_ALLOC,
        ".shstrtab" => SHF_NONE,
        ".strtab" => SHF_ALLOC,
        ".symtab" => SHF_ALLOC,
        ".symtab_shndx" => SHF_ALLOC,
        ".tbss" => SHF_ALLOC | SHF_WRITE | SHF_TLS,
        ".tdata" => SHF_ALLOC | SHF_WRITE | SHF_TLS,
        ".tdata1" => SHF_ALLOC | SHF_WRITE | SHF_TLS,
        ".text" => SHF_ALLOC | SHF_EXECINSTR,
        _ => return None,
    };

    Some(flags)
}

/// Section types for the standard section names.
pub fn section_type(name: &str) -> Option<u32> {
    let sh_type = match name {
        ".bss" => SHT_NOBITS,
        ".comment" => SHT_PROGBITS,
        ".data" => SHT_PROGBITS,
        ".data1" => SHT_PROGBITS,
        ".debug" => SHT_PROGBITS,
        ".dynamic" => SHT_DYNAMIC,
        ".dynstr" => SHT_STRTAB,
        ".dynsym" => SHT_DYNSYM,
        ".fini" => SHT_PROGBITS,
        ".fini_array" => SHT_FINI_ARRAY,
        ".got" => SHT_PROGBITS,
        ".hash" => SHT_HASH,
        ".init" => SHT_PROGBITS,
        ".init_array" => SHT_INIT_ARRAY,
        ".interp" => SHT_PROGBITS,
        ".line" => SHT_PROGBITS,
        ".note" => SHT_NOTE,
        ".plt" => SHT_PROGBITS,
        ".preinit_array" => SHT_PREINIT_ARRAY,
        ".relname" => SHT_REL,
        ".relaname" => SHT_RELA,
        ".rodata" => SHT_PROGBITS,
        ".rodata1" => SHT_PROGBITS,
        ".shstrtab" => SHT_STRTAB,
        ".strtab" => SHT_STRTAB,
        ".symtab" => SHT_SYMTAB,
        ".symtab_shndx" => SHT_SYMTAB_SHNDX,
        ".tbss" => SHT_NOBITS,
        ".tdata" => SHT_PROGBITS,
        ".tdata1" => SHT_PROGBITS,
        ".text" => SHT_PROGBITS,
        _ => return None,
    };

    Some(sh_type)
}

/// Explicit `@type` names usable in `.section` directives.
pub fn section_type_by_name(name: &str) -> Option<u32> {
    let sh_type = match name {
        "null" => SHT_NULL,
        "progbits" => SHT_PROGBITS,
        "symtab" => SHT_SYMTAB,
        "strtab" => SHT_STRTAB,
        "rela" => SHT_RELA,
        "hash" => SHT_HASH,
        "dynamic" => SHT_DYNAMIC,
        "note" => SHT_NOTE,
        "nobits" => SHT_NOBITS,
        "rel" => SHT_REL,
        "shlib" => SHT_SHLIB,
        "dynsym" => SHT_DYNSYM,
        "init_array" => SHT_INIT_ARRAY,
        "fini_array" => SHT_FINI_ARRAY,
        "preinit_array" => SHT_PREINIT_ARRAY,
        "group" => SHT_GROUP,
        "symtab_shndx" => SHT_SYMTAB_SHNDX,
        "num" => SHT_NUM,
        "loos" => SHT_LOOS,
        _ => return None,
    };

    Some(sh_type)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    pub e_type: u16,
    pub e_machine: u16,
    pub e_version: u32,
    pub e_entry: u32,
    pub e_phoff: u32,
    pub e_shoff: u32,
    pub e_flags: u32,
    pub e_ehsize: u16,
    pub e_phentsize: u16,
    pub e_phnum: u16,
    pub e_shentsize: u16,
    pub e_shnum: u16,
    pub e_shstrndx: u16,
}

impl Header {
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        // e_ident: magic, 32-bit class, little-endian data, version 1.
        writer.write_all(&[0x7f, b'E', b'L', b'F', 1, 1, 1, 0, 0])?;
        writer.write_all(&[0; 7])?;

        writer.write_u16::<LittleEndian>(self.e_type)?;
        writer.write_u16::<LittleEndian>(self.e_machine)?;
        writer.write_u32::<LittleEndian>(self.e_version)?;
        writer.write_u32::<LittleEndian>(self.e_entry)?;
        writer.write_u32::<LittleEndian>(self.e_phoff)?;
        writer.write_u32::<LittleEndian>(self.e_shoff)?;
        writer.write_u32::<LittleEndian>(self.e_flags)?;
        writer.write_u16::<LittleEndian>(self.e_ehsize)?;
        writer.write_u16::<LittleEndian>(self.e_phentsize)?;
        writer.write_u16::<LittleEndian>(self.e_phnum)?;
        writer.write_u16::<LittleEndian>(self.e_shentsize)?;
        writer.write_u16::<LittleEndian>(self.e_shnum)?;
        writer.write_u16::<LittleEndian>(self.e_shstrndx)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgramHeader {
    pub p_type: u32,
    pub p_offset: u32,
    pub p_vaddr: u32,
    pub p_paddr: u32,
    pub p_filesz: u32,
    pub p_memsz: u32,
    pub p_flags: u32,
    pub p_align: u32,
}

impl ProgramHeader {
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(self.p_type)?;
        writer.write_u32::<LittleEndian>(self.p_offset)?;
        writer.write_u32::<LittleEndian>(self.p_vaddr)?;
        writer.write_u32::<LittleEndian>(self.p_paddr)?;
        writer.write_u32::<LittleEndian>(self.p_filesz)?;
        writer.write_u32::<LittleEndian>(self.p_memsz)?;
        writer.write_u32::<LittleEndian>(self.p_flags)?;
        writer.write_u32::<LittleEndian>(self.p_align)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SectionHeader {
    pub sh_name: u32,
    pub sh_type: u32,
    pub sh_flags: u32,
    pub sh_addr: u32,
    pub sh_offset: u32,
    pub sh_size: u32,
    pub sh_link: u32,
    pub sh_info: u32,
    pub sh_addralign: u32,
    pub sh_entsize: u32,
}

impl SectionHeader {
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(self.sh_name)?;
        writer.write_u32::<LittleEndian>(self.sh_type)?;
        writer.write_u32::<LittleEndian>(self.sh_flags)?;
        writer.write_u32::<LittleEndian>(self.sh_addr)?;
        writer.write_u32::<LittleEndian>(self.sh_offset)?;
        writer.write_u32::<LittleEndian>(self.sh_size)?;
        writer.write_u32::<LittleEndian>(self.sh_link)?;
        writer.write_u32::<LittleEndian>(self.sh_info)?;
        writer.write_u32::<LittleEndian>(self.sh_addralign)?;
        writer.write_u32::<LittleEndian>(self.sh_entsize)
    }
}

/// A named section: what the assembler accumulates per `.section`
/// directive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub header: SectionHeader,
}

impl Section {
    pub fn new(name: &str) -> Section {
        Section {
            name: name.to_owned(),
            header: SectionHeader::default(),
        }
    }

    /// The unnamed placeholder every section list starts with.
    pub fn sentinel() -> Section {
        Section::default()
    }
}

pub struct Image {
    pub header: Header,
    pub program_headers: [ProgramHeader; PHDR_COUNT as usize],
    pub sections: Vec<Section>,
    pub text: Vec<u8>,
}

impl Image {
    /// Lays out an executable image from the assembler's section records,
    /// text bytes, and entry point.
    pub fn link(mut sections: Vec<Section>, text: Vec<u8>, entry: u32) -> Image {
        let pos = text.len() as u32;

        // Named sections move past the ELF and program headers.
        for section in &mut sections {
            if !section.name.is_empty() {
                section.header.sh_offset += LOAD_OFFSET;
            }
        }

        let find = |name: &str| {
            sections
                .iter()
                .find(|s| s.name == name)
                .map(|s| s.header)
                .unwrap_or_default()
        };

        let text_hdr = find(".text");
        let rodata_hdr = find(".rodata");

        let mut shstrtab = Section::new(".shstrtab");

        shstrtab.header.sh_type = SHT_STRTAB;
        shstrtab.header.sh_flags = SHF_STRINGS;
        shstrtab.header.sh_offset = pos + LOAD_OFFSET;
        shstrtab.header.sh_addr = 0; // not mapped
        shstrtab.header.sh_addralign = 1;

        // Every name contributes its bytes plus a terminator, the sentinel
        // included.
        let shstrtab_size: u32 = sections
            .iter()
            .map(|s| s.name.len() as u32 + 1)
            .sum::<u32>()
            + shstrtab.name.len() as u32
            + 1;

        shstrtab.header.sh_size = shstrtab_size;

        sections.push(shstrtab);

        // Assign shstrtab offsets while the final order is known.
        let mut name_offset = 0;

        for section in &mut sections {
            section.header.sh_name = name_offset;
            name_offset += section.name.len() as u32 + 1;
        }

        let header = Header {
            e_type: ET_EXEC,
            e_machine: EM_HV2,
            e_version: 1,
            e_entry: entry,
            e_phoff: 0x34,
            e_shoff: pos + LOAD_OFFSET + shstrtab_size,
            e_flags: 0,
            e_ehsize: HEADER_SIZE as u16,
            e_phentsize: PHDR_SIZE as u16,
            e_phnum: PHDR_COUNT as u16,
            e_shentsize: SHDR_SIZE as u16,
            e_shnum: sections.len() as u16,
            e_shstrndx: sections.len() as u16 - 1,
        };

        let program_headers = [
            ProgramHeader {
                p_type: PT_LOAD,
                p_offset: text_hdr.sh_offset,
                p_vaddr: text_hdr.sh_addr,
                p_paddr: text_hdr.sh_offset,
                p_filesz: text_hdr.sh_size,
                p_memsz: text_hdr.sh_size,
                p_flags: PF_X | PF_R | PF_W,
                p_align: 32,
            },
            ProgramHeader {
                p_type: PT_LOAD,
                p_offset: rodata_hdr.sh_offset,
                p_vaddr: rodata_hdr.sh_addr,
                p_paddr: rodata_hdr.sh_offset,
                p_filesz: rodata_hdr.sh_size,
                p_memsz: rodata_hdr.sh_size,
                p_flags: PF_R,
                p_align: 1,
            },
            ProgramHeader {
                p_type: PT_LOAD,
                p_offset: 7,
                p_vaddr: STACK_BASE - STACK_SIZE,
                p_paddr: 0,
                p_filesz: 1,
                p_memsz: STACK_SIZE,
                p_flags: PF_R | PF_W,
                p_align: 32,
            },
        ];

        Image {
            header,
            program_headers,
            sections,
            text,
        }
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.header.write_to(writer)?;

        for phdr in &self.program_headers {
            phdr.write_to(writer)?;
        }

        writer.write_all(&self.text)?;

        for section in &self.sections {
            writer.write_all(section.name.as_bytes())?;
            writer.write_all(&[0])?;
        }

        for section in &self.sections {
            section.header.write_to(writer)?;
        }

        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();

        self.write_to(&mut bytes).unwrap();

        bytes
    }
}

pub trait WriteElfExt: Write + Sized {
    fn write_elf32(&mut self, image: &Image) -> io::Result<()> {
        image.write_to(self)
    }
}

impl<W: Write + Sized> WriteElfExt for W {}

pub fn write_file<P: AsRef<Path>>(path: P, image: &Image) -> io::Result<()> {
    BufWriter::new(File::create(path)?).write_elf32(image)
}

#[cfg(test)]
mod test {
    use super::*;
    use byteorder::{ByteOrder, LittleEndian};

    fn sample_sections() -> Vec<Section> {
        let mut text = Section::new(".text");

        text.header.sh_type = SHT_PROGBITS;
        text.header.sh_flags = SHF_ALLOC | SHF_EXECINSTR;
        text.header.sh_addr = 0x40000;
        text.header.sh_offset = 0;
        text.header.sh_size = 8;
        text.header.sh_addralign = 4;

        let mut rodata = Section::new(".rodata");

        rodata.header.sh_type = SHT_PROGBITS;
        rodata.header.sh_flags = SHF_ALLOC;
        rodata.header.sh_addr = 0x40008;
        rodata.header.sh_offset = 8;
        rodata.header.sh_size = 4;
        rodata.header.sh_addralign = 4;

        vec![Section::sentinel(), text, rodata]
    }

    #[test]
    fn header_fields() {
        let image = Image::link(sample_sections(), vec![0; 12], 0x40000);

        assert_eq!(image.header.e_type, ET_EXEC);
        assert_eq!(image.header.e_machine, 0x1332);
        assert_eq!(image.header.e_phoff, 0x34);
        assert_eq!(image.header.e_phnum, 3);
        assert_eq!(image.header.e_ehsize, 52);
        assert_eq!(image.header.e_phentsize, 32);
        assert_eq!(image.header.e_shentsize, 40);

        // Sentinel + .text + .rodata + .shstrtab.
        assert_eq!(image.header.e_shnum, 4);
        assert_eq!(image.header.e_shstrndx, 3);
        assert_eq!(image.header.e_entry, 0x40000);
    }

    #[test]
    fn magic_and_machine_bytes() {
        let bytes = Image::link(sample_sections(), vec![0; 12], 0x40000).to_bytes();

        assert_eq!(&bytes[..4], &[0x7f, b'E', b'L', b'F']);
        assert_eq!(bytes[4], 1); // 32-bit
        assert_eq!(bytes[5], 1); // little-endian
        assert_eq!(bytes[18], 0x32);
        assert_eq!(bytes[19], 0x13);
    }

    #[test]
    fn section_offsets_shift_past_headers() {
        let image = Image::link(sample_sections(), vec![0; 12], 0);

        assert_eq!(image.sections[0].header.sh_offset, 0); // sentinel untouched
        assert_eq!(image.sections[1].header.sh_offset, LOAD_OFFSET);
        assert_eq!(image.sections[2].header.sh_offset, 8 + LOAD_OFFSET);
    }

    #[test]
    fn shstrtab_contents() {
        let bytes = Image::link(sample_sections(), vec![0xaa; 12], 0).to_bytes();

        let start = (LOAD_OFFSET + 12) as usize;
        let table = &bytes[start..start + 25];

        assert_eq!(table, b"\0.text\0.rodata\0.shstrtab\0");
    }

    #[test]
    fn program_headers_cover_text_rodata_stack() {
        let image = Image::link(sample_sections(), vec![0; 12], 0);

        let text = &image.program_headers[0];

        assert_eq!(text.p_type, PT_LOAD);
        assert_eq!(text.p_vaddr, 0x40000);
        assert_eq!(text.p_filesz, 8);
        assert_eq!(text.p_flags, PF_X | PF_R | PF_W);
        assert_eq!(text.p_align, 32);

        let rodata = &image.program_headers[1];

        assert_eq!(rodata.p_flags, PF_R);
        assert_eq!(rodata.p_align, 1);

        let stack = &image.program_headers[2];

        assert_eq!(stack.p_vaddr, STACK_BASE - STACK_SIZE);
        assert_eq!(stack.p_memsz, STACK_SIZE);
        assert_eq!(stack.p_filesz, 1);
        assert_eq!(stack.p_offset, 7);
    }

    #[test]
    fn section_headers_round_trip_fields() {
        let image = Image::link(sample_sections(), vec![0; 12], 0);
        let bytes = image.to_bytes();

        // Section headers start at e_shoff.
        let shoff = LittleEndian::read_u32(&bytes[32..36]) as usize;

        // The .text header is entry 1; sh_addr is its fourth field.
        let text_hdr = &bytes[shoff + 40..shoff + 80];

        assert_eq!(LittleEndian::read_u32(&text_hdr[12..16]), 0x40000);

        // sh_name offsets index into shstrtab: sentinel 0, .text 1.
        assert_eq!(LittleEndian::read_u32(&text_hdr[0..4]), 1);
    }

    #[test]
    fn standard_section_tables() {
        assert_eq!(section_flags(".text"), Some(SHF_ALLOC | SHF_EXECINSTR));
        assert_eq!(section_type(".text"), Some(SHT_PROGBITS));
        assert_eq!(section_flags(".rodata"), Some(SHF_ALLOC));
        assert_eq!(section_type(".bss"), Some(SHT_NOBITS));
        assert_eq!(section_flags(".nope"), None);
        assert_eq!(section_type_by_name("progbits"), Some(SHT_PROGBITS));
        assert_eq!(section_type_by_name("nobits"), Some(SHT_NOBITS));
        assert_eq!(section_type_by_name("bogus"), None);
    }
}
