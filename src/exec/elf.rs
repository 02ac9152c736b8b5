//! ELF scanning for the update blob, grounded in
//! `update.cpp`'s `LiveUpdate::exec`: find the ELF header (at offset 0
//! or one sector in, to skip a bootloader), compute the expected total
//! size from the section header table, and locate the first program
//! header's physical load address. Parsed the same way
//! [`crate::storage::header`] parses the storage header: plain packed
//! structs read in place via `zerocopy::LayoutVerified`.
use zerocopy::{AsBytes, FromBytes, LayoutVerified};

use crate::error::{Error, Result};

/// Minimum buffer size to even attempt to read an ELF header
/// (`update.cpp`'s `ELF_MINIMUM`).
pub const ELF_MINIMUM: usize = 164;

/// Sector size assumed when skipping a leading bootloader sector
/// looking for the real ELF header (`update.cpp`'s `SECT_SIZE`).
pub const SECTOR_SIZE: usize = 512;

const EI_CLASS: usize = 4;
const ELFCLASS32: u8 = 1;
const ELFCLASS64: u8 = 2;

fn has_elf_magic(buf: &[u8]) -> bool {
    buf.len() >= 4 && &buf[0..4] == b"\x7FELF"
}

#[repr(packed)]
#[derive(Clone, Copy, Debug, Default, FromBytes, AsBytes)]
struct Elf32Ehdr {
    e_ident: [u8; 16],
    e_type: u16,
    e_machine: u16,
    e_version: u32,
    e_entry: u32,
    e_phoff: u32,
    e_shoff: u32,
    e_flags: u32,
    e_ehsize: u16,
    e_phentsize: u16,
    e_phnum: u16,
    e_shentsize: u16,
    e_shnum: u16,
    e_shstrndx: u16,
}

#[repr(packed)]
#[derive(Clone, Copy, Debug, Default, FromBytes, AsBytes)]
struct Elf32Phdr {
    p_type: u32,
    p_offset: u32,
    p_vaddr: u32,
    p_paddr: u32,
    p_filesz: u32,
    p_memsz: u32,
    p_flags: u32,
    p_align: u32,
}

#[repr(packed)]
#[derive(Clone, Copy, Debug, Default, FromBytes, AsBytes)]
struct Elf64Ehdr {
    e_ident: [u8; 16],
    e_type: u16,
    e_machine: u16,
    e_version: u32,
    e_entry: u64,
    e_phoff: u64,
    e_shoff: u64,
    e_flags: u32,
    e_ehsize: u16,
    e_phentsize: u16,
    e_phnum: u16,
    e_shentsize: u16,
    e_shnum: u16,
    e_shstrndx: u16,
}

#[repr(packed)]
#[derive(Clone, Copy, Debug, Default, FromBytes, AsBytes)]
struct Elf64Phdr {
    p_type: u32,
    p_flags: u32,
    p_offset: u64,
    p_vaddr: u64,
    p_paddr: u64,
    p_filesz: u64,
    p_memsz: u64,
    p_align: u64,
}

/// Everything the update executor needs out of a scanned ELF blob:
/// where its first loadable segment lives inside the blob, where it
/// wants to be placed physically, how many bytes to copy, and where to
/// jump once the copy is done.
#[derive(Debug, Clone, Copy)]
pub struct ScannedImage {
    pub segment_offset: usize,
    pub physical_base: usize,
    pub total_len: usize,
    pub entry_point: usize,
}

/// Locate and validate the ELF header in `blob`, trying offset 0 and
/// then one sector in (to skip a bootloader). Returns the layout the
/// executor needs to perform the hotswap copy.
pub fn scan(blob: &[u8]) -> Result<ScannedImage> {
    if blob.len() < ELF_MINIMUM {
        return Err(Error::ElfInvalid);
    }
    let binary = if has_elf_magic(blob) {
        blob
    } else if blob.len() > SECTOR_SIZE && has_elf_magic(&blob[SECTOR_SIZE..]) {
        &blob[SECTOR_SIZE..]
    } else {
        return Err(Error::ElfInvalid);
    };

    let class = binary[EI_CLASS];
    let image = match class {
        ELFCLASS32 => scan32(binary)?,
        ELFCLASS64 => scan64(binary)?,
        _ => return Err(Error::ElfInvalid),
    };

    if blob.len() < image.total_len || image.total_len < ELF_MINIMUM {
        return Err(Error::ElfIncomplete);
    }
    if image.total_len <= 64 {
        return Err(Error::ElfMalformed);
    }
    Ok(image)
}

fn scan32(binary: &[u8]) -> Result<ScannedImage> {
    let view: LayoutVerified<&[u8], Elf32Ehdr> =
        LayoutVerified::new(&binary[..core::mem::size_of::<Elf32Ehdr>()]).ok_or(Error::ElfInvalid)?;
    let ehdr: Elf32Ehdr = *view;
    let e_shnum = ehdr.e_shnum as usize;
    let e_shentsize = ehdr.e_shentsize as usize;
    let e_shoff = ehdr.e_shoff as usize;
    let e_phoff = ehdr.e_phoff as usize;
    let e_entry = ehdr.e_entry as usize;
    let total_len = e_shnum * e_shentsize + e_shoff;

    let phdr_start = e_phoff;
    let phdr_end = phdr_start + core::mem::size_of::<Elf32Phdr>();
    if phdr_end > binary.len() {
        return Err(Error::ElfMalformed);
    }
    let phdr_view: LayoutVerified<&[u8], Elf32Phdr> =
        LayoutVerified::new(&binary[phdr_start..phdr_end]).ok_or(Error::ElfMalformed)?;
    let phdr: Elf32Phdr = *phdr_view;
    let p_offset = phdr.p_offset as usize;
    let p_paddr = phdr.p_paddr as usize;

    Ok(ScannedImage {
        segment_offset: p_offset,
        physical_base: p_paddr,
        total_len,
        entry_point: e_entry,
    })
}

fn scan64(binary: &[u8]) -> Result<ScannedImage> {
    let view: LayoutVerified<&[u8], Elf64Ehdr> =
        LayoutVerified::new(&binary[..core::mem::size_of::<Elf64Ehdr>()]).ok_or(Error::ElfInvalid)?;
    let ehdr: Elf64Ehdr = *view;
    let e_shnum = ehdr.e_shnum as usize;
    let e_shentsize = ehdr.e_shentsize as usize;
    let e_shoff = ehdr.e_shoff as usize;
    let e_phoff = ehdr.e_phoff as usize;
    let e_entry = ehdr.e_entry as usize;
    let total_len = e_shnum * e_shentsize + e_shoff;

    let phdr_start = e_phoff;
    let phdr_end = phdr_start + core::mem::size_of::<Elf64Phdr>();
    if phdr_end > binary.len() {
        return Err(Error::ElfMalformed);
    }
    let phdr_view: LayoutVerified<&[u8], Elf64Phdr> =
        LayoutVerified::new(&binary[phdr_start..phdr_end]).ok_or(Error::ElfMalformed)?;
    let phdr: Elf64Phdr = *phdr_view;
    let p_offset = phdr.p_offset as usize;
    let p_paddr = phdr.p_paddr as usize;

    Ok(ScannedImage {
        segment_offset: p_offset,
        physical_base: p_paddr,
        total_len,
        entry_point: e_entry,
    })
}

/// Builders shared between this module's tests and
/// [`crate::exec::executor`]'s tests.
#[cfg(test)]
pub(crate) mod tests_support {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;

    pub(crate) fn build_elf32(shnum: u16, shentsize: u16, shoff: u32, phoff: u32, paddr: u32, offset: u32) -> Vec<u8> {
        let mut buf = vec![0u8; 4096];
        buf[0] = 0x7F;
        buf[1] = b'E';
        buf[2] = b'L';
        buf[3] = b'F';
        buf[EI_CLASS] = ELFCLASS32;
        let ehdr = Elf32Ehdr {
            e_ident: {
                let mut id = [0u8; 16];
                id[0..4].copy_from_slice(b"\x7FELF");
                id[EI_CLASS] = ELFCLASS32;
                id
            },
            e_type: 2,
            e_machine: 3,
            e_version: 1,
            e_entry: 0x10000,
            e_phoff: phoff,
            e_shoff: shoff,
            e_flags: 0,
            e_ehsize: core::mem::size_of::<Elf32Ehdr>() as u16,
            e_phentsize: core::mem::size_of::<Elf32Phdr>() as u16,
            e_phnum: 1,
            e_shentsize: shentsize,
            e_shnum: shnum,
            e_shstrndx: 0,
        };
        buf[..core::mem::size_of::<Elf32Ehdr>()].copy_from_slice(ehdr.as_bytes());
        let phdr = Elf32Phdr {
            p_type: 1,
            p_offset: offset,
            p_vaddr: 0x10000,
            p_paddr: paddr,
            p_filesz: 100,
            p_memsz: 100,
            p_flags: 5,
            p_align: 0x1000,
        };
        buf[phoff as usize..phoff as usize + core::mem::size_of::<Elf32Phdr>()].copy_from_slice(phdr.as_bytes());
        buf
    }

    /// A small but fully-valid ELF32 blob: one section header table
    /// entry, one program header, no bootloader sector prefix.
    pub(crate) fn build_minimal_elf32() -> Vec<u8> {
        build_elf32(2, 40, 500, 52, 0x100000, 64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use tests_support::build_elf32;

    #[test]
    fn scans_valid_elf32_at_offset_zero() {
        let buf = build_elf32(2, 40, 500, 52, 0x100000, 64);
        let image = scan(&buf).unwrap();
        assert_eq!(image.physical_base, 0x100000);
        assert_eq!(image.segment_offset, 64);
        assert_eq!(image.total_len, 2 * 40 + 500);
    }

    #[test]
    fn finds_header_after_bootloader_sector() {
        let inner = build_elf32(2, 40, 500, 52, 0x100000, 64);
        let mut buf = vec![0u8; SECTOR_SIZE + inner.len()];
        buf[SECTOR_SIZE..].copy_from_slice(&inner);
        let image = scan(&buf).unwrap();
        assert_eq!(image.physical_base, 0x100000);
    }

    #[test]
    fn too_small_is_rejected() {
        let buf = vec![0u8; 32];
        assert_eq!(scan(&buf).unwrap_err(), Error::ElfInvalid);
    }

    #[test]
    fn no_magic_anywhere_is_rejected() {
        let buf = vec![0u8; 4096];
        assert_eq!(scan(&buf).unwrap_err(), Error::ElfInvalid);
    }

    #[test]
    fn truncated_blob_is_incomplete() {
        let full = build_elf32(2, 40, 500, 52, 0x100000, 64);
        let truncated = &full[..400];
        assert_eq!(scan(truncated).unwrap_err(), Error::ElfIncomplete);
    }
}
