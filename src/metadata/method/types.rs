//! Header flags of method bodies and their extra data sections (ECMA-335 II.25.4).

use bitflags::bitflags;

bitflags! {
    /// Flags in the first bits of a method body header.
    ///
    /// The two lowest bits select the header layout; the remaining flags only exist in the
    /// fat layout, whose first 12 bits hold them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MethodBodyFlags: u16 {
        /// One-byte header: code size in the upper 6 bits, max stack 8, no locals
        const TINY_FORMAT = 0x2;
        /// Twelve-byte header
        const FAT_FORMAT = 0x3;
        /// Data sections follow the code
        const MORE_SECTS = 0x8;
        /// Locals are zero-initialized
        const INIT_LOCALS = 0x10;
    }
}

bitflags! {
    /// Kind byte of a method data section.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SectionFlags: u8 {
        /// The section holds exception handling clauses
        const EHTABLE = 0x1;
        /// Reserved, never written
        const OPT_ILTABLE = 0x2;
        /// 24-byte clauses and a 3-byte data size
        const FAT_FORMAT = 0x40;
        /// Another section follows
        const MORE_SECTS = 0x80;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layouts() {
        assert_eq!(
            MethodBodyFlags::from_bits_truncate(0x0A & 0b11),
            MethodBodyFlags::TINY_FORMAT
        );
        let fat = MethodBodyFlags::FAT_FORMAT | MethodBodyFlags::INIT_LOCALS;
        assert_eq!(fat.bits(), 0x13);
        assert!(fat.contains(MethodBodyFlags::TINY_FORMAT));
    }

    #[test]
    fn section_kinds() {
        assert_eq!((SectionFlags::EHTABLE | SectionFlags::FAT_FORMAT).bits(), 0x41);
        let chained = SectionFlags::from_bits_truncate(0x81);
        assert!(chained.contains(SectionFlags::MORE_SECTS));
        assert!(!chained.contains(SectionFlags::FAT_FORMAT));
    }
}
