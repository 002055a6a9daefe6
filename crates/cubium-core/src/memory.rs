//! Emulated address spaces and the fallible typed read primitive.
//!
//! Memory is big-endian, as seen by the emulated PowerPC core. Physical
//! addresses index MEM1 (and MEM2 on Wii) directly. Virtual addresses go
//! through the fixed BAT mirrors at `0x8000_0000` (cached) and
//! `0xC000_0000` (uncached); anything else is unmapped.

/// Physical memory map constants.
pub mod layout {
    /// MEM1 is 24 MiB on both GameCube and Wii.
    pub const MEM1_SIZE: u32 = 0x0180_0000;
    /// Physical base of the Wii-only MEM2 block.
    pub const MEM2_BASE: u32 = 0x1000_0000;
    /// MEM2 is 64 MiB.
    pub const MEM2_SIZE: u32 = 0x0400_0000;
    /// Cached BAT mirror of physical memory.
    pub const CACHED_MIRROR_BASE: u32 = 0x8000_0000;
    /// Uncached BAT mirror of physical memory.
    pub const UNCACHED_MIRROR_BASE: u32 = 0xC000_0000;
    /// Mask that strips the mirror bits from a translated address.
    pub const MIRROR_MASK: u32 = 0x3FFF_FFFF;
}

/// Address space a host-side read is issued against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressSpace {
    /// Effective addresses, translated by the MMU.
    #[default]
    Virtual,
    /// Physical addresses, no translation.
    Physical,
}

/// Value produced by a successful host read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadResult<T> {
    /// `true` when the read went through virtual-to-physical translation.
    pub translated: bool,
    pub value: T,
}

impl<T> ReadResult<T> {
    pub fn new(translated: bool, value: T) -> Self {
        Self { translated, value }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ReadResult<U> {
        ReadResult {
            translated: self.translated,
            value: f(self.value),
        }
    }
}

/// Fallible, width-typed host reads from emulated memory.
///
/// Implementors only provide [`MemoryAccess::try_read_into`]; the typed
/// helpers decode big-endian values on top of it. A read fails as a whole
/// when any byte of it is not accessible in the requested space.
pub trait MemoryAccess {
    /// Whether data address translation (MSR.DR) is currently enabled.
    fn translation_enabled(&self) -> bool;

    /// Fills `buf` from `addr`, returning the translation flag on success.
    fn try_read_into(&self, addr: u32, space: AddressSpace, buf: &mut [u8]) -> Option<bool>;

    fn try_read_u8(&self, addr: u32, space: AddressSpace) -> Option<ReadResult<u8>> {
        let mut buf = [0u8; 1];
        let translated = self.try_read_into(addr, space, &mut buf)?;
        Some(ReadResult::new(translated, buf[0]))
    }

    fn try_read_u16(&self, addr: u32, space: AddressSpace) -> Option<ReadResult<u16>> {
        let mut buf = [0u8; 2];
        let translated = self.try_read_into(addr, space, &mut buf)?;
        Some(ReadResult::new(translated, u16::from_be_bytes(buf)))
    }

    fn try_read_u32(&self, addr: u32, space: AddressSpace) -> Option<ReadResult<u32>> {
        let mut buf = [0u8; 4];
        let translated = self.try_read_into(addr, space, &mut buf)?;
        Some(ReadResult::new(translated, u32::from_be_bytes(buf)))
    }

    fn try_read_u64(&self, addr: u32, space: AddressSpace) -> Option<ReadResult<u64>> {
        let mut buf = [0u8; 8];
        let translated = self.try_read_into(addr, space, &mut buf)?;
        Some(ReadResult::new(translated, u64::from_be_bytes(buf)))
    }

    fn try_read_f32(&self, addr: u32, space: AddressSpace) -> Option<ReadResult<f32>> {
        self.try_read_u32(addr, space).map(|r| r.map(f32::from_bits))
    }

    fn try_read_f64(&self, addr: u32, space: AddressSpace) -> Option<ReadResult<f64>> {
        self.try_read_u64(addr, space).map(|r| r.map(f64::from_bits))
    }
}

impl<T: MemoryAccess + ?Sized> MemoryAccess for &T {
    fn translation_enabled(&self) -> bool {
        (**self).translation_enabled()
    }

    fn try_read_into(&self, addr: u32, space: AddressSpace, buf: &mut [u8]) -> Option<bool> {
        (**self).try_read_into(addr, space, buf)
    }
}

/// Flat MEM1/MEM2 backing store with BAT-style virtual mirrors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmulatedMemory {
    mem1: Vec<u8>,
    mem2: Option<Vec<u8>>,
    translation_enabled: bool,
}

impl EmulatedMemory {
    /// GameCube layout: MEM1 only.
    pub fn gamecube() -> Self {
        Self {
            mem1: vec![0; layout::MEM1_SIZE as usize],
            mem2: None,
            translation_enabled: true,
        }
    }

    /// Wii layout: MEM1 plus MEM2.
    pub fn wii() -> Self {
        Self {
            mem1: vec![0; layout::MEM1_SIZE as usize],
            mem2: Some(vec![0; layout::MEM2_SIZE as usize]),
            translation_enabled: true,
        }
    }

    /// Builds MEM1 from a raw dump. Shorter images are zero-extended, longer
    /// ones are truncated to MEM1's size.
    pub fn from_mem1_image(image: &[u8]) -> Self {
        let mut mem = Self::gamecube();
        let len = image.len().min(mem.mem1.len());
        mem.mem1[..len].copy_from_slice(&image[..len]);
        if image.len() > len {
            tracing::warn!(
                "MEM1 image is {} bytes, truncating to {}",
                image.len(),
                layout::MEM1_SIZE
            );
        }
        mem
    }

    /// Toggles MSR.DR. With translation off only physical reads succeed.
    pub fn set_translation_enabled(&mut self, enabled: bool) {
        self.translation_enabled = enabled;
    }

    pub fn mem1(&self) -> &[u8] {
        &self.mem1
    }

    pub fn mem2(&self) -> Option<&[u8]> {
        self.mem2.as_deref()
    }

    /// Maps an effective address onto a physical one through the BAT mirrors.
    pub fn translate(&self, addr: u32) -> Option<u32> {
        if addr >= layout::CACHED_MIRROR_BASE {
            Some(addr & layout::MIRROR_MASK)
        } else {
            None
        }
    }

    fn physical_range(&self, paddr: u32, len: usize) -> Option<(&[u8], usize)> {
        let start = paddr as usize;
        let end = start.checked_add(len)?;
        if end <= self.mem1.len() {
            return Some((&self.mem1, start));
        }
        let mem2 = self.mem2.as_deref()?;
        let offset = start.checked_sub(layout::MEM2_BASE as usize)?;
        (offset + len <= mem2.len()).then_some((mem2, offset))
    }

    fn physical_range_mut(&mut self, paddr: u32, len: usize) -> Option<&mut [u8]> {
        let start = paddr as usize;
        let end = start.checked_add(len)?;
        if end <= self.mem1.len() {
            return Some(&mut self.mem1[start..end]);
        }
        let mem2 = self.mem2.as_deref_mut()?;
        let offset = start.checked_sub(layout::MEM2_BASE as usize)?;
        mem2.get_mut(offset..offset + len)
    }

    fn resolve(&self, addr: u32, space: AddressSpace) -> Option<(u32, bool)> {
        match space {
            AddressSpace::Physical => Some((addr, false)),
            AddressSpace::Virtual if self.translation_enabled => {
                self.translate(addr).map(|paddr| (paddr, true))
            }
            AddressSpace::Virtual => None,
        }
    }

    /// Writes raw bytes. Returns `false` when any byte is unmapped.
    pub fn write_bytes(&mut self, addr: u32, space: AddressSpace, data: &[u8]) -> bool {
        let Some((paddr, _)) = self.resolve(addr, space) else {
            return false;
        };
        match self.physical_range_mut(paddr, data.len()) {
            Some(dst) => {
                dst.copy_from_slice(data);
                true
            }
            None => false,
        }
    }

    pub fn write_u8(&mut self, addr: u32, space: AddressSpace, value: u8) -> bool {
        self.write_bytes(addr, space, &[value])
    }

    pub fn write_u16(&mut self, addr: u32, space: AddressSpace, value: u16) -> bool {
        self.write_bytes(addr, space, &value.to_be_bytes())
    }

    pub fn write_u32(&mut self, addr: u32, space: AddressSpace, value: u32) -> bool {
        self.write_bytes(addr, space, &value.to_be_bytes())
    }

    pub fn write_u64(&mut self, addr: u32, space: AddressSpace, value: u64) -> bool {
        self.write_bytes(addr, space, &value.to_be_bytes())
    }

    pub fn write_f32(&mut self, addr: u32, space: AddressSpace, value: f32) -> bool {
        self.write_u32(addr, space, value.to_bits())
    }

    pub fn write_f64(&mut self, addr: u32, space: AddressSpace, value: f64) -> bool {
        self.write_u64(addr, space, value.to_bits())
    }
}

impl Default for EmulatedMemory {
    fn default() -> Self {
        Self::gamecube()
    }
}

impl MemoryAccess for EmulatedMemory {
    fn translation_enabled(&self) -> bool {
        self.translation_enabled
    }

    fn try_read_into(&self, addr: u32, space: AddressSpace, buf: &mut [u8]) -> Option<bool> {
        let (paddr, translated) = self.resolve(addr, space)?;
        let (block, offset) = self.physical_range(paddr, buf.len())?;
        buf.copy_from_slice(&block[offset..offset + buf.len()]);
        Some(translated)
    }
}
