use crate::fault::Fault;

/// Stack window size in bytes.
pub const STACK_SIZE: u32 = 0x8000;

/// Where the stack grows down from when the image does not say otherwise.
pub const DEFAULT_STACK_TOP: u32 = 0x0020_0000;

/// A contiguous run of guest bytes placed at a virtual address.
#[derive(Debug, Default, Clone)]
pub struct Segment {
    pub vma: u32,
    pub bytes: Vec<u8>,
}

impl Segment {
    pub fn new(vma: u32, bytes: Vec<u8>) -> Self {
        Self { vma, bytes }
    }

    pub fn zeroed(vma: u32, size: u32) -> Self {
        Self {
            vma,
            bytes: vec![0; size as usize],
        }
    }

    fn contains(&self, address: u32) -> bool {
        !self.bytes.is_empty()
            && address >= self.vma
            && (address - self.vma) < self.bytes.len() as u32
    }

    fn end(&self) -> u32 {
        self.vma.wrapping_add(self.bytes.len() as u32)
    }

    fn read(&self, address: u32) -> u8 {
        self.bytes[(address - self.vma) as usize]
    }

    fn write(&mut self, address: u32, value: u8) {
        self.bytes[(address - self.vma) as usize] = value;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Text,
    Rodata,
    Data,
    Bss,
    Heap,
    Stack,
}

impl SegmentKind {
    fn is_writable(self) -> bool {
        !matches!(self, Self::Text | Self::Rodata)
    }
}

/// The guest address space: the image segments plus a heap filling the gap
/// up to the stack window. Every access is checked; an address no segment
/// claims is a segment fault, never wraparound into another one.
#[derive(Debug)]
pub struct Mmu {
    text: Segment,
    rodata: Segment,
    data: Segment,
    bss: Segment,
    heap: Segment,
    stack: Segment,
    entry_point: u32,
    stack_top: u32,
}

impl Mmu {
    pub fn new(
        entry_point: u32,
        text: Segment,
        rodata: Segment,
        data: Segment,
        bss: Segment,
        stack_top: u32,
    ) -> Self {
        let stack_low = stack_top - STACK_SIZE;
        let image_end = [&text, &rodata, &data, &bss]
            .iter()
            .map(|s| s.end())
            .max()
            .unwrap_or(0);
        let heap_size = stack_low.saturating_sub(image_end);
        let heap = Segment::zeroed(image_end, heap_size);
        let stack = Segment::zeroed(stack_low, STACK_SIZE);

        Self {
            text,
            rodata,
            data,
            bss,
            heap,
            stack,
            entry_point,
            stack_top,
        }
    }

    pub fn entry_point(&self) -> u32 {
        self.entry_point
    }

    pub fn stack_top(&self) -> u32 {
        self.stack_top
    }

    pub fn stack_size(&self) -> u32 {
        STACK_SIZE
    }

    pub fn heap_base(&self) -> u32 {
        self.heap.vma
    }

    pub fn heap_end(&self) -> u32 {
        self.heap.end()
    }

    pub fn heap_size(&self) -> u32 {
        self.heap.bytes.len() as u32
    }

    /// Maps an address to the segment owning it.
    pub fn resolve(&self, address: u32) -> Result<SegmentKind, Fault> {
        if self.text.contains(address) {
            Ok(SegmentKind::Text)
        } else if self.rodata.contains(address) {
            Ok(SegmentKind::Rodata)
        } else if self.data.contains(address) {
            Ok(SegmentKind::Data)
        } else if self.bss.contains(address) {
            Ok(SegmentKind::Bss)
        } else if self.heap.contains(address) {
            Ok(SegmentKind::Heap)
        } else if self.stack.contains(address) {
            Ok(SegmentKind::Stack)
        } else {
            Err(Fault::Segment { address })
        }
    }

    fn segment(&self, kind: SegmentKind) -> &Segment {
        match kind {
            SegmentKind::Text => &self.text,
            SegmentKind::Rodata => &self.rodata,
            SegmentKind::Data => &self.data,
            SegmentKind::Bss => &self.bss,
            SegmentKind::Heap => &self.heap,
            SegmentKind::Stack => &self.stack,
        }
    }

    fn segment_mut(&mut self, kind: SegmentKind) -> &mut Segment {
        match kind {
            SegmentKind::Text => &mut self.text,
            SegmentKind::Rodata => &mut self.rodata,
            SegmentKind::Data => &mut self.data,
            SegmentKind::Bss => &mut self.bss,
            SegmentKind::Heap => &mut self.heap,
            SegmentKind::Stack => &mut self.stack,
        }
    }

    pub fn read_byte(&self, address: u32) -> Result<u8, Fault> {
        let kind = self.resolve(address)?;
        Ok(self.segment(kind).read(address))
    }

    pub fn read_half(&self, address: u32) -> Result<u16, Fault> {
        if address & 1 != 0 {
            return Err(Fault::Alignment { address });
        }

        let low = self.read_byte(address)?;
        let high = self.read_byte(address.wrapping_add(1))?;
        Ok(u16::from_le_bytes([low, high]))
    }

    pub fn read_word(&self, address: u32) -> Result<u32, Fault> {
        if address & 3 != 0 {
            return Err(Fault::Alignment { address });
        }

        let mut bytes = [0_u8; 4];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = self.read_byte(address.wrapping_add(i as u32))?;
        }
        Ok(u32::from_le_bytes(bytes))
    }

    pub fn write_byte(&mut self, address: u32, value: u8) -> Result<(), Fault> {
        let kind = self.resolve(address)?;
        if !kind.is_writable() {
            return Err(Fault::Segment { address });
        }

        self.segment_mut(kind).write(address, value);
        Ok(())
    }

    pub fn write_half(&mut self, address: u32, value: u16) -> Result<(), Fault> {
        if address & 1 != 0 {
            return Err(Fault::Alignment { address });
        }

        for (i, byte) in value.to_le_bytes().into_iter().enumerate() {
            self.write_byte(address.wrapping_add(i as u32), byte)?;
        }
        Ok(())
    }

    pub fn write_word(&mut self, address: u32, value: u32) -> Result<(), Fault> {
        if address & 3 != 0 {
            return Err(Fault::Alignment { address });
        }

        for (i, byte) in value.to_le_bytes().into_iter().enumerate() {
            self.write_byte(address.wrapping_add(i as u32), byte)?;
        }
        Ok(())
    }

    /// Instruction fetch for the narrow engine. Only the text segment
    /// holds executable bytes.
    pub fn fetch_half(&self, address: u32) -> Result<u16, Fault> {
        if self.resolve(address)? != SegmentKind::Text {
            return Err(Fault::Segment { address });
        }
        self.read_half(address)
    }

    /// Instruction fetch for the wide engine.
    pub fn fetch_word(&self, address: u32) -> Result<u32, Fault> {
        if self.resolve(address)? != SegmentKind::Text {
            return Err(Fault::Segment { address });
        }
        self.read_word(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn mmu() -> Mmu {
        Mmu::new(
            0,
            Segment::new(0, vec![0; 0x1000]),
            Segment::new(0x1000, vec![0xAA; 0x100]),
            Segment::new(0x2000, vec![0; 0x100]),
            Segment::zeroed(0x2100, 0x100),
            0x1_0000,
        )
    }

    #[test]
    fn resolve_covers_every_segment() {
        let m = mmu();
        assert_eq!(m.resolve(0x0).unwrap(), SegmentKind::Text);
        assert_eq!(m.resolve(0xFFF).unwrap(), SegmentKind::Text);
        assert_eq!(m.resolve(0x1000).unwrap(), SegmentKind::Rodata);
        assert_eq!(m.resolve(0x2000).unwrap(), SegmentKind::Data);
        assert_eq!(m.resolve(0x2100).unwrap(), SegmentKind::Bss);
        assert_eq!(m.resolve(0x2200).unwrap(), SegmentKind::Heap);
        assert_eq!(m.resolve(0x7FFF).unwrap(), SegmentKind::Heap);
        assert_eq!(m.resolve(0x8000).unwrap(), SegmentKind::Stack);
        assert_eq!(m.resolve(0xFFFF).unwrap(), SegmentKind::Stack);
    }

    #[test]
    fn unmapped_address_faults() {
        let m = mmu();
        assert_eq!(
            m.resolve(0x1_0000),
            Err(Fault::Segment { address: 0x1_0000 })
        );
        assert_eq!(
            m.resolve(0xFFFF_FFFF),
            Err(Fault::Segment {
                address: 0xFFFF_FFFF
            })
        );
    }

    #[test]
    fn address_below_the_lowest_segment_faults() {
        let m = Mmu::new(
            0x8000,
            Segment::new(0x8000, vec![0; 0x100]),
            Segment::default(),
            Segment::default(),
            Segment::default(),
            0x2_0000,
        );
        assert_eq!(
            m.resolve(0x7FFF),
            Err(Fault::Segment { address: 0x7FFF })
        );
        assert_eq!(m.resolve(0x8000).unwrap(), SegmentKind::Text);
    }

    #[test]
    fn word_round_trip_in_heap() {
        let mut m = mmu();
        m.write_word(0x4000, 0xDEAD_BEEF).unwrap();
        assert_eq!(m.read_word(0x4000).unwrap(), 0xDEAD_BEEF);
        assert_eq!(m.read_byte(0x4000).unwrap(), 0xEF);
        assert_eq!(m.read_byte(0x4003).unwrap(), 0xDE);
    }

    #[test]
    fn read_only_segments_reject_writes() {
        let mut m = mmu();
        assert_eq!(
            m.write_byte(0x10, 1),
            Err(Fault::Segment { address: 0x10 })
        );
        assert_eq!(
            m.write_word(0x1000, 1),
            Err(Fault::Segment { address: 0x1000 })
        );
        assert!(m.read_word(0x1000).is_ok());
    }

    #[test]
    fn misaligned_accesses_fault() {
        let mut m = mmu();
        assert_eq!(m.read_word(0x4001), Err(Fault::Alignment { address: 0x4001 }));
        assert_eq!(m.read_half(0x4001), Err(Fault::Alignment { address: 0x4001 }));
        assert_eq!(
            m.write_word(0x4002, 0),
            Err(Fault::Alignment { address: 0x4002 })
        );
    }

    #[test]
    fn fetch_is_text_only() {
        let m = mmu();
        assert!(m.fetch_word(0).is_ok());
        assert_eq!(
            m.fetch_word(0x4000),
            Err(Fault::Segment { address: 0x4000 })
        );
        assert_eq!(
            m.fetch_half(0x8000),
            Err(Fault::Segment { address: 0x8000 })
        );
    }

    #[test]
    fn stack_round_trip_below_the_top() {
        let mut m = mmu();
        m.write_word(0xFFFC, 0xCAFE_F00D).unwrap();
        assert_eq!(m.read_word(0xFFFC).unwrap(), 0xCAFE_F00D);
        m.write_half(0x8000, 0x1234).unwrap();
        assert_eq!(m.read_half(0x8000).unwrap(), 0x1234);
        // The top itself is outside the window.
        assert_eq!(
            m.write_word(0x1_0000, 0),
            Err(Fault::Segment { address: 0x1_0000 })
        );
    }

    #[test]
    fn heap_fills_gap_between_image_and_stack() {
        let m = mmu();
        assert_eq!(m.heap_base(), 0x2200);
        assert_eq!(m.heap_end(), 0x8000);
        assert_eq!(m.stack_top(), 0x1_0000);
    }
}
