//! Running checksums: CRC-32 for job integrity, Adler-32 for zlib framing.

/// CRC-32 (IEEE) of uncompressed data, resumable across chunks.
#[derive(Debug, Clone, Default)]
pub struct Crc32 {
    hasher: crc32fast::Hasher,
}

impl Crc32 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    pub fn value(&self) -> u32 {
        self.hasher.clone().finalize()
    }
}

const ADLER_MOD: u32 = 65_521;
/// Largest run of bytes before the sums must be reduced to stay within u32.
const ADLER_NMAX: usize = 5_552;

/// Adler-32, resumable across chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adler32 {
    a: u32,
    b: u32,
}

impl Default for Adler32 {
    fn default() -> Self {
        Self { a: 1, b: 0 }
    }
}

impl Adler32 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        for block in data.chunks(ADLER_NMAX) {
            for &byte in block {
                self.a += byte as u32;
                self.b += self.a;
            }
            self.a %= ADLER_MOD;
            self.b %= ADLER_MOD;
        }
    }

    pub fn value(&self) -> u32 {
        (self.b << 16) | self.a
    }
}

pub fn adler32(data: &[u8]) -> u32 {
    let mut adler = Adler32::new();
    adler.update(data);
    adler.value()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adler32_reference_value() {
        assert_eq!(adler32(b"Wikipedia"), 0x11E6_0398);
        assert_eq!(adler32(b""), 1);
    }

    #[test]
    fn test_checksums_resume_across_chunks() {
        let data: Vec<u8> = (0..20_000u32).map(|i| (i * 31 % 251) as u8).collect();
        let mut crc = Crc32::new();
        let mut adler = Adler32::new();
        for chunk in data.chunks(777) {
            crc.update(chunk);
            adler.update(chunk);
        }
        assert_eq!(crc.value(), crc32fast::hash(&data));
        assert_eq!(adler.value(), adler32(&data));
    }
}
