use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use hound_core::{Error, Result};

pub const MAGIC: &[u8; 4] = b"HNDX";
pub const VERSION: u32 = 1;

/// The commit record for one index generation (§4.1). Written last during
/// a build; its absence on disk means the generation never finished and is
/// eligible for GC (§6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub version: u32,
    pub generation: u32,
    pub file_count: u32,
    pub trigram_count: u32,
    pub created_at: u64,
}

impl Manifest {
    pub fn write<W: Write>(&self, mut w: W) -> Result<()> {
        w.write_all(MAGIC)?;
        w.write_u32::<LittleEndian>(self.version)?;
        w.write_u32::<LittleEndian>(self.generation)?;
        w.write_u32::<LittleEndian>(self.file_count)?;
        w.write_u32::<LittleEndian>(self.trigram_count)?;
        w.write_u64::<LittleEndian>(self.created_at)?;
        Ok(())
    }

    pub fn read<R: Read>(mut r: R) -> Result<Manifest> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)
            .map_err(|e| corrupt_or_io(e, "manifest too short"))?;
        if &magic != MAGIC {
            return Err(Error::CorruptIndex("bad manifest magic".into()));
        }
        let version = r
            .read_u32::<LittleEndian>()
            .map_err(|e| corrupt_or_io(e, "manifest too short: version"))?;
        if version != VERSION {
            return Err(Error::CorruptIndex(format!(
                "unsupported manifest version {version}"
            )));
        }
        let generation = r
            .read_u32::<LittleEndian>()
            .map_err(|e| corrupt_or_io(e, "manifest too short: generation"))?;
        let file_count = r
            .read_u32::<LittleEndian>()
            .map_err(|e| corrupt_or_io(e, "manifest too short: file_count"))?;
        let trigram_count = r
            .read_u32::<LittleEndian>()
            .map_err(|e| corrupt_or_io(e, "manifest too short: trigram_count"))?;
        let created_at = r
            .read_u64::<LittleEndian>()
            .map_err(|e| corrupt_or_io(e, "manifest too short: created_at"))?;
        Ok(Manifest {
            version,
            generation,
            file_count,
            trigram_count,
            created_at,
        })
    }
}

fn corrupt_or_io(e: io::Error, msg: &str) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::CorruptIndex(msg.to_string())
    } else {
        Error::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let manifest = Manifest {
            version: VERSION,
            generation: 7,
            file_count: 42,
            trigram_count: 1000,
            created_at: 1_700_000_000,
        };
        let mut buf = Vec::new();
        manifest.write(&mut buf).unwrap();
        let parsed = Manifest::read(&buf[..]).unwrap();
        assert_eq!(manifest, parsed);
    }

    #[test]
    fn rejects_bad_magic() {
        let buf = [0u8; 24];
        assert!(matches!(
            Manifest::read(&buf[..]),
            Err(Error::CorruptIndex(_))
        ));
    }

    #[test]
    fn rejects_short_read() {
        let buf = [b'H', b'N', b'D'];
        assert!(matches!(
            Manifest::read(&buf[..]),
            Err(Error::CorruptIndex(_))
        ));
    }

    #[test]
    fn rejects_truncation_after_magic() {
        // Magic plus a version field cut off partway through: every field
        // read after the magic must still map a short read to
        // `CorruptIndex`, not `Error::Io` (§4.1).
        let mut buf = MAGIC.to_vec();
        buf.extend_from_slice(&[1, 0]);
        assert!(matches!(
            Manifest::read(&buf[..]),
            Err(Error::CorruptIndex(_))
        ));
    }

    #[test]
    fn rejects_truncation_mid_trailing_fields() {
        // Magic, a valid version, generation and file_count, but cut off
        // before trigram_count/created_at.
        let mut buf = Vec::new();
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&VERSION.to_le_bytes());
        buf.extend_from_slice(&7u32.to_le_bytes());
        buf.extend_from_slice(&42u32.to_le_bytes());
        assert!(matches!(
            Manifest::read(&buf[..]),
            Err(Error::CorruptIndex(_))
        ));
    }
}
