// archive.rs - Little-endian primitives and the archive header
//
// Everything is written without padding. Strings are a u32 byte length
// followed by UTF-8.

use std::fmt;
use std::io::{Read, Write};

use crate::error::{EcsError, EcsResult};
use crate::math::{Quat, Vec3};

/// Bytes at the head and tail of every archive.
pub const MAGIC: &[u8; 4] = b"LECS";

/// Recommended file extension for world archives.
pub const ARCHIVE_EXTENSION: &str = "lecs";

/// Format version written by this build.
pub const FORMAT_VERSION: ArchiveVersion = ArchiveVersion {
    major: 1,
    minor: 1,
    patch: 0,
};

/// Format revision stored after the leading magic.
///
/// A minor bump adds sections, so a reader refuses minors newer than its
/// own. Patch levels never change the layout and are always accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ArchiveVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
}

impl ArchiveVersion {
    /// Archives with entity names and flags after the component section.
    pub fn has_metadata(&self) -> bool {
        self.minor >= 1
    }

    /// Same major, and no sections newer than this build understands.
    pub fn is_readable(&self) -> bool {
        self.major == FORMAT_VERSION.major && self.minor <= FORMAT_VERSION.minor
    }
}

impl fmt::Display for ArchiveVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

pub fn write_header<W: Write + ?Sized>(w: &mut W, version: ArchiveVersion) -> EcsResult<()> {
    w.write_all(MAGIC)?;
    write_u16(w, version.major)?;
    write_u16(w, version.minor)?;
    write_u16(w, version.patch)?;
    Ok(())
}

/// Read the magic and version. Rejects unknown magic and unreadable versions.
pub fn read_header<R: Read + ?Sized>(r: &mut R) -> EcsResult<ArchiveVersion> {
    expect_magic(r, "header")?;
    let version = ArchiveVersion {
        major: read_u16(r)?,
        minor: read_u16(r)?,
        patch: read_u16(r)?,
    };
    if !version.is_readable() {
        return Err(EcsError::UnsupportedVersion {
            found: version.to_string(),
            supported: FORMAT_VERSION.to_string(),
        });
    }
    Ok(version)
}

pub fn expect_magic<R: Read + ?Sized>(r: &mut R, what: &str) -> EcsResult<()> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(EcsError::format(format!("bad {what} magic {magic:02x?}")));
    }
    Ok(())
}

pub fn write_u8<W: Write + ?Sized>(w: &mut W, v: u8) -> EcsResult<()> {
    w.write_all(&[v])?;
    Ok(())
}

pub fn write_u16<W: Write + ?Sized>(w: &mut W, v: u16) -> EcsResult<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub fn write_u32<W: Write + ?Sized>(w: &mut W, v: u32) -> EcsResult<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub fn write_u64<W: Write + ?Sized>(w: &mut W, v: u64) -> EcsResult<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub fn write_f32<W: Write + ?Sized>(w: &mut W, v: f32) -> EcsResult<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub fn write_str<W: Write + ?Sized>(w: &mut W, s: &str) -> EcsResult<()> {
    let len = u32::try_from(s.len())
        .map_err(|_| EcsError::usage(format!("string of {} bytes is too long to archive", s.len())))?;
    write_u32(w, len)?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

pub fn write_vec3<W: Write + ?Sized>(w: &mut W, v: Vec3) -> EcsResult<()> {
    for c in v.to_array() {
        write_f32(w, c)?;
    }
    Ok(())
}

/// Quaternions go out as x, y, z, w.
pub fn write_quat<W: Write + ?Sized>(w: &mut W, q: Quat) -> EcsResult<()> {
    for c in q.to_array() {
        write_f32(w, c)?;
    }
    Ok(())
}

pub fn read_u8<R: Read + ?Sized>(r: &mut R) -> EcsResult<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

pub fn read_u16<R: Read + ?Sized>(r: &mut R) -> EcsResult<u16> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

pub fn read_u32<R: Read + ?Sized>(r: &mut R) -> EcsResult<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub fn read_u64<R: Read + ?Sized>(r: &mut R) -> EcsResult<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

pub fn read_f32<R: Read + ?Sized>(r: &mut R) -> EcsResult<f32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

/// Read a length-prefixed string. The length is trusted only as far as the
/// stream actually delivers bytes.
pub fn read_string<R: Read + ?Sized>(r: &mut R) -> EcsResult<String> {
    let len = read_u32(r)? as u64;
    let mut bytes = Vec::new();
    r.take(len).read_to_end(&mut bytes)?;
    if bytes.len() as u64 != len {
        return Err(EcsError::format(format!("truncated string ({} of {len} bytes)", bytes.len())));
    }
    String::from_utf8(bytes).map_err(|e| EcsError::format(format!("string is not UTF-8: {e}")))
}

pub fn read_vec3<R: Read + ?Sized>(r: &mut R) -> EcsResult<Vec3> {
    Ok(Vec3::new(read_f32(r)?, read_f32(r)?, read_f32(r)?))
}

pub fn read_quat<R: Read + ?Sized>(r: &mut R) -> EcsResult<Quat> {
    Ok(Quat::from_xyzw(read_f32(r)?, read_f32(r)?, read_f32(r)?, read_f32(r)?))
}
