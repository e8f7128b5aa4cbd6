//! CPU register access.

use vsp_protocol::VspError;

use crate::connection::Connection;

/// One named register of a [`crate::Target`]. `size_bytes` is
/// established once, at enumeration time: it never
/// changes for the lifetime of the register.
#[derive(Debug, Clone)]
pub struct CpuReg {
    pub(crate) name: String,
    pub(crate) size_bytes: usize,
}

impl CpuReg {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    /// Reads the register's current bytes, index 0 = least significant
    /// byte (little-endian, per the register's documented wire layout).
    pub fn get_value(&self, conn: &Connection, target: &str) -> Result<Vec<u8>, VspError> {
        let cmd = format!("getr,{},{}", target, self.name);
        let resp = conn.command(&cmd).ok_or(VspError::TransportClosed)?;
        if resp.len() != self.size_bytes + 1 || resp[0] != "OK" {
            return Err(VspError::ProtocolShape {
                expected: format!("OK + {} byte fields", self.size_bytes),
                got: format!("{} fields", resp.len()),
            });
        }

        resp[1..]
            .iter()
            .map(|field| {
                u8::from_str_radix(field, 16).map_err(|_| VspError::TransportCorruption(format!(
                    "register byte {:?} is not valid hex",
                    field
                )))
            })
            .collect()
    }

    /// Writes `bytes` (must be exactly `size_bytes` long, little-endian).
    pub fn set_value(&self, conn: &Connection, target: &str, bytes: &[u8]) -> Result<(), VspError> {
        if bytes.len() != self.size_bytes {
            return Err(VspError::ArgumentMismatch { expected: self.size_bytes, got: bytes.len() });
        }

        let byte_fields: Vec<String> = bytes.iter().map(|b| b.to_string()).collect();
        let cmd = format!("setr,{},{},{}", target, self.name, byte_fields.join(","));
        let resp = conn.command(&cmd).ok_or(VspError::TransportClosed)?;
        // setr may reply with a bare `OK` or `OK,<echo>`.
        if resp.is_empty() || resp[0] != "OK" || resp.len() > 2 {
            return Err(VspError::ProtocolShape {
                expected: "OK or OK,<field>".to_string(),
                got: format!("{} fields", resp.len()),
            });
        }
        Ok(())
    }

    /// Convenience accessor for registers up to 8 bytes wide, decoded
    /// little-endian (index 0 = lowest byte).
    pub fn get_u64(&self, conn: &Connection, target: &str) -> Result<u64, VspError> {
        let bytes = self.get_value(conn, target)?;
        if bytes.len() > 8 {
            return Err(VspError::Semantic { what: format!("register {} wider than 8 bytes", self.name) });
        }
        let mut value: u64 = 0;
        for (i, byte) in bytes.iter().enumerate() {
            value |= (*byte as u64) << (8 * i);
        }
        Ok(value)
    }
}
