//! SFDP discovery
//!
//! Reads the SFDP header, the parameter headers and the two tables the NOR
//! engine understands.

use core::fmt;

use crate::error::{Error, IoFailure};
use crate::protocol::spi25;
use crate::transport::Transport;

use super::types::*;

/// Reasons discovery can fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryError {
    /// Header signature was not "SFDP"
    BadSignature,
    /// No Basic Flash Parameter Table among the parameter headers
    MissingBasicTable,
    /// The transport failed
    Transport,
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadSignature => write!(f, "SFDP signature mismatch"),
            Self::MissingBasicTable => write!(f, "no basic flash parameter table"),
            Self::Transport => write!(f, "transport failed during SFDP read"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DiscoveryError {}

impl From<DiscoveryError> for Error {
    fn from(e: DiscoveryError) -> Self {
        match e {
            DiscoveryError::BadSignature => Error::Io(IoFailure::BadSignature),
            DiscoveryError::MissingBasicTable => Error::Io(IoFailure::MissingBasicTable),
            DiscoveryError::Transport => Error::Io(IoFailure::Transport),
        }
    }
}

fn read<T: Transport + ?Sized>(
    transport: &mut T,
    addr: u32,
    buf: &mut [u8],
) -> Result<(), DiscoveryError> {
    spi25::read_sfdp(transport, addr, buf).map_err(|_| DiscoveryError::Transport)
}

/// Copy little-endian bytes into DWORDs
fn fill_dwords(bytes: &[u8], words: &mut [u32]) {
    for (word, chunk) in words.iter_mut().zip(bytes.chunks(4)) {
        let mut raw = [0u8; 4];
        raw[..chunk.len()].copy_from_slice(chunk);
        *word = u32::from_le_bytes(raw);
    }
}

/// Read and capture the SFDP parameter tables
///
/// The header is read at address 0 and must carry the "SFDP" signature.
/// Up to ten parameter headers follow at address 8. The Basic Flash
/// Parameter Table (at most 23 DWORDs) and the 4-Byte Address Instruction
/// Table are copied out; any other table is skipped. When the same ID
/// appears twice the later table wins.
///
/// # Example
///
/// ```ignore
/// let tables = sfdp::discover(&mut transport)?;
/// let params = tables.basic_params();
/// println!("Flash size: {} bytes", params.density_bytes);
/// ```
pub fn discover<T: Transport + ?Sized>(transport: &mut T) -> Result<ParameterTables, DiscoveryError> {
    let mut buf = [0u8; 8];
    read(transport, 0x00, &mut buf)?;
    let header = SfdpHeader::parse(&buf);

    if !header.is_valid() {
        log::debug!(
            "SFDP signature invalid: 0x{:08X} (expected 0x{:08X})",
            header.signature,
            SFDP_SIGNATURE
        );
        return Err(DiscoveryError::BadSignature);
    }

    log::debug!(
        "SFDP revision {}, {} parameter header(s)",
        header.revision,
        header.nph as usize + 1
    );

    let mut tables = ParameterTables {
        header,
        ..Default::default()
    };

    let count = header.num_param_headers();
    let mut raw = [0u8; MAX_PARAMETER_HEADERS * 8];
    read(transport, 0x08, &mut raw[..count * 8])?;

    let mut found_basic = false;
    let mut table_buf = [0u8; BFPT_MAX_DWORDS * 4];

    for chunk in raw[..count * 8].chunks_exact(8) {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(chunk);
        let param = ParameterHeader::parse(&bytes);
        // Capacity equals the header cap, so this never fails
        let _ = tables.headers.push(param);

        log::debug!(
            "parameter table 0x{:04X} rev {} at 0x{:06X}, {} DWORDs",
            param.id,
            param.revision,
            param.table_pointer,
            param.length_dwords
        );

        if !param.is_basic() && !param.is_four_byte() {
            log::trace!("skipping parameter table 0x{:04X}", param.id);
            continue;
        }

        let len = core::cmp::min(param.length_bytes(), table_buf.len());
        if len == 0 {
            log::trace!("parameter table 0x{:04X} is empty", param.id);
            continue;
        }
        let data = &mut table_buf[..len];
        read(transport, param.table_pointer, data)?;

        if param.is_basic() {
            tables.basic = [0; BFPT_MAX_DWORDS];
            fill_dwords(data, &mut tables.basic);
            tables.basic_len = len;
            found_basic = true;
        } else {
            tables.four_byte = [0; FOUR_BYTE_TABLE_DWORDS];
            fill_dwords(data, &mut tables.four_byte);
            tables.four_byte_enabled = true;
        }
    }

    if !found_basic {
        return Err(DiscoveryError::MissingBasicTable);
    }

    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spi::opcodes;
    use crate::transport::mock::MockTransport;

    /// SFDP data from the MX25L6436E datasheet (JESD216 rev 1.0, 9 DWORD BFPT)
    const MX25L6436E_SFDP: [u8; 0x58] = [
        0x53, 0x46, 0x44, 0x50, // @0x00: "SFDP"
        0x00, 0x01, 0x01, 0xFF, // @0x04: revision 1.0, 2 headers
        0x00, 0x00, 0x01, 0x09, // @0x08: JEDEC basic header, 9 DW
        0x1C, 0x00, 0x00, 0xFF, // @0x0C: pointer 0x1C
        0xC2, 0x00, 0x01, 0x04, // @0x10: Macronix header, 4 DW
        0x48, 0x00, 0x00, 0xFF, // @0x14: pointer 0x48
        0xFF, 0xFF, 0xFF, 0xFF, // @0x18
        0xE5, 0x20, 0xC9, 0xFF, // @0x1C: DWORD 1
        0xFF, 0xFF, 0xFF, 0x03, // @0x20: DWORD 2 - density
        0x00, 0xFF, 0x08, 0x6B, // @0x24: DWORD 3
        0x08, 0x3B, 0x00, 0xFF, // @0x28: DWORD 4
        0xEE, 0xFF, 0xFF, 0xFF, // @0x2C: DWORD 5
        0xFF, 0xFF, 0x00, 0x00, // @0x30: DWORD 6
        0xFF, 0xFF, 0x00, 0xFF, // @0x34: DWORD 7
        0x0C, 0x20, 0x0F, 0x52, // @0x38: DWORD 8 - erase types
        0x10, 0xD8, 0x00, 0xFF, // @0x3C: DWORD 9 - erase types
        0xFF, 0xFF, 0xFF, 0xFF, // @0x40
        0xFF, 0xFF, 0xFF, 0xFF, // @0x44
        0x00, 0x36, 0x00, 0x27, // @0x48: Macronix table
        0xF4, 0x4F, 0xFF, 0xFF, // @0x4C
        0xD9, 0xC8, 0xFF, 0xFF, // @0x50
        0xFF, 0xFF, 0xFF, 0xFF, // @0x54
    ];

    fn sfdp_mock(image: &'static [u8]) -> MockTransport {
        MockTransport::new(move |rec, buf| {
            let addr = rec.address.unwrap_or(0) as usize;
            for (i, b) in buf.iter_mut().enumerate() {
                *b = image.get(addr + i).copied().unwrap_or(0xFF);
            }
        })
    }

    #[test]
    fn test_header_parse() {
        let data = [0x53, 0x46, 0x44, 0x50, 0x06, 0x01, 0x00, 0xFF];
        let header = SfdpHeader::parse(&data);
        assert!(header.is_valid());
        assert_eq!(header.revision, SfdpRevision::new(1, 6));
        assert_eq!(header.num_param_headers(), 1);
    }

    #[test]
    fn test_header_count_is_capped() {
        let data = [0x53, 0x46, 0x44, 0x50, 0x06, 0x01, 0x20, 0xFF];
        assert_eq!(SfdpHeader::parse(&data).num_param_headers(), 10);
    }

    #[test]
    fn test_param_header_parse() {
        let data = [0x84, 0x00, 0x01, 0x02, 0xC0, 0x00, 0x00, 0xFF];
        let header = ParameterHeader::parse(&data);
        assert!(header.is_four_byte());
        assert_eq!(header.length_bytes(), 8);
        assert_eq!(header.table_pointer, 0xC0);
    }

    #[test]
    fn test_discover_mx25l6436e() {
        let mut mock = sfdp_mock(&MX25L6436E_SFDP);
        let tables = discover(&mut mock).unwrap();

        assert_eq!(tables.headers.len(), 2);
        assert_eq!(tables.basic_len, 36);
        assert!(!tables.four_byte_enabled);

        let params = tables.basic_params();
        assert_eq!(params.density_bytes, 8 * 1024 * 1024);
        assert_eq!(params.page_size, 256);
        assert_eq!(params.erase_types[0], SfdpEraseType { opcode: 0x20, size: 4096 });
        assert_eq!(params.erase_types[1], SfdpEraseType { opcode: 0x52, size: 32768 });
        assert_eq!(params.erase_types[2], SfdpEraseType { opcode: 0xD8, size: 65536 });
        assert!(!params.erase_types[3].is_valid());

        assert!(params.fast_read_112);
        assert!(params.fast_read_114);
        assert!(!params.fast_read_144);
        assert!(!params.fast_read_122);
        assert_eq!(params.fast_read_112_params.opcode, 0x3B);
        assert_eq!(params.fast_read_112_params.wait_clocks(), 8);
        assert_eq!(params.fast_read_114_params.opcode, 0x6B);
        assert_eq!(params.fast_read_114_params.wait_clocks(), 8);
        assert_eq!(params.quad_enable, QuadEnableRequirement::Ignore);

        // Header, parameter headers, BFPT; the vendor table is never read
        let reads = mock.with_opcode(opcodes::RDSFDP);
        assert_eq!(reads.len(), 3);
        assert_eq!(reads[1].read_len, 16);
        assert_eq!(reads[2].address, Some(0x1C));
    }

    #[test]
    fn test_bad_signature() {
        static IMAGE: [u8; 8] = [0x53, 0x46, 0x44, 0x51, 0x00, 0x01, 0x00, 0xFF];
        let mut mock = sfdp_mock(&IMAGE);
        assert_eq!(discover(&mut mock), Err(DiscoveryError::BadSignature));
        assert_eq!(mock.log.len(), 1);
    }

    #[test]
    fn test_missing_basic_table() {
        static IMAGE: [u8; 16] = [
            0x53, 0x46, 0x44, 0x50, 0x06, 0x01, 0x00, 0xFF, //
            0xC2, 0x00, 0x01, 0x04, 0x48, 0x00, 0x00, 0xFF,
        ];
        let mut mock = sfdp_mock(&IMAGE);
        assert_eq!(discover(&mut mock), Err(DiscoveryError::MissingBasicTable));
    }

    #[test]
    fn test_zero_length_table_is_not_read() {
        static IMAGE: [u8; 16] = [
            0x53, 0x46, 0x44, 0x50, 0x06, 0x01, 0x00, 0xFF, //
            0x00, 0x06, 0x01, 0x00, 0x80, 0x00, 0x00, 0xFF,
        ];
        let mut mock = sfdp_mock(&IMAGE);
        assert_eq!(discover(&mut mock), Err(DiscoveryError::MissingBasicTable));
        assert_eq!(mock.log.len(), 2);
    }

    #[test]
    fn test_transport_failure() {
        let mut mock = sfdp_mock(&MX25L6436E_SFDP);
        mock.fail_at = Some(1);
        assert_eq!(discover(&mut mock), Err(DiscoveryError::Transport));
        let err: Error = DiscoveryError::Transport.into();
        assert_eq!(err.code(), -4);
    }
}
