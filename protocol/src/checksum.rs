//! CRC-16 (Modbus variant) used in every frame trailer

/// Initial register value
pub const CRC_SEED: u16 = 0xFFFF;

/// Reflected polynomial 0x8005
pub const CRC_POLY: u16 = 0xA001;

/// Compute the CRC-16/MODBUS of `data`
///
/// The cube validates inbound frames with exactly this routine, so seed,
/// polynomial and bit order must not change.
pub fn crc16_modbus(data: &[u8]) -> u16 {
    let mut crc = CRC_SEED;
    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ CRC_POLY;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}
