//! CRC-16/CCITT-FALSE (poly 0x1021, init 0xFFFF, no reflection, no xor-out).

/// Initial register value.
pub const CRC16_INIT: u16 = 0xFFFF;

const POLY: u16 = 0x1021;

static TABLE: [u16; 256] = build_table();

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ POLY
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// CRC of `data` starting from [`CRC16_INIT`].
pub fn crc16(data: &[u8]) -> u16 {
    crc16_update(CRC16_INIT, data)
}

/// Continue a running CRC over more bytes.
pub fn crc16_update(crc: u16, data: &[u8]) -> u16 {
    data.iter().fold(crc, |crc, &byte| {
        (crc << 8) ^ TABLE[usize::from((crc >> 8) as u8 ^ byte)]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_init_value() {
        assert_eq!(crc16(&[]), 0xFFFF);
    }

    #[test]
    fn standard_check_value() {
        assert_eq!(crc16(b"123456789"), 0x29B1);
    }

    #[test]
    fn table_edges() {
        assert_eq!(TABLE[0], 0x0000);
        assert_ne!(TABLE[255], 0x0000);
    }

    #[test]
    fn incremental_matches_one_shot() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06];
        let split = crc16_update(crc16(&data[..2]), &data[2..]);
        assert_eq!(split, crc16(&data));
    }

    #[test]
    fn single_bit_flip_changes_crc() {
        let mut data: Vec<u8> = (0..1024u32).map(|i| i as u8).collect();
        let before = crc16(&data);
        data[512] ^= 0x01;
        assert_ne!(before, crc16(&data));
    }

    #[test]
    fn zeros_and_ones_move_off_init() {
        assert_ne!(crc16(&[0u8; 16]), 0x0000);
        assert_ne!(crc16(&[0xFFu8; 16]), 0xFFFF);
    }
}
