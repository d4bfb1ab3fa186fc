//! Curve parameters and wire constants

/// secp256k1 field prime: P = 2^256 - 2^32 - 977
pub const SECP256K1_P: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xfe, 0xff, 0xff, 0xfc, 0x2f,
];

/// secp256k1 curve coefficient a
pub const SECP256K1_A: u32 = 0;

/// secp256k1 curve coefficient b
pub const SECP256K1_B: u32 = 7;

/// Generator x-coordinate
pub const SECP256K1_GX: [u8; 32] = [
    0x79, 0xbe, 0x66, 0x7e, 0xf9, 0xdc, 0xbb, 0xac,
    0x55, 0xa0, 0x62, 0x95, 0xce, 0x87, 0x0b, 0x07,
    0x02, 0x9b, 0xfc, 0xdb, 0x2d, 0xce, 0x28, 0xd9,
    0x59, 0xf2, 0x81, 0x5b, 0x16, 0xf8, 0x17, 0x98,
];

/// Generator y-coordinate
pub const SECP256K1_GY: [u8; 32] = [
    0x48, 0x3a, 0xda, 0x77, 0x26, 0xa3, 0xc4, 0x65,
    0x5d, 0xa4, 0xfb, 0xfc, 0x0e, 0x11, 0x08, 0xa8,
    0xfd, 0x17, 0xb4, 0x48, 0xa6, 0x85, 0x54, 0x19,
    0x9c, 0x47, 0xd0, 0x8f, 0xfb, 0x10, 0xd4, 0xb8,
];

/// Order of the generator
pub const SECP256K1_N: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe,
    0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b,
    0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36, 0x41, 0x41,
];

/// Maximum length of a single data push
pub const MAX_PUSH_SIZE: usize = 520;

/// Largest push that fits a direct length byte
pub const MAX_DIRECT_PUSH: usize = 75;

/// Script numbers are limited to 4 bytes
pub const MAX_SCRIPT_NUM_SIZE: usize = 4;

/// Sighash flag committing to all inputs and outputs
pub const SIGHASH_ALL: u32 = 1;

/// Default input sequence
pub const SEQUENCE_FINAL: u32 = 0xffffffff;

/// Base58 alphabet without 0, O, I and l
pub const BASE58_ALPHABET: &[u8; 58] =
    b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

pub const MAINNET_P2PKH_PREFIX: u8 = 0x00;
pub const TESTNET_P2PKH_PREFIX: u8 = 0x6f;
pub const MAINNET_P2SH_PREFIX: u8 = 0x05;
pub const TESTNET_P2SH_PREFIX: u8 = 0xc4;
