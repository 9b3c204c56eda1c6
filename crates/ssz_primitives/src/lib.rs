//! Primitive value types shared by the SSZ Merkle-tree crates.
//!
//! Provides a dependency-light [`FixedBytes`] wrapper (no Ethereum-specific
//! primitive crate required), the [`Hash256`] alias used both for Merkle
//! roots and for 32-byte chunk payloads, and the wide unsigned integers
//! backed by [`ruint`].

use std::fmt;
use std::str::FromStr;

#[cfg(feature = "rand")]
use rand::RngCore;
use ruint::Uint;

/// A 256-bit unsigned integer type.
pub type U256 = Uint<256, 4>;

/// A 128-bit unsigned integer type.
pub type U128 = Uint<128, 2>;

/// A 256-bit hash; also the payload of a single Merkle chunk (32 bytes).
pub type Hash256 = FixedBytes<32>;

/// A fixed-size byte array with convenient constructors.
///
/// A simple wrapper around `[u8; N]`, ordered lexicographically and
/// hex-printable with a `0x` prefix.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FixedBytes<const N: usize>(pub [u8; N]);

impl<const N: usize> FixedBytes<N> {
    /// Create a new `FixedBytes` filled with zeros.
    pub const fn zero() -> Self {
        Self([0u8; N])
    }

    /// Create filled with a specific byte.
    pub const fn repeat_byte(byte: u8) -> Self {
        Self([byte; N])
    }

    /// Create from a slice, zero-padding on the right if it is short.
    pub fn from_slice(slice: &[u8]) -> Self {
        let mut result = [0u8; N];
        let len = slice.len().min(N);
        result[..len].copy_from_slice(&slice[..len]);
        Self(result)
    }

    /// Create a new `FixedBytes` filled with random bytes.
    #[cfg(feature = "rand")]
    pub fn random() -> Self {
        let mut bytes = Self::zero();
        rand::thread_rng().fill_bytes(&mut bytes.0);
        bytes
    }

    /// Create from a hex string (with or without a `0x` prefix).
    pub fn from_hex_str(s: &str) -> Result<Self, hex::FromHexError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        if bytes.len() != N {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut result = [0u8; N];
        result.copy_from_slice(&bytes);
        Ok(Self(result))
    }

    /// Get as a byte slice.
    pub const fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Convert to the inner byte array.
    pub const fn into_inner(self) -> [u8; N] {
        self.0
    }

    /// Whether every byte is zero.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl<const N: usize> From<[u8; N]> for FixedBytes<N> {
    fn from(bytes: [u8; N]) -> Self {
        Self(bytes)
    }
}

impl<const N: usize> AsRef<[u8]> for FixedBytes<N> {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl<const N: usize> AsMut<[u8]> for FixedBytes<N> {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl<const N: usize> Default for FixedBytes<N> {
    fn default() -> Self {
        Self::zero()
    }
}

impl<const N: usize> FromStr for FixedBytes<N> {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex_str(s)
    }
}

impl<const N: usize> fmt::Display for FixedBytes<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl<const N: usize> fmt::Debug for FixedBytes<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Hash256 {
    /// A hash filled with zeros.
    pub const ZERO: Self = Self::zero();

    /// Chunk holding a little-endian `u64` zero-padded to 32 bytes.
    ///
    /// This is the SSZ hash-tree-root of every unsigned integer that fits
    /// in 64 bits, and the payload of list length leaves.
    pub fn from_u64_le(value: u64) -> Self {
        let mut chunk = [0u8; 32];
        chunk[..8].copy_from_slice(&value.to_le_bytes());
        Self(chunk)
    }

    /// Read the low 8 bytes as a little-endian `u64`.
    ///
    /// Returns `None` if any of the upper 24 bytes is nonzero.
    pub fn try_to_u64_le(&self) -> Option<u64> {
        if self.0[8..].iter().any(|b| *b != 0) {
            return None;
        }
        let mut le = [0u8; 8];
        le.copy_from_slice(&self.0[..8]);
        Some(u64::from_le_bytes(le))
    }

    /// Chunk holding a little-endian `U128` zero-padded to 32 bytes.
    pub fn from_u128_le(value: U128) -> Self {
        let mut chunk = [0u8; 32];
        chunk[..16].copy_from_slice(&value.to_le_bytes::<16>());
        Self(chunk)
    }

    /// Chunk holding a little-endian `U256`.
    pub fn from_u256_le(value: U256) -> Self {
        Self(value.to_le_bytes::<32>())
    }

    /// Read the low 16 bytes as a little-endian `U128`.
    pub fn to_u128_le(&self) -> U128 {
        let mut le = [0u8; 16];
        le.copy_from_slice(&self.0[..16]);
        U128::from_le_bytes::<16>(le)
    }

    /// Read all 32 bytes as a little-endian `U256`.
    pub fn to_u256_le(&self) -> U256 {
        U256::from_le_bytes::<32>(self.0)
    }
}

impl From<U256> for Hash256 {
    fn from(value: U256) -> Self {
        Self::from_u256_le(value)
    }
}
