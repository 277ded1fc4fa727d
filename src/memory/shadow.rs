//! Concrete memory standing in for the native address space.
//!
//! When execution leaves the VM for an external call, the concrete planes of
//! all ordinary objects are blitted out to native memory and read back
//! afterwards. `ShadowMemory` is that native side: a sparse byte store
//! addressed by the objects' concrete base addresses.

use std::collections::BTreeMap;

/// A sparse concrete byte store. Unmapped bytes read as zero.
#[derive(Clone, Debug, Default)]
pub struct ShadowMemory {
    bytes: BTreeMap<u64, u8>,
}

impl ShadowMemory {
    pub fn new() -> ShadowMemory {
        ShadowMemory {
            bytes: BTreeMap::new(),
        }
    }

    /// Write a span of bytes at the given address.
    pub fn write(&mut self, address: u64, bytes: &[u8]) {
        for (i, byte) in bytes.iter().enumerate() {
            self.bytes.insert(address + i as u64, *byte);
        }
    }

    /// Read a span of bytes at the given address.
    pub fn read(&self, address: u64, len: usize) -> Vec<u8> {
        (0..len)
            .map(|i| {
                self.bytes
                    .get(&(address + i as u64))
                    .copied()
                    .unwrap_or(0)
            })
            .collect()
    }

    /// Write one byte.
    pub fn write8(&mut self, address: u64, byte: u8) {
        self.bytes.insert(address, byte);
    }

    /// Read one byte.
    pub fn read8(&self, address: u64) -> u8 {
        self.bytes.get(&address).copied().unwrap_or(0)
    }
}
