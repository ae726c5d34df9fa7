/*
 * mask.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Passerella, a WebSocket endpoint library.
 *
 * Passerella is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Passerella is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Passerella.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Payload masking (RFC 6455 §5.3): per-frame 32-bit key, XOR cycled over
//! the payload. Masking and unmasking are the same operation.

/// Draw a fresh masking key. A new key is generated for every client-emitted
/// frame, independently.
pub fn generate_key() -> [u8; 4] {
    rand::random()
}

/// XOR `data` in place with `key` cycled by index modulo 4.
pub fn apply(key: [u8; 4], data: &mut [u8]) {
    for (i, octet) in data.iter_mut().enumerate() {
        *octet ^= key[i % 4];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applying_twice_is_identity() {
        let key = [0xA5, 0x01, 0xFF, 0x3C];
        let mut data = b"the sample payload".to_vec();
        apply(key, &mut data);
        assert_ne!(data, b"the sample payload");
        apply(key, &mut data);
        assert_eq!(data, b"the sample payload");
    }

    #[test]
    fn key_cycles_modulo_four() {
        let key = [1, 2, 3, 4];
        let mut data = vec![0u8; 6];
        apply(key, &mut data);
        assert_eq!(data, vec![1, 2, 3, 4, 1, 2]);
    }

    #[test]
    fn zero_key_is_noop() {
        let mut data = b"unchanged".to_vec();
        apply([0; 4], &mut data);
        assert_eq!(data, b"unchanged");
    }
}
