//! The single place where we generate random material for our own
//! use.  These functions never fail; they panic if the OS RNG does.

use rand::rngs::OsRng;
use rand::RngCore;

/// Fill the whole slice with random material.
pub fn fill_random(bytes: &mut [u8]) {
    OsRng.fill_bytes(bytes);
}

/// Return a fresh random vector of length `len`.
pub fn random_vec(len: usize) -> Vec<u8> {
    let mut v = vec![0u8; len];
    fill_random(&mut v);
    v
}
