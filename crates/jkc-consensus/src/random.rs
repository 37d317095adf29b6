//! Pinned pseudo-random generator for the subsidy bonus.
//!
//! The bonus draw is consensus-critical: every validator must reproduce it
//! from the block height alone. This is the 32-bit Mersenne Twister
//! (MT19937) with the reference seeding, and a uniform integer draw that
//! maps engine output to a range by bucketing with rejection, matching the
//! generator the chain launched with output for output.

const N: usize = 624;
const M: usize = 397;
const MATRIX_A: u32 = 0x9908_b0df;
const UPPER_MASK: u32 = 0x8000_0000;
const LOWER_MASK: u32 = 0x7fff_ffff;

/// 32-bit Mersenne Twister.
pub struct Mt19937 {
    state: [u32; N],
    index: usize,
}

impl Mt19937 {
    pub fn new(seed: u32) -> Self {
        let mut state = [0u32; N];
        state[0] = seed;
        for i in 1..N {
            let prev = state[i - 1];
            state[i] = 1_812_433_253u32
                .wrapping_mul(prev ^ (prev >> 30))
                .wrapping_add(i as u32);
        }
        Mt19937 { state, index: N }
    }

    pub fn next_u32(&mut self) -> u32 {
        if self.index >= N {
            self.twist();
        }

        let mut y = self.state[self.index];
        self.index += 1;

        y ^= y >> 11;
        y ^= (y << 7) & 0x9d2c_5680;
        y ^= (y << 15) & 0xefc6_0000;
        y ^ (y >> 18)
    }

    fn twist(&mut self) {
        for i in 0..N {
            let y = (self.state[i] & UPPER_MASK) | (self.state[(i + 1) % N] & LOWER_MASK);
            let mut next = self.state[(i + M) % N] ^ (y >> 1);
            if y & 1 != 0 {
                next ^= MATRIX_A;
            }
            self.state[i] = next;
        }
        self.index = 0;
    }

    /// Uniform integer in `[min, max]`.
    ///
    /// The engine range is split into `max - min + 1` equal buckets and draws
    /// landing past the last bucket are rejected.
    pub fn uniform_int(&mut self, min: u32, max: u32) -> u32 {
        let range = max - min;
        if range == 0 {
            return min;
        }
        if range == u32::MAX {
            return self.next_u32();
        }

        let buckets = range + 1;
        let mut bucket_size = u32::MAX / buckets;
        if u32::MAX % buckets == range {
            bucket_size += 1;
        }

        loop {
            let result = self.next_u32() / bucket_size;
            if result <= range {
                return min + result;
            }
        }
    }
}

/// First uniform draw in `[1, range]` from a generator seeded with `seed`.
pub fn seeded_draw(seed: u32, range: u32) -> u32 {
    Mt19937::new(seed).uniform_int(1, range)
}
