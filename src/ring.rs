//! Fixed-capacity PCM ring shared by the decode worker and the audio output

use std::sync::Mutex;

struct Cursors {
    data: Vec<i16>,
    write: usize,
    read: usize,
    count: usize,
}

/// Interleaved stereo i16 samples.
///
/// The producer never blocks: samples that do not fit are dropped. The
/// consumer always gets the amount it asked for, padded with silence.
pub struct PcmRingBuffer {
    inner: Mutex<Cursors>,
    capacity: usize,
}

impl PcmRingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Cursors {
                data: vec![0; capacity],
                write: 0,
                read: 0,
                count: 0,
            }),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Occupancy in `[0, 1]`
    pub fn level(&self) -> f32 {
        if self.capacity == 0 {
            return 0.0;
        }
        (self.len() as f32 / self.capacity as f32).clamp(0.0, 1.0)
    }

    /// Copies as many samples as fit and returns that number
    pub fn push(&self, samples: &[i16]) -> usize {
        let mut c = self.lock();
        let n = samples.len().min(self.capacity - c.count);
        if n == 0 {
            return 0;
        }
        let first = n.min(self.capacity - c.write);
        let w = c.write;
        c.data[w..w + first].copy_from_slice(&samples[..first]);
        c.data[..n - first].copy_from_slice(&samples[first..n]);
        c.write = (c.write + n) % self.capacity;
        c.count += n;
        n
    }

    /// Fills all of `out`, real audio first then silence. Returns the number
    /// of real samples.
    pub fn pull(&self, out: &mut [i16]) -> usize {
        let mut c = self.lock();
        let n = out.len().min(c.count);
        if n > 0 {
            let first = n.min(self.capacity - c.read);
            let r = c.read;
            out[..first].copy_from_slice(&c.data[r..r + first]);
            out[first..n].copy_from_slice(&c.data[..n - first]);
            c.read = (c.read + n) % self.capacity;
            c.count -= n;
        }
        out[n..].fill(0);
        n
    }

    pub fn clear(&self) {
        let mut c = self.lock();
        c.write = 0;
        c.read = 0;
        c.count = 0;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Cursors> {
        // a panicking holder cannot leave the cursors inconsistent
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
