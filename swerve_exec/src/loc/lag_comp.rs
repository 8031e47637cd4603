//! # Latency compensation pose buffer
//!
//! A bounded, time-ordered, interpolating map from timestamp to pose. The
//! control loop is the only writer; consumers that need the pose at a past
//! timestamp (e.g. to compensate a vision pipeline's processing delay) may
//! query it concurrently.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::collections::VecDeque;
use std::sync::RwLock;

// Internal
use super::Pose;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Default number of pose history entries retained.
pub const DEFAULT_CAPACITY: usize = 25;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Bounded interpolating pose history.
///
/// Entries are kept in timestamp order; inserting past the capacity evicts
/// the single oldest entry. The interior lock means one writer and any
/// number of readers never observe a torn entry.
pub struct LagCompBuffer {
    inner: RwLock<Samples>,
}

struct Samples {
    entries: VecDeque<(f64, Pose)>,
    capacity: usize,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for LagCompBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl LagCompBuffer {
    /// Create a buffer holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Samples {
                entries: VecDeque::with_capacity(capacity + 1),
                capacity,
            }),
        }
    }

    /// Insert a pose sample, keeping the entries in timestamp order.
    ///
    /// Under normal operation timestamps are strictly increasing and this is
    /// an O(1) push; an out-of-order sample is inserted at its sorted
    /// position. If the buffer is full the oldest entry is evicted.
    pub fn add_sample(&self, time_s: f64, pose: Pose) {
        let mut samples = self.inner.write().unwrap();

        let out_of_order = matches!(samples.entries.back(), Some((t, _)) if *t > time_s);

        if out_of_order {
            let idx = samples.entries.partition_point(|(t, _)| *t <= time_s);
            samples.entries.insert(idx, (time_s, pose));
        } else {
            samples.entries.push_back((time_s, pose));
        }

        if samples.entries.len() > samples.capacity {
            samples.entries.pop_front();
        }
    }

    /// Get the pose at the given timestamp.
    ///
    /// - Empty buffer: the default (identity) pose.
    /// - At or before the oldest entry: the oldest pose.
    /// - At or after the newest entry: the newest pose.
    /// - Otherwise: linear interpolation between the bracketing entries,
    ///   with shortest-arc rotation interpolation.
    pub fn get_sample(&self, time_s: f64) -> Pose {
        let samples = self.inner.read().unwrap();

        let (front, back) = match (samples.entries.front(), samples.entries.back()) {
            (Some(f), Some(b)) => (*f, *b),
            _ => return Pose::default(),
        };

        if time_s <= front.0 {
            return front.1;
        }
        if time_s >= back.0 {
            return back.1;
        }

        // Locate the first entry past the query time; its predecessor is the
        // other bracket
        let idx = samples.entries.partition_point(|(t, _)| *t <= time_s);
        let (t1, p1) = samples.entries[idx];
        let (t0, p0) = samples.entries[idx - 1];

        let frac = (time_s - t0) / (t1 - t0);
        p0.interpolate(&p1, frac)
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Timestamp of the oldest entry, if any.
    pub fn first_time_s(&self) -> Option<f64> {
        self.inner.read().unwrap().entries.front().map(|(t, _)| *t)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use util::maths::epsilon_equals_eps;

    const TOL: f64 = 1e-9;

    #[test]
    fn test_empty_returns_default() {
        let buf = LagCompBuffer::new(4);
        assert_eq!(buf.get_sample(123.0), Pose::default());
    }

    #[test]
    fn test_bounded_eviction() {
        let buf = LagCompBuffer::new(25);

        // Insert capacity + 5 samples at increasing timestamps
        for i in 0..30 {
            buf.add_sample(i as f64, Pose::new(i as f64, 0.0, 0.0));
        }

        assert_eq!(buf.len(), 25);

        // Oldest five were evicted: a query at t=4 clamps to the t=5 sample
        assert_eq!(buf.first_time_s(), Some(5.0));
        assert!(epsilon_equals_eps(
            buf.get_sample(4.0).position_m[0],
            5.0,
            TOL
        ));

        // The most recent insertions are all present and exact
        for i in 5..30 {
            let p = buf.get_sample(i as f64);
            assert!(epsilon_equals_eps(p.position_m[0], i as f64, TOL));
        }
    }

    #[test]
    fn test_interpolation() {
        let buf = LagCompBuffer::new(4);
        buf.add_sample(0.0, Pose::new(0.0, 0.0, 0.0));
        buf.add_sample(1.0, Pose::new(10.0, 0.0, 90f64.to_radians()));

        let p = buf.get_sample(0.5);
        assert!(epsilon_equals_eps(p.position_m[0], 5.0, TOL));
        assert!(epsilon_equals_eps(p.position_m[1], 0.0, TOL));
        assert!(epsilon_equals_eps(p.heading_rad, 45f64.to_radians(), TOL));
    }

    #[test]
    fn test_clamp_at_bounds() {
        let buf = LagCompBuffer::new(4);
        buf.add_sample(1.0, Pose::new(1.0, 1.0, 0.5));
        buf.add_sample(2.0, Pose::new(2.0, 2.0, 1.0));

        // Before the earliest and after the latest return the boundary
        // samples unmodified
        assert_eq!(buf.get_sample(0.0), Pose::new(1.0, 1.0, 0.5));
        assert_eq!(buf.get_sample(1.0), Pose::new(1.0, 1.0, 0.5));
        assert_eq!(buf.get_sample(2.0), Pose::new(2.0, 2.0, 1.0));
        assert_eq!(buf.get_sample(99.0), Pose::new(2.0, 2.0, 1.0));
    }

    #[test]
    fn test_out_of_order_insert() {
        let buf = LagCompBuffer::new(4);
        buf.add_sample(0.0, Pose::new(0.0, 0.0, 0.0));
        buf.add_sample(2.0, Pose::new(2.0, 0.0, 0.0));
        buf.add_sample(1.0, Pose::new(1.0, 0.0, 0.0));

        // Order is by timestamp, not insertion
        assert!(epsilon_equals_eps(
            buf.get_sample(1.5).position_m[0],
            1.5,
            TOL
        ));
    }
}
