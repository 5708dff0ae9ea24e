/// Limits how many tasks may be running at once.
///
/// The gate only counts; the scheduler acquires a slot when a task moves to
/// running and releases it when that task reaches a terminal status, whether
/// by settling, cancellation or agent removal. An execution that never
/// settles keeps its slot.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    limit: usize,
    in_flight: usize,
}

impl ConcurrencyGate {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            in_flight: 0,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of slots currently held.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn has_capacity(&self) -> bool {
        self.in_flight < self.limit
    }

    /// Take a slot if one is free.
    pub fn try_acquire(&mut self) -> bool {
        if !self.has_capacity() {
            return false;
        }
        self.in_flight += 1;
        true
    }

    /// Give a slot back.
    pub fn release(&mut self) {
        debug_assert!(self.in_flight > 0, "released a slot that was never acquired");
        self.in_flight = self.in_flight.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_up_to_limit() {
        let mut gate = ConcurrencyGate::new(2);
        assert!(gate.try_acquire());
        assert!(gate.try_acquire());
        assert!(!gate.try_acquire());
        assert_eq!(gate.in_flight(), 2);
        assert!(!gate.has_capacity());
    }

    #[test]
    fn test_release_frees_slot() {
        let mut gate = ConcurrencyGate::new(1);
        assert!(gate.try_acquire());
        gate.release();
        assert!(gate.has_capacity());
        assert!(gate.try_acquire());
    }

    #[test]
    fn test_zero_limit_never_admits() {
        let mut gate = ConcurrencyGate::new(0);
        assert!(!gate.try_acquire());
        assert!(!gate.has_capacity());
    }
}
