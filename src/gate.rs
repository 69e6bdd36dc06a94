use crate::distance::haversine_distance;
use crate::types::Position;

pub const DEFAULT_DISTANCE_THRESHOLD_M: f64 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GateDecision {
    /// Position becomes the new reference. `moved_m` is `None` for the first fix
    /// or a forced acceptance.
    Accepted { moved_m: Option<f64> },
    /// Within the threshold of the last accepted position
    Jitter { moved_m: f64 },
    /// NaN/infinite coordinates; the reference is left untouched
    Invalid,
}

impl GateDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, GateDecision::Accepted { .. })
    }
}

/// Displacement gate: only movement strictly beyond `threshold_m` since the last
/// accepted position lets a probe through.
pub struct PositionGate {
    threshold_m: f64,
    last_accepted: Option<Position>,
    force_next: bool,
}

impl PositionGate {
    pub fn new(threshold_m: f64) -> Self {
        PositionGate {
            threshold_m,
            last_accepted: None,
            force_next: false,
        }
    }

    /// Decide on a fresh fix. On acceptance the reference position is replaced
    /// immediately, before any probe runs.
    pub fn offer(&mut self, position: Position) -> GateDecision {
        if !position.is_finite() {
            return GateDecision::Invalid;
        }

        let last = match self.last_accepted {
            Some(last) if !self.force_next => last,
            _ => {
                self.accept(position);
                return GateDecision::Accepted { moved_m: None };
            }
        };

        match haversine_distance(&last, &position) {
            Some(moved_m) if moved_m > self.threshold_m => {
                self.accept(position);
                GateDecision::Accepted {
                    moved_m: Some(moved_m),
                }
            }
            Some(moved_m) => GateDecision::Jitter { moved_m },
            None => GateDecision::Invalid,
        }
    }

    /// Let the next valid fix through regardless of distance
    pub fn force_next(&mut self) {
        self.force_next = true;
    }

    pub fn last_accepted(&self) -> Option<&Position> {
        self.last_accepted.as_ref()
    }

    pub fn threshold_m(&self) -> f64 {
        self.threshold_m
    }

    fn accept(&mut self, position: Position) {
        self.last_accepted = Some(position);
        self.force_next = false;
    }
}

impl Default for PositionGate {
    fn default() -> Self {
        Self::new(DEFAULT_DISTANCE_THRESHOLD_M)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ~0.111 m of latitude per 1e-6 degree
    const DEG_PER_M: f64 = 1.0 / 111_194.93;

    fn north_of(p: &Position, meters: f64) -> Position {
        Position::new(p.latitude + meters * DEG_PER_M, p.longitude)
    }

    #[test]
    fn test_first_fix_always_accepted() {
        let mut gate = PositionGate::default();
        let p = Position::new(37.7749, -122.4194);

        assert_eq!(gate.offer(p), GateDecision::Accepted { moved_m: None });
        assert_eq!(gate.last_accepted(), Some(&p));
    }

    #[test]
    fn test_sub_meter_jitter_discarded() {
        let mut gate = PositionGate::default();
        let a = Position::new(37.7749, -122.4194);
        gate.offer(a);

        let decision = gate.offer(north_of(&a, 0.5));
        assert!(matches!(decision, GateDecision::Jitter { moved_m } if moved_m < 1.0));
        assert_eq!(gate.last_accepted(), Some(&a));
    }

    #[test]
    fn test_two_meters_accepted() {
        let mut gate = PositionGate::default();
        let a = Position::new(37.7749, -122.4194);
        let b = north_of(&a, 2.0);
        gate.offer(a);

        let decision = gate.offer(b);
        assert!(decision.is_accepted());
        assert_eq!(gate.last_accepted(), Some(&b));
    }

    #[test]
    fn test_exactly_threshold_is_jitter() {
        let mut gate = PositionGate::new(5.0);
        let a = Position::new(0.0, 0.0);
        gate.offer(a);
        // Slightly under 5 m to stay clear of rounding at the boundary
        assert!(!gate.offer(north_of(&a, 4.999)).is_accepted());
        assert!(gate.offer(north_of(&a, 5.01)).is_accepted());
    }

    #[test]
    fn test_gated_against_newest_reference() {
        let mut gate = PositionGate::default();
        let a = Position::new(10.0, 10.0);
        let b = north_of(&a, 2.0);
        gate.offer(a);
        gate.offer(b);

        // 0.5 m from b but 2.5 m from a: jitter relative to newest
        assert!(!gate.offer(north_of(&b, 0.5)).is_accepted());
    }

    #[test]
    fn test_invalid_does_not_poison_reference() {
        let mut gate = PositionGate::default();
        let a = Position::new(10.0, 10.0);
        gate.offer(a);

        assert_eq!(gate.offer(Position::new(f64::NAN, 10.0)), GateDecision::Invalid);
        assert_eq!(gate.last_accepted(), Some(&a));
        assert!(gate.offer(north_of(&a, 3.0)).is_accepted());
    }

    #[test]
    fn test_force_next_bypasses_threshold_once() {
        let mut gate = PositionGate::default();
        let a = Position::new(10.0, 10.0);
        gate.offer(a);
        gate.force_next();

        assert_eq!(gate.offer(a), GateDecision::Accepted { moved_m: None });
        assert!(!gate.offer(a).is_accepted());
    }
}
