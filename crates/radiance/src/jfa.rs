//! Jump flooding schedule shared by every backend.
//!
//! The seed pass always writes ping-pong slot [`PingPong::A`]. Iteration `i`
//! then reads the slot written by iteration `i - 1` and writes the other one,
//! so slot roles are a pure function of the iteration index.

use crate::types::Resolution;

/// Number of passes that guarantee convergence: `ceil(log2(max(W, H)))`.
pub fn full_convergence_passes(resolution: Resolution) -> u32 {
    let edge = resolution.max_edge();
    if edge <= 1 {
        0
    } else {
        u32::BITS - (edge - 1).leading_zeros()
    }
}

/// How many propagation passes a run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JfaMode {
    /// User cap, used when the JFA output itself is displayed.
    Capped(u32),
    /// Enough passes to converge over the whole image.
    Converged,
}

impl JfaMode {
    pub fn pass_count(self, resolution: Resolution) -> u32 {
        match self {
            JfaMode::Capped(passes) => passes,
            JfaMode::Converged => full_convergence_passes(resolution),
        }
    }
}

/// One of the two ping-pong targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PingPong {
    A,
    B,
}

impl PingPong {
    pub fn index(self) -> usize {
        match self {
            PingPong::A => 0,
            PingPong::B => 1,
        }
    }

    pub fn other(self) -> Self {
        match self {
            PingPong::A => PingPong::B,
            PingPong::B => PingPong::A,
        }
    }

    /// Slot read by iteration `iteration` (0-based).
    pub fn read_for(iteration: u32) -> Self {
        if iteration % 2 == 0 {
            PingPong::A
        } else {
            PingPong::B
        }
    }

    /// Slot written by iteration `iteration` (0-based).
    pub fn write_for(iteration: u32) -> Self {
        Self::read_for(iteration).other()
    }

    /// Slot holding the result after `passes` iterations.
    pub fn output_after(passes: u32) -> Self {
        Self::read_for(passes)
    }
}

/// A single propagation iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JfaPass {
    pub iteration: u32,
    /// Step in pixels, `2^(P - i - 1)`.
    pub offset: u32,
    pub read: PingPong,
    pub write: PingPong,
}

impl JfaPass {
    /// Offset in normalized texture units, as bound to the step program.
    pub fn offset_uv(&self, resolution: Resolution) -> [f32; 2] {
        let [inv_w, inv_h] = resolution.inverse();
        let off = self.offset as f32;
        [off * inv_w, off * inv_h]
    }
}

/// Offset-halving schedule for one propagation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassPlan {
    passes: u32,
}

impl PassPlan {
    pub fn new(mode: JfaMode, resolution: Resolution) -> Self {
        Self {
            passes: mode.pass_count(resolution),
        }
    }

    pub fn len(&self) -> u32 {
        self.passes
    }

    pub fn is_empty(&self) -> bool {
        self.passes == 0
    }

    /// Slot consumers read once every pass has run.
    pub fn output(&self) -> PingPong {
        PingPong::output_after(self.passes)
    }

    pub fn passes(&self) -> impl Iterator<Item = JfaPass> {
        let total = self.passes;
        (0..total).map(move |iteration| JfaPass {
            iteration,
            offset: step_offset(total, iteration),
            read: PingPong::read_for(iteration),
            write: PingPong::write_for(iteration),
        })
    }
}

// Caps above 32 would shift past the word; those passes all degenerate to a
// one-pixel step.
fn step_offset(total: u32, iteration: u32) -> u32 {
    let exponent = total - iteration - 1;
    1u32.checked_shl(exponent).unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn res(width: u32, height: u32) -> Resolution {
        Resolution::new(width, height).unwrap()
    }

    #[test]
    fn convergence_pass_counts_match_reference() {
        assert_eq!(full_convergence_passes(res(64, 64)), 6);
        assert_eq!(full_convergence_passes(res(256, 256)), 8);
        assert_eq!(full_convergence_passes(res(800, 600)), 10);
        assert_eq!(full_convergence_passes(res(1, 1)), 0);
        assert_eq!(full_convergence_passes(res(2, 1)), 1);
        assert_eq!(full_convergence_passes(res(65, 3)), 7);
        assert_eq!(full_convergence_passes(res(1280, 720)), 11);
    }

    #[test]
    fn convergence_matches_float_reference() {
        for edge in 1..=2048u32 {
            let expected = (edge as f64).log2().ceil() as u32;
            assert_eq!(full_convergence_passes(res(edge, 1)), expected, "{edge}");
        }
    }

    #[test]
    fn roles_alternate_every_iteration() {
        let plan = PassPlan::new(JfaMode::Capped(12), res(512, 512));
        for pass in plan.passes() {
            let expected = if pass.iteration % 2 == 0 {
                PingPong::A
            } else {
                PingPong::B
            };
            assert_eq!(pass.read, expected);
            assert_ne!(pass.read, pass.write);
        }
        let passes: Vec<_> = plan.passes().collect();
        for pair in passes.windows(2) {
            assert_eq!(pair[1].read, pair[0].write);
        }
    }

    #[test]
    fn offsets_halve_down_to_one() {
        let plan = PassPlan::new(JfaMode::Converged, res(256, 200));
        let offsets: Vec<u32> = plan.passes().map(|pass| pass.offset).collect();
        assert_eq!(offsets, vec![128, 64, 32, 16, 8, 4, 2, 1]);
        assert_eq!(plan.output(), PingPong::A);
    }

    #[test]
    fn output_follows_parity() {
        assert_eq!(PassPlan::new(JfaMode::Capped(3), res(8, 8)).output(), PingPong::B);
        assert_eq!(PassPlan::new(JfaMode::Capped(4), res(8, 8)).output(), PingPong::A);
    }

    #[test]
    fn zero_passes_reads_seed_output() {
        let plan = PassPlan::new(JfaMode::Converged, res(1, 1));
        assert!(plan.is_empty());
        assert_eq!(plan.passes().count(), 0);
        assert_eq!(plan.output(), PingPong::A);
    }

    #[test]
    fn offset_uv_is_normalized() {
        let plan = PassPlan::new(JfaMode::Capped(2), res(4, 8));
        let first = plan.passes().next().unwrap();
        assert_eq!(first.offset, 2);
        assert_eq!(first.offset_uv(res(4, 8)), [0.5, 0.25]);
    }
}
