//! Shared, atomically swappable pattern grid.

use std::sync::Arc;

use arc_swap::{ArcSwap, Guard};
use hb_ir::Pattern;

/// Handle to the grid shared between the transport and the editor.
///
/// Readers always see a complete grid: whole-pattern loads are a single
/// pointer swap, and cell edits copy the grid, modify the copy and swap it in.
#[derive(Clone, Debug)]
pub struct PatternHandle {
    slot: Arc<ArcSwap<Pattern>>,
}

impl PatternHandle {
    pub fn new(pattern: Pattern) -> Self {
        assert!(pattern.is_well_formed(), "pattern storage does not match its shape");
        Self {
            slot: Arc::new(ArcSwap::from_pointee(pattern)),
        }
    }

    /// Borrow the current grid without taking a reference count.
    pub fn load(&self) -> Guard<Arc<Pattern>> {
        self.slot.load()
    }

    /// An owned snapshot of the current grid.
    pub fn snapshot(&self) -> Arc<Pattern> {
        self.slot.load_full()
    }

    pub fn voices(&self) -> usize {
        self.slot.load().voices()
    }

    pub fn steps(&self) -> usize {
        self.slot.load().steps()
    }

    /// Replace the whole grid, returning the previous one.
    ///
    /// The new grid must have the same shape as the current one.
    pub fn replace(&self, pattern: Pattern) -> Arc<Pattern> {
        {
            let current = self.slot.load();
            assert!(
                current.same_shape(&pattern) && pattern.is_well_formed(),
                "pattern shape {}x{} does not match {}x{}",
                pattern.voices(),
                pattern.steps(),
                current.voices(),
                current.steps()
            );
        }
        self.slot.swap(Arc::new(pattern))
    }

    /// Apply an edit as one atomic swap. `edit` may run more than once under contention.
    pub fn edit<F: FnMut(&mut Pattern)>(&self, mut edit: F) {
        self.slot.rcu(|current| {
            let mut next = Pattern::clone(current);
            edit(&mut next);
            next
        });
    }

    pub fn is_step_active(&self, voice: usize, step: usize) -> bool {
        self.slot.load().is_step_active(voice, step)
    }

    pub fn step_pitch(&self, voice: usize, step: usize) -> f32 {
        self.slot.load().step_pitch(voice, step)
    }

    pub fn set_step_active(&self, voice: usize, step: usize, active: bool) {
        self.edit(|p| p.set_step_active(voice, step, active));
    }

    pub fn set_step_pitch(&self, voice: usize, step: usize, pitch: f32) {
        self.edit(|p| p.set_step_pitch(voice, step, pitch));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn edits_are_visible_to_other_handles() {
        let handle = PatternHandle::new(Pattern::new(2, 16));
        let reader = handle.clone();
        handle.set_step_active(1, 4, true);
        handle.set_step_pitch(1, 4, 0.9);
        assert!(reader.is_step_active(1, 4));
        assert_eq!(reader.step_pitch(1, 4), 0.9);
    }

    #[test]
    fn snapshot_is_unaffected_by_later_edits() {
        let handle = PatternHandle::new(Pattern::new(2, 4));
        let before = handle.snapshot();
        handle.set_step_active(0, 0, true);
        assert!(!before.is_step_active(0, 0));
        assert!(handle.is_step_active(0, 0));
    }

    #[test]
    fn replace_swaps_whole_grid() {
        let handle = PatternHandle::new(Pattern::new(2, 4));
        let mut next = Pattern::new(2, 4);
        next.set_step_active(1, 3, true);
        let previous = handle.replace(next);
        assert!(!previous.is_step_active(1, 3));
        assert!(handle.is_step_active(1, 3));
    }

    #[test]
    #[should_panic(expected = "does not match")]
    fn replace_rejects_other_shapes() {
        let handle = PatternHandle::new(Pattern::new(2, 4));
        handle.replace(Pattern::new(3, 4));
    }

    #[test]
    fn readers_never_see_partial_grids() {
        // Writer alternates between an all-off and an all-on grid; every
        // snapshot a reader takes must be uniformly one or the other.
        let handle = PatternHandle::new(Pattern::new(4, 16));
        let writer = handle.clone();
        let write_thread = thread::spawn(move || {
            for i in 0..500 {
                let mut next = Pattern::new(4, 16);
                if i % 2 == 0 {
                    for v in 0..4 {
                        for s in 0..16 {
                            next.set_step_active(v, s, true);
                        }
                    }
                }
                writer.replace(next);
            }
        });

        for _ in 0..2000 {
            let grid = handle.load();
            let on = (0..4)
                .flat_map(|v| (0..16).map(move |s| (v, s)))
                .filter(|&(v, s)| grid.is_step_active(v, s))
                .count();
            assert!(on == 0 || on == 64, "observed partial grid with {on} active cells");
        }
        write_thread.join().unwrap();
    }
}
