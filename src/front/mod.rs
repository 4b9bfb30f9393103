//! Front end for consuming text shaders and loading them into [`Module`](super::Module)s.

pub mod wgsl;

use crate::arena::Arena;

/// Helper class to emit expressions.
///
/// The front ends bracket the lowering of every statement with
/// [`start`](Self::start) and [`finish`](Self::finish); any expression
/// appended to the arena in between is covered by the resulting
/// [`Statement::Emit`](crate::Statement::Emit) range.
#[derive(Debug, Default)]
pub struct Emitter {
    start_len: Option<usize>,
}

impl Emitter {
    pub fn start(&mut self, arena: &Arena<crate::Expression>) {
        if self.start_len.is_some() {
            unreachable!("Emitting has already started!");
        }
        self.start_len = Some(arena.len());
    }

    /// Produce an `Emit` statement covering the expressions appended since
    /// the matching [`start`](Self::start), if there were any.
    #[must_use]
    pub fn finish(&mut self, arena: &Arena<crate::Expression>) -> Option<crate::Statement> {
        let start_len = self.start_len.take().unwrap();
        if start_len != arena.len() {
            Some(crate::Statement::Emit(arena.range_from(start_len)))
        } else {
            None
        }
    }
}
