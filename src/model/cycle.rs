use rand::seq::SliceRandom;
use rand::Rng;

/// Presentation order over the bank for hosts that step through models.
///
/// The order may be shuffled; ids stay the bank's stable indices.
#[derive(Clone, Debug)]
pub struct ModelCycle {
    order: Vec<usize>,
    cursor: usize,
}

impl ModelCycle {
    /// Models in id order. `count` must be non-zero.
    pub fn new(count: usize) -> Self {
        Self {
            order: (0..count.max(1)).collect(),
            cursor: 0,
        }
    }

    /// Models in a random presentation order
    pub fn shuffled<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Self {
        let mut cycle = Self::new(count);
        cycle.order.shuffle(rng);
        cycle
    }

    /// Model id under the cursor
    pub fn current(&self) -> usize {
        self.order[self.cursor]
    }

    /// Move the cursor by `delta` positions (wrapping) and return the new id
    pub fn switch(&mut self, delta: isize) -> usize {
        let len = self.order.len() as isize;
        self.cursor = (self.cursor as isize + delta).rem_euclid(len) as usize;
        self.current()
    }

    /// Presentation order as model ids
    pub fn order(&self) -> &[usize] {
        &self.order
    }
}
