use crate::error::{EngineError, Result};
use crate::simulation::cell::Topology;

/// Double-buffered cell storage plus a scratch buffer.
///
/// Exactly one of the two main buffers is current. Update passes read the
/// current buffer and write the other one, then `swap()` flips the flag.
/// The storage type is a host `Vec<f32>` for the CPU backend and a
/// `wgpu::Buffer` for the GPU backend.
pub struct StateField<T> {
    buffers: [T; 2],
    scratch: T,
    current: usize,
    width: u32,
    height: u32,
    stride: usize,
}

impl<T> StateField<T> {
    /// Assemble a field from already allocated storage
    pub fn from_parts(width: u32, height: u32, stride: usize, a: T, b: T, scratch: T) -> Self {
        Self {
            buffers: [a, b],
            scratch,
            current: 0,
            width,
            height,
            stride,
        }
    }

    /// Buffer readable by render and edit passes
    pub fn current_buffer(&self) -> &T {
        &self.buffers[self.current]
    }

    /// Buffer the next update pass writes
    pub fn write_buffer(&self) -> &T {
        &self.buffers[1 - self.current]
    }

    pub fn scratch_buffer(&self) -> &T {
        &self.scratch
    }

    pub fn current_mut(&mut self) -> &mut T {
        &mut self.buffers[self.current]
    }

    /// Borrow (current, scratch, write) at once for an update pass
    pub fn split_mut(&mut self) -> (&T, &mut T, &mut T) {
        let [a, b] = &mut self.buffers;
        if self.current == 0 {
            (&*a, &mut self.scratch, b)
        } else {
            (&*b, &mut self.scratch, a)
        }
    }

    /// Both main buffers, indexed by slot
    pub fn buffers(&self) -> &[T; 2] {
        &self.buffers
    }

    /// Slot (0 or 1) of the current buffer
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Flip buffer roles after a completed update pass
    pub fn swap(&mut self) {
        self.current = 1 - self.current;
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Floats per cell
    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Floats per buffer
    pub fn len(&self) -> usize {
        self.cell_count() * self.stride
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StateField<Vec<f32>> {
    /// Allocate a zeroed host field of `channels` state channels plus selector
    pub fn new(width: u32, height: u32, channels: usize) -> Self {
        let stride = channels + 1;
        let len = width as usize * height as usize * stride;
        Self::from_parts(width, height, stride, vec![0.0; len], vec![0.0; len], vec![0.0; len])
    }

    /// Set every cell of both buffers to `cell`
    pub fn reset(&mut self, cell: &[f32]) {
        debug_assert_eq!(cell.len(), self.stride);
        let stride = self.stride;
        for buffer in self.buffers.iter_mut().chain(std::iter::once(&mut self.scratch)) {
            for chunk in buffer.chunks_exact_mut(stride) {
                chunk.copy_from_slice(cell);
            }
        }
    }

    /// State vector of cell (x, y) in the current buffer
    pub fn cell(&self, x: u32, y: u32) -> &[f32] {
        let start = (y as usize * self.width as usize + x as usize) * self.stride;
        &self.current_buffer()[start..start + self.stride]
    }
}

/// Reject grids the engine cannot simulate
pub fn validate_grid(width: u32, height: u32, topology: Topology) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(EngineError::grid(format!("{}x{} has no cells", width, height)));
    }
    if topology == Topology::Hex && height % 2 != 0 {
        return Err(EngineError::grid(format!(
            "hex lattice needs an even height to wrap, got {}",
            height
        )));
    }
    Ok(())
}
