use crate::memory::{EmulatedMemory, MemoryAccess};

/// Lifecycle of the emulated machine as seen by host-side tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CoreState {
    #[default]
    Uninitialized,
    Starting,
    Running,
    Paused,
    Stopping,
}

impl CoreState {
    /// `true` while memory holds a live, inspectable machine image.
    pub fn is_emulation_active(self) -> bool {
        matches!(self, CoreState::Running | CoreState::Paused)
    }
}

/// Host-side view of the emulated machine.
///
/// `run_as_cpu_thread` is a synchronous hand-off: the job runs while the
/// emulated CPU is quiesced and the call returns only after the job has
/// finished, so the job observes a torn-free memory image.
pub trait Machine {
    fn state(&self) -> CoreState;

    fn run_as_cpu_thread(&self, job: &mut dyn FnMut(&dyn MemoryAccess));
}

impl<T: Machine + ?Sized> Machine for &T {
    fn state(&self) -> CoreState {
        (**self).state()
    }

    fn run_as_cpu_thread(&self, job: &mut dyn FnMut(&dyn MemoryAccess)) {
        (**self).run_as_cpu_thread(job)
    }
}

/// A machine whose CPU never runs on its own: memory only changes through
/// `&mut` access, so every hand-off already sees a quiescent image.
///
/// Used for inspecting RAM dumps and in tests.
#[derive(Debug, Clone, Default)]
pub struct Console {
    memory: EmulatedMemory,
    state: CoreState,
}

impl Console {
    pub fn new(memory: EmulatedMemory) -> Self {
        Self {
            memory,
            state: CoreState::Paused,
        }
    }

    pub fn set_state(&mut self, state: CoreState) {
        self.state = state;
    }

    pub fn memory(&self) -> &EmulatedMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut EmulatedMemory {
        &mut self.memory
    }
}

impl Machine for Console {
    fn state(&self) -> CoreState {
        self.state
    }

    fn run_as_cpu_thread(&self, job: &mut dyn FnMut(&dyn MemoryAccess)) {
        job(&self.memory);
    }
}
