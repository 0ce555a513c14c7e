pub mod io;
pub mod runtime_error;
pub mod vm_bc;

pub use io::{InputEvent, InputSource, NoInput, ScriptedInput, StdinInput};
pub use runtime_error::{ControlFlowError, Fault, Location, RuntimeError};
pub use vm_bc::{BlockFrame, VmBc, VmBcConfig};
