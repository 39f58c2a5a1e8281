pub mod console;
pub mod constants;
pub mod image;
pub mod runtime;

pub use self::{
    console::{Console, ConsoleError, ScriptedConsole},
    image::{Image, ImageError},
    runtime::{ExecutionError, Exception, Machine, StepOutcome},
};
