//! Comandos y cadenas de comandos.
//!
//! Una cadena es la secuencia ordenada de comandos de un flujo: un `Entry`
//! con la identidad del método de contrato seguido de los `Step` a ejecutar.
//! - `StepCommand`: callable con aridad fija aplicado posicionalmente.
//! - `IntoStep` / `TryIntoStep` / `IntoBoundStep`: adaptan closures de
//!   aridad 0..=4.
//! - `CommandChain`: append-only hasta que se sella.

mod chain;
pub mod step;

pub use chain::{ChainSnapshot, Command, CommandChain};
pub use step::{IntoBoundStep, IntoStep, StepCommand, StepFailure, TryIntoStep};
