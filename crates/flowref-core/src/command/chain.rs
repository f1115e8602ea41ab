use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use log::warn;
use once_cell::sync::OnceCell;

use super::step::StepCommand;
use crate::reference::ReferenceIdentity;

/// Elemento de una cadena de flujo.
#[derive(Clone, Debug)]
pub enum Command {
    /// Inicio de la cadena: identidad del método de contrato que responde.
    Entry(ReferenceIdentity),
    /// Paso ejecutable.
    Step(StepCommand),
}

impl Command {
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Entry(_) => "From",
            Command::Step(_) => "To",
        }
    }
}

/// Vista de los comandos de una cadena en un momento dado.
#[derive(Clone, Debug)]
pub enum ChainSnapshot {
    /// Cadena sellada, inmutable.
    Sealed(Arc<[Command]>),
    /// Cadena aún en construcción: copia de lo añadido hasta ahora.
    Partial(Arc<[Command]>),
}

impl ChainSnapshot {
    pub fn commands(&self) -> &[Command] {
        match self {
            ChainSnapshot::Sealed(c) | ChainSnapshot::Partial(c) => c,
        }
    }

    pub fn is_sealed(&self) -> bool {
        matches!(self, ChainSnapshot::Sealed(_))
    }
}

/// Cadena ordenada de comandos, append-only hasta que se sella.
///
/// Mientras está abierta los comandos viven tras un `RwLock`; al sellarla se
/// mueven a un `OnceCell` y las lecturas posteriores no toman ningún lock.
#[derive(Default)]
pub struct CommandChain {
    pending: RwLock<Vec<Command>>,
    sealed: OnceCell<Arc<[Command]>>,
}

impl CommandChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Añade un comando al final. Devuelve `false` (y lo descarta) si la
    /// cadena ya estaba sellada.
    pub fn push(&self, command: Command) -> bool {
        let mut pending = self.pending.write().unwrap_or_else(PoisonError::into_inner);
        if self.sealed.get().is_some() {
            warn!("ignoring {} command appended to a sealed chain", command.kind());
            return false;
        }
        pending.push(command);
        true
    }

    /// Sella la cadena. Idempotente: devuelve `true` sólo la primera vez.
    pub fn seal(&self) -> bool {
        let mut pending = self.pending.write().unwrap_or_else(PoisonError::into_inner);
        if self.sealed.get().is_some() {
            return false;
        }
        let commands: Arc<[Command]> = std::mem::take(&mut *pending).into();
        self.sealed.set(commands).is_ok()
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.get().is_some()
    }

    pub fn snapshot(&self) -> ChainSnapshot {
        if let Some(commands) = self.sealed.get() {
            return ChainSnapshot::Sealed(Arc::clone(commands));
        }
        let pending = self.pending.read().unwrap_or_else(PoisonError::into_inner);
        // may have been sealed while we waited for the lock
        match self.sealed.get() {
            Some(commands) => ChainSnapshot::Sealed(Arc::clone(commands)),
            None => ChainSnapshot::Partial(pending.clone().into()),
        }
    }

    pub fn len(&self) -> usize {
        self.snapshot().commands().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for CommandChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("CommandChain")
         .field("sealed", &snapshot.is_sealed())
         .field("commands", &snapshot.commands())
         .finish()
    }
}
