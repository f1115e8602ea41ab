//! Step commands: callables aplicados posicionalmente a los argumentos de
//! una invocación.
//!
//! Los argumentos viajan como `serde_json::Value` (representación neutra);
//! cada step decodifica los que necesita según su aridad. Un step cuyo tipo
//! de retorno es `()` es *void*: no produce valor y deja pasar el resultado
//! anterior.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::errors::StepError;
use crate::reference::ReferenceIdentity;

/// Fallo al ejecutar un step, antes de envolverlo con el id del flujo.
#[derive(Debug)]
pub enum StepFailure {
    MissingArguments { expected: usize, got: usize },
    Argument { position: usize, source: serde_json::Error },
    Output(serde_json::Error),
    Failed(StepError),
}

type StepFn = dyn Fn(&[Value]) -> Result<Option<Value>, StepFailure> + Send + Sync;

/// Un paso ejecutable de la cadena.
#[derive(Clone)]
pub struct StepCommand {
    arity: usize,
    label: &'static str,
    origin: Option<ReferenceIdentity>,
    call: Arc<StepFn>,
}

impl StepCommand {
    /// Número de argumentos posicionales que consume.
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Nombre del callable envuelto (para diagnósticos).
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Referencia resuelta de la que proviene, si se declaró con una.
    pub fn origin(&self) -> Option<&ReferenceIdentity> {
        self.origin.as_ref()
    }

    pub fn with_origin(mut self, origin: ReferenceIdentity) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Aplica los `arguments` posicionalmente. `Ok(None)` para steps void.
    /// Los argumentos sobrantes se ignoran.
    pub fn run(&self, arguments: &[Value]) -> Result<Option<Value>, StepFailure> {
        match arguments.get(..self.arity) {
            Some(positional) => (self.call)(positional),
            None => Err(StepFailure::MissingArguments { expected: self.arity,
                                                        got: arguments.len() }),
        }
    }
}

impl fmt::Debug for StepCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepCommand")
         .field("arity", &self.arity)
         .field("label", &self.label)
         .field("origin", &self.origin.as_ref().map(|o| o.flow_id()))
         .finish()
    }
}

/// Convierte un callable infalible en `StepCommand`. `Marker` sólo sirve
/// para distinguir las implementaciones por aridad.
pub trait IntoStep<Marker>: Send + Sync + 'static {
    fn into_step(self) -> StepCommand;
}

/// Igual que `IntoStep` para callables que devuelven `Result<R, E>`; un `Err`
/// aborta la invocación.
pub trait TryIntoStep<Marker>: Send + Sync + 'static {
    fn try_into_step(self) -> StepCommand;
}

/// Callable cuyo primer parámetro es el receptor `&T` de una referencia
/// ligada; la aridad no cuenta el receptor.
pub trait IntoBoundStep<T: ?Sized, Marker>: Send + Sync + 'static {
    fn into_bound_step(self, receiver: Arc<T>) -> StepCommand;
}

fn decode_arg<A: DeserializeOwned>(arguments: &[Value], position: usize) -> Result<A, StepFailure> {
    A::deserialize(&arguments[position]).map_err(|source| StepFailure::Argument { position, source })
}

fn encode_output<R: Serialize + 'static>(output: R) -> Result<Option<Value>, StepFailure> {
    if TypeId::of::<R>() == TypeId::of::<()>() {
        return Ok(None);
    }
    serde_json::to_value(output).map(Some).map_err(StepFailure::Output)
}

macro_rules! count_args {
    () => { 0usize };
    ($head:ident $($tail:ident)*) => { 1usize + count_args!($($tail)*) };
}

macro_rules! impl_steps {
    ($($arg:ident : $pos:tt),*) => {
        impl<F, R, $($arg,)*> IntoStep<(R, $($arg,)*)> for F
            where F: Fn($($arg),*) -> R + Send + Sync + 'static,
                  R: Serialize + 'static,
                  $($arg: DeserializeOwned + 'static,)*
        {
            #[allow(unused_variables)]
            fn into_step(self) -> StepCommand {
                let call = move |arguments: &[Value]| -> Result<Option<Value>, StepFailure> {
                    let output = (self)($(decode_arg::<$arg>(arguments, $pos)?),*);
                    encode_output(output)
                };
                StepCommand { arity: count_args!($($arg)*),
                              label: std::any::type_name::<F>(),
                              origin: None,
                              call: Arc::new(call) }
            }
        }

        impl<F, R, E, $($arg,)*> TryIntoStep<(R, E, $($arg,)*)> for F
            where F: Fn($($arg),*) -> Result<R, E> + Send + Sync + 'static,
                  R: Serialize + 'static,
                  E: Into<StepError> + 'static,
                  $($arg: DeserializeOwned + 'static,)*
        {
            #[allow(unused_variables)]
            fn try_into_step(self) -> StepCommand {
                let call = move |arguments: &[Value]| -> Result<Option<Value>, StepFailure> {
                    let output = (self)($(decode_arg::<$arg>(arguments, $pos)?),*)
                        .map_err(|e| StepFailure::Failed(e.into()))?;
                    encode_output(output)
                };
                StepCommand { arity: count_args!($($arg)*),
                              label: std::any::type_name::<F>(),
                              origin: None,
                              call: Arc::new(call) }
            }
        }

        impl<F, T, R, $($arg,)*> IntoBoundStep<T, (R, $($arg,)*)> for F
            where F: Fn(&T, $($arg),*) -> R + Send + Sync + 'static,
                  T: ?Sized + Send + Sync + 'static,
                  R: Serialize + 'static,
                  $($arg: DeserializeOwned + 'static,)*
        {
            #[allow(unused_variables)]
            fn into_bound_step(self, receiver: Arc<T>) -> StepCommand {
                let call = move |arguments: &[Value]| -> Result<Option<Value>, StepFailure> {
                    let output = (self)(&*receiver, $(decode_arg::<$arg>(arguments, $pos)?),*);
                    encode_output(output)
                };
                StepCommand { arity: count_args!($($arg)*),
                              label: std::any::type_name::<F>(),
                              origin: None,
                              call: Arc::new(call) }
            }
        }
    };
}

impl_steps!();
impl_steps!(A0: 0);
impl_steps!(A0: 0, A1: 1);
impl_steps!(A0: 0, A1: 1, A2: 2);
impl_steps!(A0: 0, A1: 1, A2: 2, A3: 3);
