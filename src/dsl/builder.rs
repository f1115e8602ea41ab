//! Builder de un flujo sobre un método de contrato.
//!
//! El builder se obtiene con `FlowRef::from`. Mientras está abierto la
//! definición no está registrada y el flujo anterior del mismo método (si lo
//! hay) sigue respondiendo. `build()` (o soltar el builder) sella la cadena y
//! la registra, reemplazando a la anterior.
//!
//! ```ignore
//! let flows = flow().from(MethodRef::<dyn Flows>::new("process_two"))?
//!                   .to(|a: String, b: String| format!("{a}{b}"))
//!                   .build()?;
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use flowref_core::{resolve, Contract, Declaring, DispatchError, DispatchRecord, FlowDefinition, FlowResult, IntoBoundStep,
                   IntoStep, MethodRef, ReferenceIdentity, ResolutionError, StepCommand, TryIntoStep};
use log::{debug, warn};

pub struct FlowBuilder<C: ?Sized> {
    definition: Arc<FlowDefinition>,
    record: Arc<DispatchRecord>,
    // un to_ref/to_bound fallido descarta la definición sin registrarla
    discarded: bool,
    _contract: PhantomData<fn() -> Box<C>>,
}

impl<C: Declaring + ?Sized> FlowBuilder<C> {
    pub(crate) fn new(definition: Arc<FlowDefinition>, record: Arc<DispatchRecord>) -> Self {
        Self { definition,
               record,
               discarded: false,
               _contract: PhantomData }
    }

    /// Añade un step; la aridad se toma de la firma del closure.
    pub fn to<M>(self, step: impl IntoStep<M>) -> Self {
        self.definition.add_step(step.into_step());
        self
    }

    /// Añade un step falible; un `Err` aborta la invocación.
    pub fn try_to<M>(self, step: impl TryIntoStep<M>) -> Self {
        self.definition.add_step(step.try_into_step());
        self
    }

    /// Añade un step que implementa `reference` (un método de cualquier
    /// `Declaring`). La aridad del closure debe coincidir con la declarada.
    pub fn to_ref<T, M>(self, reference: MethodRef<T>, step: impl IntoStep<M>) -> FlowResult<Self>
        where T: Declaring + ?Sized
    {
        let pushed = resolve(&reference).and_then(|origin| self.push_checked(origin, step.into_step()));
        self.keep_if(pushed)
    }

    /// Como `to_ref` para referencias ligadas (`MethodRef::bound`): el step
    /// recibe el receptor capturado como primer parámetro.
    pub fn to_bound<T, M>(self, reference: MethodRef<T>, step: impl IntoBoundStep<T, M>) -> FlowResult<Self>
        where T: Declaring + Send + Sync
    {
        let pushed = resolve(&reference).and_then(|origin| match origin.receiver::<T>() {
                                            Some(receiver) => self.push_checked(origin, step.into_bound_step(receiver)),
                                            None => Err(ResolutionError::Unbound { reference: origin.flow_id() }),
                                        });
        self.keep_if(pushed)
    }

    pub fn definition(&self) -> &Arc<FlowDefinition> {
        &self.definition
    }

    fn keep_if(mut self, pushed: Result<(), ResolutionError>) -> FlowResult<Self> {
        match pushed {
            Ok(()) => Ok(self),
            Err(e) => {
                warn!("discarding flow {}: {e}", self.definition.id());
                self.discarded = true;
                Err(e.into())
            }
        }
    }

    fn push_checked(&self, origin: ReferenceIdentity, step: StepCommand) -> Result<(), ResolutionError> {
        let expected = origin.method().arity;
        if step.arity() != expected {
            return Err(ResolutionError::ArityMismatch { reference: origin.flow_id(),
                                                        expected,
                                                        got: step.arity() });
        }
        self.definition.add_step(step.with_origin(origin));
        Ok(())
    }
}

impl<C: ?Sized> FlowBuilder<C> {
    // sólo la primera vez: build() seguido del drop no registra dos veces
    fn seal_and_register(&self) {
        if !self.discarded && self.definition.seal() {
            debug!("register flow={} steps={}", self.definition.id(), self.definition.step_count());
            self.record.handler().register(Arc::clone(&self.definition));
        }
    }
}

impl<C: Contract + ?Sized> FlowBuilder<C> {
    /// Sella y registra la cadena y devuelve la instancia de despacho del
    /// contrato (la misma para todos los flujos de `C`).
    pub fn build(self) -> FlowResult<Arc<C>> {
        self.seal_and_register();
        self.record
            .instance::<C>()
            .ok_or_else(|| DispatchError::NoInstance { contract: self.record.descriptor().name().to_string() }.into())
    }
}

impl<C: ?Sized> Drop for FlowBuilder<C> {
    fn drop(&mut self) {
        self.seal_and_register();
    }
}

impl<C: ?Sized> fmt::Debug for FlowBuilder<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowBuilder")
         .field("definition", &self.definition)
         .finish()
    }
}
