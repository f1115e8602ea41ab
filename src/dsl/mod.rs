//! DSL fluida para definir flujos sobre métodos de contrato.
//! Ejemplo de uso:
//! let flows = flow().from(MethodRef::<dyn Flows>::new("process_two"))?
//!                   .to(|a: String, b: String| combine(&a, &b))
//!                   .build()?;
//! flows.process_two("a".into(), "b".into())?;
//! // o más tarde, desde cualquier hilo:
//! let flows = get_flow::<dyn Flows>()?;

mod builder;

use std::sync::Arc;

use flowref_core::{resolve, Contract, Declaring, FlowDefinition, FlowRegistry, FlowResult, MethodRef};
use log::debug;

pub use builder::FlowBuilder;

/// Punto de entrada de la DSL sobre el registro global.
pub fn flow() -> FlowRef {
    FlowRef::with_registry(FlowRegistry::global())
}

/// Instancia de despacho de `C` en el registro global.
pub fn get_flow<C: Contract + ?Sized>() -> FlowResult<Arc<C>> {
    flow().get::<C>()
}

#[derive(Clone, Debug)]
pub struct FlowRef {
    registry: Arc<FlowRegistry>,
}

impl FlowRef {
    pub fn with_registry(registry: Arc<FlowRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<FlowRegistry> {
        &self.registry
    }

    /// Empieza un flujo que responde a `reference`.
    ///
    /// Aquí sólo se valida el contrato y se asegura su registro; la
    /// definición se registra al sellar el builder, reemplazando entonces a
    /// la anterior del mismo método.
    pub fn from<C: Declaring + ?Sized>(&self, reference: MethodRef<C>) -> FlowResult<FlowBuilder<C>> {
        let identity = resolve(&reference)?;
        let record = self.registry.record_for(*identity.declaring())?;
        let definition = Arc::new(FlowDefinition::new(identity));
        debug!("from:open flow={} contract={}", definition.id(), record.descriptor().name());
        Ok(FlowBuilder::new(definition, record))
    }

    pub fn get<C: Contract + ?Sized>(&self) -> FlowResult<Arc<C>> {
        self.registry.instance::<C>()
    }
}
