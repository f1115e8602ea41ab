//! FlowRef
//!
//! Define, con una DSL fluida, la secuencia de pasos que se ejecuta al
//! invocar un método de un contrato, y obtiene la instancia que la despacha:
//! - `dsl`: `flow()`, `FlowRef`, `FlowBuilder`, `get_flow`.
//! - Re-exporta el núcleo (`flowref-core`): contratos, registro y errores.

pub mod dsl;

pub use dsl::{flow, get_flow, FlowBuilder, FlowRef};
pub use flowref_core::{declare_type, flow_contract, init_dotenv};
pub use flowref_core::{Contract, Declaring, DefinitionError, DispatchError, FlowConfig, FlowDefinition, FlowError, FlowHandler,
                       FlowProxy, FlowRegistry, FlowResult, FlowSummary, MethodRef, MethodSignature, ReferenceIdentity,
                       ResolutionError, StepError, TypeDescriptor, TypeKind};
