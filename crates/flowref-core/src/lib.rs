//! flowref-core: registro y despacho de flujos por referencia a método
pub mod command;
pub mod config;
pub mod definition;
pub mod dispatch;
pub mod errors;
mod macros;
pub mod reference;
pub mod registry;

pub use command::{ChainSnapshot, Command, CommandChain, IntoBoundStep, IntoStep, StepCommand, StepFailure, TryIntoStep};
pub use config::{init_dotenv, FlowConfig, CONFIG};
pub use definition::{FlowDefinition, FlowSummary};
pub use dispatch::{decode, encode, FlowHandler, FlowProxy};
pub use errors::{DefinitionError, DispatchError, FlowError, FlowResult, ResolutionError, StepError};
pub use reference::{resolve, CapturedReceiver, Contract, Declaring, MethodRef, MethodSignature, ReferenceIdentity, TypeDescriptor,
                    TypeKind};
pub use registry::{DispatchRecord, FlowRegistry};

// Usado por el código que genera `flow_contract!`.
pub use serde_json::Value;
