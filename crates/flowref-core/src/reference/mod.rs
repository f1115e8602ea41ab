//! Referencias a métodos: metadatos de tipos declarantes y resolución de
//! identidades.

pub mod resolver;
pub mod types;

pub use resolver::{resolve, CapturedReceiver, MethodRef, ReferenceIdentity};
pub use types::{Contract, Declaring, MethodSignature, ProxyFactory, TypeDescriptor, TypeKind};
