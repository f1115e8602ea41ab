//! Metadatos de tipos declarantes.
//!
//! Un tipo declarante expone de forma explícita su nombre, su conjunto de
//! métodos y (si es un contrato) la fábrica del proxy de despacho. Estos
//! metadatos sustituyen a la introspección en tiempo de ejecución: los
//! genera `flow_contract!` para contratos y `declare_type!` para tipos
//! concretos.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::dispatch::FlowHandler;

/// Fabrica la instancia de despacho (`Arc<C>` borrado como `Any`) de un
/// contrato a partir de su handler.
pub type ProxyFactory = fn(Arc<FlowHandler>) -> Box<dyn Any + Send + Sync>;

/// Clase de tipo declarante.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// Contrato puro (trait) sobre el que se pueden definir flujos.
    Contract,
    /// Tipo concreto; sólo válido como referencia de un step intermedio.
    Concrete,
}

/// Nombre y número de parámetros (sin contar el receptor) de un método.
///
/// Es también la clave de despacho: dos métodos con el mismo nombre y
/// distinta aridad tienen flujos independientes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    pub name: &'static str,
    pub arity: usize,
}

impl MethodSignature {
    pub const fn new(name: &'static str, arity: usize) -> Self {
        Self { name, arity }
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.arity)
    }
}

/// Metadatos estáticos de un tipo declarante.
#[derive(Clone, Copy)]
pub struct TypeDescriptor {
    type_id: TypeId,
    name: &'static str,
    kind: TypeKind,
    methods: &'static [MethodSignature],
    supertypes: fn() -> Vec<TypeDescriptor>,
    proxy: Option<ProxyFactory>,
}

fn no_supertypes() -> Vec<TypeDescriptor> {
    Vec::new()
}

fn proxy_factory<C>(handler: Arc<FlowHandler>) -> Box<dyn Any + Send + Sync>
    where C: Contract + ?Sized
{
    Box::new(C::proxy(handler))
}

impl TypeDescriptor {
    /// Descriptor de un contrato: lleva la fábrica de su proxy.
    pub fn contract<C>(methods: &'static [MethodSignature], supertypes: fn() -> Vec<TypeDescriptor>) -> Self
        where C: Contract + ?Sized
    {
        Self { type_id: TypeId::of::<C>(),
               name: display_name(std::any::type_name::<C>()),
               kind: TypeKind::Contract,
               methods,
               supertypes,
               proxy: Some(proxy_factory::<C>) }
    }

    /// Descriptor de un tipo concreto (sin proxy).
    pub fn concrete<T>(methods: &'static [MethodSignature]) -> Self
        where T: ?Sized + 'static
    {
        Self { type_id: TypeId::of::<T>(),
               name: display_name(std::any::type_name::<T>()),
               kind: TypeKind::Concrete,
               methods,
               supertypes: no_supertypes,
               proxy: None }
    }

    /// Declara los supertipos directos (traits padre de un contrato).
    pub fn with_supertypes(mut self, supertypes: fn() -> Vec<TypeDescriptor>) -> Self {
        self.supertypes = supertypes;
        self
    }

    pub fn of<T: Declaring + ?Sized>() -> Self {
        T::descriptor()
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn is_contract(&self) -> bool {
        self.kind == TypeKind::Contract
    }

    pub fn methods(&self) -> &'static [MethodSignature] {
        self.methods
    }

    /// Supertipos declarados directamente (un solo nivel).
    pub fn supertypes(&self) -> Vec<TypeDescriptor> {
        (self.supertypes)()
    }

    pub(crate) fn proxy(&self) -> Option<ProxyFactory> {
        self.proxy
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for TypeDescriptor {}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
         .field("name", &self.name)
         .field("kind", &self.kind)
         .field("methods", &self.methods)
         .finish()
    }
}

// `type_name::<dyn Foo>()` devuelve "dyn crate::Foo".
fn display_name(raw: &'static str) -> &'static str {
    raw.strip_prefix("dyn ").unwrap_or(raw)
}

/// Tipo que publica sus metadatos para la resolución de referencias.
pub trait Declaring: 'static {
    fn descriptor() -> TypeDescriptor;
}

/// Contrato sobre el que se definen flujos.
///
/// Se implementa para `dyn Trait` mediante `flow_contract!`; `proxy`
/// construye la instancia de despacho que delega cada llamada en el
/// handler.
pub trait Contract: Declaring + Send + Sync {
    fn proxy(handler: Arc<FlowHandler>) -> Arc<Self>;
}
