//! Resolución de referencias a métodos.
//!
//! Una `MethodRef<T>` es la clave explícita que el llamador entrega al DSL:
//! tipo declarante (parámetro de tipo), nombre del método, aridad opcional y,
//! si la referencia está ligada a una instancia, el receptor capturado.
//! `resolve` la convierte en una `ReferenceIdentity` estable usando los
//! metadatos de `Declaring`.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::types::{Declaring, MethodSignature, TypeDescriptor};
use crate::errors::ResolutionError;

/// Referencia explícita a un método de `T`.
pub struct MethodRef<T: ?Sized> {
    method: String,
    arity: Option<usize>,
    receiver: Option<CapturedReceiver>,
    _declaring: PhantomData<fn() -> Box<T>>,
}

impl<T: Declaring + ?Sized> MethodRef<T> {
    /// Referencia no ligada (`Tipo::metodo`).
    pub fn new(method: impl Into<String>) -> Self {
        Self { method: method.into(),
               arity: None,
               receiver: None,
               _declaring: PhantomData }
    }

    /// Restringe la búsqueda a métodos con exactamente `arity` parámetros.
    pub fn with_arity(mut self, arity: usize) -> Self {
        self.arity = Some(arity);
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn arity(&self) -> Option<usize> {
        self.arity
    }

    pub fn is_bound(&self) -> bool {
        self.receiver.is_some()
    }
}

impl<T: Declaring + Send + Sync> MethodRef<T> {
    /// Referencia ligada a una instancia (`instancia::metodo`).
    pub fn bound(receiver: Arc<T>, method: impl Into<String>) -> Self {
        Self { method: method.into(),
               arity: None,
               receiver: Some(CapturedReceiver(receiver)),
               _declaring: PhantomData }
    }
}

impl<T: ?Sized> fmt::Debug for MethodRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodRef")
         .field("declaring", &std::any::type_name::<T>())
         .field("method", &self.method)
         .field("arity", &self.arity)
         .field("bound", &self.receiver.is_some())
         .finish()
    }
}

/// Receptor capturado por una referencia ligada.
#[derive(Clone)]
pub struct CapturedReceiver(Arc<dyn Any + Send + Sync>);

impl CapturedReceiver {
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.0).downcast::<T>().ok()
    }
}

impl fmt::Debug for CapturedReceiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CapturedReceiver(..)")
    }
}

/// Identidad resuelta de una referencia.
///
/// Dos identidades apuntan al mismo punto de entrada si coinciden tipo
/// declarante y firma; el receptor es informativo.
#[derive(Clone, Debug)]
pub struct ReferenceIdentity {
    declaring: TypeDescriptor,
    method: MethodSignature,
    receiver: Option<CapturedReceiver>,
}

impl ReferenceIdentity {
    pub fn declaring(&self) -> &TypeDescriptor {
        &self.declaring
    }

    pub fn method(&self) -> MethodSignature {
        self.method
    }

    pub fn captured_receiver(&self) -> Option<&CapturedReceiver> {
        self.receiver.as_ref()
    }

    /// Recupera el receptor capturado con su tipo concreto.
    pub fn receiver<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.receiver.as_ref().and_then(|r| r.downcast::<T>())
    }

    /// `<tipo declarante>#<método>`
    pub fn flow_id(&self) -> String {
        format!("{}#{}", self.declaring.name(), self.method.name)
    }

    pub fn same_entry_point(&self, other: &ReferenceIdentity) -> bool {
        self.declaring == other.declaring && self.method == other.method
    }
}

/// Resuelve una referencia contra los metadatos de su tipo declarante.
///
/// Busca primero entre los métodos propios y después entre los de los
/// supertipos directos; gana la primera coincidencia.
pub fn resolve<T: Declaring + ?Sized>(reference: &MethodRef<T>) -> Result<ReferenceIdentity, ResolutionError> {
    let declaring = T::descriptor();
    if let Err(reason) = check_identifier(&reference.method) {
        return Err(ResolutionError::InvalidReference { reference: format!("{}#{}", declaring.name(), reference.method),
                                                       reason });
    }
    let method = find_method(&declaring, &reference.method, reference.arity).ok_or_else(|| {
                     let method = match reference.arity {
                         Some(arity) => format!("{}/{}", reference.method, arity),
                         None => reference.method.clone(),
                     };
                     ResolutionError::MethodNotFound { method,
                                                       type_name: declaring.name().to_string() }
                 })?;
    Ok(ReferenceIdentity { declaring,
                           method,
                           receiver: reference.receiver.clone() })
}

fn find_method(declaring: &TypeDescriptor, name: &str, arity: Option<usize>) -> Option<MethodSignature> {
    let name = plain_name(name);
    let matches = |m: &&MethodSignature| plain_name(m.name) == name && arity.map_or(true, |a| a == m.arity);
    declaring.methods()
             .iter()
             .find(matches)
             .or_else(|| {
                 declaring.supertypes()
                          .iter()
                          .find_map(|s| s.methods().iter().find(matches))
             })
             .copied()
}

// `stringify!(r#type)` conserva el prefijo `r#`
fn plain_name(name: &str) -> &str {
    name.strip_prefix("r#").unwrap_or(name)
}

fn check_identifier(name: &str) -> Result<(), String> {
    let mut chars = plain_name(name).chars();
    match chars.next() {
        None => Err("empty method name".to_string()),
        Some(c) if !(c == '_' || c.is_alphabetic()) => Err(format!("'{c}' cannot start a method name")),
        Some(_) => match chars.find(|c| !(*c == '_' || c.is_alphanumeric())) {
            Some(c) => Err(format!("'{c}' is not allowed in a method name")),
            None => Ok(()),
        },
    }
}
