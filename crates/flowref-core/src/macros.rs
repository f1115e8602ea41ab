//! Macros para declarar contratos y tipos concretos.
//!
//! Exportadas en la raíz del crate:
//!   use flowref_core::{flow_contract, declare_type};

/// Declara un contrato de flujos.
///
/// Genera el trait (con `Send + Sync` como supertraits), implementa
/// `Declaring` y `Contract` para `dyn Trait` e implementa el trait para
/// `FlowProxy<C>`, que delega cada llamada en `FlowHandler::invoke`.
///
/// ```ignore
/// flow_contract! {
///     pub trait Flows: Parent {
///         fn process_two(&self, a: String, b: String) -> FlowResult<String>;
///     }
/// }
/// ```
///
/// Los métodos toman `&self` y devuelven `FlowResult<R>`; argumentos y `R`
/// deben ser serializables. Los supertraits deben declararse también con
/// `flow_contract!`.
#[macro_export]
macro_rules! flow_contract {
    (
        $(#[$meta:meta])*
        $vis:vis trait $name:ident $(: $first:ident $(+ $rest:ident)*)? {
            $(
                $(#[$mmeta:meta])*
                fn $method:ident(&self $(, $arg:ident : $argty:ty)*) -> $ret:ty;
            )*
        }
    ) => {
        $(#[$meta])*
        $vis trait $name: $($first $(+ $rest)* +)? ::std::marker::Send + ::std::marker::Sync {
            $(
                $(#[$mmeta])*
                fn $method(&self $(, $arg: $argty)*) -> $ret;
            )*
        }

        impl $crate::Declaring for dyn $name {
            fn descriptor() -> $crate::TypeDescriptor {
                const METHODS: &[$crate::MethodSignature] = &[
                    $($crate::MethodSignature::new(::std::stringify!($method), $crate::__flow_count!($($arg)*)),)*
                ];
                fn supertypes() -> ::std::vec::Vec<$crate::TypeDescriptor> {
                    ::std::vec![$(<dyn $first as $crate::Declaring>::descriptor()
                                  $(, <dyn $rest as $crate::Declaring>::descriptor())*)?]
                }
                $crate::TypeDescriptor::contract::<dyn $name>(METHODS, supertypes)
            }
        }

        impl $crate::Contract for dyn $name {
            fn proxy(handler: ::std::sync::Arc<$crate::FlowHandler>) -> ::std::sync::Arc<Self> {
                ::std::sync::Arc::new($crate::FlowProxy::<dyn $name>::new(handler))
            }
        }

        impl<C: ?Sized + 'static> $name for $crate::FlowProxy<C> {
            $(
                fn $method(&self $(, $arg: $argty)*) -> $ret {
                    let arguments: ::std::vec::Vec<$crate::Value> = ::std::vec![$($crate::encode(&$arg)?),*];
                    let value = $crate::FlowProxy::handler(self).invoke(::std::stringify!($method), arguments)?;
                    $crate::decode(value)
                }
            )*
        }
    };
}

/// Declara metadatos de un tipo concreto para usarlo en `to_ref`.
///
/// - declare_type!(Name { method / 2, other / 0 });
#[macro_export]
macro_rules! declare_type {
    ($ty:ty { $($method:ident / $arity:literal),* $(,)? }) => {
        impl $crate::Declaring for $ty {
            fn descriptor() -> $crate::TypeDescriptor {
                const METHODS: &[$crate::MethodSignature] = &[
                    $($crate::MethodSignature::new(::std::stringify!($method), $arity),)*
                ];
                $crate::TypeDescriptor::concrete::<$ty>(METHODS)
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __flow_count {
    () => { 0usize };
    ($head:ident $($tail:ident)*) => { 1usize + $crate::__flow_count!($($tail)*) };
}
