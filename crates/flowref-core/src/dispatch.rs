//! Despacho de invocaciones hacia las cadenas registradas.
//!
//! Cada contrato tiene un único `FlowHandler` con la tabla
//! `firma de método -> definición`. La instancia que recibe el llamador es un
//! `FlowProxy<dyn Contrato>`: `flow_contract!` implementa el trait para él
//! codificando los argumentos a `serde_json::Value`, llamando a
//! `FlowHandler::invoke` y decodificando el resultado.

use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use dashmap::DashMap;
use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::config::FlowConfig;
use crate::definition::{FlowDefinition, FlowSummary};
use crate::errors::{DispatchError, FlowResult};
use crate::reference::MethodSignature;

pub struct FlowHandler {
    contract: &'static str,
    flows: DashMap<MethodSignature, Arc<FlowDefinition>>,
    config: FlowConfig,
}

impl FlowHandler {
    pub fn new(contract: &'static str, config: FlowConfig) -> Self {
        Self { contract,
               flows: DashMap::new(),
               config }
    }

    pub fn contract(&self) -> &'static str {
        self.contract
    }

    pub fn config(&self) -> FlowConfig {
        self.config
    }

    /// Registra `definition` bajo la firma de su método de entrada.
    /// Devuelve la definición reemplazada, si la había (gana la última).
    pub fn register(&self, definition: Arc<FlowDefinition>) -> Option<Arc<FlowDefinition>> {
        let key = definition.entry().method();
        let previous = self.flows.insert(key, definition);
        if let Some(old) = &previous {
            warn!("replacing flow {} (revision {}) for method {key}", old.id(), old.revision());
        }
        previous
    }

    /// Ejecuta la cadena registrada para `method` con `arguments.len()`
    /// parámetros.
    pub fn invoke(&self, method: &'static str, arguments: Vec<Value>) -> Result<Value, DispatchError> {
        let key = MethodSignature::new(method, arguments.len());
        if self.config.log_invocations {
            info!("Invoking method: {method}");
        }
        // el guard del DashMap no debe vivir mientras corren los steps
        let definition = self.flows
                             .get(&key)
                             .map(|entry| Arc::clone(entry.value()))
                             .ok_or_else(|| DispatchError::NoFlow { contract: self.contract.to_string(),
                                                                    method: key.to_string() })?;
        definition.execute(&arguments, self.config.dispatch_unsealed)
    }

    pub fn definition(&self, method: MethodSignature) -> Option<Arc<FlowDefinition>> {
        self.flows.get(&method).map(|entry| Arc::clone(entry.value()))
    }

    pub fn is_registered(&self, method: MethodSignature) -> bool {
        self.flows.contains_key(&method)
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// Resúmenes de las definiciones activas, ordenados por método.
    pub fn summaries(&self) -> Vec<FlowSummary> {
        let mut out: Vec<FlowSummary> = self.flows.iter().map(|entry| entry.value().summary()).collect();
        out.sort_by(|a, b| a.method.cmp(&b.method));
        out
    }
}

impl fmt::Debug for FlowHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowHandler")
         .field("contract", &self.contract)
         .field("flows", &self.flows.len())
         .field("config", &self.config)
         .finish()
    }
}

/// Instancia de despacho de un contrato `C` (`dyn Trait`).
pub struct FlowProxy<C: ?Sized> {
    handler: Arc<FlowHandler>,
    _contract: PhantomData<fn() -> Box<C>>,
}

impl<C: ?Sized> FlowProxy<C> {
    pub fn new(handler: Arc<FlowHandler>) -> Self {
        Self { handler,
               _contract: PhantomData }
    }

    // función asociada para no chocar con métodos del contrato
    pub fn handler(proxy: &Self) -> &Arc<FlowHandler> {
        &proxy.handler
    }
}

impl<C: ?Sized> fmt::Debug for FlowProxy<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FlowProxy").field(&self.handler.contract).finish()
    }
}

/// Codifica un argumento de invocación.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> FlowResult<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Decodifica el resultado de una invocación. Para `()` el valor se descarta.
pub fn decode<R: DeserializeOwned + 'static>(value: Value) -> FlowResult<R> {
    if TypeId::of::<R>() == TypeId::of::<()>() {
        return Ok(serde_json::from_value(Value::Null)?);
    }
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::IntoStep;
    use crate::errors::FlowError;
    use crate::reference::{resolve, Declaring, MethodRef, TypeDescriptor};
    use serde_json::json;

    struct Ops;

    impl Declaring for Ops {
        fn descriptor() -> TypeDescriptor {
            const METHODS: &[MethodSignature] = &[MethodSignature::new("join", 2),
                                                  MethodSignature::new("join", 3),
                                                  MethodSignature::new("ping", 0)];
            TypeDescriptor::concrete::<Ops>(METHODS)
        }
    }

    fn sealed(method: MethodRef<Ops>, step: impl FnOnce(&FlowDefinition)) -> Arc<FlowDefinition> {
        let def = FlowDefinition::new(resolve(&method).unwrap());
        step(&def);
        def.seal();
        Arc::new(def)
    }

    fn handler(config: FlowConfig) -> FlowHandler {
        FlowHandler::new("tests::Ops", config)
    }

    #[test]
    fn routes_by_name_and_arity() {
        let h = handler(FlowConfig::default());
        h.register(sealed(MethodRef::new("join").with_arity(2), |d| {
             d.add_step((|a: String, b: String| format!("{a}{b}")).into_step());
         }));
        h.register(sealed(MethodRef::new("join").with_arity(3), |d| {
             d.add_step((|a: String, b: String, c: String| format!("{a}{b}{c}")).into_step());
         }));
        assert_eq!(h.invoke("join", vec![json!("a"), json!("b")]).unwrap(), json!("ab"));
        assert_eq!(h.invoke("join", vec![json!("a"), json!("b"), json!("c")]).unwrap(), json!("abc"));
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn unknown_method_is_no_flow() {
        let h = handler(FlowConfig::default());
        match h.invoke("ping", vec![]) {
            Err(DispatchError::NoFlow { contract, method }) => {
                assert_eq!(contract, "tests::Ops");
                assert_eq!(method, "ping/0");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn last_registration_wins() {
        let h = handler(FlowConfig::default());
        let first = sealed(MethodRef::new("ping"), |d| {
            d.add_step((|| "first").into_step());
        });
        assert!(h.register(Arc::clone(&first)).is_none());
        let replaced = h.register(sealed(MethodRef::new("ping"), |d| {
                             d.add_step((|| "second").into_step());
                         }));
        assert!(Arc::ptr_eq(&replaced.unwrap(), &first));
        assert_eq!(h.invoke("ping", vec![]).unwrap(), json!("second"));
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn unsealed_dispatch_follows_config() {
        let open = || {
            let def = FlowDefinition::new(resolve(&MethodRef::<Ops>::new("ping")).unwrap());
            def.add_step((|| 7).into_step());
            Arc::new(def)
        };
        let strict = handler(FlowConfig::default());
        strict.register(open());
        assert!(matches!(strict.invoke("ping", vec![]), Err(DispatchError::Unsealed { .. })));

        let lenient = handler(FlowConfig::default().with_dispatch_unsealed(true));
        lenient.register(open());
        assert_eq!(lenient.invoke("ping", vec![]).unwrap(), json!(7));
    }

    #[test]
    fn summaries_are_sorted_by_method() {
        let h = handler(FlowConfig::default());
        h.register(sealed(MethodRef::new("ping"), |_| {}));
        h.register(sealed(MethodRef::new("join").with_arity(2), |_| {}));
        let methods: Vec<String> = h.summaries().into_iter().map(|s| s.method).collect();
        assert_eq!(methods, vec!["join/2", "ping/0"]);
    }

    #[test]
    fn decode_discards_value_for_unit() {
        decode::<()>(json!("ignored")).unwrap();
        assert_eq!(decode::<i32>(json!(3)).unwrap(), 3);
        assert!(matches!(decode::<i32>(json!("x")), Err(FlowError::Dispatch(DispatchError::Codec(_)))));
        assert_eq!(encode("a").unwrap(), json!("a"));
    }
}
