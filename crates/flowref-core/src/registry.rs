//! Registro de instancias de despacho.
//!
//! Un `DispatchRecord` por contrato: descriptor, handler y la instancia
//! `Arc<dyn Contrato>` ya construida. Las entradas nunca se eliminan.
//! La creación usa doble verificación bajo un único `RwLock`, de modo que
//! varios hilos que definen flujos del mismo contrato a la vez comparten el
//! mismo registro.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;
use log::debug;
use once_cell::sync::Lazy;

use crate::config::{FlowConfig, CONFIG};
use crate::definition::FlowDefinition;
use crate::dispatch::FlowHandler;
use crate::errors::{DefinitionError, DispatchError, FlowResult};
use crate::reference::{Contract, TypeDescriptor};

static GLOBAL: Lazy<Arc<FlowRegistry>> = Lazy::new(|| Arc::new(FlowRegistry::new()));

pub struct DispatchRecord {
    descriptor: TypeDescriptor,
    // Arc<C> del contrato
    instance: Box<dyn Any + Send + Sync>,
    handler: Arc<FlowHandler>,
}

impl DispatchRecord {
    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    pub fn handler(&self) -> &Arc<FlowHandler> {
        &self.handler
    }

    pub fn instance<C: Contract + ?Sized>(&self) -> Option<Arc<C>> {
        self.instance.downcast_ref::<Arc<C>>().cloned()
    }
}

impl fmt::Debug for DispatchRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchRecord")
         .field("contract", &self.descriptor.name())
         .field("handler", &self.handler)
         .finish()
    }
}

pub struct FlowRegistry {
    records: RwLock<IndexMap<TypeId, Arc<DispatchRecord>>>,
    config: FlowConfig,
}

impl Default for FlowRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowRegistry {
    /// Registro aislado con la configuración de entorno (`CONFIG`).
    pub fn new() -> Self {
        Self::with_config(*CONFIG)
    }

    pub fn with_config(config: FlowConfig) -> Self {
        Self { records: RwLock::new(IndexMap::new()),
               config }
    }

    /// Registro compartido por todo el proceso.
    pub fn global() -> Arc<FlowRegistry> {
        Arc::clone(&GLOBAL)
    }

    pub fn config(&self) -> FlowConfig {
        self.config
    }

    /// Registro del contrato `descriptor`, creándolo si aún no existe.
    /// Sólo los contratos pueden tener registro.
    pub fn record_for(&self, descriptor: TypeDescriptor) -> Result<Arc<DispatchRecord>, DefinitionError> {
        let factory = match descriptor.proxy() {
            Some(factory) if descriptor.is_contract() => factory,
            _ => {
                return Err(DefinitionError::NotAContract { type_name: descriptor.name().to_string() });
            }
        };
        let key = descriptor.type_id();

        let existing = self.read().get(&key).cloned();
        if let Some(record) = existing {
            return Ok(record);
        }

        let mut records = self.write();
        if let Some(record) = records.get(&key) {
            debug!("record_for:hit_after_lock contract={}", descriptor.name());
            return Ok(Arc::clone(record));
        }
        let handler = Arc::new(FlowHandler::new(descriptor.name(), self.config));
        let record = Arc::new(DispatchRecord { descriptor,
                                               instance: factory(Arc::clone(&handler)),
                                               handler });
        records.insert(key, Arc::clone(&record));
        debug!("record_for:create contract={} records={}", descriptor.name(), records.len());
        Ok(record)
    }

    /// Registra `definition` en el handler de su contrato. La definición
    /// queda despachable tal cual; normalmente llega ya sellada.
    pub fn attach(&self, definition: Arc<FlowDefinition>) -> Result<Arc<DispatchRecord>, DefinitionError> {
        let record = self.record_for(*definition.entry().declaring())?;
        debug!("attach contract={} flow={} sealed={}",
               record.descriptor.name(),
               definition.id(),
               definition.is_sealed());
        record.handler.register(definition);
        Ok(record)
    }

    /// Instancia de despacho de `C`, si ya se definió algún flujo sobre él.
    pub fn instance<C: Contract + ?Sized>(&self) -> FlowResult<Arc<C>> {
        self.record_of::<C>()
            .and_then(|record| record.instance::<C>())
            .ok_or_else(|| {
                DispatchError::NoInstance { contract: C::descriptor().name().to_string() }.into()
            })
    }

    pub fn record(&self, type_id: TypeId) -> Option<Arc<DispatchRecord>> {
        self.read().get(&type_id).cloned()
    }

    pub fn record_of<C: Contract + ?Sized>(&self) -> Option<Arc<DispatchRecord>> {
        self.record(TypeId::of::<C>())
    }

    /// Contratos con registro, en orden de creación.
    pub fn contracts(&self) -> Vec<TypeDescriptor> {
        self.read().values().map(|record| record.descriptor).collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexMap<TypeId, Arc<DispatchRecord>>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexMap<TypeId, Arc<DispatchRecord>>> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for FlowRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowRegistry")
         .field("contracts", &self.contracts())
         .field("config", &self.config)
         .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::IntoStep;
    use crate::errors::FlowError;
    use crate::reference::{resolve, Declaring, MethodRef, MethodSignature};

    crate::flow_contract! {
        pub trait Echo {
            fn echo(&self, text: String) -> FlowResult<String>;
            fn twice(&self, text: String) -> FlowResult<String>;
        }
    }

    crate::flow_contract! {
        pub trait Other {
            fn noop(&self) -> FlowResult<()>;
        }
    }

    struct NotContract;

    impl Declaring for NotContract {
        fn descriptor() -> TypeDescriptor {
            const METHODS: &[MethodSignature] = &[MethodSignature::new("run", 0)];
            TypeDescriptor::concrete::<NotContract>(METHODS)
        }
    }

    fn sealed<T: Declaring + ?Sized>(reference: MethodRef<T>, step: impl FnOnce(&FlowDefinition)) -> Arc<FlowDefinition> {
        let def = FlowDefinition::new(resolve(&reference).unwrap());
        step(&def);
        def.seal();
        Arc::new(def)
    }

    #[test]
    fn concrete_types_cannot_define_flows() {
        let registry = FlowRegistry::with_config(FlowConfig::default());
        let err = registry.attach(sealed(MethodRef::<NotContract>::new("run"), |_| {}))
                          .unwrap_err();
        assert!(err.to_string().contains("needs to be an interface"));
        assert!(registry.is_empty());
    }

    #[test]
    fn one_record_per_contract() {
        let registry = FlowRegistry::with_config(FlowConfig::default());
        let a = registry.attach(sealed(MethodRef::<dyn Echo>::new("echo"), |d| {
                                    d.add_step((|t: String| t).into_step());
                                }))
                        .unwrap();
        let b = registry.attach(sealed(MethodRef::<dyn Echo>::new("twice"), |d| {
                                    d.add_step((|t: String| format!("{t}{t}")).into_step());
                                }))
                        .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
        assert_eq!(a.handler().len(), 2);

        let echo = registry.instance::<dyn Echo>().unwrap();
        assert!(Arc::ptr_eq(&echo, &registry.instance::<dyn Echo>().unwrap()));
        assert_eq!(echo.echo("hi".into()).unwrap(), "hi");
        assert_eq!(echo.twice("hi".into()).unwrap(), "hihi");
    }

    #[test]
    fn record_for_does_not_register_flows() {
        let registry = FlowRegistry::with_config(FlowConfig::default());
        let first = registry.record_for(<dyn Echo>::descriptor()).unwrap();
        let again = registry.record_for(<dyn Echo>::descriptor()).unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert!(first.handler().is_empty());
        assert!(registry.record_for(NotContract::descriptor()).is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn missing_instance_is_reported() {
        let registry = FlowRegistry::with_config(FlowConfig::default());
        match registry.instance::<dyn Other>() {
            Err(FlowError::Dispatch(DispatchError::NoInstance { contract })) => {
                assert!(contract.ends_with("Other"))
            }
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn contracts_keep_creation_order() {
        let registry = FlowRegistry::with_config(FlowConfig::default());
        registry.attach(sealed(MethodRef::<dyn Other>::new("noop"), |_| {})).unwrap();
        registry.attach(sealed(MethodRef::<dyn Echo>::new("echo"), |_| {})).unwrap();
        let names: Vec<TypeId> = registry.contracts().iter().map(|d| d.type_id()).collect();
        assert_eq!(names, vec![TypeId::of::<dyn Other>(), TypeId::of::<dyn Echo>()]);
        registry.instance::<dyn Other>().unwrap().noop().unwrap();
    }
}
