//! Definición de un flujo: identidad de entrada + cadena de comandos.
//!
//! Se crea con el comando `Entry` ya sembrado; el builder añade los steps y
//! la sella al terminar. La ejecución recorre la cadena en orden, salta los
//! `Entry` y devuelve el valor del último step no-void.

use std::fmt;

use chrono::{DateTime, Utc};
use log::{debug, error};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::command::{ChainSnapshot, Command, CommandChain, StepCommand, StepFailure};
use crate::errors::DispatchError;
use crate::reference::ReferenceIdentity;

/// Resumen serializable de una definición registrada.
#[derive(Debug, Clone, Serialize)]
pub struct FlowSummary {
    pub id: String,
    /// Firma `nombre/aridad` del método de entrada.
    pub method: String,
    pub steps: usize,
    pub sealed: bool,
    pub revision: Uuid,
    pub registered_at: DateTime<Utc>,
}

pub struct FlowDefinition {
    id: String,
    revision: Uuid,
    registered_at: DateTime<Utc>,
    entry: ReferenceIdentity,
    chain: CommandChain,
}

impl FlowDefinition {
    pub fn new(entry: ReferenceIdentity) -> Self {
        let chain = CommandChain::new();
        chain.push(Command::Entry(entry.clone()));
        Self { id: entry.flow_id(),
               revision: Uuid::new_v4(),
               registered_at: Utc::now(),
               entry,
               chain }
    }

    /// `<tipo declarante>#<método>`
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Distingue definiciones sucesivas con el mismo id.
    pub fn revision(&self) -> Uuid {
        self.revision
    }

    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }

    pub fn entry(&self) -> &ReferenceIdentity {
        &self.entry
    }

    pub fn chain(&self) -> &CommandChain {
        &self.chain
    }

    pub fn add_step(&self, step: StepCommand) -> bool {
        self.chain.push(Command::Step(step))
    }

    pub fn seal(&self) -> bool {
        let sealed = self.chain.seal();
        if sealed {
            debug!("flow {} sealed with {} commands", self.id, self.chain.len());
        }
        sealed
    }

    pub fn is_sealed(&self) -> bool {
        self.chain.is_sealed()
    }

    /// Número de steps ejecutables (sin contar el `Entry`).
    pub fn step_count(&self) -> usize {
        self.chain
            .snapshot()
            .commands()
            .iter()
            .filter(|c| matches!(c, Command::Step(_)))
            .count()
    }

    /// Ejecuta la cadena con `arguments`.
    ///
    /// Con `allow_unsealed == false` una cadena en construcción se rechaza;
    /// con `true` se ejecutan los steps añadidos hasta el momento.
    pub fn execute(&self, arguments: &[Value], allow_unsealed: bool) -> Result<Value, DispatchError> {
        let snapshot = self.chain.snapshot();
        if let ChainSnapshot::Partial(_) = snapshot {
            if !allow_unsealed {
                return Err(DispatchError::Unsealed { flow_id: self.id.clone() });
            }
        }
        let mut result = Value::Null;
        for (index, command) in snapshot.commands().iter().enumerate() {
            let Command::Step(step) = command else {
                continue;
            };
            match step.run(arguments) {
                Ok(Some(value)) => result = value,
                Ok(None) => {}
                Err(failure) => {
                    error!("flow {} failed at step {} ({})", self.id, index, step.label());
                    return Err(self.dispatch_error(index, failure));
                }
            }
        }
        Ok(result)
    }

    pub fn summary(&self) -> FlowSummary {
        let snapshot = self.chain.snapshot();
        FlowSummary { id: self.id.clone(),
                      method: self.entry.method().to_string(),
                      steps: snapshot.commands()
                                     .iter()
                                     .filter(|c| matches!(c, Command::Step(_)))
                                     .count(),
                      sealed: snapshot.is_sealed(),
                      revision: self.revision,
                      registered_at: self.registered_at }
    }

    fn dispatch_error(&self, step: usize, failure: StepFailure) -> DispatchError {
        let flow_id = self.id.clone();
        match failure {
            StepFailure::MissingArguments { expected, got } => DispatchError::MissingArguments { flow_id,
                                                                                                 step,
                                                                                                 expected,
                                                                                                 got },
            StepFailure::Argument { position, source } => DispatchError::Argument { flow_id,
                                                                                    step,
                                                                                    position,
                                                                                    source },
            StepFailure::Output(e) => DispatchError::Codec(e),
            StepFailure::Failed(source) => DispatchError::Step { flow_id, step, source },
        }
    }
}

impl fmt::Display for FlowDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.chain.snapshot();
        let kinds: Vec<&str> = snapshot.commands().iter().map(Command::kind).collect();
        write!(f, "{} [{}]", self.id, kinds.join(" -> "))
    }
}

impl fmt::Debug for FlowDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowDefinition")
         .field("id", &self.id)
         .field("revision", &self.revision)
         .field("chain", &self.chain)
         .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{IntoStep, TryIntoStep};
    use crate::reference::{resolve, Declaring, MethodRef, MethodSignature, TypeDescriptor};
    use serde_json::json;

    struct Calc;

    impl Declaring for Calc {
        fn descriptor() -> TypeDescriptor {
            const METHODS: &[MethodSignature] = &[MethodSignature::new("sum", 2)];
            TypeDescriptor::concrete::<Calc>(METHODS)
        }
    }

    fn definition() -> FlowDefinition {
        FlowDefinition::new(resolve(&MethodRef::<Calc>::new("sum")).unwrap())
    }

    #[test]
    fn id_is_type_hash_method() {
        let def = definition();
        assert!(def.id().ends_with("Calc#sum"));
        assert_eq!(def.step_count(), 0);
        assert_eq!(def.chain().len(), 1);
    }

    #[test]
    fn returns_last_non_void_result() {
        let def = definition();
        def.add_step((|a: i64, b: i64| a + b).into_step());
        def.add_step((|a: i64, b: i64| a * b).into_step());
        def.add_step((|| ()).into_step());
        def.seal();
        assert_eq!(def.execute(&[json!(3), json!(4)], false).unwrap(), json!(12));
    }

    #[test]
    fn empty_chain_returns_null() {
        let def = definition();
        def.seal();
        assert_eq!(def.execute(&[], false).unwrap(), Value::Null);
    }

    #[test]
    fn unsealed_chain_is_rejected_unless_allowed() {
        let def = definition();
        def.add_step((|| "partial").into_step());
        assert!(matches!(def.execute(&[], false), Err(DispatchError::Unsealed { .. })));
        assert_eq!(def.execute(&[], true).unwrap(), json!("partial"));
    }

    #[test]
    fn failing_step_aborts_remaining_steps() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        let reached = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&reached);
        let def = definition();
        def.add_step((|| Err::<(), _>("boom")).try_into_step());
        def.add_step((move || flag.store(true, Ordering::SeqCst)).into_step());
        def.seal();
        match def.execute(&[], false) {
            Err(DispatchError::Step { step, .. }) => assert_eq!(step, 1),
            other => panic!("unexpected {other:?}"),
        }
        assert!(!reached.load(Ordering::SeqCst));
    }

    #[test]
    fn summary_reflects_chain_state() {
        let def = definition();
        def.add_step((|a: i64, b: i64| a - b).into_step());
        let open = def.summary();
        assert_eq!(open.steps, 1);
        assert!(!open.sealed);
        assert_eq!(open.method, "sum/2");
        def.seal();
        let sealed = def.summary();
        assert!(sealed.sealed);
        assert_eq!(sealed.revision, def.revision());
        let json = serde_json::to_value(&sealed).unwrap();
        assert_eq!(json["steps"], json!(1));
    }

    #[test]
    fn display_lists_command_kinds() {
        let def = definition();
        def.add_step((|| 1).into_step());
        assert!(def.to_string().ends_with("Calc#sum [From -> To]"));
    }
}
