//! Errores del motor de flujos.
//!
//! Cada fase tiene su propio enum: resolución de referencias, definición de
//! flujos (registro) y despacho (invocación). `FlowError` los agrupa para
//! que la API pública devuelva un único tipo.

use thiserror::Error;

/// Error producido por un step de usuario.
pub type StepError = Box<dyn std::error::Error + Send + Sync>;

/// Resultado de cualquier operación pública del motor.
pub type FlowResult<T> = Result<T, FlowError>;

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("cannot resolve reference '{reference}': {reason}")]
    InvalidReference { reference: String, reason: String },
    #[error("could not find method {method} in {type_name}")]
    MethodNotFound { method: String, type_name: String },
    #[error("step for {reference} takes {got} arguments but the method declares {expected}")]
    ArityMismatch { reference: String, expected: usize, got: usize },
    #[error("reference {reference} is not bound to an instance")]
    Unbound { reference: String },
}

#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("{type_name} needs to be an interface in order to define flows from it")]
    NotAContract { type_name: String },
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no flow registered for method {method} of {contract}")]
    NoFlow { contract: String, method: String },
    #[error("no dispatch instance registered for {contract}")]
    NoInstance { contract: String },
    #[error("flow {flow_id} is still being defined")]
    Unsealed { flow_id: String },
    #[error("step {step} of flow {flow_id} expects {expected} arguments, got {got}")]
    MissingArguments { flow_id: String, step: usize, expected: usize, got: usize },
    #[error("step {step} of flow {flow_id} rejected argument {position}: {source}")]
    Argument {
        flow_id: String,
        step: usize,
        position: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("step {step} of flow {flow_id} failed: {source}")]
    Step {
        flow_id: String,
        step: usize,
        #[source]
        source: StepError,
    },
    #[error("value codec: {0}")]
    Codec(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum FlowError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Definition(#[from] DefinitionError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl From<serde_json::Error> for FlowError {
    fn from(err: serde_json::Error) -> Self {
        FlowError::Dispatch(DispatchError::Codec(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_a_contract_mentions_interface() {
        let err = DefinitionError::NotAContract { type_name: "demo::Plain".into() };
        assert_eq!(err.to_string(),
                   "demo::Plain needs to be an interface in order to define flows from it");
    }

    #[test]
    fn method_not_found_format() {
        let err = ResolutionError::MethodNotFound { method: "nope".into(),
                                                    type_name: "demo::Flows".into() };
        assert_eq!(err.to_string(), "could not find method nope in demo::Flows");
    }

    #[test]
    fn arity_mismatch_format() {
        let err = ResolutionError::ArityMismatch { reference: "demo::Helper#combine".into(),
                                                   expected: 2,
                                                   got: 0 };
        assert_eq!(err.to_string(),
                   "step for demo::Helper#combine takes 0 arguments but the method declares 2");
    }

    #[test]
    fn flow_error_is_transparent() {
        let err: FlowError = DispatchError::NoFlow { contract: "demo::Flows".into(),
                                                     method: "run/0".into() }.into();
        assert_eq!(err.to_string(), "no flow registered for method run/0 of demo::Flows");
        assert!(matches!(err, FlowError::Dispatch(DispatchError::NoFlow { .. })));
    }

    #[test]
    fn step_error_keeps_source() {
        let err = DispatchError::Step { flow_id: "demo::Flows#run".into(),
                                        step: 2,
                                        source: "boom".into() };
        assert_eq!(err.to_string(), "step 2 of flow demo::Flows#run failed: boom");
        assert!(std::error::Error::source(&err).is_some());
    }
}
