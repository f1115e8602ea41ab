//! Configuración del motor desde variables de entorno.
//! Convención `FLOWREF_*`; el archivo `.env` se carga una sola vez.

use std::env;

use dotenvy::dotenv;
use once_cell::sync::Lazy;

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

/// Configuración global usada por `FlowRegistry::global()`.
pub static CONFIG: Lazy<FlowConfig> = Lazy::new(FlowConfig::from_env);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowConfig {
    /// Emite un registro `info!` por cada invocación despachada.
    pub log_invocations: bool,
    /// Permite despachar cadenas que aún no se han sellado.
    pub dispatch_unsealed: bool,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self { log_invocations: true,
               dispatch_unsealed: false }
    }
}

impl FlowConfig {
    pub fn from_env() -> Self {
        Lazy::force(&DOTENV_LOADED);
        let defaults = Self::default();
        Self { log_invocations: flag("FLOWREF_LOG_INVOCATIONS").unwrap_or(defaults.log_invocations),
               dispatch_unsealed: flag("FLOWREF_DISPATCH_UNSEALED").unwrap_or(defaults.dispatch_unsealed) }
    }

    pub fn with_log_invocations(mut self, enabled: bool) -> Self {
        self.log_invocations = enabled;
        self
    }

    pub fn with_dispatch_unsealed(mut self, enabled: bool) -> Self {
        self.dispatch_unsealed = enabled;
        self
    }
}

/// Carga `.env` antes de que nada lea `FLOWREF_*`; las aplicaciones lo
/// llaman al arrancar si crean registros con `FlowConfig::from_env`.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}

fn flag(name: &str) -> Option<bool> {
    env::var(name).ok().and_then(|v| parse_flag(&v))
}

// valores no reconocidos => None (se usa el default)
fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_log_and_reject_unsealed() {
        let cfg = FlowConfig::default();
        assert!(cfg.log_invocations);
        assert!(!cfg.dispatch_unsealed);
    }

    #[test]
    fn flags_accept_common_spellings() {
        for raw in ["1", "true", "YES", " on "] {
            assert_eq!(parse_flag(raw), Some(true), "{raw:?}");
        }
        for raw in ["0", "False", "no", "off"] {
            assert_eq!(parse_flag(raw), Some(false), "{raw:?}");
        }
        assert_eq!(parse_flag("maybe"), None);
        assert_eq!(parse_flag(""), None);
    }

    #[test]
    fn dotenv_loads_once_and_global_config_is_stable() {
        init_dotenv();
        init_dotenv();
        assert!(Lazy::get(&DOTENV_LOADED).is_some());
        assert_eq!(*CONFIG, FlowConfig::from_env());
    }

    #[test]
    fn builders_override_fields() {
        let cfg = FlowConfig::default().with_dispatch_unsealed(true).with_log_invocations(false);
        assert_eq!(cfg,
                   FlowConfig { log_invocations: false,
                                dispatch_unsealed: true });
    }
}
