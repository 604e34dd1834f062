//! Extension registry: an init-time-immutable name → (info, factory) map. Built once at
//! process start, looked up by name for every new session; no runtime registration, which keeps
//! the set of attachable extensions auditable and the lookup lock-free.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::error::{Error, Result};
use crate::framework::{AudioExtension, ExtensionInfo, SstvExtension};

type Factory = fn(u32) -> Box<dyn AudioExtension>;

struct Entry {
    info: ExtensionInfo,
    factory: Factory,
}

pub struct Registry {
    entries: HashMap<&'static str, Entry>,
}

impl Registry {
    fn build() -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            "sstv",
            Entry {
                info: ExtensionInfo {
                    name: "sstv",
                    description: "Slow-scan television image decoder",
                },
                factory: |sample_rate| Box::new(SstvExtension::new(sample_rate)),
            },
        );
        Self { entries }
    }

    pub fn global() -> &'static Registry {
        static REGISTRY: OnceLock<Registry> = OnceLock::new();
        REGISTRY.get_or_init(Registry::build)
    }

    pub fn list(&self) -> Vec<ExtensionInfo> {
        let mut infos: Vec<ExtensionInfo> = self.entries.values().map(|e| e.info).collect();
        infos.sort_by_key(|i| i.name);
        infos
    }

    /// Instantiate a fresh extension by name, for a session sampled at `sample_rate` Hz.
    pub fn create(&self, name: &str, sample_rate: u32) -> Result<Box<dyn AudioExtension>> {
        self.entries
            .get(name)
            .map(|e| (e.factory)(sample_rate))
            .ok_or_else(|| Error::UnknownExtension(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sstv_extension_is_registered() {
        let names: Vec<&str> = Registry::global().list().iter().map(|i| i.name).collect();
        assert!(names.contains(&"sstv"));
    }

    #[test]
    fn unknown_extension_name_errors() {
        let err = match Registry::global().create("does-not-exist", 8000) {
            Err(e) => e,
            Ok(_) => panic!("expected an error"),
        };
        assert!(matches!(err, Error::UnknownExtension(_)));
    }

    #[test]
    fn known_extension_name_instantiates() {
        let ext = Registry::global().create("sstv", 8000);
        assert!(ext.is_ok());
    }
}
