/// A single named string preference in persistent storage.
///
/// Implementations do not validate what is written.
pub trait PreferenceStore {
    fn get(&self) -> Option<String>;
    fn set(&mut self, value: &str);
}

/// In-process store, for hosts without browser storage.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    value: Option<String>,
}

impl MemoryStore {
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
        }
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self) -> Option<String> {
        self.value.clone()
    }

    fn set(&mut self, value: &str) {
        self.value = Some(value.to_string());
    }
}
