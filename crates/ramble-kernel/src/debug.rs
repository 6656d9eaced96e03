use std::sync::Arc;

use ramble_core::now_millis;
use ramble_store::Store;
use serde_json::Value;

use crate::error::Result;

/// Reserved debug/onboarding surface. Onboarding has no
/// dedicated state of its own in this repo — it is tracked as ordinary
/// key/value entries under a fixed namespace, the same generic table
/// `getData`/`setData`/`deleteData` use — so `resetOnboarding` and
/// friends are thin conveniences over that table rather than a separate
/// subsystem.
const ONBOARDING_STATUS_KEY: &str = "debug:onboarding_status";
const USER_PROFILE_KEY: &str = "debug:user_profile";

pub struct DebugFacade {
    store: Arc<Store>,
}

impl DebugFacade {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn get_data(&self, key: &str) -> Result<Option<(String, String)>> {
        Ok(self.store.get_data(key)?)
    }

    pub fn set_data(&self, key: &str, value_type: &str, value: &str) -> Result<()> {
        Ok(self.store.set_data(key, value_type, value, now_millis())?)
    }

    pub fn delete_data(&self, key: &str) -> Result<()> {
        Ok(self.store.delete_data(key)?)
    }

    pub fn reset_database(&self) -> Result<()> {
        Ok(self.store.reset_database()?)
    }

    pub fn reset_onboarding(&self) -> Result<()> {
        self.delete_data(ONBOARDING_STATUS_KEY)
    }

    pub fn onboarding_status(&self) -> Result<Value> {
        match self.get_data(ONBOARDING_STATUS_KEY)? {
            Some((_, value)) => Ok(serde_json::from_str(&value).unwrap_or(Value::Null)),
            None => Ok(serde_json::json!({ "complete": false })),
        }
    }

    pub fn user_profile(&self) -> Result<Value> {
        match self.get_data(USER_PROFILE_KEY)? {
            Some((_, value)) => Ok(serde_json::from_str(&value).unwrap_or(Value::Null)),
            None => Ok(Value::Null),
        }
    }

    pub fn clear_onboarding_data(&self) -> Result<()> {
        self.delete_data(ONBOARDING_STATUS_KEY)?;
        self.delete_data(USER_PROFILE_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_data_round_trips() {
        let facade = DebugFacade::new(Arc::new(Store::in_memory("default").unwrap()));
        facade.set_data("theme", "string", "\"dark\"").unwrap();
        let (value_type, value) = facade.get_data("theme").unwrap().unwrap();
        assert_eq!(value_type, "string");
        assert_eq!(value, "\"dark\"");
    }

    #[test]
    fn missing_onboarding_status_defaults_to_incomplete() {
        let facade = DebugFacade::new(Arc::new(Store::in_memory("default").unwrap()));
        assert_eq!(facade.onboarding_status().unwrap(), serde_json::json!({ "complete": false }));
    }

    #[test]
    fn clear_onboarding_data_removes_both_keys() {
        let facade = DebugFacade::new(Arc::new(Store::in_memory("default").unwrap()));
        facade.set_data(ONBOARDING_STATUS_KEY, "json", "{\"complete\":true}").unwrap();
        facade.set_data(USER_PROFILE_KEY, "json", "{\"name\":\"a\"}").unwrap();
        facade.clear_onboarding_data().unwrap();
        assert!(facade.get_data(ONBOARDING_STATUS_KEY).unwrap().is_none());
        assert!(facade.get_data(USER_PROFILE_KEY).unwrap().is_none());
    }
}
