use std::sync::Mutex;

/// Holds at most one active lens id, diverting input away from the
/// extraction pipeline while a lens is active. A plain
/// mutex is sufficient under the Kernel's single-thread-assumption.
pub struct LensRouter {
    active: Mutex<Option<String>>,
}

impl LensRouter {
    pub fn new() -> Self {
        Self { active: Mutex::new(None) }
    }

    pub fn activate(&self, lens_id: String) {
        *self.active.lock().unwrap() = Some(lens_id);
    }

    pub fn deactivate(&self) {
        *self.active.lock().unwrap() = None;
    }

    pub fn active_lens(&self) -> Option<String> {
        self.active.lock().unwrap().clone()
    }

    /// Returns whether `text` was captured by an active lens (diverted,
    /// not persisted or enqueued).
    pub fn route(&self, _text: &str) -> bool {
        self.active.lock().unwrap().is_some()
    }
}

impl Default for LensRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_captures_input_only_while_a_lens_is_active() {
        let router = LensRouter::new();
        assert!(!router.route("hello"));
        router.activate("settings".to_string());
        assert!(router.route("hello"));
        router.deactivate();
        assert!(!router.route("hello"));
    }
}
