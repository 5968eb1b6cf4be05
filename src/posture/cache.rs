//! Posture-response cache (spec §3 "Posture-response cache", §4.E)
//!
//! Keyed by probe id (`"OS"`, `"MAC"`, `"DOMAIN"`, `"ENDPOINT_STATE"`, or a
//! process path). Each entry tracks the last body the probe produced, whether
//! a probe invocation is outstanding, whether the body needs to reach the
//! controller, and whether the current policy still requires this id at all.

use std::collections::HashMap;

/// One cached posture-check body and its delivery state.
#[derive(Debug, Clone, Default)]
pub struct CacheEntry {
    /// Last JSON body the probe produced for this id.
    pub serialized: serde_json::Value,
    /// A probe invocation is outstanding for this id.
    pub pending: bool,
    /// This id's body must reach the controller on the next `send`.
    pub should_send: bool,
    /// No policy currently requires this id (cleared at tick start if required).
    pub obsolete: bool,
    /// The last submission of this id's body errored.
    pub errored: bool,
}

/// The posture cache plus the derived invariants of spec §3 and the tick
/// algorithm of spec §4.E.
#[derive(Debug, Default)]
pub struct PostureCache {
    entries: HashMap<String, CacheEntry>,
}

impl PostureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Step 4 (part 1): any entry with no outstanding probe and nothing
    /// pending to send is no longer volunteered by this tick's policy walk
    /// until proven otherwise.
    pub fn mark_idle_entries_obsolete(&mut self) {
        for entry in self.entries.values_mut() {
            if !entry.pending && !entry.should_send {
                entry.obsolete = true;
            }
        }
    }

    /// Step 4 (part 2): `id` is required this tick. Clears `obsolete`; if no
    /// probe is already outstanding, marks one pending and returns `true` so
    /// the caller dispatches it. Returns `false` if a probe for `id` is
    /// already in flight (spec §3 "at most one outstanding probe per probe id").
    pub fn require(&mut self, id: &str) -> bool {
        let entry = self.entries.entry(id.to_string()).or_default();
        entry.obsolete = false;
        if entry.pending {
            false
        } else {
            entry.pending = true;
            true
        }
    }

    /// Step 5: drop every entry still flagged obsolete.
    pub fn sweep_obsolete(&mut self) {
        self.entries.retain(|_, entry| !entry.obsolete);
    }

    /// `collect`: a probe for `id` returned `body`. `force_resend` is the
    /// tick's effective "must resend regardless of body change" flag (spec
    /// §4.E "must_send" folded with "send every time", see DESIGN.md).
    /// Discards silently if `id` was already swept as obsolete.
    pub fn collect(&mut self, id: &str, body: serde_json::Value, force_resend: bool) {
        let Some(entry) = self.entries.get_mut(id) else {
            return;
        };
        entry.pending = false;
        if entry.serialized != body {
            entry.serialized = body;
            entry.should_send = true;
        } else {
            entry.should_send = force_resend || entry.errored;
        }
    }

    /// `send`: take every id currently flagged `should_send`, clearing the
    /// flag as it is handed off (spec §3 "`should_send` is cleared exactly
    /// when a batch that includes this id is handed to the transport").
    pub fn take_bodies_to_send(&mut self) -> Vec<(String, serde_json::Value)> {
        let ids: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.should_send)
            .map(|(id, _)| id.clone())
            .collect();
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(entry) = self.entries.get_mut(&id) {
                entry.should_send = false;
                out.push((id, entry.serialized.clone()));
            }
        }
        out
    }

    /// Record whether `id`'s most recent submission succeeded (spec §4.E
    /// "Transport dispatch", per-id path). A failed submission leaves
    /// `should_send` false here -- the sticky retry is re-armed the next
    /// time `collect` runs for this id with an unchanged body.
    pub fn mark_submission_result(&mut self, id: &str, success: bool) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.errored = !success;
        }
    }

    /// Insert or overwrite the `ENDPOINT_STATE` entry outside the normal
    /// cache flow and immediately mark it for sending (spec §4.E
    /// `endpoint_state_change`, "without going through the cache").
    pub fn force_entry(&mut self, id: &str, body: serde_json::Value) {
        let entry = self.entries.entry(id.to_string()).or_default();
        entry.serialized = body;
        entry.should_send = true;
        entry.pending = false;
        entry.obsolete = false;
    }

    #[cfg(test)]
    pub fn entry(&self, id: &str) -> Option<&CacheEntry> {
        self.entries.get(id)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_dispatches_once_until_collected() {
        let mut cache = PostureCache::new();
        assert!(cache.require("OS"));
        assert!(!cache.require("OS"), "second require while pending must not re-dispatch");
        cache.collect("OS", serde_json::json!({"type": "linux"}), false);
        assert!(cache.require("OS"), "after collect, pending cleared, may dispatch again");
    }

    #[test]
    fn idle_entries_become_obsolete_and_are_swept() {
        let mut cache = PostureCache::new();
        cache.require("MAC");
        cache.collect("MAC", serde_json::json!({"macAddresses": []}), false);
        cache.take_bodies_to_send();

        cache.mark_idle_entries_obsolete();
        assert!(cache.entry("MAC").unwrap().obsolete);
        cache.sweep_obsolete();
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn required_entry_is_not_swept() {
        let mut cache = PostureCache::new();
        cache.require("OS");
        cache.mark_idle_entries_obsolete();
        cache.require("OS");
        cache.sweep_obsolete();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn unchanged_body_does_not_resend_without_force_or_error() {
        let mut cache = PostureCache::new();
        cache.require("DOMAIN");
        cache.collect("DOMAIN", serde_json::json!({"domain": ""}), false);
        cache.take_bodies_to_send();

        cache.require("DOMAIN");
        cache.collect("DOMAIN", serde_json::json!({"domain": ""}), false);
        assert!(cache.take_bodies_to_send().is_empty());
    }

    #[test]
    fn errored_entry_resends_even_with_unchanged_body() {
        let mut cache = PostureCache::new();
        cache.require("OS");
        cache.collect("OS", serde_json::json!({"type": "linux"}), false);
        let sent = cache.take_bodies_to_send();
        assert_eq!(sent.len(), 1);
        cache.mark_submission_result("OS", false);

        cache.require("OS");
        cache.collect("OS", serde_json::json!({"type": "linux"}), false);
        let sent = cache.take_bodies_to_send();
        assert_eq!(sent.len(), 1, "errored id must resend even though body is unchanged");
    }

    #[test]
    fn collect_discards_when_entry_was_already_swept() {
        let mut cache = PostureCache::new();
        cache.collect("GHOST", serde_json::json!({}), false);
        assert!(cache.entry("GHOST").is_none());
    }

    #[test]
    fn force_entry_bypasses_dedup_and_marks_should_send() {
        let mut cache = PostureCache::new();
        cache.force_entry("ENDPOINT_STATE", serde_json::json!({"woken": true, "unlocked": false}));
        let sent = cache.take_bodies_to_send();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "ENDPOINT_STATE");
    }
}
