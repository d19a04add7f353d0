use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::mem;

/// A value that can be listed in a [`Chooser`]. Keys must be unique within
/// one chooser's value set at any point in time.
pub trait ChooserValue: Clone {
    type Key: Clone + Eq + Hash + fmt::Debug;

    fn extract_key(&self) -> Self::Key;
}

/// Per-item rendering handle supplied by the host UI layer. The chooser only
/// ever talks to items through these two operations.
pub trait ItemHandle<V: ChooserValue> {
    /// Update the visual content for a key/value pair. Called when the handle
    /// is created and again on every reconciliation pass that reuses it.
    fn format_for(&mut self, key: &V::Key, value: &V);

    /// Toggle the selected visual state.
    fn set_selected(&mut self, selected: bool);
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Selection<V: ChooserValue> {
    pub item: V,
    pub key: V::Key,
}

/// The attempted selection transition handed to a [`CommitHook`].
#[derive(Clone, Debug)]
pub struct SelectionChange<V: ChooserValue> {
    pub new: Option<Selection<V>>,
    pub old: Option<Selection<V>>,
}

pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Decides whether a selection change becomes durable. Returning `Ok(false)`
/// or `Err(_)` rolls the chooser back to its previously committed selection;
/// errors are additionally logged.
pub trait CommitHook<V: ChooserValue> {
    fn commit(&mut self, change: &SelectionChange<V>, explicit: bool) -> Result<bool, HookError>;
}

/// Presents a list of keyed values the user can choose from.
///
/// Each value is bound to a rendering handle by its key. Bindings are reused
/// across [`Chooser::replace_all_values`] calls as long as the key survives,
/// so a host can keep per-item UI state alive across data refreshes. At most
/// one value is selected at a time, and every selection change runs through
/// the commit hook before it becomes durable.
#[derive(Clone)]
pub struct Chooser<V: ChooserValue, H> {
    values: Vec<V>,
    selection: Option<Selection<V>>,
    committed: Option<Selection<V>>,
    kv_map: HashMap<V::Key, V>,
    bindings: HashMap<V::Key, H>,
    order: Vec<V::Key>,
    has_initial_data: bool,
    layout_revision: u64,
    make_handle: fn() -> H,
}

impl<V: ChooserValue, H: ItemHandle<V>> Chooser<V, H> {
    pub fn new(make_handle: fn() -> H) -> Self {
        Self {
            values: Vec::new(),
            selection: None,
            committed: None,
            kv_map: HashMap::new(),
            bindings: HashMap::new(),
            order: Vec::new(),
            has_initial_data: false,
            layout_revision: 0,
            make_handle,
        }
    }

    /// Replace the full value set, reusing bindings whose key survives and
    /// carrying the selection over to the new value object for its key.
    ///
    /// The very first non-empty assignment auto-selects the first element;
    /// later assignments never do. The commit hook always runs afterwards
    /// with `explicit = false`.
    pub fn replace_all_values(&mut self, new_values: Vec<V>, hook: &mut dyn CommitHook<V>) {
        if !self.has_initial_data {
            if let Some(first) = new_values.first() {
                self.selection = Some(Selection {
                    key: first.extract_key(),
                    item: first.clone(),
                });
                self.has_initial_data = true;
            }
        }
        self.values = new_values;

        let mut old_bindings = mem::take(&mut self.bindings);
        let old_len = old_bindings.len();
        let mut bindings = HashMap::with_capacity(self.values.len());
        let mut kv_map = HashMap::with_capacity(self.values.len());
        let mut order = Vec::with_capacity(self.values.len());
        let mut any_new = false;
        for value in &self.values {
            let key = value.extract_key();
            kv_map.insert(key.clone(), value.clone());
            let mut handle = old_bindings.remove(&key).unwrap_or_else(|| {
                any_new = true;
                (self.make_handle)()
            });
            handle.format_for(&key, value);
            bindings.insert(key.clone(), handle);
            order.push(key);
        }

        // Carry the selection over iff its key still exists, swapping in the
        // new value object so the selection survives content mutation.
        if let Some(selection) = self.selection.take() {
            let key = selection.key;
            let bound = bindings.contains_key(&key);
            let item = self.values.iter().find(|value| value.extract_key() == key);
            if bound != item.is_some() {
                // Can only disagree if extract_key is impure.
                log::warn!("selection key {key:?} inconsistent between bindings and values");
            }
            self.selection = item.map(|item| Selection {
                item: item.clone(),
                key,
            });
        }

        self.bindings = bindings;
        self.kv_map = kv_map;
        self.order = order;
        // Membership-identical replacements keep the layout revision, so the
        // host never rebuilds list chrome (scroll, focus) on a content-only
        // refresh. Equal sizes with any key swapped implies any_new.
        if any_new || old_len != self.bindings.len() {
            self.layout_revision += 1;
        }
        self.refresh_selection(false, hook);
    }

    /// Select the value bound to `key`, or clear the selection for `None` or
    /// an unknown key.
    pub fn set_selection_by_key(
        &mut self,
        key: Option<&V::Key>,
        explicit: bool,
        hook: &mut dyn CommitHook<V>,
    ) {
        self.selection = key.and_then(|key| {
            self.kv_map.get(key).map(|value| Selection {
                item: value.clone(),
                key: key.clone(),
            })
        });
        self.refresh_selection(explicit, hook);
    }

    /// Run the commit hook for the pending selection. Accept marks the
    /// selected binding and records the selection as committed; reject (or a
    /// hook error) restores the previously committed selection.
    fn refresh_selection(&mut self, explicit: bool, hook: &mut dyn CommitHook<V>) {
        let change = SelectionChange {
            new: self.selection.clone(),
            old: self.committed.clone(),
        };
        let accepted = match hook.commit(&change, explicit) {
            Ok(accepted) => accepted,
            Err(error) => {
                log::error!("commit hook failed: {error}");
                false
            }
        };
        if accepted {
            let selected = self.selection.as_ref().map(|selection| selection.key.clone());
            for (key, handle) in &mut self.bindings {
                handle.set_selected(selected.as_ref() == Some(key));
            }
            self.committed = self.selection.clone();
        } else {
            self.selection = self.committed.clone();
        }
    }

    pub fn values(&self) -> &[V] {
        &self.values
    }

    pub fn selection(&self) -> Option<&Selection<V>> {
        self.selection.as_ref()
    }

    pub fn has_initial_data(&self) -> bool {
        self.has_initial_data
    }

    /// Advances only when the binding set's membership changes. Hosts can
    /// compare revisions to keep unrelated list state across refreshes.
    pub fn layout_revision(&self) -> u64 {
        self.layout_revision
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn key_at(&self, index: usize) -> Option<&V::Key> {
        self.order.get(index)
    }

    pub fn selected_index(&self) -> Option<usize> {
        let selection = self.selection.as_ref()?;
        self.order.iter().position(|key| *key == selection.key)
    }

    /// Bindings in display order.
    pub fn rows(&self) -> impl Iterator<Item = (&V::Key, &H)> {
        self.order
            .iter()
            .filter_map(|key| self.bindings.get(key).map(|handle| (key, handle)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, Eq, PartialEq)]
    struct TestValue {
        id: String,
        body: String,
    }

    impl TestValue {
        fn new(id: &str, body: &str) -> Self {
            Self {
                id: id.to_string(),
                body: body.to_string(),
            }
        }
    }

    impl ChooserValue for TestValue {
        type Key = String;

        fn extract_key(&self) -> String {
            self.id.clone()
        }
    }

    #[derive(Clone, Debug, Default)]
    struct TestHandle {
        formatted: Vec<String>,
        selected: bool,
    }

    impl ItemHandle<TestValue> for TestHandle {
        fn format_for(&mut self, key: &String, value: &TestValue) {
            self.formatted.push(format!("{key}:{}", value.body));
        }

        fn set_selected(&mut self, selected: bool) {
            self.selected = selected;
        }
    }

    struct AcceptAll;

    impl CommitHook<TestValue> for AcceptAll {
        fn commit(
            &mut self,
            _change: &SelectionChange<TestValue>,
            _explicit: bool,
        ) -> Result<bool, HookError> {
            Ok(true)
        }
    }

    struct RejectAll;

    impl CommitHook<TestValue> for RejectAll {
        fn commit(
            &mut self,
            _change: &SelectionChange<TestValue>,
            _explicit: bool,
        ) -> Result<bool, HookError> {
            Ok(false)
        }
    }

    struct FailingHook;

    impl CommitHook<TestValue> for FailingHook {
        fn commit(
            &mut self,
            _change: &SelectionChange<TestValue>,
            _explicit: bool,
        ) -> Result<bool, HookError> {
            Err("hook blew up".into())
        }
    }

    #[derive(Default)]
    struct RecordingHook {
        commits: Vec<(Option<String>, Option<String>, bool)>,
    }

    impl CommitHook<TestValue> for RecordingHook {
        fn commit(
            &mut self,
            change: &SelectionChange<TestValue>,
            explicit: bool,
        ) -> Result<bool, HookError> {
            self.commits.push((
                change.new.as_ref().map(|selection| selection.key.clone()),
                change.old.as_ref().map(|selection| selection.key.clone()),
                explicit,
            ));
            Ok(true)
        }
    }

    fn chooser() -> Chooser<TestValue, TestHandle> {
        Chooser::new(TestHandle::default)
    }

    #[test]
    fn first_nonempty_replace_auto_selects_first_element() {
        let mut chooser = chooser();
        let mut hook = RecordingHook::default();
        chooser.replace_all_values(vec![TestValue::new("a", "1"), TestValue::new("b", "2")], &mut hook);

        let selection = chooser.selection().expect("selection");
        assert_eq!(selection.key, "a");
        // The auto-selection is reported as non-explicit.
        assert_eq!(hook.commits, vec![(Some("a".to_string()), None, false)]);
    }

    #[test]
    fn auto_select_does_not_retrigger_after_empty_replace() {
        let mut chooser = chooser();
        chooser.replace_all_values(vec![TestValue::new("a", "1")], &mut AcceptAll);
        chooser.replace_all_values(Vec::new(), &mut AcceptAll);
        assert!(chooser.selection().is_none());

        chooser.replace_all_values(vec![TestValue::new("c", "3")], &mut AcceptAll);
        assert!(chooser.selection().is_none());
        assert!(chooser.has_initial_data());
    }

    #[test]
    fn identical_replace_is_idempotent() {
        let mut chooser = chooser();
        let values = vec![TestValue::new("a", "1"), TestValue::new("b", "2")];
        chooser.replace_all_values(values.clone(), &mut AcceptAll);
        let revision = chooser.layout_revision();

        chooser.replace_all_values(values, &mut AcceptAll);
        assert_eq!(chooser.layout_revision(), revision);
        assert_eq!(chooser.len(), 2);
        assert_eq!(chooser.selection().expect("selection").key, "a");
    }

    #[test]
    fn selection_survives_replace_with_new_value_object() {
        let mut chooser = chooser();
        chooser.replace_all_values(vec![TestValue::new("a", "old")], &mut AcceptAll);
        chooser.set_selection_by_key(Some(&"a".to_string()), true, &mut AcceptAll);

        chooser.replace_all_values(
            vec![TestValue::new("a", "new"), TestValue::new("b", "2")],
            &mut AcceptAll,
        );
        let selection = chooser.selection().expect("selection");
        assert_eq!(selection.key, "a");
        // The selection points at the fresh value object, not the stale one.
        assert_eq!(selection.item.body, "new");
    }

    #[test]
    fn selection_cleared_when_key_vanishes() {
        let mut chooser = chooser();
        chooser.replace_all_values(vec![TestValue::new("a", "1"), TestValue::new("b", "2")], &mut AcceptAll);
        chooser.set_selection_by_key(Some(&"b".to_string()), true, &mut AcceptAll);

        chooser.replace_all_values(vec![TestValue::new("a", "1")], &mut AcceptAll);
        assert!(chooser.selection().is_none());
    }

    #[test]
    fn replace_reuses_bindings_and_creates_only_missing_ones() {
        let mut chooser = chooser();
        chooser.replace_all_values(vec![TestValue::new("a", "1")], &mut AcceptAll);
        chooser.set_selection_by_key(Some(&"a".to_string()), true, &mut AcceptAll);
        let revision = chooser.layout_revision();

        chooser.replace_all_values(
            vec![TestValue::new("a", "1"), TestValue::new("b", "2")],
            &mut AcceptAll,
        );
        assert_eq!(chooser.selection().expect("selection").key, "a");
        assert_eq!(chooser.len(), 2);
        assert_eq!(chooser.layout_revision(), revision + 1);

        // The reused binding saw a second format pass; the new one saw one.
        let formats: Vec<usize> = chooser.rows().map(|(_, handle)| handle.formatted.len()).collect();
        assert_eq!(formats, vec![2, 1]);
    }

    #[test]
    fn rejected_commit_rolls_back_selection() {
        let mut chooser = chooser();
        chooser.replace_all_values(vec![TestValue::new("a", "1"), TestValue::new("b", "2")], &mut AcceptAll);
        assert_eq!(chooser.selection().expect("selection").key, "a");

        chooser.set_selection_by_key(Some(&"b".to_string()), true, &mut RejectAll);
        assert_eq!(chooser.selection().expect("selection").key, "a");
    }

    #[test]
    fn hook_error_is_treated_as_rejection() {
        let mut chooser = chooser();
        chooser.replace_all_values(vec![TestValue::new("a", "1"), TestValue::new("b", "2")], &mut AcceptAll);

        chooser.set_selection_by_key(Some(&"b".to_string()), true, &mut FailingHook);
        assert_eq!(chooser.selection().expect("selection").key, "a");
    }

    #[test]
    fn unknown_key_resolves_to_null_selection() {
        let mut chooser = chooser();
        chooser.replace_all_values(vec![TestValue::new("a", "1")], &mut AcceptAll);

        let mut hook = RecordingHook::default();
        chooser.set_selection_by_key(Some(&"missing".to_string()), true, &mut hook);
        assert!(chooser.selection().is_none());
        assert_eq!(hook.commits, vec![(None, Some("a".to_string()), true)]);
    }

    #[test]
    fn accepted_selection_marks_exactly_one_binding() {
        let mut chooser = chooser();
        chooser.replace_all_values(
            vec![TestValue::new("a", "1"), TestValue::new("b", "2"), TestValue::new("c", "3")],
            &mut AcceptAll,
        );
        chooser.set_selection_by_key(Some(&"b".to_string()), true, &mut AcceptAll);

        let selected: Vec<&str> = chooser
            .rows()
            .filter(|(_, handle)| handle.selected)
            .map(|(key, _)| key.as_str())
            .collect();
        assert_eq!(selected, vec!["b"]);
    }

    #[test]
    fn replace_reports_non_explicit_commit_with_carried_selection() {
        let mut chooser = chooser();
        chooser.replace_all_values(vec![TestValue::new("a", "1")], &mut AcceptAll);
        chooser.set_selection_by_key(Some(&"a".to_string()), true, &mut AcceptAll);

        let mut hook = RecordingHook::default();
        chooser.replace_all_values(vec![TestValue::new("a", "changed")], &mut hook);
        assert_eq!(
            hook.commits,
            vec![(Some("a".to_string()), Some("a".to_string()), false)]
        );
    }
}
