//! Pure state transitions.
//!
//! `TodoState::apply` never mutates its input: it builds the next state and
//! the store swaps it in while holding the write lock.

use crate::error::{Result, TodoError};
use crate::types::{TodoState, Transition};

impl TodoState {
    /// Applies a transition and returns the resulting state
    ///
    /// `UpdateItem` and `DeleteItem` on an absent id return an unchanged copy.
    /// `AddItem` appends without checking for an existing id.
    #[must_use]
    pub fn apply(&self, transition: Transition) -> Self {
        match transition {
            Transition::SetPendingInput(text) => Self {
                items: self.items.clone(),
                pending_input: text,
            },
            Transition::AddItem(item) => {
                let mut items = Vec::with_capacity(self.items.len() + 1);
                items.extend(self.items.iter().cloned());
                items.push(item);
                Self {
                    items,
                    pending_input: self.pending_input.clone(),
                }
            },
            Transition::UpdateItem(item) => {
                let Some(index) = self.position(&item.id) else {
                    return self.clone();
                };
                let mut next = self.clone();
                next.items[index] = item;
                next
            },
            Transition::DeleteItem(item) => {
                let Some(index) = self.position(&item.id) else {
                    return self.clone();
                };
                let mut next = self.clone();
                next.items.remove(index);
                next
            },
        }
    }
}

impl Transition {
    /// Decodes a transition from its JSON form
    ///
    /// # Errors
    ///
    /// - [`TodoError::UnknownTransition`] if `type` is missing or not one of
    ///   [`Transition::TAGS`]
    /// - [`TodoError::InvalidTransition`] if the text is not JSON or the
    ///   payload does not match the tag
    pub fn decode(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;

        let tag = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();

        if !Self::TAGS.iter().any(|known| *known == tag) {
            tracing::error!(tag, "Rejected unknown transition");
            return Err(TodoError::UnknownTransition {
                tag: tag.to_string(),
            });
        }

        Ok(serde_json::from_value(value)?)
    }

    /// Encodes this transition as JSON
    ///
    /// # Errors
    ///
    /// Returns [`TodoError::InvalidTransition`] if serialization fails.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use crate::types::{TodoId, TodoItem};
    use chrono::Utc;
    use proptest::prelude::*;

    fn item(text: &str) -> TodoItem {
        TodoItem::new(TodoId::new(), text.to_string(), Utc::now())
    }

    #[test]
    fn set_pending_input_replaces_text() {
        let state = TodoState::with_items(vec![item("a")]);
        let next = state.apply(Transition::SetPendingInput("buy milk".to_string()));

        assert_eq!(next.pending_input, "buy milk");
        assert_eq!(next.items, state.items);
    }

    #[test]
    fn add_item_appends() {
        let a = item("a");
        let b = item("b");
        let state = TodoState::with_items(vec![a.clone()]);

        let next = state.apply(Transition::AddItem(b.clone()));

        assert_eq!(next.items, vec![a, b]);
        assert_eq!(state.count(), 1, "input state is untouched");
    }

    #[test]
    fn update_item_keeps_position() {
        let a = item("a");
        let b = item("b");
        let c = item("c");
        let state = TodoState::with_items(vec![a.clone(), b.clone(), c.clone()]);

        let edited = b.with_text("bee");
        let next = state.apply(Transition::UpdateItem(edited.clone()));

        assert_eq!(next.items, vec![a, edited, c]);
    }

    #[test]
    fn delete_item_closes_the_gap() {
        let a = item("a");
        let b = item("b");
        let c = item("c");
        let state = TodoState::with_items(vec![a.clone(), b.clone(), c.clone()]);

        let next = state.apply(Transition::DeleteItem(b));

        assert_eq!(next.items, vec![a, c]);
    }

    #[test]
    fn delete_matches_by_id_only() {
        let a = item("a");
        let state = TodoState::with_items(vec![a.clone()]);

        let next = state.apply(Transition::DeleteItem(a.with_text("stale copy")));

        assert!(next.items.is_empty());
    }

    #[test]
    fn decode_known_transition() {
        let todo = item("a");
        let encoded = Transition::AddItem(todo.clone()).encode().unwrap();

        let decoded = Transition::decode(&encoded).unwrap();

        assert_eq!(decoded, Transition::AddItem(todo));
    }

    #[test]
    fn decode_unknown_tag_fails_loudly() {
        let err = Transition::decode(r#"{"type": "ToggleItem", "payload": null}"#).unwrap_err();
        assert!(matches!(err, TodoError::UnknownTransition { ref tag } if tag == "ToggleItem"));
    }

    #[test]
    fn decode_missing_tag_is_unknown() {
        let err = Transition::decode(r#"{"payload": "x"}"#).unwrap_err();
        assert!(matches!(err, TodoError::UnknownTransition { ref tag } if tag.is_empty()));
    }

    #[test]
    fn decode_bad_payload_is_invalid() {
        let err = Transition::decode(r#"{"type": "AddItem", "payload": 42}"#).unwrap_err();
        assert!(matches!(err, TodoError::InvalidTransition(_)));
    }

    fn arb_item() -> impl Strategy<Value = TodoItem> {
        (any::<u128>(), "[a-z ]{0,12}").prop_map(|(id, text)| {
            TodoItem::new(TodoId::from_uuid(uuid::Uuid::from_u128(id)), text, Utc::now())
        })
    }

    fn arb_state() -> impl Strategy<Value = TodoState> {
        (prop::collection::vec(arb_item(), 0..8), "[a-z ]{0,12}").prop_map(|(items, pending)| {
            // Ids in a list are unique
            let mut seen = std::collections::HashSet::new();
            let items = items
                .into_iter()
                .filter(|item| seen.insert(item.id.clone()))
                .collect();
            TodoState {
                items,
                pending_input: pending,
            }
        })
    }

    proptest! {
        #[test]
        fn prop_missing_target_is_noop(state in arb_state(), target in arb_item()) {
            prop_assume!(!state.exists(&target.id));

            prop_assert_eq!(&state.apply(Transition::UpdateItem(target.clone())), &state);
            prop_assert_eq!(&state.apply(Transition::DeleteItem(target)), &state);
        }

        #[test]
        fn prop_add_then_delete_restores_items(state in arb_state(), fresh in arb_item()) {
            prop_assume!(!state.exists(&fresh.id));

            let next = state
                .apply(Transition::AddItem(fresh.clone()))
                .apply(Transition::DeleteItem(fresh));

            prop_assert_eq!(next.items, state.items);
        }

        #[test]
        fn prop_fields_are_independent(state in arb_state(), text in ".{0,16}", target in arb_item()) {
            let next = state.apply(Transition::SetPendingInput(text));
            prop_assert_eq!(&next.items, &state.items);

            for transition in [
                Transition::AddItem(target.clone()),
                Transition::UpdateItem(target.clone()),
                Transition::DeleteItem(target.clone()),
            ] {
                prop_assert_eq!(&state.apply(transition).pending_input, &state.pending_input);
            }
        }

        #[test]
        fn prop_update_is_idempotent(state in arb_state(), index in any::<prop::sample::Index>(), text in "[a-z]{0,8}") {
            prop_assume!(!state.items.is_empty());
            let target = state.items[index.index(state.items.len())].with_text(text);

            let once = state.apply(Transition::UpdateItem(target.clone()));
            let twice = once.apply(Transition::UpdateItem(target));

            prop_assert_eq!(once, twice);
        }
    }
}
