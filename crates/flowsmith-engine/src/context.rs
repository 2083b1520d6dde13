use flowsmith_llm::Message;
use flowsmith_store::ConversationMessage;

/// Ordered context for one call: system message (if any), the history in
/// insertion order, then the new user prompt.
#[must_use]
pub fn build_context(
    system: Option<&str>,
    history: &[ConversationMessage],
    prompt: &str,
) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    if let Some(system) = system.filter(|s| !s.trim().is_empty()) {
        messages.push(Message::system(system));
    }
    messages.extend(
        history
            .iter()
            .map(|m| Message::new(m.role, m.content.clone())),
    );
    messages.push(Message::user(prompt));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowsmith_llm::Role;
    use flowsmith_store::Conversation;
    use proptest::prelude::*;

    fn history(exchanges: usize) -> Vec<ConversationMessage> {
        let mut conversation = Conversation::new("t");
        for i in 0..exchanges {
            conversation.record_exchange(&format!("q{i}"), &format!("a{i}"));
        }
        conversation.messages
    }

    #[test]
    fn test_order_system_history_prompt() {
        let context = build_context(Some("be brief"), &history(1), "next");
        let roles: Vec<Role> = context.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert_eq!(context[1].content, "q0");
        assert_eq!(context[3].content, "next");
    }

    #[test]
    fn test_blank_system_is_dropped() {
        let context = build_context(Some("  "), &[], "hi");
        assert_eq!(context.len(), 1);
        assert_eq!(context[0].role, Role::User);
    }

    proptest! {
        #[test]
        fn prop_context_length(exchanges in 0usize..20, with_system: bool, prompt in "[a-z ]{1,20}") {
            let history = history(exchanges);
            let system = with_system.then_some("sys");
            let context = build_context(system, &history, &prompt);

            let expected = history.len() + 1 + usize::from(with_system);
            prop_assert_eq!(context.len(), expected);
            prop_assert_eq!(&context[context.len() - 1].content, &prompt);
            let offset = usize::from(with_system);
            for (i, message) in history.iter().enumerate() {
                prop_assert_eq!(&context[offset + i].content, &message.content);
                prop_assert_eq!(context[offset + i].role, message.role);
            }
        }
    }
}
