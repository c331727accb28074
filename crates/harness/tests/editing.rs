use branchlog_core::{BranchPosition, MessageId, message_ids as ids};
use branchlog_engine::{EngineConfig, EngineError};
use branchlog_harness::{FailingGenerator, RecordingGenerator, TestConversation};
use branchlog_storage::StorageError;

fn m(id: i64) -> MessageId {
    MessageId::new(id)
}

// ============================================================================
// Send / edit workflows
// ============================================================================

#[test]
fn send_appends_user_message_and_reply() -> Result<(), Box<dyn std::error::Error>> {
    let mut conv = TestConversation::new()?;
    let first = conv.say(None, "hello")?;
    assert_eq!(first.ids(), [m(1), m(2)]);
    assert!(first.user.is_user());
    assert!(!first.reply.is_user());
    assert_eq!(first.reply.parent_message_id, Some(first.user.id));
    assert_eq!(first.reply.content, "echo: hello");

    let second = conv.say(Some(first.reply.id), "how are you")?;
    assert_eq!(second.user.parent_message_id, Some(m(2)));
    assert_eq!(conv.path_ids()?, vec![ids(&[1, 2, 3, 4])]);
    Ok(())
}

#[test]
fn edit_branches_from_the_same_parent() -> Result<(), Box<dyn std::error::Error>> {
    let mut conv = TestConversation::new()?;
    let first = conv.say(None, "hello")?;
    let second = conv.say(Some(first.reply.id), "how are you")?;

    let edited = conv.edit(second.user.id, "how old are you")?;
    assert_eq!(edited.ids(), [m(5), m(6)]);
    assert_eq!(edited.user.parent_message_id, Some(m(2)));
    assert_eq!(edited.user.edited_from_message_id, Some(m(3)));
    assert_eq!(edited.reply.content, "echo: how old are you");

    let original = conv.engine.get_message(m(3))?.ok_or("original missing")?;
    assert!(original.is_edited);
    assert_eq!(original.content, "how are you");

    assert_eq!(conv.path_ids()?, vec![ids(&[1, 2, 3, 4]), ids(&[1, 2, 5, 6])]);
    Ok(())
}

#[test]
fn editing_an_edited_message_extends_from_latest() -> Result<(), Box<dyn std::error::Error>> {
    let mut conv = TestConversation::new()?;
    let first = conv.say(None, "hello")?;
    let second = conv.say(Some(first.reply.id), "v1")?;
    conv.edit(second.user.id, "v2")?;

    // Editing the superseded original still lands at the end of the chain.
    let third = conv.edit(second.user.id, "v3")?;
    assert_eq!(third.user.edited_from_message_id, Some(m(5)));
    assert_eq!(third.user.parent_message_id, Some(m(2)));
    assert_eq!(conv.engine.resolve_edit_chain(m(3))?, ids(&[3, 5, 7]));
    assert_eq!(conv.engine.latest_in_chain(m(3))?, Some(m(7)));
    assert_eq!(conv.engine.original_in_chain(m(7))?, Some(m(3)));
    assert_eq!(conv.path_ids()?.len(), 3);
    Ok(())
}

#[test]
fn assistant_replies_and_unknown_ids_are_not_editable() -> Result<(), Box<dyn std::error::Error>> {
    let mut conv = TestConversation::new()?;
    let first = conv.say(None, "hello")?;

    let err = conv.edit(first.reply.id, "rewrite the answer").unwrap_err();
    assert!(matches!(err, EngineError::NotEditable(id) if id == first.reply.id));

    let err = conv.edit(m(40), "nothing here").unwrap_err();
    assert!(matches!(err, EngineError::MessageNotFound(id) if id == m(40)));
    assert!(!err.is_corruption());

    assert_eq!(conv.messages()?.len(), 2);
    Ok(())
}

#[test]
fn replying_to_a_missing_parent_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let mut conv = TestConversation::new()?;
    let err = conv.say(Some(m(8)), "orphan").unwrap_err();
    assert!(matches!(err, EngineError::Storage(StorageError::NotFound(_))));
    assert!(conv.messages()?.is_empty());
    Ok(())
}

#[test]
fn generator_failure_keeps_the_user_message() -> Result<(), Box<dyn std::error::Error>> {
    let mut conv = TestConversation::with_generator(Box::new(FailingGenerator))?;
    let err = conv.say(None, "anyone there?").unwrap_err();
    assert!(matches!(err, EngineError::Generator(_)));

    let messages = conv.messages()?;
    assert_eq!(messages.len(), 1);
    assert!(messages[0].is_user());
    assert_eq!(conv.path_ids()?, vec![ids(&[1])]);
    Ok(())
}

#[test]
fn generator_sees_the_recent_path_only() -> Result<(), Box<dyn std::error::Error>> {
    let recorder = RecordingGenerator::new();
    let config = EngineConfig {
        context_window: 3,
        ..EngineConfig::default()
    };
    let mut conv = TestConversation::with_config(config, Box::new(recorder.clone()))?;

    let a = conv.say(None, "a")?;
    let b = conv.say(Some(a.reply.id), "b")?;
    conv.say(Some(b.reply.id), "c")?;
    // Branch: the edit's context must not include the replaced message.
    conv.edit(b.user.id, "b2")?;

    let contexts: Vec<Vec<MessageId>> = recorder
        .contexts()
        .iter()
        .map(|ctx| ctx.iter().map(|msg| msg.id).collect())
        .collect();
    assert_eq!(
        contexts,
        vec![ids(&[1]), ids(&[1, 2, 3]), ids(&[3, 4, 5]), ids(&[1, 2, 7])]
    );
    Ok(())
}

// ============================================================================
// Derived views
// ============================================================================

#[test]
fn branch_positions_track_the_displayed_path() -> Result<(), Box<dyn std::error::Error>> {
    let mut conv = TestConversation::new()?;
    let first = conv.say(None, "hello")?;
    let second = conv.say(Some(first.reply.id), "v1")?;
    conv.edit(second.user.id, "v2")?;

    let positions = conv
        .engine
        .branch_positions(conv.conversation_id, &ids(&[1, 2, 5, 6]))?;
    assert_eq!(positions.keys().copied().collect::<Vec<_>>(), ids(&[3, 5]));
    assert_eq!(
        positions[&m(3)],
        BranchPosition {
            current_index: 2,
            total: 2
        }
    );
    Ok(())
}

#[test]
fn message_groups_absorb_new_replies() -> Result<(), Box<dyn std::error::Error>> {
    let mut conv = TestConversation::new()?;
    let first = conv.say(None, "hello")?;
    let second = conv.say(Some(first.reply.id), "v1")?;
    let edited = conv.edit(second.user.id, "v2")?;

    let mut groups = conv.engine.message_groups(conv.conversation_id)?;
    assert_eq!(groups.groups(), &[ids(&[1, 2, 3, 4]), ids(&[5, 6])]);
    let fork = groups.divergence_points();
    assert_eq!(fork.len(), 1);
    assert_eq!(fork[0].first, m(5));
    assert_eq!(fork[0].parent, Some(m(2)));

    let next = conv.say(Some(edited.reply.id), "go on")?;
    assert_eq!(groups.extend_group(Some(edited.reply.id), &next.ids()), 1);
    assert_eq!(groups.groups()[1], ids(&[5, 6, 7, 8]));

    // The re-fetched view agrees with the incrementally extended one.
    let fresh = conv.engine.message_groups(conv.conversation_id)?;
    assert_eq!(fresh.groups(), groups.groups());
    Ok(())
}

#[test]
fn on_disk_conversation_survives_reopen() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let config = EngineConfig {
        database_path: Some(dir.path().join("branchlog.db")),
        ..EngineConfig::default()
    };

    let (conversation_id, before) = {
        let mut conv = TestConversation::with_config(
            config.clone(),
            Box::new(branchlog_harness::EchoGenerator),
        )?;
        let first = conv.say(None, "hello")?;
        conv.say(Some(first.reply.id), "still here?")?;
        conv.edit(m(3), "still there?")?;
        (conv.conversation_id, conv.path_ids()?)
    };

    let mut reopened =
        TestConversation::with_config(config, Box::new(branchlog_harness::EchoGenerator))?;
    reopened.conversation_id = conversation_id;
    assert_eq!(reopened.path_ids()?, before);
    assert_eq!(reopened.engine.resolve_edit_chain(m(3))?, ids(&[3, 5]));
    Ok(())
}
