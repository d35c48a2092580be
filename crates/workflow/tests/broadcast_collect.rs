use std::sync::Arc;

use hourbot_chat::events::{ChatEnvelope, ChatEvent, EventContext, HandlerResult, MessageEvent};
use hourbot_chat::gateway::GatewayRunner;
use hourbot_chat::messages::{PROMPT_TEXT, REMINDER_TEXT};
use hourbot_chat::transport::{RecordingChatClient, ScriptedGatewayTransport};
use hourbot_core::domain::conversation::{ConversationId, ConversationKind};
use hourbot_core::domain::hours::Hours;
use hourbot_core::domain::user::UserId;
use hourbot_core::pending::PendingReplies;
use hourbot_db::repositories::{
    HoursRepository, RosterRepository, SqlHoursRepository, SqlRosterRepository,
};
use hourbot_db::{connect_with_settings, migrations, DbPool};
use hourbot_workflow::{WorkflowRuntime, WorkflowSettings};

struct World {
    pool: DbPool,
    chat: Arc<RecordingChatClient>,
    pending: Arc<PendingReplies>,
    roster: Arc<SqlRosterRepository>,
    hours: Arc<SqlHoursRepository>,
    runtime: WorkflowRuntime,
}

async fn world(registered: &[&str]) -> World {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    let roster = Arc::new(SqlRosterRepository::new(pool.clone()));
    for id in registered {
        roster.insert_if_absent(&UserId::new(*id)).await.expect("seed roster");
    }
    let hours = Arc::new(SqlHoursRepository::new(pool.clone()));
    let chat = Arc::new(RecordingChatClient::new());
    let pending = Arc::new(PendingReplies::new());
    let runtime = WorkflowRuntime::new(
        roster.clone(),
        hours.clone(),
        chat.clone(),
        pending.clone(),
        WorkflowSettings::default(),
    );
    World { pool, chat, pending, roster, hours, runtime }
}

fn dm(id: &str) -> ConversationId {
    RecordingChatClient::private_conversation_for(&UserId::new(id))
}

fn message(envelope_id: &str, kind: ConversationKind, author: &str, text: &str) -> ChatEnvelope {
    let conversation_id = match kind {
        ConversationKind::Group => ConversationId::new("C-general"),
        ConversationKind::Private => dm(author),
    };
    ChatEnvelope {
        envelope_id: envelope_id.to_owned(),
        event: ChatEvent::Message(MessageEvent {
            conversation_id,
            kind,
            author_id: UserId::new(author),
            from_self: false,
            text: text.to_owned(),
        }),
    }
}

async fn stored_hours(world: &World, id: &str) -> Option<Hours> {
    let user = world
        .roster
        .find_by_external_id(&UserId::new(id))
        .await
        .expect("find user")
        .expect("registered");
    world.hours.find_by_user(user.key).await.expect("find hours").map(|record| record.hours)
}

#[tokio::test]
async fn round_prompts_every_registered_user_without_writing_hours() {
    let world = world(&["UA", "UB"]).await;

    let report = world.runtime.coordinator().start_round(None).await.expect("round");

    assert_eq!(report.prompted, 2);
    assert_eq!(world.chat.sent_to(&dm("UA")), vec![PROMPT_TEXT]);
    assert_eq!(world.chat.sent_to(&dm("UB")), vec![PROMPT_TEXT]);
    assert!(world.hours.list_all().await.expect("list").is_empty());

    world.pool.close().await;
}

#[tokio::test]
async fn reply_is_normalized_stored_and_confirmed() {
    let world = world(&["UA"]).await;
    let dispatcher = world.runtime.dispatcher("!gobot");
    world.runtime.coordinator().start_round(None).await.expect("round");

    let result = dispatcher
        .dispatch(
            &message("env-1", ConversationKind::Private, "UA", "7.25"),
            &EventContext::default(),
        )
        .await
        .expect("dispatch");

    assert_eq!(result, HandlerResult::Processed);
    assert_eq!(stored_hours(&world, "UA").await, Some(Hours::parse("7.3").expect("hours")));
    assert!(world.pending.peek(&dm("UA")).is_none());
    assert_eq!(
        world.chat.sent_to(&dm("UA")),
        vec![PROMPT_TEXT.to_owned(), "Recording 7.3 hours for the week".to_owned()]
    );

    world.pool.close().await;
}

#[tokio::test]
async fn second_round_before_reply_sends_reminder_only() {
    let world = world(&["UA"]).await;

    world.runtime.coordinator().start_round(None).await.expect("first round");
    let second = world.runtime.coordinator().start_round(None).await.expect("second round");

    assert_eq!(second.reminded, 1);
    assert_eq!(world.chat.sent_to(&dm("UA")), vec![PROMPT_TEXT, REMINDER_TEXT]);
    assert_eq!(world.pending.len(), 1);

    world.pool.close().await;
}

#[tokio::test]
async fn unparseable_reply_keeps_user_awaiting_with_corrective_message() {
    let world = world(&["UA"]).await;
    let dispatcher = world.runtime.dispatcher("!gobot");
    world.runtime.coordinator().start_round(None).await.expect("round");

    dispatcher
        .dispatch(
            &message("env-1", ConversationKind::Private, "UA", "not-a-number"),
            &EventContext::default(),
        )
        .await
        .expect("dispatch");

    assert!(world.pending.peek(&dm("UA")).is_some());
    assert_eq!(world.chat.sent_to(&dm("UA")).len(), 2);
    assert_eq!(stored_hours(&world, "UA").await, None);

    world.pool.close().await;
}

#[tokio::test]
async fn gateway_session_registers_collects_and_overwrites() {
    let world = world(&[]).await;
    let transport = Arc::new(ScriptedGatewayTransport::new(vec![
        message("env-1", ConversationKind::Group, "UA", "!gobot add"),
        message("env-2", ConversationKind::Group, "UA", "!gobot add"),
        message("env-3", ConversationKind::Group, "UB", "!gobot dm"),
        message("env-4", ConversationKind::Private, "UA", "10"),
        message("env-5", ConversationKind::Private, "UA", "11"),
        message("env-6", ConversationKind::Group, "UB", "!gobot dm"),
        message("env-7", ConversationKind::Private, "UA", "12.5"),
    ]));
    let runner =
        GatewayRunner::new(transport, world.chat.clone(), world.runtime.dispatcher("!gobot"));

    runner.start().await.expect("session");

    assert_eq!(
        world.chat.sent_to(&ConversationId::new("C-general")),
        vec![
            "Added <@UA> to the hours roster",
            "User already added",
            "Asked 1 user for their hours",
            "Asked 1 user for their hours",
        ]
    );
    // "11" arrives while idle and is ignored.
    assert_eq!(
        world.chat.sent_to(&dm("UA")),
        vec![
            PROMPT_TEXT,
            "Recording 10.0 hours for the week",
            PROMPT_TEXT,
            "Recording 12.5 hours for the week",
        ]
    );
    let records = world.hours.list_all().await.expect("list");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].hours, Hours::parse("12.5").expect("hours"));
    assert_eq!(records[0].revision, 2);

    world.pool.close().await;
}
