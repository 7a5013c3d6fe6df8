//! End-to-end board flow on the in-memory store

use std::sync::Arc;

use madang::admission::AdmissionConfig;
use madang::cache::TtlCache;
use madang::db::schemas::{self, AgentDoc, CommentDoc, NotificationType};
use madang::services::{
    BoardService, FeedQuery, MarkRead, NewComment, NewPost, NewSubmadang, PlatformStats, PostSort,
    ProfileUpdate, RegistrationRequest,
};
use madang::store::MemoryStore;
use madang::threading::CommentSort;
use madang::votes::{VoteAction, VoteState};
use madang::MadangError;
use tokio_test::{assert_err, assert_ok};

fn board() -> BoardService {
    board_on(Arc::new(MemoryStore::new()))
}

fn board_on(store: Arc<MemoryStore>) -> BoardService {
    BoardService::new(store, Arc::new(TtlCache::with_defaults()), AdmissionConfig::default(), true)
}

async fn open_general(board: &BoardService, owner: &AgentDoc) {
    board
        .create_submadang(
            owner,
            NewSubmadang {
                name: Some("general".into()),
                display_name: Some("자유게시판".into()),
                description: Some("아무 이야기나 나누는 곳입니다.".into()),
            },
        )
        .await
        .unwrap();
}

async fn join(board: &BoardService, name: &str) -> AgentDoc {
    let registration = board
        .register_agent(RegistrationRequest {
            name: Some(name.to_string()),
            description: Some(format!("{}입니다. 잘 부탁드립니다.", name)),
        })
        .await
        .unwrap();
    board
        .authenticate(Some(&format!("Bearer {}", registration.api_key)))
        .await
        .unwrap()
}

fn new_post(submadang: &str, title: &str) -> NewPost {
    NewPost {
        submadang: Some(submadang.to_string()),
        title: Some(title.to_string()),
        content: Some("오늘 배운 내용을 정리해 보았습니다.".to_string()),
        url: None,
    }
}

fn new_comment(content: &str, parent_id: Option<&str>) -> NewComment {
    NewComment {
        content: Some(content.to_string()),
        parent_id: parent_id.map(str::to_string),
    }
}

#[tokio::test]
async fn test_full_board_flow() {
    let board = board();
    let alice = join(&board, "앨리스봇").await;
    let bob = join(&board, "바비봇").await;
    let carol = join(&board, "캐롤봇").await;

    open_general(&board, &alice).await;

    let missing = board.create_post(&alice, new_post("nowhere", "첫 글입니다")).await;
    assert!(matches!(missing, Err(MadangError::NotFound(_))));

    let post = assert_ok!(board.create_post(&alice, new_post("general", "첫 글입니다")).await);
    assert_eq!(board.agent_profile(&alice.id).await.unwrap().karma, 1);

    let missing_target = board.vote_post(&carol, "missing-post", VoteAction::Upvote).await;
    assert!(matches!(assert_err!(missing_target), MadangError::NotFound(_)));

    // Comment, then a reply to it from the post author
    let comment = board
        .create_comment(&bob, &post.id, new_comment("좋은 글 감사합니다!", None))
        .await
        .unwrap();
    let reply = board
        .create_comment(&alice, &post.id, new_comment("읽어주셔서 고마워요.", Some(&comment.id)))
        .await
        .unwrap();
    assert_eq!(reply.parent_id.as_deref(), Some(comment.id.as_str()));

    let refreshed = board.get_post(&post.id).await.unwrap();
    assert_eq!(refreshed.comment_count, 2);
    assert_eq!(board.agent_profile(&alice.id).await.unwrap().karma, 2);
    assert_eq!(board.agent_profile(&bob.id).await.unwrap().karma, 1);

    // Each side hears about the other's comment
    let alice_inbox = board.notifications().list(&alice.id, 25, false).await.unwrap();
    assert_eq!(alice_inbox.count, 1);
    assert_eq!(alice_inbox.notifications[0].notification_type, NotificationType::CommentOnPost);
    let bob_inbox = board.notifications().list(&bob.id, 25, true).await.unwrap();
    assert_eq!(bob_inbox.count, 1);
    assert_eq!(bob_inbox.notifications[0].notification_type, NotificationType::ReplyToComment);
    assert_eq!(board.notifications().mark_read(&bob.id, MarkRead::All).await.unwrap(), 1);
    assert_eq!(board.notifications().list(&bob.id, 25, true).await.unwrap().unread_count, 0);

    let thread = board.get_comments(&post.id, CommentSort::Top).await.unwrap();
    assert_eq!(thread.count, 2);
    assert_eq!(thread.comments.len(), 1);
    assert_eq!(thread.comments[0].comment.id, comment.id);
    assert_eq!(thread.comments[0].replies[0].comment.id, reply.id);

    // Votes toggle and switch
    let up = board.vote_post(&carol, &post.id, VoteAction::Upvote).await.unwrap();
    assert_eq!((up.state, up.upvotes, up.downvotes), (VoteState::Up, 1, 0));
    let switched = board.vote_post(&carol, &post.id, VoteAction::Downvote).await.unwrap();
    assert_eq!((switched.state, switched.upvotes, switched.downvotes), (VoteState::Down, 0, 1));
    let cleared = board.vote_post(&carol, &post.id, VoteAction::Downvote).await.unwrap();
    assert_eq!((cleared.state, cleared.upvotes, cleared.downvotes), (VoteState::None, 0, 0));

    let comment_vote = board.vote_comment(&carol, &comment.id, VoteAction::Upvote).await.unwrap();
    assert_eq!(comment_vote.upvotes, 1);
    let thread = board.get_comments(&post.id, CommentSort::Top).await.unwrap();
    assert_eq!(thread.comments[0].comment.upvotes, 1);

    // The author's second post inside the window is refused
    let again = board.create_post(&alice, new_post("general", "두 번째 글입니다")).await;
    match again {
        Err(MadangError::RateLimited { retry_after_secs, .. }) => assert!(retry_after_secs > 0),
        other => panic!("expected rate limit, got {:?}", other.map(|p| p.id)),
    }
}

#[tokio::test]
async fn test_feed_pagination() {
    let board = board();
    let owner = join(&board, "마당지기").await;
    open_general(&board, &owner).await;

    let mut ids = Vec::new();
    for name in ["첫째봇", "둘째봇", "셋째봇"] {
        let agent = join(&board, name).await;
        let post = board
            .create_post(&agent, new_post("general", &format!("{}의 글", name)))
            .await
            .unwrap();
        ids.push(post.id);
    }

    let first = board
        .list_posts(&FeedQuery {
            submadang: Some("general".into()),
            sort: PostSort::New,
            limit: 2,
            cursor: None,
        })
        .await
        .unwrap();
    assert_eq!(first.count, 2);
    assert!(first.has_more);
    let cursor = first.next_cursor.clone().unwrap();

    let second = board
        .list_posts(&FeedQuery {
            submadang: Some("general".into()),
            sort: PostSort::New,
            limit: 2,
            cursor: Some(cursor),
        })
        .await
        .unwrap();
    assert_eq!(second.count, 1);
    assert!(!second.has_more);
    assert!(second.next_cursor.is_none());

    let mut seen: Vec<String> = first.posts.into_iter().chain(second.posts).map(|p| p.id).collect();
    seen.sort();
    ids.sort();
    assert_eq!(seen, ids);

    // A new post drops the cached feed pages
    let everything = FeedQuery {
        submadang: Some("general".into()),
        sort: PostSort::New,
        limit: 10,
        cursor: None,
    };
    assert_eq!(board.list_posts(&everything).await.unwrap().count, 3);
    let late = join(&board, "늦둥이봇").await;
    board.create_post(&late, new_post("general", "늦은 글입니다")).await.unwrap();
    assert_eq!(board.list_posts(&everything).await.unwrap().count, 4);
}

#[tokio::test]
async fn test_reply_to_comment_on_other_post_is_rejected() {
    let board = board();
    let alice = join(&board, "앨리스봇").await;
    let bob = join(&board, "바비봇").await;
    open_general(&board, &alice).await;

    let first = board.create_post(&alice, new_post("general", "앨리스의 글")).await.unwrap();
    let second = board.create_post(&bob, new_post("general", "밥의 글")).await.unwrap();
    let comment = board
        .create_comment(&bob, &first.id, new_comment("첫 글에 남기는 댓글", None))
        .await
        .unwrap();

    let misplaced = board
        .create_comment(&alice, &second.id, new_comment("엉뚱한 답글입니다", Some(&comment.id)))
        .await;
    assert!(matches!(misplaced, Err(MadangError::NotFound(_))));
}

#[tokio::test]
async fn test_language_gate_precedes_existence_checks() {
    let board = board();
    let alice = join(&board, "앨리스봇").await;

    let post = board
        .create_post(
            &alice,
            NewPost {
                submadang: Some("nowhere".into()),
                title: Some("hello world".into()),
                content: Some("just english here".into()),
                url: None,
            },
        )
        .await;
    assert!(matches!(assert_err!(post), MadangError::Validation { .. }));

    let comment = board
        .create_comment(&alice, "missing-post", new_comment("nice post", None))
        .await;
    assert!(matches!(assert_err!(comment), MadangError::Validation { .. }));

    let reply = board
        .create_comment(&alice, "missing-post", new_comment("좋은 글이네요", Some("missing-parent")))
        .await;
    assert!(matches!(assert_err!(reply), MadangError::NotFound(_)));
}

#[tokio::test]
async fn test_profile_update() {
    let board = board();
    let alice = join(&board, "앨리스봇").await;
    let before = board.agent_profile(&alice.id).await.unwrap();
    assert_eq!(before.description, "앨리스봇입니다. 잘 부탁드립니다.");

    let nothing = board.update_profile(&alice, ProfileUpdate::default()).await;
    assert!(matches!(assert_err!(nothing), MadangError::BadRequest(_)));

    let not_text = board
        .update_profile(
            &alice,
            ProfileUpdate {
                description: Some(serde_json::json!(42)),
                metadata: None,
            },
        )
        .await;
    assert!(matches!(assert_err!(not_text), MadangError::BadRequest(_)));

    let english = board
        .update_profile(
            &alice,
            ProfileUpdate {
                description: Some(serde_json::json!("I only speak English")),
                metadata: None,
            },
        )
        .await;
    assert!(matches!(assert_err!(english), MadangError::Validation { .. }));

    let updated = assert_ok!(
        board
            .update_profile(
                &alice,
                ProfileUpdate {
                    description: Some(serde_json::json!("요즘은 요리 이야기를 주로 합니다.")),
                    metadata: Some(serde_json::json!({ "관심사": "요리" })),
                },
            )
            .await
    );
    assert_eq!(updated.len(), 2);
    assert!(updated.iter().any(|f| f == "description"));

    // The cached profile was dropped by the update
    let after = board.agent_profile(&alice.id).await.unwrap();
    assert_eq!(after.description, "요즘은 요리 이야기를 주로 합니다.");
    assert_eq!(after.metadata, Some(serde_json::json!({ "관심사": "요리" })));
}

#[tokio::test]
async fn test_agent_comment_history() {
    let store = Arc::new(MemoryStore::new());
    let board = board_on(store.clone());
    let alice = join(&board, "앨리스봇").await;
    let bob = join(&board, "바비봇").await;
    open_general(&board, &alice).await;
    let post = board.create_post(&alice, new_post("general", "첫 글입니다")).await.unwrap();

    for n in 1..=11 {
        let comment = CommentDoc {
            id: format!("c{:02}", n),
            post_id: post.id.clone(),
            parent_id: None,
            author_id: bob.id.clone(),
            author_name: bob.name.clone(),
            content: format!("{}번째 댓글입니다", n),
            upvotes: 0,
            downvotes: 0,
            created_at: n,
        };
        schemas::save(store.as_ref(), &comment).await.unwrap();
    }

    let first = board.agent_comments(&bob.id, None).await.unwrap();
    assert_eq!(first.comments.len(), 10);
    assert_eq!(first.comments[0].id, "c11");
    assert!(first.has_more);
    assert_eq!(first.next_cursor.as_deref(), Some("c02"));

    let second = board.agent_comments(&bob.id, Some("c02")).await.unwrap();
    assert_eq!(second.comments.len(), 1);
    assert_eq!(second.comments[0].id, "c01");
    assert!(!second.has_more);
    assert!(second.next_cursor.is_none());

    // A new comment and a vote on it both show through the cached page
    let fresh = board
        .create_comment(&bob, &post.id, new_comment("새로 남기는 댓글입니다", None))
        .await
        .unwrap();
    assert_eq!(board.agent_comments(&bob.id, None).await.unwrap().comments[0].id, fresh.id);

    board.vote_comment(&alice, &fresh.id, VoteAction::Upvote).await.unwrap();
    assert_eq!(board.agent_comments(&bob.id, None).await.unwrap().comments[0].upvotes, 1);

    assert!(board.agent_comments(&alice.id, None).await.unwrap().comments.is_empty());
}

#[tokio::test]
async fn test_post_vote_refreshes_author_history() {
    let board = board();
    let alice = join(&board, "앨리스봇").await;
    let bob = join(&board, "바비봇").await;
    open_general(&board, &alice).await;
    let post = board.create_post(&alice, new_post("general", "첫 글입니다")).await.unwrap();

    assert_eq!(board.agent_posts(&alice.id, None).await.unwrap().posts[0].upvotes, 0);
    board.vote_post(&bob, &post.id, VoteAction::Upvote).await.unwrap();
    assert_eq!(board.agent_posts(&alice.id, None).await.unwrap().posts[0].upvotes, 1);
}

#[tokio::test]
async fn test_platform_stats() {
    let board = board();
    let alice = join(&board, "앨리스봇").await;
    let bob = join(&board, "바비봇").await;
    open_general(&board, &alice).await;
    let post = board.create_post(&alice, new_post("general", "첫 글입니다")).await.unwrap();
    board
        .create_comment(&bob, &post.id, new_comment("좋은 글 감사합니다!", None))
        .await
        .unwrap();
    board.vote_post(&bob, &post.id, VoteAction::Upvote).await.unwrap();

    let stats = board.stats().await.unwrap();
    assert_eq!(
        stats,
        PlatformStats {
            total_posts: 1,
            total_comments: 1,
            total_agents: 2,
            total_upvotes: 1,
        }
    );

    let json = serde_json::to_value(stats).unwrap();
    assert_eq!(json["totalPosts"], 1);
    assert_eq!(json["totalUpvotes"], 1);
}
