//! Consensus handler tests: proposals, voting, resolution side effects.

use super::super::common::*;
use flock_proto::flock_service_server::FlockService;
use flock_storage::Store;
use tonic::Code;

async fn only_public_id(
    server: &crate::server::FlockServer,
    user_id: &flock_storage::UserId,
    key: &ed25519_dalek::SigningKey,
) -> String {
    let board = server
        .get_votes(create_signed_request(
            user_id,
            key,
            "/flock.FlockService/GetVotes",
            flock_proto::Empty {},
        ))
        .await
        .unwrap()
        .into_inner();
    let mut ids: Vec<String> = board
        .member_votes
        .iter()
        .map(|row| row.public_id.clone())
        .chain(board.detail_votes.iter().map(|row| row.public_id.clone()))
        .collect();
    assert_eq!(ids.len(), 1, "expected exactly one open session");
    ids.pop().unwrap()
}

#[tokio::test]
async fn handler_kick_vote_full_flow() {
    let server = create_test_server().await;
    let (alice, alice_key) = create_test_user(&server, "alice").await;
    let (bob, bob_key) = create_test_user(&server, "bob").await;
    let (carol, _) = create_test_user(&server, "carol").await;
    let flock_id = create_test_flock(&server, "geese", &[&alice, &bob, &carol]).await;

    server
        .create_kick(create_signed_request(
            &alice,
            &alice_key,
            "/flock.FlockService/CreateKick",
            flock_proto::MemberActionRequest {
                username: "carol".to_string(),
            },
        ))
        .await
        .unwrap();

    // the board shows the kick with the creator's auto-yes
    let board = server
        .get_votes(create_signed_request(
            &alice,
            &alice_key,
            "/flock.FlockService/GetVotes",
            flock_proto::Empty {},
        ))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(board.member_votes.len(), 1);
    let row = &board.member_votes[0];
    assert_eq!(row.kind, "KICK");
    assert_eq!(row.involving, "carol");
    assert_eq!(row.creator, "alice");
    assert_eq!(row.yes, 1);
    assert_eq!(row.no, 0);

    // bob's yes reaches the majority of 2 and resolves the session
    let response = server
        .cast_vote(create_signed_request(
            &bob,
            &bob_key,
            "/flock.FlockService/CastVote",
            flock_proto::CastVoteRequest {
                public_id: row.public_id.clone(),
                vote: true,
            },
        ))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(response.consensus.as_deref(), Some("Yes"));
    assert_eq!(server.store.count_members(&flock_id).await.unwrap(), 2);
}

#[tokio::test]
async fn handler_kick_blocked_with_two_members() {
    let server = create_test_server().await;
    let (alice, alice_key) = create_test_user(&server, "alice").await;
    let (bob, _) = create_test_user(&server, "bob").await;
    create_test_flock(&server, "geese", &[&alice, &bob]).await;

    let err = server
        .create_kick(create_signed_request(
            &alice,
            &alice_key,
            "/flock.FlockService/CreateKick",
            flock_proto::MemberActionRequest {
                username: "bob".to_string(),
            },
        ))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn handler_unresolved_vote_returns_no_consensus() {
    let server = create_test_server().await;
    let (alice, alice_key) = create_test_user(&server, "alice").await;
    let (bob, bob_key) = create_test_user(&server, "bob").await;
    let (carol, _) = create_test_user(&server, "carol").await;
    let (dana, _) = create_test_user(&server, "dana").await;
    let (erin, _) = create_test_user(&server, "erin").await;
    create_test_flock(&server, "geese", &[&alice, &bob, &carol, &dana, &erin]).await;

    server
        .create_description_update(create_signed_request(
            &alice,
            &alice_key,
            "/flock.FlockService/CreateDescriptionUpdate",
            flock_proto::CreateDescriptionUpdateRequest {
                description: "new words".to_string(),
            },
        ))
        .await
        .unwrap();
    let public_id = only_public_id(&server, &alice, &alice_key).await;

    // 2 yes of 5 members: still open
    let response = server
        .cast_vote(create_signed_request(
            &bob,
            &bob_key,
            "/flock.FlockService/CastVote",
            flock_proto::CastVoteRequest {
                public_id,
                vote: true,
            },
        ))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(response.consensus, None);
}

#[tokio::test]
async fn handler_duplicate_description_session_conflicts() {
    let server = create_test_server().await;
    let (alice, alice_key) = create_test_user(&server, "alice").await;
    let (bob, _) = create_test_user(&server, "bob").await;
    create_test_flock(&server, "geese", &[&alice, &bob]).await;

    let make_request = || flock_proto::CreateDescriptionUpdateRequest {
        description: "new words".to_string(),
    };
    server
        .create_description_update(create_signed_request(
            &alice,
            &alice_key,
            "/flock.FlockService/CreateDescriptionUpdate",
            make_request(),
        ))
        .await
        .unwrap();
    let err = server
        .create_description_update(create_signed_request(
            &alice,
            &alice_key,
            "/flock.FlockService/CreateDescriptionUpdate",
            make_request(),
        ))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::AlreadyExists);
}

#[tokio::test]
async fn handler_picture_update_stages_upload_and_applies_on_yes() {
    let server = create_test_server().await;
    let (alice, alice_key) = create_test_user(&server, "alice").await;
    let (bob, bob_key) = create_test_user(&server, "bob").await;
    let (carol, _) = create_test_user(&server, "carol").await;
    let flock_id = create_test_flock(&server, "geese", &[&alice, &bob, &carol]).await;

    server
        .create_picture_update(create_signed_request(
            &alice,
            &alice_key,
            "/flock.FlockService/CreatePictureUpdate",
            flock_proto::CreatePictureUpdateRequest {
                image: b"goose.png".to_vec(),
            },
        ))
        .await
        .unwrap();

    let board = server
        .get_votes(create_signed_request(
            &alice,
            &alice_key,
            "/flock.FlockService/GetVotes",
            flock_proto::Empty {},
        ))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(board.detail_votes.len(), 1);
    let row = &board.detail_votes[0];
    assert_eq!(row.kind, "UPDATE_PICTURE");
    assert_eq!(row.pictures.len(), 1);

    let response = server
        .cast_vote(create_signed_request(
            &bob,
            &bob_key,
            "/flock.FlockService/CastVote",
            flock_proto::CastVoteRequest {
                public_id: row.public_id.clone(),
                vote: true,
            },
        ))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(response.consensus.as_deref(), Some("Yes"));

    let flock = server.store.get_flock(&flock_id).await.unwrap();
    assert_eq!(flock.picture.as_deref(), Some(row.pictures[0].as_str()));
}

#[tokio::test]
async fn handler_post_creation_respects_image_cap() {
    let server = create_test_server().await;
    let (alice, alice_key) = create_test_user(&server, "alice").await;
    let (bob, _) = create_test_user(&server, "bob").await;
    create_test_flock(&server, "geese", &[&alice, &bob]).await;

    let too_many = vec![b"img".to_vec(); 7];
    let err = server
        .create_post(create_signed_request(
            &alice,
            &alice_key,
            "/flock.FlockService/CreatePost",
            flock_proto::CreatePostRequest {
                description: "sunrise".to_string(),
                images: too_many,
            },
        ))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);

    let err = server
        .create_post(create_signed_request(
            &alice,
            &alice_key,
            "/flock.FlockService/CreatePost",
            flock_proto::CreatePostRequest {
                description: "sunrise".to_string(),
                images: vec![],
            },
        ))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn handler_solo_post_is_visible_immediately() {
    let server = create_test_server().await;
    let (alice, alice_key) = create_test_user(&server, "alice").await;
    create_test_flock(&server, "geese", &[&alice]).await;

    server
        .create_post(create_signed_request(
            &alice,
            &alice_key,
            "/flock.FlockService/CreatePost",
            flock_proto::CreatePostRequest {
                description: "sunrise".to_string(),
                images: vec![b"one".to_vec(), b"two".to_vec()],
            },
        ))
        .await
        .unwrap();

    let posts = server
        .get_posts(create_signed_request(
            &alice,
            &alice_key,
            "/flock.FlockService/GetPosts",
            flock_proto::FlockByNameRequest {
                name: "geese".to_string(),
            },
        ))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(posts.posts.len(), 1);
    assert_eq!(posts.posts[0].description, "sunrise");
    assert_eq!(posts.posts[0].pictures.len(), 2);
}

#[tokio::test]
async fn handler_vote_on_foreign_session_is_denied() {
    let server = create_test_server().await;
    let (alice, alice_key) = create_test_user(&server, "alice").await;
    let (bob, _) = create_test_user(&server, "bob").await;
    let (carol, carol_key) = create_test_user(&server, "carol").await;
    let (dave, _) = create_test_user(&server, "dave").await;
    create_test_flock(&server, "geese", &[&alice, &bob]).await;
    create_test_flock(&server, "ducks", &[&carol, &dave]).await;

    server
        .create_description_update(create_signed_request(
            &alice,
            &alice_key,
            "/flock.FlockService/CreateDescriptionUpdate",
            flock_proto::CreateDescriptionUpdateRequest {
                description: "new words".to_string(),
            },
        ))
        .await
        .unwrap();
    let public_id = only_public_id(&server, &alice, &alice_key).await;

    let err = server
        .cast_vote(create_signed_request(
            &carol,
            &carol_key,
            "/flock.FlockService/CastVote",
            flock_proto::CastVoteRequest {
                public_id,
                vote: true,
            },
        ))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::PermissionDenied);
}
