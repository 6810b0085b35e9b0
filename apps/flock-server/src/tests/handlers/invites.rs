//! Invite flow tests: proposal, vote, outstanding invite, accept/decline.

use super::super::common::*;
use flock_proto::flock_service_server::FlockService;
use flock_storage::Store;
use tonic::Code;

#[tokio::test]
async fn handler_solo_invite_joins_immediately() {
    let server = create_test_server().await;
    let (alice, alice_key) = create_test_user(&server, "alice").await;
    let (bob, _) = create_test_user(&server, "bob").await;
    let flock_id = create_test_flock(&server, "geese", &[&alice]).await;

    server
        .create_invite(create_signed_request(
            &alice,
            &alice_key,
            "/flock.FlockService/CreateInvite",
            flock_proto::MemberActionRequest {
                username: "bob".to_string(),
            },
        ))
        .await
        .unwrap();

    assert_eq!(server.store.count_members(&flock_id).await.unwrap(), 2);
    assert_eq!(
        server
            .store
            .flock_for_user(&bob)
            .await
            .unwrap()
            .unwrap()
            .id,
        flock_id
    );
}

#[tokio::test]
async fn handler_invite_vote_then_accept() {
    let server = create_test_server().await;
    let (alice, alice_key) = create_test_user(&server, "alice").await;
    let (bob, bob_key) = create_test_user(&server, "bob").await;
    let (carol, _) = create_test_user(&server, "carol").await;
    let (dana, dana_key) = create_test_user(&server, "dana").await;
    let geese = create_test_flock(&server, "geese", &[&alice, &bob, &carol]).await;
    let ducks = create_test_flock(&server, "ducks", &[&dana]).await;

    server
        .create_invite(create_signed_request(
            &alice,
            &alice_key,
            "/flock.FlockService/CreateInvite",
            flock_proto::MemberActionRequest {
                username: "dana".to_string(),
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
    assert_eq!(board.member_votes.len(), 1);
    assert_eq!(board.member_votes[0].kind, "INVITE");
    let public_id = board.member_votes[0].public_id.clone();

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
    assert_eq!(response.consensus.as_deref(), Some("Yes"));
    // the vote alone moves nobody
    assert_eq!(server.store.count_members(&geese).await.unwrap(), 3);

    // dana sees and accepts the outstanding invite
    let invites = server
        .get_outstanding_invites(create_signed_request(
            &dana,
            &dana_key,
            "/flock.FlockService/GetOutstandingInvites",
            flock_proto::Empty {},
        ))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(invites.invites.len(), 1);
    assert_eq!(invites.invites[0].name, "geese");

    server
        .accept_invite(create_signed_request(
            &dana,
            &dana_key,
            "/flock.FlockService/AcceptInvite",
            flock_proto::InviteDecisionRequest {
                name: "geese".to_string(),
            },
        ))
        .await
        .unwrap();
    assert_eq!(server.store.count_members(&geese).await.unwrap(), 4);
    assert_eq!(server.store.count_members(&ducks).await.unwrap(), 0);
}

#[tokio::test]
async fn handler_decline_leaves_membership_untouched() {
    let server = create_test_server().await;
    let (alice, alice_key) = create_test_user(&server, "alice").await;
    let (bob, bob_key) = create_test_user(&server, "bob").await;
    let (carol, _) = create_test_user(&server, "carol").await;
    let (dana, dana_key) = create_test_user(&server, "dana").await;
    let geese = create_test_flock(&server, "geese", &[&alice, &bob, &carol]).await;

    server
        .create_invite(create_signed_request(
            &alice,
            &alice_key,
            "/flock.FlockService/CreateInvite",
            flock_proto::MemberActionRequest {
                username: "dana".to_string(),
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
    server
        .cast_vote(create_signed_request(
            &bob,
            &bob_key,
            "/flock.FlockService/CastVote",
            flock_proto::CastVoteRequest {
                public_id: board.member_votes[0].public_id.clone(),
                vote: true,
            },
        ))
        .await
        .unwrap();

    server
        .decline_invite(create_signed_request(
            &dana,
            &dana_key,
            "/flock.FlockService/DeclineInvite",
            flock_proto::InviteDecisionRequest {
                name: "geese".to_string(),
            },
        ))
        .await
        .unwrap();
    assert_eq!(server.store.count_members(&geese).await.unwrap(), 3);
    assert!(server.store.flock_for_user(&dana).await.unwrap().is_none());

    // a second decline finds no invite
    let err = server
        .decline_invite(create_signed_request(
            &dana,
            &dana_key,
            "/flock.FlockService/DeclineInvite",
            flock_proto::InviteDecisionRequest {
                name: "geese".to_string(),
            },
        ))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn handler_invite_target_cannot_vote() {
    let server = create_test_server().await;
    let (alice, alice_key) = create_test_user(&server, "alice").await;
    let (bob, _) = create_test_user(&server, "bob").await;
    let (carol, carol_key) = create_test_user(&server, "carol").await;
    create_test_flock(&server, "geese", &[&alice, &bob]).await;
    create_test_flock(&server, "others", &[&carol]).await;

    // carol leaves her flock so she can be invited
    server
        .leave_flock(create_signed_request(
            &carol,
            &carol_key,
            "/flock.FlockService/LeaveFlock",
            flock_proto::Empty {},
        ))
        .await
        .unwrap();

    server
        .create_invite(create_signed_request(
            &alice,
            &alice_key,
            "/flock.FlockService/CreateInvite",
            flock_proto::MemberActionRequest {
                username: "carol".to_string(),
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
    let public_id = board.member_votes[0].public_id.clone();

    // carol is not a member of geese, so the session is foreign to her
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
