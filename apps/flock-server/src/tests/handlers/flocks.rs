//! Flock handler tests.

use super::super::common::*;
use flock_proto::flock_service_server::FlockService;
use flock_storage::Store;
use tonic::Code;

#[tokio::test]
async fn handler_register_and_flock_create() {
    let server = create_test_server().await;

    let (public_key, signing_key) = generate_keypair();
    let response = server
        .register(tonic::Request::new(flock_proto::RegisterRequest {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            public_key: hex::encode(&public_key),
        }))
        .await
        .unwrap()
        .into_inner();
    let user_id = flock_storage::UserId(uuid::Uuid::parse_str(&response.user_id).unwrap());

    let request = create_signed_request(
        &user_id,
        &signing_key,
        "/flock.FlockService/CreateFlock",
        flock_proto::CreateFlockRequest {
            name: "geese".to_string(),
            description: "honk".to_string(),
        },
    );
    server.create_flock(request).await.unwrap();

    let info = server
        .get_flock_info(create_signed_request(
            &user_id,
            &signing_key,
            "/flock.FlockService/GetFlockInfo",
            flock_proto::FlockByNameRequest {
                name: "geese".to_string(),
            },
        ))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(info.name, "geese");
    assert_eq!(info.description, "honk");

    // the creator is the sole member and user info reflects the flock
    let user_info = server
        .get_user_info(create_signed_request(
            &user_id,
            &signing_key,
            "/flock.FlockService/GetUserInfo",
            flock_proto::Empty {},
        ))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(user_info.flock_name, "geese");
}

#[tokio::test]
async fn handler_flock_create_rejects_duplicates_and_second_flocks() {
    let server = create_test_server().await;
    let (alice, alice_key) = create_test_user(&server, "alice").await;
    let (bob, bob_key) = create_test_user(&server, "bob").await;
    create_test_flock(&server, "geese", &[&alice]).await;

    // alice is already in a flock
    let err = server
        .create_flock(create_signed_request(
            &alice,
            &alice_key,
            "/flock.FlockService/CreateFlock",
            flock_proto::CreateFlockRequest {
                name: "ducks".to_string(),
                description: "quack".to_string(),
            },
        ))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);

    // duplicate name
    let err = server
        .create_flock(create_signed_request(
            &bob,
            &bob_key,
            "/flock.FlockService/CreateFlock",
            flock_proto::CreateFlockRequest {
                name: "geese".to_string(),
                description: "also honk".to_string(),
            },
        ))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);

    // empty description
    let err = server
        .create_flock(create_signed_request(
            &bob,
            &bob_key,
            "/flock.FlockService/CreateFlock",
            flock_proto::CreateFlockRequest {
                name: "ducks".to_string(),
                description: "  ".to_string(),
            },
        ))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn handler_members_are_ordered_by_username() {
    let server = create_test_server().await;
    let (carol, carol_key) = create_test_user(&server, "carol").await;
    let (alice, _) = create_test_user(&server, "alice").await;
    let (bob, _) = create_test_user(&server, "bob").await;
    create_test_flock(&server, "geese", &[&carol, &alice, &bob]).await;

    let members = server
        .get_flock_members(create_signed_request(
            &carol,
            &carol_key,
            "/flock.FlockService/GetFlockMembers",
            flock_proto::FlockByNameRequest {
                name: "geese".to_string(),
            },
        ))
        .await
        .unwrap()
        .into_inner();
    let usernames: Vec<&str> = members
        .members
        .iter()
        .map(|member| member.username.as_str())
        .collect();
    assert_eq!(usernames, vec!["alice", "bob", "carol"]);
}

#[tokio::test]
async fn handler_update_profile_conflicts_on_duplicate_username() {
    let server = create_test_server().await;
    let (alice, alice_key) = create_test_user(&server, "alice").await;
    let (_bob, _) = create_test_user(&server, "bob").await;

    let err = server
        .update_profile(create_signed_request(
            &alice,
            &alice_key,
            "/flock.FlockService/UpdateProfile",
            flock_proto::UpdateProfileRequest {
                username: "bob".to_string(),
                bio: String::new(),
            },
        ))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::AlreadyExists);

    // empty update is refused
    let err = server
        .update_profile(create_signed_request(
            &alice,
            &alice_key,
            "/flock.FlockService/UpdateProfile",
            flock_proto::UpdateProfileRequest {
                username: String::new(),
                bio: String::new(),
            },
        ))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);

    // bio-only update works
    server
        .update_profile(create_signed_request(
            &alice,
            &alice_key,
            "/flock.FlockService/UpdateProfile",
            flock_proto::UpdateProfileRequest {
                username: String::new(),
                bio: "goose enjoyer".to_string(),
            },
        ))
        .await
        .unwrap();
}

#[tokio::test]
async fn handler_leave_flock() {
    let server = create_test_server().await;
    let (alice, alice_key) = create_test_user(&server, "alice").await;
    let (bob, _) = create_test_user(&server, "bob").await;
    let flock_id = create_test_flock(&server, "geese", &[&alice, &bob]).await;

    server
        .leave_flock(create_signed_request(
            &alice,
            &alice_key,
            "/flock.FlockService/LeaveFlock",
            flock_proto::Empty {},
        ))
        .await
        .unwrap();
    assert_eq!(server.store.count_members(&flock_id).await.unwrap(), 1);
}
