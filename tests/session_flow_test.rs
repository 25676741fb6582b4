mod common;

use std::time::Duration;

use common::{create_post, signed_in_user, signup_form, TestEnv};
use napbook::auth::validation::SigninForm;
use napbook::auth::{AuthFailure, AuthStatus, Navigation, Route};
use napbook::error::AppError;
use napbook::models::LikedBy;

fn assert_rejected_as_guest(err: AppError) {
    match err {
        AppError::Backend(e) => assert_eq!(e.code, 401, "unexpected error: {}", e),
        other => panic!("expected a 401 backend error, got {:?}", other),
    }
}

#[tokio::test]
async fn sign_up_authenticates_the_new_user() {
    let env = TestEnv::new();
    let (app, _backend) = env.client();

    let signed_in = app
        .auth()
        .sign_up(&signup_form("Grace Hopper", "grace@example.com"))
        .await
        .expect("sign-up should succeed");

    assert_eq!(signed_in.redirect, Route::Home);
    assert_eq!(signed_in.user.email, "grace@example.com");
    assert_eq!(signed_in.user.username, "gracehopper");

    let state = app.session.snapshot();
    assert_eq!(state.status, AuthStatus::Authenticated);
    assert_eq!(state.user.id, signed_in.user.id);
    assert!(!app.session.is_loading());

    // The profile gets an initials avatar from the backend
    let current = app.current_user().await.unwrap();
    let current = current.as_ref().as_ref().expect("profile should exist");
    assert!(current.profile.image_url.contains("avatars/initials"));
    assert!(current.saves.is_empty());
}

#[tokio::test]
async fn duplicate_email_points_to_sign_in() {
    let env = TestEnv::new();
    let (first, _) = env.client();
    signed_in_user(&first, "Grace", "grace@example.com").await;

    let (second, _) = env.client();
    let failure = second
        .auth()
        .sign_up(&signup_form("Other Grace", "grace@example.com"))
        .await
        .unwrap_err();

    assert_eq!(failure, AuthFailure::AccountExists);
    let notice = failure.notice();
    assert_eq!(notice.title, "Sign-up failed");
    assert_eq!(notice.link, Some(Route::SignIn));
    assert!(!second.session.is_authenticated());
}

#[tokio::test]
async fn invalid_sign_up_never_reaches_the_backend() {
    let env = TestEnv::new();
    let (app, backend) = env.client();

    let mut form = signup_form("G", "not-an-email");
    form.password = "short".to_string();
    let failure = app.auth().sign_up(&form).await.unwrap_err();

    let AuthFailure::Validation(errors) = failure else {
        panic!("expected validation errors, got {:?}", failure);
    };
    assert_eq!(errors.for_field("name").collect::<Vec<_>>(), vec!["Too short"]);
    assert_eq!(errors.for_field("email").collect::<Vec<_>>(), vec!["Invalid email"]);
    assert!(errors.for_field("password").next().is_some());
    assert!(backend.session_secret().await.is_none());
}

#[tokio::test]
async fn wrong_password_keeps_the_user_signed_out() {
    let env = TestEnv::new();
    let (first, _) = env.client();
    signed_in_user(&first, "Grace", "grace@example.com").await;

    let (app, _) = env.client();
    let failure = app
        .auth()
        .sign_in(&SigninForm {
            email: "grace@example.com".to_string(),
            password: "wrong-password".to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(failure, AuthFailure::Backend(_)));
    assert_eq!(failure.notice().title, "Error");
    assert_eq!(app.navigate("/").await, Navigation::Redirect(Route::SignIn));
}

#[tokio::test]
async fn sign_in_replaces_the_previous_user() {
    let env = TestEnv::new();
    let (setup, _) = env.client();
    signed_in_user(&setup, "Ada", "ada@example.com").await;
    setup.auth().sign_out().await.unwrap();
    signed_in_user(&setup, "Grace", "grace@example.com").await;

    let (app, _) = env.client();
    app.auth()
        .sign_in(&SigninForm {
            email: "ada@example.com".to_string(),
            password: "password123".to_string(),
        })
        .await
        .unwrap();
    let first = app.current_user().await.unwrap();
    assert_eq!(first.as_ref().as_ref().unwrap().profile.email, "ada@example.com");

    let signed_in = app
        .auth()
        .sign_in(&SigninForm {
            email: "grace@example.com".to_string(),
            password: "password123".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(signed_in.user.email, "grace@example.com");

    // The cached profile of the previous user is gone
    let current = app.current_user().await.unwrap();
    assert_eq!(
        current.as_ref().as_ref().unwrap().profile.email,
        "grace@example.com"
    );
}

#[tokio::test]
async fn sign_out_without_a_session_is_a_no_op() {
    let env = TestEnv::new();
    let (app, _) = env.client();
    assert_eq!(app.auth().sign_out().await.unwrap(), None);
}

#[tokio::test]
async fn sign_out_resets_session_and_cache() {
    let env = TestEnv::new();
    let (app, backend) = env.client();
    signed_in_user(&app, "Grace", "grace@example.com").await;
    app.current_user().await.unwrap();

    assert_eq!(app.auth().sign_out().await.unwrap(), Some(()));
    assert!(!app.session.is_authenticated());
    assert!(app.session.user().is_empty());
    assert!(!app.cache.is_cached(&napbook::cache::QueryKey::CurrentUser));
    assert!(backend.session_secret().await.is_none());
    assert_eq!(app.navigate("/saved").await, Navigation::Redirect(Route::SignIn));
}

#[tokio::test]
async fn revoked_session_redirects_to_sign_in() {
    let env = TestEnv::new();
    let (app, _) = env.client();
    signed_in_user(&app, "Grace", "grace@example.com").await;
    assert_eq!(app.navigate("/explore").await, Navigation::Proceed);

    assert_eq!(env.store.revoke_sessions("grace@example.com").unwrap(), 1);

    assert_eq!(app.navigate("/explore").await, Navigation::Redirect(Route::SignIn));
    assert_eq!(app.session.snapshot().status, AuthStatus::Unauthenticated);
}

#[tokio::test]
async fn exempt_routes_skip_the_check() {
    let env = TestEnv::new();
    let (app, _) = env.client();

    assert_eq!(app.navigate("/sign-in").await, Navigation::Exempt);
    assert_eq!(app.navigate("/sign-up").await, Navigation::Exempt);
    assert_eq!(app.session.snapshot().status, AuthStatus::Unknown);

    assert_eq!(app.navigate("/no/such/page").await, Navigation::NotFound);
}

#[tokio::test]
async fn session_secret_resumes_in_a_new_client() {
    let env = TestEnv::new();
    let (app, backend) = env.client();
    let user_id = signed_in_user(&app, "Grace", "grace@example.com").await;
    let secret = backend.session_secret().await.unwrap();

    let resumed = std::sync::Arc::new(env.store.connect_with_session(secret));
    let next = napbook::state::AppState::new(env.config.clone(), resumed);
    assert_eq!(next.navigate("/").await, Navigation::Proceed);
    assert_eq!(next.session.user().id, user_id);
}

#[tokio::test]
async fn failed_sign_in_after_sign_up_asks_for_manual_sign_in() {
    let env = TestEnv::new();
    let (app, backend) = env.flaky_client();
    backend.fail_sessions(true);

    let failure = app
        .auth()
        .sign_up(&signup_form("Grace", "grace@example.com"))
        .await
        .unwrap_err();

    assert_eq!(failure, AuthFailure::SessionFailed);
    let notice = failure.notice();
    assert_eq!(notice.title, "Sign-in failed");
    assert_eq!(notice.description, "Please try signing in manually");
    assert_eq!(notice.link, Some(Route::SignIn));
    assert!(!app.session.is_authenticated());

    // The account itself was created
    let (other, _) = env.client();
    other
        .auth()
        .sign_in(&SigninForm {
            email: "grace@example.com".to_string(),
            password: "password123".to_string(),
        })
        .await
        .expect("manual sign-in should work");
}

#[tokio::test]
async fn failed_profile_write_stops_sign_up_before_sign_in() {
    let env = TestEnv::new();
    let (app, backend) = env.flaky_client();
    backend.fail_creates(true);

    let failure = app
        .auth()
        .sign_up(&signup_form("Grace", "grace@example.com"))
        .await
        .unwrap_err();

    assert_eq!(
        failure,
        AuthFailure::Backend("An unexpected error occurred".to_string())
    );
    assert_eq!(failure.notice().title, "Error");
    assert!(backend.inner().session_secret().await.is_none());
    assert_eq!(app.session.snapshot().status, AuthStatus::Unknown);
}

#[tokio::test]
async fn revoked_session_cannot_like_or_save() {
    let env = TestEnv::new();
    let (app, _) = env.client();
    let user_id = signed_in_user(&app, "Grace", "grace@example.com").await;
    let post = create_post(&app, &user_id, "Harbour at dawn").await;

    env.store.revoke_sessions("grace@example.com").unwrap();
    assert!(!app.check_auth_user().await);

    let mut likes = LikedBy::default();
    likes.insert(&user_id);
    assert_rejected_as_guest(app.like_post(&post.id, &likes).await.unwrap_err());
    assert_rejected_as_guest(app.save_post(&user_id, &post.id).await.unwrap_err());

    let (anonymous, _) = env.client();
    assert_rejected_as_guest(anonymous.like_post(&post.id, &likes).await.unwrap_err());

    let stored = app.gateway.get_post_by_id(&post.id).await.unwrap();
    assert!(stored.likes.is_empty());
    assert!(app.gateway.list_saved_records(&user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn superseded_check_answers_with_the_published_state() {
    let env = TestEnv::new();
    let (app, backend) = env.flaky_client();
    signed_in_user(&app, "Grace", "grace@example.com").await;

    backend.hold_account_lookups();
    let pending = {
        let app = app.clone();
        tokio::spawn(async move { app.check_auth_user().await })
    };
    tokio::time::timeout(Duration::from_secs(5), async {
        while !app.session.is_loading() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("check should start");

    app.session.sign_out_reset();
    backend.release_account_lookups();

    assert!(!pending.await.unwrap());
    assert_eq!(app.session.snapshot().status, AuthStatus::Unauthenticated);
    assert!(app.session.user().is_empty());
}
