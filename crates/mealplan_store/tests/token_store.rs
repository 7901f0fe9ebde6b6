mod common;

use chrono::Duration;
use common::{count_rows, fixture, seed_user, start};
use mealplan_store::model::{
    CodeChallengeMethod, OAuth2ClientTokenCreationInput, PASSWORD_RESET_TOKEN_LIFETIME_MINUTES,
};
use mealplan_store::repo::{
    OAuth2ClientTokenRepository, PasswordResetTokenRepository, SqliteOAuth2ClientTokenRepository,
    SqlitePasswordResetTokenRepository,
};
use mealplan_store::ErrorKind;
use rusqlite::Connection;

fn stored_column(conn: &Connection, sql: &str) -> String {
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
}

fn oauth_input() -> OAuth2ClientTokenCreationInput {
    OAuth2ClientTokenCreationInput {
        id: "oauth-1".to_string(),
        client_id: "mobile-app".to_string(),
        belongs_to_user: "user-1".to_string(),
        redirect_uri: "https://example.com/callback".to_string(),
        scope: "household_member".to_string(),
        code: "code-secret".to_string(),
        code_challenge: "challenge".to_string(),
        code_challenge_method: Some(CodeChallengeMethod::S256),
        code_expires_in_seconds: 300,
        access: "access-secret".to_string(),
        access_expires_in_seconds: 3_600,
        refresh: "refresh-secret".to_string(),
        refresh_expires_in_seconds: 86_400,
    }
}

#[test]
fn password_reset_token_is_encrypted_at_rest() {
    let fx = fixture();
    seed_user(&fx.conn, "user-1", "user@example.com");
    let repo = SqlitePasswordResetTokenRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();

    let created = repo
        .create_password_reset_token(&fx.ctx, "user-1", "reset-me")
        .unwrap();
    assert_eq!(created.token, "reset-me");
    assert_eq!(created.belongs_to_user, "user-1");
    assert_eq!(
        created.expires_at,
        start() + Duration::minutes(PASSWORD_RESET_TOKEN_LIFETIME_MINUTES)
    );

    let stored = stored_column(&fx.conn, "SELECT token FROM password_reset_tokens;");
    assert_ne!(stored, "reset-me");
    assert!(!stored.contains("reset-me"));

    let found = repo
        .get_password_reset_token_by_token(&fx.ctx, "reset-me")
        .unwrap();
    assert_eq!(found, created);
}

#[test]
fn expired_or_redeemed_reset_tokens_are_not_found() {
    let fx = fixture();
    seed_user(&fx.conn, "user-1", "user@example.com");
    let repo = SqlitePasswordResetTokenRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();

    let expiring = repo
        .create_password_reset_token(&fx.ctx, "user-1", "short-lived")
        .unwrap();
    fx.clock.advance(Duration::minutes(PASSWORD_RESET_TOKEN_LIFETIME_MINUTES));
    let err = repo
        .get_password_reset_token_by_token(&fx.ctx, "short-lived")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(!err.to_string().contains("short-lived"));

    let redeemable = repo
        .create_password_reset_token(&fx.ctx, "user-1", "one-shot")
        .unwrap();
    repo.redeem_password_reset_token(&fx.ctx, &redeemable.id).unwrap();
    let err = repo
        .get_password_reset_token_by_token(&fx.ctx, "one-shot")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let first_redeemed: i64 = fx
        .conn
        .query_row(
            "SELECT redeemed_at FROM password_reset_tokens WHERE id = ?1;",
            [&redeemable.id],
            |row| row.get(0),
        )
        .unwrap();
    fx.clock.advance(Duration::minutes(1));
    repo.redeem_password_reset_token(&fx.ctx, &redeemable.id).unwrap();
    let second_redeemed: i64 = fx
        .conn
        .query_row(
            "SELECT redeemed_at FROM password_reset_tokens WHERE id = ?1;",
            [&redeemable.id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(first_redeemed, second_redeemed);

    let err = repo
        .redeem_password_reset_token(&fx.ctx, "no-such-token")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_ne!(expiring.id, redeemable.id);
}

#[test]
fn oauth2_token_is_found_by_each_secret() {
    let fx = fixture();
    seed_user(&fx.conn, "user-1", "user@example.com");
    let repo = SqliteOAuth2ClientTokenRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();

    let created = repo.create_oauth2_client_token(&fx.ctx, &oauth_input()).unwrap();
    assert_eq!(created.code_created_at, start());
    assert_eq!(created.access_created_at, start());
    assert_eq!(created.refresh_created_at, start());
    assert_eq!(created.code_expires_at, start() + Duration::seconds(300));
    assert_eq!(created.refresh_expires_at, start() + Duration::seconds(86_400));

    let stored_access = stored_column(&fx.conn, "SELECT access FROM oauth2_client_tokens;");
    assert_ne!(stored_access, "access-secret");

    for found in [
        repo.get_oauth2_client_token_by_code(&fx.ctx, "code-secret").unwrap(),
        repo.get_oauth2_client_token_by_access(&fx.ctx, "access-secret").unwrap(),
        repo.get_oauth2_client_token_by_refresh(&fx.ctx, "refresh-secret").unwrap(),
    ] {
        assert_eq!(found, created);
    }
}

#[test]
fn archived_oauth2_token_disappears_and_cannot_be_archived_twice() {
    let fx = fixture();
    seed_user(&fx.conn, "user-1", "user@example.com");
    let repo = SqliteOAuth2ClientTokenRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();
    repo.create_oauth2_client_token(&fx.ctx, &oauth_input()).unwrap();

    repo.archive_oauth2_client_token_by_refresh(&fx.ctx, "refresh-secret")
        .unwrap();
    let err = repo
        .get_oauth2_client_token_by_access(&fx.ctx, "access-secret")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let err = repo
        .archive_oauth2_client_token_by_code(&fx.ctx, "code-secret")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(!err.to_string().contains("code-secret"));
}

fn oauth_input_with_suffix(suffix: &str) -> OAuth2ClientTokenCreationInput {
    let mut input = oauth_input();
    input.id = format!("oauth-{suffix}");
    input.code = format!("code-{suffix}");
    input.access = format!("access-{suffix}");
    input.refresh = format!("refresh-{suffix}");
    input
}

#[test]
fn archiving_by_any_secret_hides_token_from_every_lookup() {
    let fx = fixture();
    seed_user(&fx.conn, "user-1", "user@example.com");
    let repo = SqliteOAuth2ClientTokenRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();

    for suffix in ["by-code", "by-access", "by-refresh"] {
        repo.create_oauth2_client_token(&fx.ctx, &oauth_input_with_suffix(suffix))
            .unwrap();
    }
    repo.archive_oauth2_client_token_by_code(&fx.ctx, "code-by-code")
        .unwrap();
    repo.archive_oauth2_client_token_by_access(&fx.ctx, "access-by-access")
        .unwrap();
    repo.archive_oauth2_client_token_by_refresh(&fx.ctx, "refresh-by-refresh")
        .unwrap();

    for suffix in ["by-code", "by-access", "by-refresh"] {
        let lookups = [
            repo.get_oauth2_client_token_by_code(&fx.ctx, &format!("code-{suffix}")),
            repo.get_oauth2_client_token_by_access(&fx.ctx, &format!("access-{suffix}")),
            repo.get_oauth2_client_token_by_refresh(&fx.ctx, &format!("refresh-{suffix}")),
        ];
        for lookup in lookups {
            assert_eq!(lookup.unwrap_err().kind(), ErrorKind::NotFound, "{suffix}");
        }
    }
    assert_eq!(count_rows(&fx.conn, "oauth2_client_tokens"), 3);
}

#[test]
fn out_of_range_oauth2_lifetime_is_invalid_input() {
    let fx = fixture();
    seed_user(&fx.conn, "user-1", "user@example.com");
    let repo = SqliteOAuth2ClientTokenRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();

    let mut forever = oauth_input();
    forever.refresh_expires_in_seconds = i64::MAX;
    let mut far_future = oauth_input();
    far_future.access_expires_in_seconds = i64::MAX / 1_000;
    for input in [forever, far_future] {
        let err = repo.create_oauth2_client_token(&fx.ctx, &input).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
    assert_eq!(count_rows(&fx.conn, "oauth2_client_tokens"), 0);
}

#[test]
fn oauth2_token_without_refresh_stores_empty_secret() {
    let fx = fixture();
    seed_user(&fx.conn, "user-1", "user@example.com");
    let repo = SqliteOAuth2ClientTokenRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();
    let mut input = oauth_input();
    input.refresh = String::new();

    let created = repo.create_oauth2_client_token(&fx.ctx, &input).unwrap();
    assert!(created.refresh.is_empty());
    assert_eq!(
        stored_column(&fx.conn, "SELECT refresh FROM oauth2_client_tokens;"),
        ""
    );
    let err = repo
        .get_oauth2_client_token_by_refresh(&fx.ctx, "")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}
