mod common;

use chrono::Duration;
use common::{count_rows, fixture, seed_household, seed_membership, seed_user, start, Fixture};
use mealplan_store::model::{
    HouseholdInvitationCreationInput, HouseholdInvitationStatus, HouseholdRole,
    InvitationAcceptanceForUserInput, QueryFilter,
};
use mealplan_store::repo::{
    HouseholdInvitationRepository, HouseholdRepository, SqliteHouseholdInvitationRepository,
    SqliteHouseholdRepository,
};
use mealplan_store::{ErrorKind, QueryExecutor, Session, TransactionalSession};

fn world() -> Fixture {
    let fx = fixture();
    seed_user(&fx.conn, "owner", "owner@example.com");
    seed_user(&fx.conn, "guest", "guest@example.com");
    seed_household(&fx.conn, "household-1", "owner");
    seed_membership(&fx.conn, "membership-owner", "household-1", "owner");
    fx
}

fn invitation(id: &str, to_user: Option<&str>, email: &str, token: &str) -> HouseholdInvitationCreationInput {
    HouseholdInvitationCreationInput {
        id: id.to_string(),
        from_user: "owner".to_string(),
        to_user: to_user.map(str::to_string),
        to_name: "Guest".to_string(),
        to_email: email.to_string(),
        note: "come cook with us".to_string(),
        token: token.to_string(),
        destination_household: "household-1".to_string(),
        expires_at: start() + Duration::days(7),
    }
}

#[test]
fn created_invitation_is_pending_and_findable() {
    let fx = world();
    let repo = SqliteHouseholdInvitationRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();

    let created = repo
        .create_household_invitation(
            &fx.ctx,
            &invitation("inv-1", Some("guest"), "Guest@Example.com ", "tok-1"),
        )
        .unwrap();
    assert_eq!(created.status, HouseholdInvitationStatus::Pending);
    assert_eq!(created.to_email, "guest@example.com");
    assert!(created.status_note.is_empty());

    let by_household = repo
        .get_household_invitation_by_household_and_id(&fx.ctx, "household-1", "inv-1")
        .unwrap();
    assert_eq!(by_household, created);
    let by_token = repo
        .get_household_invitation_by_token_and_id(&fx.ctx, "tok-1", "inv-1")
        .unwrap();
    assert_eq!(by_token.id, "inv-1");
    let by_email = repo
        .get_household_invitation_by_email_and_token(&fx.ctx, "GUEST@example.com", "tok-1")
        .unwrap();
    assert_eq!(by_email.id, "inv-1");

    let err = repo
        .get_household_invitation_by_token_and_id(&fx.ctx, "wrong", "inv-1")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(!err.to_string().contains("wrong"));
}

#[test]
fn pending_lists_cover_sender_and_recipient() {
    let fx = world();
    let repo = SqliteHouseholdInvitationRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();
    repo.create_household_invitation(&fx.ctx, &invitation("inv-1", Some("guest"), "guest@example.com", "t1"))
        .unwrap();
    repo.create_household_invitation(&fx.ctx, &invitation("inv-2", None, "guest@example.com", "t2"))
        .unwrap();
    repo.create_household_invitation(&fx.ctx, &invitation("inv-3", None, "other@example.com", "t3"))
        .unwrap();
    repo.cancel_household_invitation(&fx.ctx, "inv-3", "changed my mind")
        .unwrap();

    let sent = repo
        .list_pending_invitations_from_user(&fx.ctx, "owner", &QueryFilter::default())
        .unwrap();
    assert_eq!(sent.total_count, 2);
    assert_eq!(sent.items.len(), 2);

    let received = repo
        .list_pending_invitations_for_user(&fx.ctx, "guest", "guest@example.com", &QueryFilter::default())
        .unwrap();
    let ids: Vec<_> = received.items.iter().map(|inv| inv.id.as_str()).collect();
    assert_eq!(ids, vec!["inv-1", "inv-2"]);
}

#[test]
fn accepting_adds_membership_once() {
    let fx = world();
    let invitations = SqliteHouseholdInvitationRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();
    let households = SqliteHouseholdRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();
    invitations
        .create_household_invitation(&fx.ctx, &invitation("inv-1", Some("guest"), "guest@example.com", "tok-1"))
        .unwrap();

    let membership = invitations
        .accept_household_invitation(&fx.ctx, "inv-1", "tok-1", "see you soon")
        .unwrap()
        .expect("known invitee gets a membership");
    assert_eq!(membership.belongs_to_household, "household-1");
    assert_eq!(membership.belongs_to_user, "guest");
    assert_eq!(membership.household_role, HouseholdRole::HouseholdMember);
    assert!(!membership.default_household);
    assert_eq!(membership.reason, "accepted household invitation \"inv-1\"");
    assert!(households
        .user_is_household_member(&fx.ctx, "household-1", "guest")
        .unwrap());

    let accepted = invitations
        .get_household_invitation_by_household_and_id(&fx.ctx, "household-1", "inv-1")
        .unwrap();
    assert_eq!(accepted.status, HouseholdInvitationStatus::Accepted);
    assert_eq!(accepted.status_note, "see you soon");

    let err = invitations
        .accept_household_invitation(&fx.ctx, "inv-1", "tok-1", "again")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(count_rows(&fx.conn, "household_user_memberships"), 2);
}

#[test]
fn accepting_with_wrong_token_changes_nothing() {
    let fx = world();
    let repo = SqliteHouseholdInvitationRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();
    repo.create_household_invitation(&fx.ctx, &invitation("inv-1", Some("guest"), "guest@example.com", "tok-1"))
        .unwrap();

    let err = repo
        .accept_household_invitation(&fx.ctx, "inv-1", "not-the-token", "let me in")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(!err.to_string().contains("not-the-token"));

    let untouched = repo
        .get_household_invitation_by_household_and_id(&fx.ctx, "household-1", "inv-1")
        .unwrap();
    assert_eq!(untouched.status, HouseholdInvitationStatus::Pending);
    assert!(untouched.status_note.is_empty());
    assert_eq!(count_rows(&fx.conn, "household_user_memberships"), 1);
}

#[test]
fn accepting_without_known_user_creates_no_membership() {
    let fx = world();
    let repo = SqliteHouseholdInvitationRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();
    repo.create_household_invitation(&fx.ctx, &invitation("inv-1", None, "new@example.com", "tok-1"))
        .unwrap();

    let membership = repo
        .accept_household_invitation(&fx.ctx, "inv-1", "tok-1", "")
        .unwrap();
    assert!(membership.is_none());
    assert_eq!(count_rows(&fx.conn, "household_user_memberships"), 1);
}

#[test]
fn expired_invitation_cannot_be_accepted() {
    let fx = world();
    let repo = SqliteHouseholdInvitationRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();
    repo.create_household_invitation(&fx.ctx, &invitation("inv-1", Some("guest"), "guest@example.com", "tok-1"))
        .unwrap();
    fx.clock.advance(Duration::days(8));

    let err = repo
        .accept_household_invitation(&fx.ctx, "inv-1", "tok-1", "")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    let still_pending = repo
        .get_household_invitation_by_household_and_id(&fx.ctx, "household-1", "inv-1")
        .unwrap();
    assert_eq!(still_pending.status, HouseholdInvitationStatus::Pending);
}

#[test]
fn cancel_and_reject_are_idempotent_but_exclusive() {
    let fx = world();
    let repo = SqliteHouseholdInvitationRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();
    repo.create_household_invitation(&fx.ctx, &invitation("inv-1", Some("guest"), "guest@example.com", "tok-1"))
        .unwrap();

    repo.cancel_household_invitation(&fx.ctx, "inv-1", "oops").unwrap();
    repo.cancel_household_invitation(&fx.ctx, "inv-1", "oops again").unwrap();
    let cancelled = repo
        .get_household_invitation_by_household_and_id(&fx.ctx, "household-1", "inv-1")
        .unwrap();
    assert_eq!(cancelled.status, HouseholdInvitationStatus::Cancelled);
    assert_eq!(cancelled.status_note, "oops");

    let err = repo
        .reject_household_invitation(&fx.ctx, "inv-1", "no thanks")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    let err = repo
        .accept_household_invitation(&fx.ctx, "inv-1", "tok-1", "")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let err = repo
        .reject_household_invitation(&fx.ctx, "ghost", "")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn attaching_invitations_links_pending_ones_by_email() {
    let fx = world();
    let repo = SqliteHouseholdInvitationRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();
    repo.create_household_invitation(&fx.ctx, &invitation("inv-1", None, "late@example.com", "t1"))
        .unwrap();
    repo.create_household_invitation(&fx.ctx, &invitation("inv-2", None, "late@example.com", "t2"))
        .unwrap();
    repo.reject_household_invitation(&fx.ctx, "inv-2", "").unwrap();
    seed_user(&fx.conn, "late", "late@example.com");

    let attached = repo
        .attach_invitations_to_user(&fx.ctx, "Late@Example.com", "late")
        .unwrap();
    assert_eq!(attached, 1);
    assert_eq!(
        repo.attach_invitations_to_user(&fx.ctx, "nobody@example.com", "late")
            .unwrap(),
        0
    );
    let linked = repo
        .get_household_invitation_by_token_and_id(&fx.ctx, "t1", "inv-1")
        .unwrap();
    assert_eq!(linked.to_user.as_deref(), Some("late"));
}

#[test]
fn registration_acceptance_runs_in_caller_session() {
    let fx = world();
    let repo = SqliteHouseholdInvitationRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();
    let households = SqliteHouseholdRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();
    repo.create_household_invitation(&fx.ctx, &invitation("inv-1", None, "new@example.com", "tok-1"))
        .unwrap();
    seed_user(&fx.conn, "new", "new@example.com");

    let session = Session::begin(&fx.conn, &fx.ctx, "register user").unwrap();
    let session = repo
        .accept_invitation_for_user(
            &fx.ctx,
            session,
            &InvitationAcceptanceForUserInput {
                user_id: "new".to_string(),
                email_address: "NEW@example.com".to_string(),
                invitation_token: "tok-1".to_string(),
            },
        )
        .unwrap();
    session.commit().unwrap();

    assert!(households
        .user_is_household_member(&fx.ctx, "household-1", "new")
        .unwrap());
    let accepted = repo
        .get_household_invitation_by_token_and_id(&fx.ctx, "tok-1", "inv-1")
        .unwrap();
    assert_eq!(accepted.status, HouseholdInvitationStatus::Accepted);
}

#[test]
fn failed_registration_acceptance_rolls_back_caller_session() {
    let fx = world();
    let repo = SqliteHouseholdInvitationRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();

    let session = Session::begin(&fx.conn, &fx.ctx, "register user").unwrap();
    session
        .connection()
        .execute(
            "INSERT INTO users (id, username, email_address, created_at)
             VALUES ('new', 'new', 'new@example.com', 0);",
            [],
        )
        .unwrap();
    let err = repo
        .accept_invitation_for_user(
            &fx.ctx,
            session,
            &InvitationAcceptanceForUserInput {
                user_id: "new".to_string(),
                email_address: "new@example.com".to_string(),
                invitation_token: "no-such-token".to_string(),
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(count_rows(&fx.conn, "users"), 2);
}
