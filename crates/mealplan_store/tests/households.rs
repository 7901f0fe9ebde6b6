mod common;

use chrono::Duration;
use common::{count_rows, fixture, seed_instrument, seed_user, start, Fixture};
use mealplan_store::model::{
    HouseholdCreationInput, HouseholdInstrumentOwnershipCreationInput,
    HouseholdInstrumentOwnershipUpdateInput, HouseholdMembershipCreationInput, HouseholdRole,
    HouseholdUpdateInput, QueryFilter,
};
use mealplan_store::repo::{
    HouseholdInstrumentOwnershipRepository, HouseholdRepository,
    SqliteHouseholdInstrumentOwnershipRepository, SqliteHouseholdRepository,
};
use mealplan_store::ErrorKind;

fn people() -> Fixture {
    let fx = fixture();
    seed_user(&fx.conn, "owner", "owner@example.com");
    seed_user(&fx.conn, "roommate", "roommate@example.com");
    fx
}

fn household(id: &str) -> HouseholdCreationInput {
    HouseholdCreationInput {
        id: id.to_string(),
        name: "The Flat".to_string(),
        contact_phone: String::new(),
        time_zone: "UTC".to_string(),
        belongs_to_user: "owner".to_string(),
    }
}

fn membership(id: &str, household: &str, user: &str) -> HouseholdMembershipCreationInput {
    HouseholdMembershipCreationInput {
        id: id.to_string(),
        household_id: household.to_string(),
        user_id: user.to_string(),
        default_household: false,
        role: HouseholdRole::HouseholdMember,
        reason: "moved in".to_string(),
    }
}

#[test]
fn creating_household_makes_owner_an_admin_member() {
    let fx = people();
    let repo = SqliteHouseholdRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();

    let created = repo.create_household(&fx.ctx, &household("flat")).unwrap();
    assert_eq!(created.created_at, start());
    assert_eq!(repo.get_household(&fx.ctx, "flat").unwrap(), created);

    let members = repo
        .list_memberships_for_household(&fx.ctx, "flat", &QueryFilter::default())
        .unwrap();
    assert_eq!(members.total_count, 1);
    let owner = &members.items[0];
    assert_eq!(owner.id, "gen-1");
    assert_eq!(owner.belongs_to_user, "owner");
    assert_eq!(owner.household_role, HouseholdRole::HouseholdAdmin);
    assert!(owner.default_household);

    let for_owner = repo
        .list_households_for_user(&fx.ctx, "owner", &QueryFilter::default())
        .unwrap();
    assert_eq!(for_owner.items, vec![created]);
    assert_eq!(
        repo.list_households_for_user(&fx.ctx, "roommate", &QueryFilter::default())
            .unwrap()
            .total_count,
        0
    );
}

#[test]
fn memberships_are_unique_while_live() {
    let fx = people();
    let repo = SqliteHouseholdRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();
    repo.create_household(&fx.ctx, &household("flat")).unwrap();

    let added = repo
        .add_user_to_household(&fx.ctx, &membership("m-1", "flat", "roommate"))
        .unwrap();
    assert_eq!(added.reason, "moved in");
    assert!(repo.user_is_household_member(&fx.ctx, "flat", "roommate").unwrap());

    let err = repo
        .add_user_to_household(&fx.ctx, &membership("m-2", "flat", "roommate"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    repo.remove_user_from_household(&fx.ctx, "flat", "roommate").unwrap();
    assert!(!repo.user_is_household_member(&fx.ctx, "flat", "roommate").unwrap());
    let err = repo
        .remove_user_from_household(&fx.ctx, "flat", "roommate")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    repo.add_user_to_household(&fx.ctx, &membership("m-3", "flat", "roommate"))
        .unwrap();
}

#[test]
fn only_owner_can_archive_and_archive_cascades_to_memberships() {
    let fx = people();
    let repo = SqliteHouseholdRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();
    repo.create_household(&fx.ctx, &household("flat")).unwrap();
    repo.add_user_to_household(&fx.ctx, &membership("m-1", "flat", "roommate"))
        .unwrap();

    let err = repo.archive_household(&fx.ctx, "flat", "roommate").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(repo.household_exists(&fx.ctx, "flat").unwrap());

    repo.archive_household(&fx.ctx, "flat", "owner").unwrap();
    assert!(!repo.household_exists(&fx.ctx, "flat").unwrap());
    assert!(!repo.user_is_household_member(&fx.ctx, "flat", "roommate").unwrap());
    let live_memberships: i64 = fx
        .conn
        .query_row(
            "SELECT COUNT(*) FROM household_user_memberships WHERE archived_at IS NULL;",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(live_memberships, 0);
}

#[test]
fn household_update_merges_fields() {
    let fx = people();
    let repo = SqliteHouseholdRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();
    repo.create_household(&fx.ctx, &household("flat")).unwrap();

    fx.clock.advance(Duration::days(1));
    let updated = repo
        .update_household(
            &fx.ctx,
            "flat",
            &HouseholdUpdateInput {
                time_zone: Some("Europe/Berlin".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.name, "The Flat");
    assert_eq!(updated.time_zone, "Europe/Berlin");
    assert_eq!(updated.last_updated_at, Some(start() + Duration::days(1)));

    let err = repo
        .update_household(
            &fx.ctx,
            "flat",
            &HouseholdUpdateInput {
                name: Some("  ".to_string()),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[test]
fn failed_household_creation_leaves_nothing_behind() {
    let fx = people();
    let repo = SqliteHouseholdRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();
    let mut orphan = household("flat");
    orphan.belongs_to_user = "nobody".to_string();

    let err = repo.create_household(&fx.ctx, &orphan).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(count_rows(&fx.conn, "households"), 0);
    assert_eq!(count_rows(&fx.conn, "household_user_memberships"), 0);
}

#[test]
fn instrument_ownerships_are_scoped_to_household() {
    let fx = people();
    seed_instrument(&fx.conn, "inst-pot", "stock pot");
    seed_instrument(&fx.conn, "inst-pan", "frying pan");
    let households = SqliteHouseholdRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();
    let repo = SqliteHouseholdInstrumentOwnershipRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();
    households.create_household(&fx.ctx, &household("flat")).unwrap();
    households.create_household(&fx.ctx, &household("cabin")).unwrap();

    let pot = repo
        .create_household_instrument_ownership(
            &fx.ctx,
            &HouseholdInstrumentOwnershipCreationInput {
                id: "own-1".to_string(),
                notes: String::new(),
                quantity: 2,
                valid_instrument_id: "inst-pot".to_string(),
                belongs_to_household: "flat".to_string(),
            },
        )
        .unwrap();
    assert_eq!(pot.instrument.name, "stock pot");
    assert_eq!(pot.quantity, 2);

    assert!(repo
        .household_instrument_ownership_exists(&fx.ctx, "own-1", "flat")
        .unwrap());
    assert!(!repo
        .household_instrument_ownership_exists(&fx.ctx, "own-1", "cabin")
        .unwrap());
    let err = repo
        .get_household_instrument_ownership(&fx.ctx, "own-1", "cabin")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let swapped = repo
        .update_household_instrument_ownership(
            &fx.ctx,
            "own-1",
            "flat",
            &HouseholdInstrumentOwnershipUpdateInput {
                valid_instrument_id: Some("inst-pan".to_string()),
                quantity: Some(1),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(swapped.instrument.name, "frying pan");
    assert_eq!(swapped.quantity, 1);

    let page = repo
        .list_household_instrument_ownerships(&fx.ctx, "flat", &QueryFilter::default())
        .unwrap();
    assert_eq!(page.items, vec![swapped]);
    assert_eq!(
        repo.list_household_instrument_ownerships(&fx.ctx, "cabin", &QueryFilter::default())
            .unwrap()
            .total_count,
        0
    );

    let err = repo
        .archive_household_instrument_ownership(&fx.ctx, "own-1", "cabin")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    repo.archive_household_instrument_ownership(&fx.ctx, "own-1", "flat")
        .unwrap();
    assert!(!repo
        .household_instrument_ownership_exists(&fx.ctx, "own-1", "flat")
        .unwrap());
}
