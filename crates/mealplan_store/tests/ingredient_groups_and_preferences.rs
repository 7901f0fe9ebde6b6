mod common;

use chrono::Duration;
use common::{count_rows, fixture, seed_ingredient, seed_user, Fixture};
use mealplan_store::model::{
    QueryFilter, UserIngredientPreferenceCreationInput, UserIngredientPreferenceUpdateInput,
    ValidIngredientGroupCreationInput, ValidIngredientGroupMemberCreationInput,
    ValidIngredientGroupUpdateInput,
};
use mealplan_store::repo::{
    SqliteUserIngredientPreferenceRepository, SqliteValidIngredientGroupRepository,
    UserIngredientPreferenceRepository, ValidIngredientGroupRepository,
};
use mealplan_store::ErrorKind;

fn pantry() -> Fixture {
    let fx = fixture();
    seed_user(&fx.conn, "user-1", "cook@example.com");
    seed_ingredient(&fx.conn, "ing-basil", "basil");
    seed_ingredient(&fx.conn, "ing-thyme", "thyme");
    seed_ingredient(&fx.conn, "ing-salt", "salt");
    fx
}

fn group(id: &str, name: &str, members: &[(&str, &str)]) -> ValidIngredientGroupCreationInput {
    ValidIngredientGroupCreationInput {
        id: id.to_string(),
        name: name.to_string(),
        slug: id.to_string(),
        description: String::new(),
        members: members
            .iter()
            .map(|(member_id, ingredient)| ValidIngredientGroupMemberCreationInput {
                id: member_id.to_string(),
                valid_ingredient_id: ingredient.to_string(),
            })
            .collect(),
    }
}

fn preference_for(ingredient: Option<&str>, group: Option<&str>) -> UserIngredientPreferenceCreationInput {
    UserIngredientPreferenceCreationInput {
        valid_ingredient_id: ingredient.map(str::to_string),
        valid_ingredient_group_id: group.map(str::to_string),
        rating: 4,
        notes: "fresh only".to_string(),
        allergy: false,
        belongs_to_user: "user-1".to_string(),
    }
}

#[test]
fn group_is_created_with_hydrated_members() {
    let fx = pantry();
    let repo = SqliteValidIngredientGroupRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();

    let created = repo
        .create_valid_ingredient_group(
            &fx.ctx,
            &group("herbs", "Fresh herbs", &[("m-1", "ing-basil"), ("m-2", "ing-thyme")]),
        )
        .unwrap();
    let member_names: Vec<_> = created
        .members
        .iter()
        .map(|member| member.valid_ingredient.name.as_str())
        .collect();
    assert_eq!(member_names, vec!["basil", "thyme"]);
    assert!(created.members.iter().all(|m| m.belongs_to_group == "herbs"));

    assert_eq!(repo.get_valid_ingredient_group(&fx.ctx, "herbs").unwrap(), created);
    let page = repo
        .list_valid_ingredient_groups(&fx.ctx, &QueryFilter::default())
        .unwrap();
    assert_eq!(page.total_count, 1);
    assert_eq!(page.items[0].members.len(), 2);
}

#[test]
fn failed_member_insert_leaves_no_group_behind() {
    let fx = pantry();
    let repo = SqliteValidIngredientGroupRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();

    let err = repo
        .create_valid_ingredient_group(
            &fx.ctx,
            &group("herbs", "Fresh herbs", &[("m-1", "ing-basil"), ("m-2", "ing-missing")]),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(count_rows(&fx.conn, "valid_ingredient_groups"), 0);
    assert_eq!(count_rows(&fx.conn, "valid_ingredient_group_members"), 0);

    let err = repo
        .create_valid_ingredient_group(
            &fx.ctx,
            &group("herbs", "Fresh herbs", &[("m-1", "ing-basil"), ("m-2", "ing-basil")]),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[test]
fn group_search_update_and_archive() {
    let fx = pantry();
    let repo = SqliteValidIngredientGroupRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();
    repo.create_valid_ingredient_group(&fx.ctx, &group("herbs", "Fresh herbs", &[("m-1", "ing-basil")]))
        .unwrap();
    repo.create_valid_ingredient_group(&fx.ctx, &group("seasoning", "Seasoning", &[("m-2", "ing-salt")]))
        .unwrap();

    let found = repo.search_valid_ingredient_groups(&fx.ctx, "HERB").unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, "herbs");
    assert_eq!(found[0].members.len(), 1);
    let err = repo.search_valid_ingredient_groups(&fx.ctx, "   ").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    fx.clock.advance(Duration::minutes(1));
    let updated = repo
        .update_valid_ingredient_group(
            &fx.ctx,
            "herbs",
            &ValidIngredientGroupUpdateInput {
                description: Some("leafy".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.name, "Fresh herbs");
    assert_eq!(updated.description, "leafy");
    assert!(updated.last_updated_at.is_some());
    let err = repo
        .update_valid_ingredient_group(
            &fx.ctx,
            "herbs",
            &ValidIngredientGroupUpdateInput {
                slug: Some("Not A Slug".to_string()),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    repo.archive_valid_ingredient_group(&fx.ctx, "herbs").unwrap();
    assert!(!repo.valid_ingredient_group_exists(&fx.ctx, "herbs").unwrap());
    let err = repo.archive_valid_ingredient_group(&fx.ctx, "herbs").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let archived_members: i64 = fx
        .conn
        .query_row(
            "SELECT COUNT(*) FROM valid_ingredient_group_members WHERE archived_at IS NOT NULL;",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(archived_members, 1);
}

#[test]
fn single_ingredient_preference_roundtrips_through_update_and_archive() {
    let fx = pantry();
    let repo = SqliteUserIngredientPreferenceRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();

    let created = repo
        .create_user_ingredient_preference(&fx.ctx, &preference_for(Some("ing-basil"), None))
        .unwrap();
    assert_eq!(created.len(), 1);
    let preference = &created[0];
    assert_eq!(preference.id, "gen-1");
    assert_eq!(preference.ingredient.name, "basil");
    assert!(repo
        .user_ingredient_preference_exists(&fx.ctx, "gen-1", "user-1")
        .unwrap());
    assert!(!repo
        .user_ingredient_preference_exists(&fx.ctx, "gen-1", "someone-else")
        .unwrap());

    let updated = repo
        .update_user_ingredient_preference(
            &fx.ctx,
            "gen-1",
            "user-1",
            &UserIngredientPreferenceUpdateInput {
                rating: Some(-2),
                allergy: Some(true),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.rating, -2);
    assert!(updated.allergy);
    assert_eq!(updated.notes, "fresh only");

    let err = repo
        .update_user_ingredient_preference(
            &fx.ctx,
            "gen-1",
            "someone-else",
            &UserIngredientPreferenceUpdateInput::default(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    repo.archive_user_ingredient_preference(&fx.ctx, "gen-1", "user-1")
        .unwrap();
    let err = repo
        .get_user_ingredient_preference(&fx.ctx, "gen-1", "user-1")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn group_preference_fans_out_to_every_member() {
    let fx = pantry();
    let groups = SqliteValidIngredientGroupRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();
    let repo = SqliteUserIngredientPreferenceRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();
    groups
        .create_valid_ingredient_group(
            &fx.ctx,
            &group("herbs", "Fresh herbs", &[("m-1", "ing-basil"), ("m-2", "ing-thyme")]),
        )
        .unwrap();
    groups
        .create_valid_ingredient_group(&fx.ctx, &group("empty", "Nothing", &[]))
        .unwrap();

    let created = repo
        .create_user_ingredient_preference(&fx.ctx, &preference_for(None, Some("herbs")))
        .unwrap();
    let names: Vec<_> = created.iter().map(|p| p.ingredient.name.as_str()).collect();
    assert_eq!(names, vec!["basil", "thyme"]);

    let page = repo
        .list_user_ingredient_preferences(&fx.ctx, "user-1", &QueryFilter::default())
        .unwrap();
    assert_eq!(page.total_count, 2);
    assert_eq!(page.filtered_count, 2);

    let err = repo
        .create_user_ingredient_preference(&fx.ctx, &preference_for(None, Some("empty")))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    let err = repo
        .create_user_ingredient_preference(&fx.ctx, &preference_for(None, Some("ghost")))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn group_preference_is_all_or_nothing() {
    let fx = pantry();
    let groups = SqliteValidIngredientGroupRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();
    let repo = SqliteUserIngredientPreferenceRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();
    groups
        .create_valid_ingredient_group(
            &fx.ctx,
            &group("herbs", "Fresh herbs", &[("m-1", "ing-basil"), ("m-2", "ing-thyme")]),
        )
        .unwrap();
    repo.create_user_ingredient_preference(&fx.ctx, &preference_for(Some("ing-thyme"), None))
        .unwrap();

    let err = repo
        .create_user_ingredient_preference(&fx.ctx, &preference_for(None, Some("herbs")))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(count_rows(&fx.conn, "user_ingredient_preferences"), 1);
}

#[test]
fn preference_target_must_be_exactly_one_of_ingredient_or_group() {
    let fx = pantry();
    let repo = SqliteUserIngredientPreferenceRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();

    for input in [
        preference_for(None, None),
        preference_for(Some("ing-basil"), Some("herbs")),
        preference_for(Some("  "), None),
    ] {
        let err = repo
            .create_user_ingredient_preference(&fx.ctx, &input)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
