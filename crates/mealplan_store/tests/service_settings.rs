mod common;

use chrono::Duration;
use common::{fixture, seed_household, seed_user, Fixture};
use mealplan_store::model::{
    QueryFilter, ServiceSettingConfigurationCreationInput, ServiceSettingConfigurationUpdateInput,
    ServiceSettingCreationInput, ServiceSettingType,
};
use mealplan_store::repo::{ServiceSettingRepository, SqliteServiceSettingRepository};
use mealplan_store::ErrorKind;

fn world() -> Fixture {
    let fx = fixture();
    seed_user(&fx.conn, "user-1", "cook@example.com");
    seed_household(&fx.conn, "household-1", "user-1");
    fx
}

fn unit_system_setting() -> ServiceSettingCreationInput {
    ServiceSettingCreationInput {
        id: "setting-units".to_string(),
        name: "preferred_unit_system".to_string(),
        kind: ServiceSettingType::User,
        description: "which measurement system to show".to_string(),
        default_value: Some("metric".to_string()),
        enumeration: vec!["metric".to_string(), "imperial".to_string()],
        admins_only: false,
    }
}

fn configuration(id: &str, value: &str, user: Option<&str>, household: Option<&str>) -> ServiceSettingConfigurationCreationInput {
    ServiceSettingConfigurationCreationInput {
        id: id.to_string(),
        value: value.to_string(),
        notes: String::new(),
        service_setting_id: "setting-units".to_string(),
        belongs_to_user: user.map(str::to_string),
        belongs_to_household: household.map(str::to_string),
    }
}

#[test]
fn setting_keeps_its_ordered_enumeration() {
    let fx = world();
    let repo = SqliteServiceSettingRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();

    let created = repo.create_service_setting(&fx.ctx, &unit_system_setting()).unwrap();
    assert_eq!(created.enumeration, vec!["metric", "imperial"]);

    let by_name = repo
        .get_service_setting_by_name(&fx.ctx, "preferred_unit_system")
        .unwrap();
    assert_eq!(by_name, created);
    assert_eq!(repo.get_service_setting(&fx.ctx, "setting-units").unwrap(), created);
    let page = repo
        .list_service_settings(&fx.ctx, &QueryFilter::default())
        .unwrap();
    assert_eq!(page.items, vec![created]);
}

#[test]
fn invalid_setting_definitions_are_rejected() {
    let fx = world();
    let repo = SqliteServiceSettingRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();

    let mut bad_default = unit_system_setting();
    bad_default.default_value = Some("cubits".to_string());
    let mut reserved = unit_system_setting();
    reserved.enumeration.push("a|b".to_string());
    let mut empty_option = unit_system_setting();
    empty_option.enumeration.push(String::new());
    let mut blank_option = unit_system_setting();
    blank_option.enumeration.insert(1, "   ".to_string());
    for input in [bad_default, reserved, empty_option, blank_option] {
        let err = repo.create_service_setting(&fx.ctx, &input).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    repo.create_service_setting(&fx.ctx, &unit_system_setting()).unwrap();
    let mut duplicate = unit_system_setting();
    duplicate.id = "setting-units-2".to_string();
    let err = repo.create_service_setting(&fx.ctx, &duplicate).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[test]
fn archived_setting_frees_its_name() {
    let fx = world();
    let repo = SqliteServiceSettingRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();
    repo.create_service_setting(&fx.ctx, &unit_system_setting()).unwrap();

    repo.archive_service_setting(&fx.ctx, "setting-units").unwrap();
    assert!(!repo.service_setting_exists(&fx.ctx, "setting-units").unwrap());
    let err = repo
        .archive_service_setting(&fx.ctx, "setting-units")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let mut replacement = unit_system_setting();
    replacement.id = "setting-units-2".to_string();
    repo.create_service_setting(&fx.ctx, &replacement).unwrap();
}

#[test]
fn configurations_are_scoped_to_user_or_household() {
    let fx = world();
    let repo = SqliteServiceSettingRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();
    repo.create_service_setting(&fx.ctx, &unit_system_setting()).unwrap();

    let for_user = repo
        .create_service_setting_configuration(&fx.ctx, &configuration("cfg-user", "imperial", Some("user-1"), None))
        .unwrap();
    assert_eq!(for_user.service_setting.name, "preferred_unit_system");
    repo.create_service_setting_configuration(
        &fx.ctx,
        &configuration("cfg-house", "metric", None, Some("household-1")),
    )
    .unwrap();

    let found = repo
        .get_service_setting_configuration_for_user_by_setting_name(&fx.ctx, "user-1", "preferred_unit_system")
        .unwrap();
    assert_eq!(found, for_user);
    let household = repo
        .get_service_setting_configuration_for_household_by_setting_name(
            &fx.ctx,
            "household-1",
            "preferred_unit_system",
        )
        .unwrap();
    assert_eq!(household.value, "metric");
    assert!(repo
        .service_setting_configuration_exists(&fx.ctx, "cfg-house")
        .unwrap());

    let user_page = repo
        .list_service_setting_configurations_for_user(&fx.ctx, "user-1", &QueryFilter::default())
        .unwrap();
    assert_eq!(user_page.total_count, 1);
    assert_eq!(user_page.items[0].id, "cfg-user");
    let household_page = repo
        .list_service_setting_configurations_for_household(&fx.ctx, "household-1", &QueryFilter::default())
        .unwrap();
    assert_eq!(household_page.items[0].id, "cfg-house");

    for input in [
        configuration("cfg-both", "metric", Some("user-1"), Some("household-1")),
        configuration("cfg-none", "metric", None, None),
        configuration("cfg-bad", "cubits", Some("user-1"), None),
    ] {
        let err = repo
            .create_service_setting_configuration(&fx.ctx, &input)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput, "{}", input.id);
    }
}

#[test]
fn configuration_update_checks_options_and_archive_hides_it() {
    let fx = world();
    let repo = SqliteServiceSettingRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();
    repo.create_service_setting(&fx.ctx, &unit_system_setting()).unwrap();
    repo.create_service_setting_configuration(&fx.ctx, &configuration("cfg-user", "metric", Some("user-1"), None))
        .unwrap();

    fx.clock.advance(Duration::hours(1));
    let updated = repo
        .update_service_setting_configuration(
            &fx.ctx,
            "cfg-user",
            &ServiceSettingConfigurationUpdateInput {
                value: Some("imperial".to_string()),
                notes: None,
            },
        )
        .unwrap();
    assert_eq!(updated.value, "imperial");
    assert!(updated.last_updated_at.is_some());

    let err = repo
        .update_service_setting_configuration(
            &fx.ctx,
            "cfg-user",
            &ServiceSettingConfigurationUpdateInput {
                value: Some("cubits".to_string()),
                notes: None,
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    repo.archive_service_setting_configuration(&fx.ctx, "cfg-user")
        .unwrap();
    let err = repo
        .get_service_setting_configuration(&fx.ctx, "cfg-user")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let err = repo
        .archive_service_setting_configuration(&fx.ctx, "cfg-user")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn configurations_of_archived_setting_are_hidden_from_get_and_list() {
    let fx = world();
    let repo = SqliteServiceSettingRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();
    repo.create_service_setting(&fx.ctx, &unit_system_setting()).unwrap();
    repo.create_service_setting_configuration(&fx.ctx, &configuration("cfg-user", "metric", Some("user-1"), None))
        .unwrap();
    repo.create_service_setting_configuration(
        &fx.ctx,
        &configuration("cfg-house", "metric", None, Some("household-1")),
    )
    .unwrap();

    repo.archive_service_setting(&fx.ctx, "setting-units").unwrap();

    let err = repo
        .get_service_setting_configuration(&fx.ctx, "cfg-user")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let user_page = repo
        .list_service_setting_configurations_for_user(&fx.ctx, "user-1", &QueryFilter::default())
        .unwrap();
    assert!(user_page.items.is_empty());
    assert_eq!(user_page.total_count, 0);
    assert_eq!(user_page.filtered_count, 0);
    let household_page = repo
        .list_service_setting_configurations_for_household(&fx.ctx, "household-1", &QueryFilter::default())
        .unwrap();
    assert!(household_page.items.is_empty());
    assert_eq!(household_page.total_count, 0);
}
